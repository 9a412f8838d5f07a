//! GIF -> video orchestration.

use std::path::Path;

use crate::convert::{PixelBufferConverter, ScaleFilter};
use crate::encode::encoder::{CodecParams, VideoEncoder};
use crate::encode::ffmpeg::{Container, FfmpegEncoder, FfmpegEncoderOpts};
use crate::encode::session::{AppendOutcome, EncodingSession, RetryPolicy};
use crate::foundation::cancel::CancelToken;
use crate::foundation::core::{CanvasSize, Pts, Timescale};
use crate::foundation::error::{GifMotionError, GifMotionResult};
use crate::source::gif::GifAsset;
use crate::source::{DelayRecord, FrameSource, FrameSourceOpener};
use crate::timing::{Schedule, TimingPolicyKind, schedule};

/// How the output canvas is derived from the source canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanvasSizing {
    /// Use the canvas declared by the source.
    #[default]
    Source,
    /// Multiply both source dimensions by an integer factor.
    Scaled(u32),
    /// Use an explicit size; frames are stretched to it.
    Fixed {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
}

impl CanvasSizing {
    /// Resolve the session canvas for a source canvas.
    pub fn resolve(self, source: CanvasSize) -> GifMotionResult<CanvasSize> {
        match self {
            CanvasSizing::Source => Ok(source),
            CanvasSizing::Scaled(factor) => {
                if factor == 0 {
                    return Err(GifMotionError::validation("canvas scale factor must be >= 1"));
                }
                source.scaled(factor)
            }
            CanvasSizing::Fixed { width, height } => CanvasSize::new(width, height),
        }
    }
}

/// What to do when the encoder refuses a buffer it was ready for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectPolicy {
    /// Record the rejection and carry on with the next emission.
    #[default]
    Continue,
    /// Abort the conversion on the first rejection.
    Abort,
}

/// Output file options used by [`convert_gif_file`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OutputOpts {
    /// Overwrite an existing output file.
    pub overwrite: bool,
    /// Background color used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
    /// Container format.
    pub container: Container,
    /// Frames queued for the spool writer before backpressure applies.
    pub queue_depth: usize,
}

impl Default for OutputOpts {
    fn default() -> Self {
        Self {
            overwrite: true,
            bg_rgba: [0, 0, 0, 255],
            container: Container::Mp4,
            queue_depth: 4,
        }
    }
}

impl OutputOpts {
    /// Encoder options for writing to `out_path`.
    pub fn encoder_opts(&self, out_path: &Path) -> FfmpegEncoderOpts {
        FfmpegEncoderOpts {
            overwrite: self.overwrite,
            bg_rgba: self.bg_rgba,
            queue_depth: self.queue_depth,
            container: self.container,
            ..FfmpegEncoderOpts::new(out_path)
        }
    }
}

/// Conversion options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConvertOpts {
    /// Output canvas derivation.
    pub canvas: CanvasSizing,
    /// Timing strategy.
    pub timing: TimingPolicyKind,
    /// Codec parameters, including the session timescale.
    pub codec: CodecParams,
    /// Readiness polling budget per append.
    pub retry: RetryPolicy,
    /// Reaction to hard rejections.
    pub reject_policy: RejectPolicy,
    /// Resampling used when frames are stretched.
    pub scale_filter: ScaleFilter,
    /// Output file options.
    pub output: OutputOpts,
}

impl ConvertOpts {
    /// Validate options that do not depend on the source or the encoder.
    pub fn validate(&self) -> GifMotionResult<()> {
        if let CanvasSizing::Scaled(0) = self.canvas {
            return Err(GifMotionError::validation("canvas scale factor must be >= 1"));
        }
        if let CanvasSizing::Fixed { width, height } = self.canvas {
            CanvasSize::new(width, height)?;
        }
        if self.retry.max_attempts == 0 {
            return Err(GifMotionError::validation("retry max_attempts must be >= 1"));
        }
        if self.output.queue_depth == 0 {
            return Err(GifMotionError::validation("output queue_depth must be >= 1"));
        }
        Ok(())
    }
}

/// Non-fatal per-emission problem.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameIssue {
    /// The encoder never became ready; the buffer was dropped.
    AppendTimeout {
        /// Source frame.
        frame_index: usize,
        /// Timestamp the buffer was submitted at.
        pts: Pts,
        /// Readiness polls made.
        attempts: u32,
    },
    /// The encoder refused the buffer.
    AppendRejected {
        /// Source frame.
        frame_index: usize,
        /// Timestamp the buffer was submitted at.
        pts: Pts,
        /// Encoder-reported reason.
        reason: String,
    },
}

/// Summary of a finished conversion.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConversionReport {
    /// Session canvas.
    pub canvas: CanvasSize,
    /// Session time base.
    pub timescale: Timescale,
    /// Timing policy name.
    pub policy: String,
    /// Frames decoded from the source.
    pub frames_read: usize,
    /// Emissions the encoder accepted.
    pub emissions_appended: usize,
    /// Emissions dropped after the readiness budget ran out.
    pub dropped: usize,
    /// Emissions the encoder refused.
    pub rejected: usize,
    /// End timestamp of every planned emission, in ticks.
    pub timestamps: Vec<i64>,
    /// Presentation end of the track.
    pub total_duration: Pts,
    /// Per-emission warnings, in order.
    pub issues: Vec<FrameIssue>,
}

/// Convert the frames of `opener` into a video through `encoder`.
///
/// Errors raised before the first append (`Decode`, `Configuration`, `Validation`) leave no
/// output. Any later fatal error drops the session, which aborts the encoder and discards partial
/// output. Append timeouts and (with [`RejectPolicy::Continue`]) rejections are collected in the
/// report instead.
#[tracing::instrument(skip_all, fields(timing = ?opts.timing, canvas = ?opts.canvas))]
pub fn convert_gif<O, E>(
    opener: &O,
    encoder: E,
    opts: &ConvertOpts,
    cancel: &CancelToken,
) -> GifMotionResult<ConversionReport>
where
    O: FrameSourceOpener,
    E: VideoEncoder,
{
    opts.validate()?;
    cancel.check()?;

    let mut source = opener.open()?;
    let Some(mut current) = source.next_frame()? else {
        return Err(GifMotionError::decode("source contains no frames"));
    };
    let canvas = opts.canvas.resolve(source.canvas())?;
    let timescale = opts.codec.timescale;

    let mut policy = opts.timing.build();
    let prescan = if policy.requires_prescan() {
        opener.open()?.read_delays()?
    } else {
        Vec::new()
    };
    policy.begin(timescale, &prescan)?;

    let mut session = EncodingSession::new(encoder, opts.retry, cancel.clone());
    session.configure(canvas, opts.codec)?;
    session.start_writing()?;
    tracing::info!(
        %canvas,
        timescale = timescale.get(),
        policy = policy.name(),
        "conversion started"
    );

    let mut converter = PixelBufferConverter::new(opts.scale_filter);
    let mut report = ConversionReport {
        canvas,
        timescale,
        policy: policy.name().to_string(),
        frames_read: 0,
        emissions_appended: 0,
        dropped: 0,
        rejected: 0,
        timestamps: Vec::new(),
        total_duration: Pts::zero(timescale),
        issues: Vec::new(),
    };

    loop {
        cancel.check()?;
        let (frame, delay) = current;
        report.frames_read += 1;

        let buffer = converter.convert(&frame, canvas)?;
        let emissions = policy.place(delay)?;
        tracing::debug!(
            frame = frame.index,
            delay_cs = delay.delay_cs,
            emissions = emissions.len(),
            "frame converted"
        );

        for emission in emissions {
            report.timestamps.push(emission.end.ticks);
            match session.append(&buffer, emission.start)? {
                AppendOutcome::Accepted { .. } => report.emissions_appended += 1,
                AppendOutcome::DroppedAfterTimeout { attempts } => {
                    tracing::warn!(
                        frame = emission.frame_index,
                        pts = %emission.start,
                        attempts,
                        "encoder not ready; frame dropped"
                    );
                    report.dropped += 1;
                    report.issues.push(FrameIssue::AppendTimeout {
                        frame_index: emission.frame_index,
                        pts: emission.start,
                        attempts,
                    });
                }
                AppendOutcome::HardRejected { reason } => {
                    tracing::warn!(
                        frame = emission.frame_index,
                        pts = %emission.start,
                        %reason,
                        "encoder rejected frame"
                    );
                    if opts.reject_policy == RejectPolicy::Abort {
                        session.fail();
                        return Err(GifMotionError::AppendRejected {
                            frame_index: emission.frame_index,
                            reason,
                        });
                    }
                    report.rejected += 1;
                    report.issues.push(FrameIssue::AppendRejected {
                        frame_index: emission.frame_index,
                        pts: emission.start,
                        reason,
                    });
                }
            }
        }
        converter.recycle(buffer);

        match source.next_frame()? {
            Some(next) => current = next,
            None => break,
        }
    }

    let end = policy.elapsed();
    session.finish(end)?;
    report.total_duration = end;

    tracing::info!(
        frames = report.frames_read,
        appended = report.emissions_appended,
        dropped = report.dropped,
        rejected = report.rejected,
        duration_s = end.as_secs_f64(),
        "conversion finished"
    );
    Ok(report)
}

/// Convert the GIF at `input` into an H.264 video at `output` using the system `ffmpeg`.
pub fn convert_gif_file(
    input: &Path,
    output: &Path,
    opts: &ConvertOpts,
) -> GifMotionResult<ConversionReport> {
    let asset = GifAsset::new(input);
    let encoder = FfmpegEncoder::new(opts.output.encoder_opts(output));
    convert_gif(&asset, encoder, opts, &CancelToken::new())
}

/// Source properties and the plans both timing policies would produce.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Inspection {
    /// Canvas declared by the source.
    pub canvas: CanvasSize,
    /// Number of frames.
    pub frame_count: usize,
    /// Resolved delays in source order.
    pub delays: Vec<DelayRecord>,
    /// Plan of [`TimingPolicyKind::DirectAccumulation`].
    pub direct_accumulation: Schedule,
    /// Plan of [`TimingPolicyKind::GcdExpansion`].
    pub gcd_expansion: Schedule,
}

/// Read every delay of `opener` and plan both timing policies without encoding.
pub fn inspect<O: FrameSourceOpener>(
    opener: &O,
    timescale: Timescale,
) -> GifMotionResult<Inspection> {
    let mut source = opener.open()?;
    let canvas = source.canvas();
    let delays = source.read_delays()?;

    let direct_accumulation = schedule(
        TimingPolicyKind::DirectAccumulation.build().as_mut(),
        &delays,
        timescale,
    )?;
    let gcd_expansion = schedule(
        TimingPolicyKind::GcdExpansion.build().as_mut(),
        &delays,
        timescale,
    )?;

    Ok(Inspection {
        canvas,
        frame_count: delays.len(),
        delays,
        direct_accumulation,
        gcd_expansion,
    })
}

#[cfg(test)]
#[path = "../tests/unit/pipeline.rs"]
mod tests;
