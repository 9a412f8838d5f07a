use crate::convert::buffer::{PixelFormat, RenderableBuffer};
use crate::foundation::core::{CanvasSize, Pts, Timescale};
use crate::foundation::error::GifMotionResult;

/// Default target bitrate in bits per second.
pub const DEFAULT_BITRATE_BPS: u32 = 640_000;

/// Video codecs an encoder can be configured with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    /// H.264 / AVC.
    #[default]
    H264,
}

/// Codec parameters fixed for a whole session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CodecParams {
    /// Output codec.
    pub codec: VideoCodec,
    /// Target bitrate in bits per second.
    pub bitrate_bps: u32,
    /// Time base of every appended timestamp and of the output track.
    pub timescale: Timescale,
    /// Layout of appended buffers.
    pub input_format: PixelFormat,
}

impl Default for CodecParams {
    fn default() -> Self {
        Self {
            codec: VideoCodec::H264,
            bitrate_bps: DEFAULT_BITRATE_BPS,
            timescale: Timescale::DEFAULT,
            input_format: PixelFormat::Argb32Premul,
        }
    }
}

/// Callback invoked once finalization has completed (or failed).
pub type FinalizeCompletion = Box<dyn FnOnce(GifMotionResult<()>) + Send + 'static>;

/// Encoder + muxer handle driven by an [`crate::EncodingSession`].
///
/// The session guarantees call order: `configure`, `start`, any number of
/// `is_ready_for_more_data`/`append`, `mark_input_finished`, `finalize`. `abort` may be called at
/// any point after which no other method is called.
pub trait VideoEncoder {
    /// Validate and apply session parameters. Rejections must be reported here, before writing.
    fn configure(&mut self, canvas: CanvasSize, params: &CodecParams) -> GifMotionResult<()>;

    /// Begin writing a track that starts at timestamp zero.
    fn start(&mut self) -> GifMotionResult<()>;

    /// Whether the encoder can take another buffer right now.
    fn is_ready_for_more_data(&mut self) -> bool;

    /// Submit one buffer. `false` means the data was refused; see [`VideoEncoder::last_error`].
    fn append(&mut self, buffer: &RenderableBuffer, pts: Pts) -> bool;

    /// Most recent failure reported by the encoder.
    fn last_error(&self) -> Option<String>;

    /// Close the video track; the last appended buffer is displayed until `end`.
    fn mark_input_finished(&mut self, end: Pts);

    /// Flush and finalize the container, then invoke `completion` (possibly from another thread).
    fn finalize(&mut self, completion: FinalizeCompletion);

    /// Tear down without producing output, removing any partially written file.
    fn abort(&mut self);
}
