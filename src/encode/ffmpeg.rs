use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::convert::buffer::{PixelFormat, RenderableBuffer, byte_len};
use crate::encode::encoder::{CodecParams, FinalizeCompletion, VideoCodec, VideoEncoder};
use crate::foundation::core::{CENTISECONDS_PER_SECOND, CanvasSize, Pts, Timescale};
use crate::foundation::error::{GifMotionError, GifMotionResult};
use crate::foundation::math::mul_div255_u16;

/// Output container written by [`FfmpegEncoder`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    /// ISO MP4.
    #[default]
    Mp4,
    /// QuickTime MOV.
    Mov,
}

impl Container {
    fn muxer(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Mov => "mov",
        }
    }
}

/// Options for [`FfmpegEncoder`].
#[derive(Clone, Debug)]
pub struct FfmpegEncoderOpts {
    /// Output file path.
    pub out_path: PathBuf,
    /// Overwrite the output file if it already exists.
    pub overwrite: bool,
    /// Background color used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
    /// Frames that may be queued for the spool writer before the encoder reports "not ready".
    pub queue_depth: usize,
    /// Output container.
    pub container: Container,
    /// `ffmpeg` executable, looked up on `PATH` when not absolute.
    pub ffmpeg_bin: PathBuf,
}

impl FfmpegEncoderOpts {
    /// Options for writing an MP4 to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            bg_rgba: [0, 0, 0, 255],
            queue_depth: 4,
            container: Container::Mp4,
            ffmpeg_bin: PathBuf::from("ffmpeg"),
        }
    }
}

struct Spool {
    path: PathBuf,
    tx: Option<SyncSender<Vec<u8>>>,
    writer: Option<JoinHandle<()>>,
}

impl Spool {
    fn close_input(&mut self) {
        drop(self.tx.take());
    }

    fn join_writer(&mut self) -> GifMotionResult<()> {
        self.close_input();
        if let Some(writer) = self.writer.take() {
            writer
                .join()
                .map_err(|_| GifMotionError::finalize("frame spool writer thread panicked"))?;
        }
        Ok(())
    }

    fn remove(&self) {
        if self.path.exists()
            && let Err(e) = std::fs::remove_file(&self.path)
        {
            tracing::warn!(spool = %self.path.display(), error = %e, "failed to remove frame spool");
        }
    }
}

/// Encoder that runs the system `ffmpeg` over raw ARGB frames.
///
/// Appended buffers are flattened and spooled once each to a file next to the output, so the
/// cost of an append does not depend on how long the frame is shown. `finalize` then plays the
/// spool into `ffmpeg` on a 100 fps centisecond grid: each frame is written once per grid slot it
/// covers, up to the next frame's timestamp or the end passed to `mark_input_finished`. The output
/// track uses the session timescale.
pub struct FfmpegEncoder {
    opts: FfmpegEncoderOpts,
    canvas: Option<CanvasSize>,
    params: Option<CodecParams>,
    frame_len: usize,

    spool: Option<Spool>,
    in_flight: Arc<AtomicUsize>,
    writer_error: Arc<Mutex<Option<String>>>,
    last_error: Option<String>,

    starts: Vec<i64>,
    end_slot: Option<i64>,
    output_touched: Arc<AtomicBool>,
}

impl FfmpegEncoder {
    /// Create an encoder writing to `opts.out_path`.
    pub fn new(opts: FfmpegEncoderOpts) -> Self {
        Self {
            opts,
            canvas: None,
            params: None,
            frame_len: 0,
            spool: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
            writer_error: Arc::new(Mutex::new(None)),
            last_error: None,
            starts: Vec::new(),
            end_slot: None,
            output_touched: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Output path.
    pub fn out_path(&self) -> &Path {
        &self.opts.out_path
    }

    fn timescale(&self) -> Timescale {
        self.params
            .map(|p| p.timescale)
            .unwrap_or(Timescale::DEFAULT)
    }
}

fn grid_slot(pts: Pts) -> i64 {
    let per_slot = pts.timescale.ticks_per_centisecond();
    (pts.ticks + per_slot / 2) / per_slot
}

/// Grid slots covered by each spooled frame.
///
/// `starts` holds the slot each frame was appended at, in order, and `end` the slot the track
/// closes at. The first frame also covers the slots before its own start. A frame whose slot is
/// reached by its successor covers nothing, and the last frame covers at least one slot.
fn plan_grid_repeats(starts: &[i64], end: i64) -> Vec<u64> {
    let mut cursor = 0i64;
    let mut repeats = Vec::with_capacity(starts.len());
    for i in 0..starts.len() {
        let until = match starts.get(i + 1) {
            Some(&next) => next,
            None => end.max(cursor + 1),
        };
        if until > cursor {
            repeats.push((until - cursor).unsigned_abs());
            cursor = until;
        } else {
            repeats.push(0);
        }
    }
    repeats
}

fn spool_path(out_path: &Path) -> PathBuf {
    let mut name = out_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "gifmotion-output".into());
    name.push(".frames");
    out_path.with_file_name(name)
}

fn record_error(slot: &Mutex<Option<String>>, msg: String) {
    match slot.lock() {
        Ok(mut guard) => *guard = Some(msg),
        Err(poisoned) => *poisoned.into_inner() = Some(msg),
    }
}

fn read_error(slot: &Mutex<Option<String>>) -> Option<String> {
    match slot.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn spawn_spool_writer(
    file: File,
    rx: Receiver<Vec<u8>>,
    in_flight: Arc<AtomicUsize>,
    writer_error: Arc<Mutex<Option<String>>>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut out = BufWriter::new(file);
        let mut failed = false;
        for frame in rx {
            if !failed && let Err(e) = out.write_all(&frame) {
                record_error(&writer_error, format!("failed to spool frame: {e}"));
                failed = true;
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        if !failed && let Err(e) = out.flush() {
            record_error(&writer_error, format!("failed to flush frame spool: {e}"));
        }
    })
}

fn ffmpeg_command(opts: &FfmpegEncoderOpts, canvas: CanvasSize, params: &CodecParams) -> Command {
    let mut cmd = Command::new(&opts.ffmpeg_bin);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    cmd.arg(if opts.overwrite { "-y" } else { "-n" });

    // Input: opaque ARGB on the centisecond grid.
    cmd.args([
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "argb",
        "-s",
        &format!("{}x{}", canvas.width, canvas.height),
        "-r",
        &CENTISECONDS_PER_SECOND.to_string(),
        "-i",
        "pipe:0",
    ]);
    cmd.args([
        "-an",
        "-c:v",
        "libx264",
        "-b:v",
        &params.bitrate_bps.to_string(),
        "-pix_fmt",
        "yuv420p",
        "-video_track_timescale",
        &params.timescale.get().to_string(),
        "-movflags",
        "+faststart",
        "-f",
        opts.container.muxer(),
    ]);
    cmd.arg(&opts.out_path);
    cmd
}

/// Write every spooled frame `plan[i]` times to `sink`.
fn feed_frames<W: Write>(
    sink: &mut W,
    spool: &Path,
    frame_len: usize,
    plan: &[u64],
) -> GifMotionResult<()> {
    let file = File::open(spool).map_err(|e| {
        GifMotionError::finalize(format!(
            "failed to open frame spool '{}': {e}",
            spool.display()
        ))
    })?;
    let mut reader = BufReader::new(file);
    let mut frame = vec![0u8; frame_len];
    for &repeats in plan {
        reader
            .read_exact(&mut frame)
            .map_err(|e| GifMotionError::finalize(format!("failed to read frame spool: {e}")))?;
        for _ in 0..repeats {
            sink.write_all(&frame).map_err(|e| {
                GifMotionError::finalize(format!("failed to write frame to ffmpeg stdin: {e}"))
            })?;
        }
    }
    sink.flush()
        .map_err(|e| GifMotionError::finalize(format!("failed to flush ffmpeg stdin: {e}")))
}

fn encode_spool(
    mut cmd: Command,
    spool: &Path,
    frame_len: usize,
    plan: &[u64],
) -> GifMotionResult<()> {
    let mut child = cmd.spawn().map_err(|e| {
        GifMotionError::finalize(format!(
            "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
        ))
    })?;

    let stdin = child.stdin.take();
    let stderr = child.stderr.take();
    let (Some(mut stdin), Some(mut stderr)) = (stdin, stderr) else {
        let _ = child.kill();
        let _ = child.wait();
        return Err(GifMotionError::finalize("failed to open ffmpeg stdio pipes"));
    };
    let stderr_drain = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut stderr_bytes = Vec::new();
        stderr.read_to_end(&mut stderr_bytes)?;
        Ok(stderr_bytes)
    });

    let fed = feed_frames(&mut stdin, spool, frame_len, plan);
    drop(stdin);

    let status = child.wait().map_err(|e| {
        GifMotionError::finalize(format!("failed to wait for ffmpeg to finish: {e}"))
    })?;
    let stderr_bytes = stderr_drain
        .join()
        .map_err(|_| GifMotionError::finalize("ffmpeg stderr drain thread panicked"))?
        .map_err(|e| GifMotionError::finalize(format!("ffmpeg stderr read failed: {e}")))?;
    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr_bytes);
        return Err(GifMotionError::finalize(format!(
            "ffmpeg exited with status {status}: {}",
            stderr.trim()
        )));
    }
    fed
}

impl VideoEncoder for FfmpegEncoder {
    fn configure(&mut self, canvas: CanvasSize, params: &CodecParams) -> GifMotionResult<()> {
        if canvas.width == 0 || canvas.height == 0 {
            return Err(GifMotionError::configuration(
                "ffmpeg encoder width/height must be non-zero",
            ));
        }
        if !canvas.width.is_multiple_of(2) || !canvas.height.is_multiple_of(2) {
            return Err(GifMotionError::configuration(format!(
                "canvas {canvas} must have even dimensions for yuv420p output; \
                 scale it by 2 or pick an even fixed size"
            )));
        }
        if params.bitrate_bps == 0 {
            return Err(GifMotionError::configuration("bitrate must be non-zero"));
        }
        if params.codec != VideoCodec::H264 {
            return Err(GifMotionError::configuration(format!(
                "unsupported codec {:?}",
                params.codec
            )));
        }
        if params.input_format != PixelFormat::Argb32Premul {
            return Err(GifMotionError::configuration(format!(
                "unsupported input format {:?}",
                params.input_format
            )));
        }
        if self.opts.queue_depth == 0 {
            return Err(GifMotionError::configuration("queue depth must be non-zero"));
        }
        let frame_len = byte_len(canvas, PixelFormat::Argb32Premul)
            .map_err(|e| GifMotionError::configuration(e.to_string()))?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(GifMotionError::configuration(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }
        if !ffmpeg_runs(&self.opts.ffmpeg_bin) {
            return Err(GifMotionError::configuration(format!(
                "ffmpeg is required for H.264 encoding, but '{}' could not be run",
                self.opts.ffmpeg_bin.display()
            )));
        }
        ensure_parent_dir(&self.opts.out_path)?;

        self.canvas = Some(canvas);
        self.params = Some(*params);
        self.frame_len = frame_len;
        Ok(())
    }

    fn start(&mut self) -> GifMotionResult<()> {
        if self.canvas.is_none() || self.params.is_none() {
            return Err(GifMotionError::invalid_state("ffmpeg encoder not configured"));
        }
        if self.spool.is_some() {
            return Err(GifMotionError::invalid_state("ffmpeg encoder already started"));
        }

        let path = spool_path(&self.opts.out_path);
        let file = File::create(&path).map_err(|e| {
            GifMotionError::configuration(format!(
                "failed to create frame spool '{}': {e}",
                path.display()
            ))
        })?;

        let (tx, rx) = mpsc::sync_channel(self.opts.queue_depth);
        self.in_flight.store(0, Ordering::SeqCst);
        self.output_touched.store(false, Ordering::SeqCst);
        match self.writer_error.lock() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        let writer = spawn_spool_writer(
            file,
            rx,
            Arc::clone(&self.in_flight),
            Arc::clone(&self.writer_error),
        );

        tracing::debug!(spool = %path.display(), out = %self.opts.out_path.display(), "frame spool opened");
        self.spool = Some(Spool {
            path,
            tx: Some(tx),
            writer: Some(writer),
        });
        self.starts.clear();
        self.end_slot = None;
        Ok(())
    }

    fn is_ready_for_more_data(&mut self) -> bool {
        // A failed writer is reported through `append` rather than as endless backpressure.
        read_error(&self.writer_error).is_some()
            || self.in_flight.load(Ordering::SeqCst) < self.opts.queue_depth
    }

    fn append(&mut self, buffer: &RenderableBuffer, pts: Pts) -> bool {
        if let Some(err) = read_error(&self.writer_error) {
            self.last_error = Some(err);
            return false;
        }
        if Some(buffer.canvas()) != self.canvas || buffer.format() != PixelFormat::Argb32Premul {
            self.last_error = Some(format!(
                "buffer {} {:?} does not match the configured canvas",
                buffer.canvas(),
                buffer.format()
            ));
            return false;
        }
        if pts.timescale != self.timescale() {
            self.last_error = Some(format!("timestamp {pts} uses a foreign timescale"));
            return false;
        }
        let Some(tx) = self.spool.as_ref().and_then(|s| s.tx.as_ref()) else {
            self.last_error = Some("ffmpeg encoder is not writing".to_string());
            return false;
        };

        let mut argb = vec![0u8; buffer.data().len()];
        flatten_premul_argb_over_bg(&mut argb, buffer.data(), self.opts.bg_rgba);

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if tx.send(argb).is_err() {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.last_error = Some(
                read_error(&self.writer_error)
                    .unwrap_or_else(|| "frame spool writer stopped".to_string()),
            );
            return false;
        }
        self.starts.push(grid_slot(pts));
        true
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }

    fn mark_input_finished(&mut self, end: Pts) {
        self.end_slot = Some(grid_slot(end));
        if let Some(spool) = self.spool.as_mut() {
            spool.close_input();
        }
    }

    fn finalize(&mut self, completion: FinalizeCompletion) {
        let (Some(mut spool), Some(canvas), Some(params)) =
            (self.spool.take(), self.canvas, self.params)
        else {
            completion(Err(GifMotionError::finalize("ffmpeg encoder not started")));
            return;
        };
        spool.close_input();

        let plan = plan_grid_repeats(&self.starts, self.end_slot.unwrap_or(0));
        let cmd = ffmpeg_command(&self.opts, canvas, &params);
        let frame_len = self.frame_len;
        let writer_error = Arc::clone(&self.writer_error);
        let output_touched = Arc::clone(&self.output_touched);

        std::thread::spawn(move || {
            let res = (|| -> GifMotionResult<()> {
                spool.join_writer()?;
                if let Some(msg) = read_error(&writer_error) {
                    return Err(GifMotionError::finalize(msg));
                }
                if plan.is_empty() {
                    return Err(GifMotionError::finalize("no frames were appended"));
                }
                output_touched.store(true, Ordering::SeqCst);
                tracing::debug!(
                    frames = plan.len(),
                    slots = plan.iter().sum::<u64>(),
                    "encoding frame spool"
                );
                encode_spool(cmd, &spool.path, frame_len, &plan)
            })();
            spool.remove();
            completion(res);
        });
    }

    fn abort(&mut self) {
        if let Some(mut spool) = self.spool.take() {
            let _ = spool.join_writer();
            spool.remove();
        }
        self.starts.clear();
        if self.output_touched.load(Ordering::SeqCst)
            && self.opts.out_path.exists()
            && let Err(e) = std::fs::remove_file(&self.opts.out_path)
        {
            tracing::warn!(out = %self.opts.out_path.display(), error = %e, "failed to remove partial output");
        }
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if let Some(mut spool) = self.spool.take() {
            let _ = spool.join_writer();
            spool.remove();
        }
    }
}

/// Flatten premultiplied ARGB8 over `bg_rgba` into opaque ARGB8.
fn flatten_premul_argb_over_bg(dst: &mut [u8], src_premul: &[u8], bg_rgba: [u8; 4]) {
    let bg_r = u16::from(bg_rgba[0]);
    let bg_g = u16::from(bg_rgba[1]);
    let bg_b = u16::from(bg_rgba[2]);

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = u16::from(s[0]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;
        d[0] = 255;
        d[1] = (u16::from(s[1]) + mul_div255_u16(bg_r, inv)).min(255) as u8;
        d[2] = (u16::from(s[2]) + mul_div255_u16(bg_g, inv)).min(255) as u8;
        d[3] = (u16::from(s[3]) + mul_div255_u16(bg_b, inv)).min(255) as u8;
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> GifMotionResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    ffmpeg_runs(Path::new("ffmpeg"))
}

fn ffmpeg_runs(bin: &Path) -> bool {
    Command::new(bin)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
