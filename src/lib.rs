//! gifmotion converts animated GIFs into H.264 video with variable presentation times.
//!
//! # Pipeline overview
//!
//! 1. **Decode**: `GifAsset -> (Frame, DelayRecord)*` (lazy, in display order)
//! 2. **Convert**: `Frame -> RenderableBuffer` (canvas-sized ARGB32, premultiplied)
//! 3. **Time**: `DelayRecord -> Emission*` through a [`TimingPolicy`]
//! 4. **Encode**: append every emission to an [`EncodingSession`] under bounded readiness retry,
//!    then finalize the container
//!
//! [`convert_gif`] runs the pipeline against any [`FrameSourceOpener`] and [`VideoEncoder`];
//! [`convert_gif_file`] wires a GIF on disk to the system `ffmpeg` binary.
//!
//! Design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Exact time base**: timescales are multiples of 100, so centisecond delays map to integer
//!   ticks without rounding.
//! - **One fatal error wins**: per-frame backpressure and rejections are reported as
//!   [`FrameIssue`]s; everything else aborts the session and discards partial output.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod convert;
mod encode;
mod foundation;
mod pipeline;
mod source;
mod timing;

pub use convert::buffer::{
    BufferPool, BufferPoolOpts, BufferPoolStats, PixelFormat, RenderableBuffer,
};
pub use convert::{PixelBufferConverter, ScaleFilter};
pub use encode::encoder::{
    CodecParams, DEFAULT_BITRATE_BPS, FinalizeCompletion, VideoCodec, VideoEncoder,
};
pub use encode::ffmpeg::{
    Container, FfmpegEncoder, FfmpegEncoderOpts, ensure_parent_dir, is_ffmpeg_on_path,
};
pub use encode::memory::{RecordedFrame, Recording, RecordingEncoder};
pub use encode::session::{
    AppendOutcome, EncodingSession, RetryPolicy, SessionState, append_with_retry,
};
pub use foundation::cancel::CancelToken;
pub use foundation::core::{CENTISECONDS_PER_SECOND, CanvasSize, Pts, Timescale};
pub use foundation::error::{GifMotionError, GifMotionResult};
pub use foundation::math::{gcd, gcd_all};
pub use pipeline::{
    CanvasSizing, ConversionReport, ConvertOpts, FrameIssue, Inspection, OutputOpts,
    RejectPolicy, convert_gif, convert_gif_file, inspect,
};
pub use source::gif::{GifAsset, GifFrameSource};
pub use source::{
    DelayRecord, FALLBACK_DELAY_CS, Frame, FrameSource, FrameSourceOpener, MemoryFrameSource,
    RawDelay,
};
pub use timing::{
    DirectAccumulation, Emission, GcdExpansion, Schedule, TimingPolicy, TimingPolicyKind,
    schedule,
};
