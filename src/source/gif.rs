use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ImageDecoder};

use crate::foundation::core::CanvasSize;
use crate::foundation::error::{GifMotionError, GifMotionResult};
use crate::source::{DelayRecord, Frame, FrameSource, FrameSourceOpener, RawDelay};

/// Delays at or below this value are presented as [`CLAMPED_MIN_DELAY_CS`] by browsers and
/// platform image decoders.
const CLAMP_THRESHOLD_CS: u32 = 1;
/// Minimum presented delay for clamped frames.
const CLAMPED_MIN_DELAY_CS: u32 = 10;

/// Animated GIF on disk.
#[derive(Clone, Debug)]
pub struct GifAsset {
    path: PathBuf,
}

impl GifAsset {
    /// Reference a GIF file. Nothing is read until [`FrameSourceOpener::open`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the asset.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSourceOpener for GifAsset {
    type Source = GifFrameSource;

    fn open(&self) -> GifMotionResult<Self::Source> {
        GifFrameSource::open(&self.path)
    }
}

/// Lazily decoded GIF frames.
///
/// Frames come out fully composited at the logical screen size (disposal methods applied by the
/// decoder), so every bitmap has the declared canvas dimensions.
pub struct GifFrameSource {
    path: PathBuf,
    canvas: CanvasSize,
    frames: image::Frames<'static>,
    next_index: usize,
    exhausted: bool,
}

impl GifFrameSource {
    /// Open `path` and read the GIF header.
    pub fn open(path: &Path) -> GifMotionResult<Self> {
        let file = File::open(path).map_err(|e| {
            GifMotionError::decode(format!("failed to open '{}': {e}", path.display()))
        })?;
        let decoder = GifDecoder::new(BufReader::new(file)).map_err(|e| {
            GifMotionError::decode(format!("'{}' is not a valid GIF: {e}", path.display()))
        })?;

        let (width, height) = decoder.dimensions();
        let canvas = CanvasSize::new(width, height).map_err(|_| {
            GifMotionError::decode(format!(
                "'{}' declares an empty logical screen ({width}x{height})",
                path.display()
            ))
        })?;

        tracing::debug!(path = %path.display(), %canvas, "opened gif");

        Ok(Self {
            path: path.to_path_buf(),
            canvas,
            frames: decoder.into_frames(),
            next_index: 0,
            exhausted: false,
        })
    }
}

impl FrameSource for GifFrameSource {
    fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    fn next_frame(&mut self) -> GifMotionResult<Option<(Frame, DelayRecord)>> {
        if self.exhausted {
            return Ok(None);
        }
        let Some(next) = self.frames.next() else {
            return Ok(None);
        };
        let index = self.next_index;
        let decoded = next.map_err(|e| {
            GifMotionError::decode(format!(
                "failed to decode frame {index} of '{}': {e}",
                self.path.display()
            ))
        })?;

        let raw = raw_delay_from_ms(decoded.delay().numer_denom_ms());
        let buffer = decoded.into_buffer();
        let (width, height) = buffer.dimensions();
        let frame = Frame::new(index, width, height, buffer.into_raw())?;
        self.next_index += 1;

        Ok(Some((frame, DelayRecord::resolve(index, raw))))
    }

    /// Reads the remaining delays from the frame descriptors without decompressing or
    /// compositing any pixel data.
    fn read_delays(&mut self) -> GifMotionResult<Vec<DelayRecord>> {
        let delays = scan_delays(&self.path, self.next_index)?;
        self.next_index += delays.len();
        self.exhausted = true;
        Ok(delays)
    }
}

/// Delays of every frame from `skip` onwards, read from the frame descriptors only.
fn scan_delays(path: &Path, skip: usize) -> GifMotionResult<Vec<DelayRecord>> {
    let file = File::open(path).map_err(|e| {
        GifMotionError::decode(format!("failed to open '{}': {e}", path.display()))
    })?;
    let mut opts = gif::DecodeOptions::new();
    opts.skip_frame_decoding(true);
    let mut decoder = opts.read_info(BufReader::new(file)).map_err(|e| {
        GifMotionError::decode(format!("'{}' is not a valid GIF: {e}", path.display()))
    })?;

    let mut delays = Vec::new();
    let mut index = 0usize;
    while let Some(frame) = decoder.read_next_frame().map_err(|e| {
        GifMotionError::decode(format!(
            "failed to read frame {index} of '{}': {e}",
            path.display()
        ))
    })? {
        if index >= skip {
            let raw = raw_delay_from_cs(u32::from(frame.delay));
            delays.push(DelayRecord::resolve(index, raw));
        }
        index += 1;
    }
    Ok(delays)
}

/// Convert the decoder's millisecond ratio back into the stored centisecond delay and its
/// clamped presentation value.
pub(crate) fn raw_delay_from_ms((numer, denom): (u32, u32)) -> RawDelay {
    let ms = if denom == 0 {
        0
    } else {
        (u64::from(numer) + u64::from(denom) / 2) / u64::from(denom)
    };
    raw_delay_from_cs(u32::try_from((ms + 5) / 10).unwrap_or(u32::MAX))
}

/// Pair a stored centisecond delay with its clamped presentation value.
pub(crate) fn raw_delay_from_cs(stored: u32) -> RawDelay {
    let clamped = if stored <= CLAMP_THRESHOLD_CS {
        CLAMPED_MIN_DELAY_CS
    } else {
        stored
    };
    RawDelay {
        unclamped: Some(stored),
        clamped: Some(clamped),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/source/gif.rs"]
mod tests;
