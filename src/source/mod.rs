//! Decoded frame sources.
//!
//! A source yields `(Frame, DelayRecord)` pairs lazily in display order. Sources are finite and
//! not restartable; re-open the asset through its [`FrameSourceOpener`] to read it again.

use crate::foundation::core::CanvasSize;
use crate::foundation::error::GifMotionResult;

/// `gif` decoding through the `image` crate.
pub mod gif;

/// Delay used when neither raw delay field carries a positive value.
pub const FALLBACK_DELAY_CS: u32 = 1;

/// One decoded frame, straight-alpha RGBA8, tightly packed and row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Position in the source sequence.
    pub index: usize,
    /// Bitmap width in pixels (may differ from the session canvas).
    pub width: u32,
    /// Bitmap height in pixels.
    pub height: u32,
    /// RGBA8 bytes, straight alpha.
    pub rgba8: Vec<u8>,
}

impl Frame {
    /// Build a frame, checking that `rgba8` matches `width * height * 4`.
    pub fn new(index: usize, width: u32, height: u32, rgba8: Vec<u8>) -> GifMotionResult<Self> {
        let expected = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4);
        if rgba8.len() != expected {
            return Err(crate::GifMotionError::decode(format!(
                "frame {index}: expected {expected} rgba bytes for {width}x{height}, got {}",
                rgba8.len()
            )));
        }
        Ok(Self {
            index,
            width,
            height,
            rgba8,
        })
    }
}

/// Raw per-frame delay fields as reported by a decoder, in centiseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawDelay {
    /// Delay as stored in the container. Zero means "use the clamped value".
    pub unclamped: Option<u32>,
    /// Delay after the decoder's minimum-delay clamp.
    pub clamped: Option<u32>,
}

impl RawDelay {
    /// Resolve to a positive delay.
    ///
    /// Order: the unclamped field, then the clamped field when the unclamped one is zero or
    /// absent, then [`FALLBACK_DELAY_CS`].
    pub fn resolve(self) -> u32 {
        let value = match self.unclamped {
            Some(v) if v != 0 => v,
            _ => self.clamped.unwrap_or(0),
        };
        if value == 0 { FALLBACK_DELAY_CS } else { value }
    }
}

/// Resolved display delay for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DelayRecord {
    /// Position in the source sequence.
    pub frame_index: usize,
    /// Display duration in hundredths of a second, always `>= 1`.
    pub delay_cs: u32,
}

impl DelayRecord {
    /// Build a record from raw decoder fields.
    pub fn resolve(frame_index: usize, raw: RawDelay) -> Self {
        Self {
            frame_index,
            delay_cs: raw.resolve(),
        }
    }
}

/// Ordered, finite sequence of decoded frames.
pub trait FrameSource {
    /// Canvas size declared by the container.
    fn canvas(&self) -> CanvasSize;

    /// Decode the next frame, or `None` once the sequence is exhausted.
    fn next_frame(&mut self) -> GifMotionResult<Option<(Frame, DelayRecord)>>;

    /// Drain the remaining frames and keep only their delays.
    fn read_delays(&mut self) -> GifMotionResult<Vec<DelayRecord>> {
        let mut delays = Vec::new();
        while let Some((_, delay)) = self.next_frame()? {
            delays.push(delay);
        }
        Ok(delays)
    }
}

/// Asset that can be (re-)opened into a fresh [`FrameSource`].
pub trait FrameSourceOpener {
    /// Source type produced by [`FrameSourceOpener::open`].
    type Source: FrameSource;

    /// Open the asset from its first frame.
    fn open(&self) -> GifMotionResult<Self::Source>;
}

/// In-memory source, used for tests and for callers that already hold decoded frames.
#[derive(Clone, Debug)]
pub struct MemoryFrameSource {
    canvas: CanvasSize,
    frames: std::collections::VecDeque<(Frame, DelayRecord)>,
}

impl MemoryFrameSource {
    /// Create a source from decoded frames and raw delay fields.
    pub fn new(canvas: CanvasSize, frames: Vec<(Frame, RawDelay)>) -> Self {
        let frames = frames
            .into_iter()
            .map(|(frame, raw)| {
                let delay = DelayRecord::resolve(frame.index, raw);
                (frame, delay)
            })
            .collect();
        Self { canvas, frames }
    }
}

impl FrameSource for MemoryFrameSource {
    fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    fn next_frame(&mut self) -> GifMotionResult<Option<(Frame, DelayRecord)>> {
        Ok(self.frames.pop_front())
    }
}

impl FrameSourceOpener for MemoryFrameSource {
    type Source = MemoryFrameSource;

    fn open(&self) -> GifMotionResult<Self::Source> {
        Ok(self.clone())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/source/delay.rs"]
mod tests;
