use crate::foundation::error::{GifMotionError, GifMotionResult};

/// Centiseconds per second; GIF delays are stored in hundredths of a second.
pub const CENTISECONDS_PER_SECOND: u32 = 100;

/// Output canvas dimensions in pixels, fixed for a whole session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CanvasSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl CanvasSize {
    /// Create a validated canvas with non-zero dimensions.
    pub fn new(width: u32, height: u32) -> GifMotionResult<Self> {
        if width == 0 || height == 0 {
            return Err(GifMotionError::validation(format!(
                "canvas must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Number of pixels covered by the canvas.
    pub fn pixel_count(self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    /// Scale both dimensions by an integer factor.
    pub fn scaled(self, factor: u32) -> GifMotionResult<Self> {
        let width = self.width.checked_mul(factor);
        let height = self.height.checked_mul(factor);
        match (width, height) {
            (Some(w), Some(h)) => Self::new(w, h),
            _ => Err(GifMotionError::validation(format!(
                "canvas {}x{} scaled by {factor} overflows",
                self.width, self.height
            ))),
        }
    }
}

impl std::fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Ticks per second of the output time base.
///
/// Always a positive multiple of 100 so any centisecond delay is an integer tick count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Timescale(u32);

impl Timescale {
    /// Default time base (600 ticks per second).
    pub const DEFAULT: Self = Self(600);

    /// Create a validated timescale.
    pub fn new(ticks_per_second: u32) -> GifMotionResult<Self> {
        if ticks_per_second == 0 || !ticks_per_second.is_multiple_of(CENTISECONDS_PER_SECOND) {
            return Err(GifMotionError::validation(format!(
                "timescale must be a positive multiple of 100, got {ticks_per_second}"
            )));
        }
        Ok(Self(ticks_per_second))
    }

    /// Ticks per second.
    pub fn get(self) -> u32 {
        self.0
    }

    /// Ticks covered by one centisecond.
    pub fn ticks_per_centisecond(self) -> i64 {
        i64::from(self.0 / CENTISECONDS_PER_SECOND)
    }

    /// Convert a centisecond duration into ticks.
    ///
    /// Equal to `round(cs / 100 * timescale)`; exact because the timescale divides by 100.
    pub fn centis_to_ticks(self, centiseconds: u32) -> i64 {
        i64::from(centiseconds) * self.ticks_per_centisecond()
    }
}

impl Default for Timescale {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for Timescale {
    type Error = GifMotionError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Timescale> for u32 {
    fn from(value: Timescale) -> Self {
        value.0
    }
}

/// Rational presentation time `ticks / timescale`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Pts {
    /// Tick count from session start.
    pub ticks: i64,
    /// Time base the ticks are expressed in.
    pub timescale: Timescale,
}

impl Pts {
    /// Session start.
    pub fn zero(timescale: Timescale) -> Self {
        Self {
            ticks: 0,
            timescale,
        }
    }

    /// Create a timestamp from a tick count.
    pub fn from_ticks(ticks: i64, timescale: Timescale) -> Self {
        Self { ticks, timescale }
    }

    /// Timestamp advanced by `ticks`.
    pub fn add_ticks(self, ticks: i64) -> Self {
        Self {
            ticks: self.ticks.saturating_add(ticks),
            timescale: self.timescale,
        }
    }

    /// Convert to floating-point seconds.
    pub fn as_secs_f64(self) -> f64 {
        self.ticks as f64 / f64::from(self.timescale.get())
    }
}

impl std::fmt::Display for Pts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.ticks, self.timescale.get())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
