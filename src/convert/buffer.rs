use crate::foundation::core::CanvasSize;
use crate::foundation::error::{GifMotionError, GifMotionResult};

/// Pixel layouts a [`RenderableBuffer`] can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PixelFormat {
    /// 32 bits per pixel, byte order `A R G B`, premultiplied alpha.
    Argb32Premul,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Argb32Premul => 4,
        }
    }
}

/// Canvas-sized pixel buffer handed to the encoder.
///
/// Rows are tightly packed (`stride == width * bytes_per_pixel`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderableBuffer {
    canvas: CanvasSize,
    format: PixelFormat,
    data: Vec<u8>,
}

impl RenderableBuffer {
    /// Allocate a zeroed (fully transparent) buffer.
    pub fn allocate(canvas: CanvasSize, format: PixelFormat) -> GifMotionResult<Self> {
        let len = byte_len(canvas, format)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            GifMotionError::buffer_allocation(format!(
                "could not allocate {len} bytes for a {canvas} buffer: {e}"
            ))
        })?;
        data.resize(len, 0);
        Ok(Self {
            canvas,
            format,
            data,
        })
    }

    /// Buffer dimensions.
    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    /// Pixel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.canvas.width as usize * self.format.bytes_per_pixel()
    }

    /// Raw pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.canvas.width || y >= self.canvas.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let start = y as usize * self.stride() + x as usize * bpp;
        self.data.get(start..start + bpp)
    }
}

pub(crate) fn byte_len(canvas: CanvasSize, format: PixelFormat) -> GifMotionResult<usize> {
    (canvas.width as usize)
        .checked_mul(canvas.height as usize)
        .and_then(|px| px.checked_mul(format.bytes_per_pixel()))
        .filter(|&len| len > 0)
        .ok_or_else(|| {
            GifMotionError::buffer_allocation(format!("buffer size for {canvas} overflows"))
        })
}

/// Pool configuration for recycled buffers.
#[derive(Debug, Clone, Copy)]
pub struct BufferPoolOpts {
    /// Maximum number of retained buffers.
    pub max_retained: usize,
}

impl Default for BufferPoolOpts {
    fn default() -> Self {
        Self { max_retained: 2 }
    }
}

/// Allocation counters for a [`BufferPool`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolStats {
    /// Buffers freshly allocated.
    pub allocated: u64,
    /// Buffers served from the pool.
    pub reused: u64,
    /// Released buffers that were not retained.
    pub dropped_on_release: u64,
}

/// Bounded recycler for renderable buffers of one format.
///
/// Buffers are keyed by canvas; a pool only hands back a buffer whose size matches the request.
#[derive(Debug)]
pub struct BufferPool {
    opts: BufferPoolOpts,
    format: PixelFormat,
    retained: Vec<RenderableBuffer>,
    stats: BufferPoolStats,
}

impl BufferPool {
    /// Create an empty pool.
    pub fn new(format: PixelFormat, opts: BufferPoolOpts) -> Self {
        Self {
            opts,
            format,
            retained: Vec::new(),
            stats: BufferPoolStats::default(),
        }
    }

    /// Pool counters.
    pub fn stats(&self) -> BufferPoolStats {
        self.stats
    }

    /// Take a buffer of `canvas` size. Contents of a reused buffer are unspecified.
    pub fn acquire(&mut self, canvas: CanvasSize) -> GifMotionResult<RenderableBuffer> {
        if let Some(pos) = self.retained.iter().position(|b| b.canvas == canvas) {
            self.stats.reused = self.stats.reused.saturating_add(1);
            return Ok(self.retained.swap_remove(pos));
        }
        let buffer = RenderableBuffer::allocate(canvas, self.format)?;
        self.stats.allocated = self.stats.allocated.saturating_add(1);
        Ok(buffer)
    }

    /// Return a buffer for reuse.
    pub fn release(&mut self, buffer: RenderableBuffer) {
        if buffer.format != self.format || self.retained.len() >= self.opts.max_retained {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }
        self.retained.push(buffer);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/convert/buffer.rs"]
mod tests;
