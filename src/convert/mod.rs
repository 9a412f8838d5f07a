//! Frame bitmap -> encoder buffer conversion.

use image::imageops::{self, FilterType};

use crate::foundation::core::CanvasSize;
use crate::foundation::error::{GifMotionError, GifMotionResult};
use crate::source::Frame;

/// Renderable buffers and their pool.
pub mod buffer;

use buffer::{BufferPool, BufferPoolOpts, PixelFormat, RenderableBuffer};

/// Resampling used when a frame is stretched onto a differently sized canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleFilter {
    /// Nearest neighbour; keeps hard pixel edges.
    Nearest,
    /// Linear interpolation.
    #[default]
    Bilinear,
}

impl ScaleFilter {
    fn filter_type(self) -> FilterType {
        match self {
            ScaleFilter::Nearest => FilterType::Nearest,
            ScaleFilter::Bilinear => FilterType::Triangle,
        }
    }
}

/// Draws decoded frames into canvas-sized ARGB32 premultiplied buffers.
///
/// Every frame is drawn into the full canvas rectangle at the origin: a bitmap whose size differs
/// from the canvas is stretched to it, never cropped, centered or letterboxed. Source pixels are
/// sRGB and the output space is sRGB, so no color transform is applied beyond premultiplication.
#[derive(Debug)]
pub struct PixelBufferConverter {
    filter: ScaleFilter,
    pool: BufferPool,
}

impl PixelBufferConverter {
    /// Create a converter with its own buffer pool.
    pub fn new(filter: ScaleFilter) -> Self {
        Self {
            filter,
            pool: BufferPool::new(PixelFormat::Argb32Premul, BufferPoolOpts::default()),
        }
    }

    /// Buffer pool counters.
    pub fn pool_stats(&self) -> buffer::BufferPoolStats {
        self.pool.stats()
    }

    /// Render `frame` into a new buffer of `canvas` size.
    pub fn convert(
        &mut self,
        frame: &Frame,
        canvas: CanvasSize,
    ) -> GifMotionResult<RenderableBuffer> {
        let mut buffer = self.pool.acquire(canvas)?;
        draw_into(&mut buffer, frame, self.filter)?;
        Ok(buffer)
    }

    /// Hand a buffer back once the encoder no longer needs it.
    pub fn recycle(&mut self, buffer: RenderableBuffer) {
        self.pool.release(buffer);
    }
}

impl Default for PixelBufferConverter {
    fn default() -> Self {
        Self::new(ScaleFilter::default())
    }
}

fn draw_into(
    buffer: &mut RenderableBuffer,
    frame: &Frame,
    filter: ScaleFilter,
) -> GifMotionResult<()> {
    let canvas = buffer.canvas();

    let mut premul = frame.rgba8.clone();
    premultiply_rgba8_in_place(&mut premul);
    let src = image::RgbaImage::from_raw(frame.width, frame.height, premul).ok_or_else(|| {
        GifMotionError::validation(format!(
            "frame {} bytes do not match {}x{}",
            frame.index, frame.width, frame.height
        ))
    })?;

    let drawn = if src.dimensions() == (canvas.width, canvas.height) {
        src
    } else {
        imageops::resize(&src, canvas.width, canvas.height, filter.filter_type())
    };

    for (dst, px) in buffer
        .data_mut()
        .chunks_exact_mut(4)
        .zip(drawn.as_raw().chunks_exact(4))
    {
        dst.copy_from_slice(&[px[3], px[0], px[1], px[2]]);
    }
    Ok(())
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/convert/draw.rs"]
mod tests;
