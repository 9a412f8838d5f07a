use super::*;

#[test]
fn allocate_is_zeroed_with_tight_stride() {
    let canvas = CanvasSize::new(3, 2).unwrap();
    let buf = RenderableBuffer::allocate(canvas, PixelFormat::Argb32Premul).unwrap();
    assert_eq!(buf.stride(), 12);
    assert_eq!(buf.data().len(), 24);
    assert!(buf.data().iter().all(|&b| b == 0));
    assert_eq!(buf.pixel(2, 1), Some(&[0u8, 0, 0, 0][..]));
    assert_eq!(buf.pixel(3, 0), None);
}

#[test]
fn oversized_canvas_is_allocation_error() {
    let canvas = CanvasSize {
        width: u32::MAX,
        height: u32::MAX,
    };
    let err = RenderableBuffer::allocate(canvas, PixelFormat::Argb32Premul).unwrap_err();
    assert!(matches!(err, GifMotionError::BufferAllocation(_)));
}

#[test]
fn pool_reuses_matching_buffers_only() {
    let a = CanvasSize::new(4, 4).unwrap();
    let b = CanvasSize::new(2, 2).unwrap();
    let mut pool = BufferPool::new(PixelFormat::Argb32Premul, BufferPoolOpts::default());

    let first = pool.acquire(a).unwrap();
    pool.release(first);
    let again = pool.acquire(a).unwrap();
    assert_eq!(again.canvas(), a);
    let other = pool.acquire(b).unwrap();
    assert_eq!(other.canvas(), b);

    let stats = pool.stats();
    assert_eq!(stats.allocated, 2);
    assert_eq!(stats.reused, 1);
}

#[test]
fn pool_is_bounded() {
    let c = CanvasSize::new(1, 1).unwrap();
    let mut pool = BufferPool::new(PixelFormat::Argb32Premul, BufferPoolOpts { max_retained: 1 });
    let x = pool.acquire(c).unwrap();
    let y = pool.acquire(c).unwrap();
    pool.release(x);
    pool.release(y);
    assert_eq!(pool.stats().dropped_on_release, 1);
}
