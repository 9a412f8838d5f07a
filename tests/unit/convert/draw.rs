use super::*;

fn frame_from_pixels(width: u32, height: u32, pixels: &[[u8; 4]]) -> Frame {
    Frame::new(0, width, height, pixels.concat()).unwrap()
}

#[test]
fn same_size_frame_is_copied_as_argb_premul() {
    let frame = frame_from_pixels(2, 1, &[[255, 0, 0, 255], [100, 50, 200, 128]]);
    let canvas = CanvasSize::new(2, 1).unwrap();
    let buf = PixelBufferConverter::default().convert(&frame, canvas).unwrap();

    assert_eq!(buf.format(), PixelFormat::Argb32Premul);
    assert_eq!(buf.pixel(0, 0).unwrap(), &[255, 255, 0, 0]);
    assert_eq!(
        buf.pixel(1, 0).unwrap(),
        &[
            128u8,
            ((100u16 * 128 + 127) / 255) as u8,
            ((50u16 * 128 + 127) / 255) as u8,
            ((200u16 * 128 + 127) / 255) as u8,
        ]
    );
}

#[test]
fn transparent_pixels_lose_color() {
    let frame = frame_from_pixels(1, 1, &[[200, 10, 10, 0]]);
    let canvas = CanvasSize::new(1, 1).unwrap();
    let buf = PixelBufferConverter::default().convert(&frame, canvas).unwrap();
    assert_eq!(buf.pixel(0, 0).unwrap(), &[0, 0, 0, 0]);
}

#[test]
fn smaller_frame_is_stretched_over_full_canvas() {
    let red = [255, 0, 0, 255];
    let green = [0, 255, 0, 255];
    let blue = [0, 0, 255, 255];
    let white = [255, 255, 255, 255];
    let frame = frame_from_pixels(2, 2, &[red, green, blue, white]);
    let canvas = CanvasSize::new(4, 4).unwrap();

    let buf = PixelBufferConverter::new(ScaleFilter::Nearest)
        .convert(&frame, canvas)
        .unwrap();

    assert_eq!(buf.pixel(0, 0).unwrap(), &[255, 255, 0, 0]);
    assert_eq!(buf.pixel(1, 1).unwrap(), &[255, 255, 0, 0]);
    assert_eq!(buf.pixel(3, 0).unwrap(), &[255, 0, 255, 0]);
    assert_eq!(buf.pixel(0, 3).unwrap(), &[255, 0, 0, 255]);
    assert_eq!(buf.pixel(3, 3).unwrap(), &[255, 255, 255, 255]);
}

#[test]
fn bilinear_stretch_leaves_no_uncovered_pixels() {
    let frame = frame_from_pixels(1, 1, &[[10, 20, 30, 255]]);
    let canvas = CanvasSize::new(5, 3).unwrap();
    let buf = PixelBufferConverter::new(ScaleFilter::Bilinear)
        .convert(&frame, canvas)
        .unwrap();
    for px in buf.data().chunks_exact(4) {
        assert_eq!(px, &[255, 10, 20, 30]);
    }
}

#[test]
fn recycled_buffers_are_fully_overwritten() {
    let mut conv = PixelBufferConverter::new(ScaleFilter::Nearest);
    let canvas = CanvasSize::new(2, 2).unwrap();

    let first = conv
        .convert(&frame_from_pixels(1, 1, &[[255, 255, 255, 255]]), canvas)
        .unwrap();
    conv.recycle(first);
    let second = conv
        .convert(&frame_from_pixels(1, 1, &[[0, 0, 0, 0]]), canvas)
        .unwrap();

    assert!(second.data().iter().all(|&b| b == 0));
    assert_eq!(conv.pool_stats().reused, 1);
}

#[test]
fn premultiply_matches_expected_rounding() {
    let mut px = vec![255u8, 128, 0, 128];
    premultiply_rgba8_in_place(&mut px);
    assert_eq!(px, vec![128, 64, 0, 128]);
}
