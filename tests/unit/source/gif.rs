use std::path::PathBuf;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Rgba, RgbaImage};

use super::*;

fn fixture_dir() -> PathBuf {
    let dir = PathBuf::from("target").join("unit_source_gif");
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_gif(path: &Path, width: u32, height: u32, frames: &[([u8; 4], u32)]) {
    let file = File::create(path).unwrap();
    let mut encoder = GifEncoder::new(file);
    encoder.set_repeat(Repeat::Infinite).unwrap();
    let frames = frames.iter().map(|&(color, delay_cs)| {
        let buf = RgbaImage::from_pixel(width, height, Rgba(color));
        image::Frame::from_parts(buf, 0, 0, Delay::from_numer_denom_ms(delay_cs * 10, 1))
    });
    encoder.encode_frames(frames).unwrap();
}

#[test]
fn raw_delay_conversion_keeps_stored_value() {
    assert_eq!(
        raw_delay_from_ms((100, 1)),
        RawDelay {
            unclamped: Some(10),
            clamped: Some(10)
        }
    );
    assert_eq!(
        raw_delay_from_ms((70, 1)),
        RawDelay {
            unclamped: Some(7),
            clamped: Some(7)
        }
    );
}

#[test]
fn raw_delay_conversion_clamps_tiny_delays() {
    let zero = raw_delay_from_ms((0, 1));
    assert_eq!(zero.unclamped, Some(0));
    assert_eq!(zero.clamped, Some(10));
    assert_eq!(zero.resolve(), 10);

    let one = raw_delay_from_ms((10, 1));
    assert_eq!(one.unclamped, Some(1));
    assert_eq!(one.resolve(), 1);

    assert_eq!(raw_delay_from_ms((5, 0)).unclamped, Some(0));
    assert_eq!(raw_delay_from_cs(1).clamped, Some(10));
    assert_eq!(raw_delay_from_cs(2).clamped, Some(2));
}

#[test]
fn open_reads_canvas_frames_and_delays() {
    let path = fixture_dir().join("three_frames.gif");
    write_gif(
        &path,
        6,
        4,
        &[([255, 0, 0, 255], 10), ([0, 255, 0, 255], 20), ([0, 0, 255, 255], 5)],
    );

    let mut src = GifAsset::new(&path).open().unwrap();
    assert_eq!(src.canvas(), CanvasSize::new(6, 4).unwrap());

    let (f0, d0) = src.next_frame().unwrap().unwrap();
    assert_eq!((f0.index, f0.width, f0.height), (0, 6, 4));
    assert_eq!(f0.rgba8.len(), 6 * 4 * 4);
    assert_eq!(&f0.rgba8[0..4], &[255, 0, 0, 255]);
    assert_eq!(d0.delay_cs, 10);

    let rest = src.read_delays().unwrap();
    let delays: Vec<u32> = rest.iter().map(|d| d.delay_cs).collect();
    assert_eq!(delays, vec![20, 5]);
    assert_eq!(rest[1].frame_index, 2);
    assert!(src.next_frame().unwrap().is_none());
}

#[test]
fn delay_scan_matches_decoded_frames() {
    let path = fixture_dir().join("scan.gif");
    write_gif(
        &path,
        4,
        4,
        &[
            ([10, 0, 0, 255], 7),
            ([20, 0, 0, 255], 1),
            ([30, 0, 0, 255], 250),
            ([40, 0, 0, 128], 12),
        ],
    );
    let asset = GifAsset::new(&path);

    let mut decoded = Vec::new();
    let mut src = asset.open().unwrap();
    while let Some((_, delay)) = src.next_frame().unwrap() {
        decoded.push(delay);
    }

    let scanned = asset.open().unwrap().read_delays().unwrap();
    assert_eq!(scanned, decoded);
    assert_eq!(
        scanned.iter().map(|d| d.delay_cs).collect::<Vec<_>>(),
        vec![7, 1, 250, 12]
    );
    assert_eq!(scan_delays(&path, 3).unwrap(), vec![decoded[3]]);
}

#[test]
fn zero_delay_frames_use_clamped_value() {
    let path = fixture_dir().join("zero_delay.gif");
    write_gif(&path, 2, 2, &[([9, 9, 9, 255], 0), ([1, 1, 1, 255], 0)]);

    let delays = GifAsset::new(&path).open().unwrap().read_delays().unwrap();
    assert!(delays.iter().all(|d| d.delay_cs == 10));
}

#[test]
fn missing_file_is_decode_error() {
    let err = match GifAsset::new(fixture_dir().join("does_not_exist.gif")).open() {
        Ok(_) => panic!("expected decode error"),
        Err(e) => e,
    };
    assert!(matches!(err, GifMotionError::Decode(_)));
}

#[test]
fn non_gif_bytes_are_decode_error() {
    let path = fixture_dir().join("not_a_gif.gif");
    std::fs::write(&path, b"definitely not a gif").unwrap();
    let err = match GifAsset::new(&path).open() {
        Ok(_) => panic!("expected decode error"),
        Err(e) => e,
    };
    assert!(matches!(err, GifMotionError::Decode(_)));
}
