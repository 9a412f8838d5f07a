use super::*;

#[test]
fn canvas_rejects_zero_dimensions() {
    assert!(CanvasSize::new(0, 10).is_err());
    assert!(CanvasSize::new(10, 0).is_err());
    assert_eq!(CanvasSize::new(4, 2).unwrap().pixel_count(), 8);
}

#[test]
fn canvas_scaled_doubles_and_detects_overflow() {
    let c = CanvasSize::new(50, 30).unwrap();
    assert_eq!(c.scaled(2).unwrap(), CanvasSize::new(100, 60).unwrap());
    assert!(c.scaled(u32::MAX).is_err());
    assert_eq!(c.to_string(), "50x30");
}

#[test]
fn timescale_must_be_multiple_of_100() {
    assert!(Timescale::new(0).is_err());
    assert!(Timescale::new(30).is_err());
    assert!(Timescale::new(90_000 + 1).is_err());
    assert_eq!(Timescale::new(600).unwrap().ticks_per_centisecond(), 6);
    assert_eq!(Timescale::new(90_000).unwrap().centis_to_ticks(3), 2_700);
    assert_eq!(Timescale::default(), Timescale::DEFAULT);
}

#[test]
fn timescale_serde_validates() {
    let ok: Timescale = serde_json::from_str("1000").unwrap();
    assert_eq!(ok.get(), 1000);
    assert!(serde_json::from_str::<Timescale>("601").is_err());
    assert_eq!(serde_json::to_string(&ok).unwrap(), "1000");
}

#[test]
fn pts_arithmetic_and_seconds() {
    let ts = Timescale::DEFAULT;
    let p = Pts::zero(ts).add_ticks(300);
    assert_eq!(p.ticks, 300);
    assert!((p.as_secs_f64() - 0.5).abs() < 1e-12);
    assert_eq!(p.to_string(), "300/600");
}
