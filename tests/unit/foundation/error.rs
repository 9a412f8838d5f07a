use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        GifMotionError::decode("x")
            .to_string()
            .contains("decode error:")
    );
    assert!(
        GifMotionError::configuration("x")
            .to_string()
            .contains("configuration error:")
    );
    assert!(
        GifMotionError::buffer_allocation("x")
            .to_string()
            .contains("buffer allocation error:")
    );
    assert!(
        GifMotionError::finalize("x")
            .to_string()
            .contains("finalize error:")
    );
    assert!(
        GifMotionError::invalid_state("x")
            .to_string()
            .contains("invalid state:")
    );
    assert!(
        GifMotionError::validation("x")
            .to_string()
            .contains("validation error:")
    );
}

#[test]
fn append_rejected_names_frame_and_reason() {
    let err = GifMotionError::AppendRejected {
        frame_index: 4,
        reason: "bad sample".to_string(),
    };
    assert_eq!(err.to_string(), "encoder rejected frame 4: bad sample");
    assert!(!err.is_setup_error());
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = GifMotionError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn setup_errors_are_classified() {
    assert!(GifMotionError::decode("x").is_setup_error());
    assert!(GifMotionError::configuration("x").is_setup_error());
    assert!(!GifMotionError::buffer_allocation("x").is_setup_error());
    assert!(!GifMotionError::finalize("x").is_setup_error());
    assert!(!GifMotionError::Cancelled.is_setup_error());
}
