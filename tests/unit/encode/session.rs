use super::*;
use crate::convert::buffer::PixelFormat;
use crate::encode::memory::RecordingEncoder;
use crate::foundation::core::Timescale;

fn canvas() -> CanvasSize {
    CanvasSize::new(4, 2).unwrap()
}

fn buffer() -> RenderableBuffer {
    RenderableBuffer::allocate(canvas(), PixelFormat::Argb32Premul).unwrap()
}

fn pts(ticks: i64) -> Pts {
    Pts::from_ticks(ticks, Timescale::DEFAULT)
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 30,
        interval_ms: 0,
    }
}

fn writing_session(enc: RecordingEncoder) -> EncodingSession<RecordingEncoder> {
    let mut session = EncodingSession::new(enc, fast_retry(), CancelToken::new());
    session.configure(canvas(), CodecParams::default()).unwrap();
    session.start_writing().unwrap();
    session
}

#[test]
fn lifecycle_reaches_closed() {
    let enc = RecordingEncoder::new();
    let log = enc.recording();
    let mut session = EncodingSession::new(enc, fast_retry(), CancelToken::new());
    assert_eq!(session.state(), SessionState::Created);

    session.configure(canvas(), CodecParams::default()).unwrap();
    assert_eq!(session.state(), SessionState::Configured);
    assert_eq!(session.canvas(), Some(canvas()));

    session.start_writing().unwrap();
    assert_eq!(session.state(), SessionState::Writing);

    let outcome = session.append(&buffer(), pts(0)).unwrap();
    assert_eq!(outcome, AppendOutcome::Accepted { attempts: 1 });
    session.finish(pts(60)).unwrap();
    assert_eq!(session.state(), SessionState::Closed);
    drop(session);

    let log = log.lock().unwrap();
    assert!(log.started);
    assert!(log.finalized);
    assert!(!log.aborted);
    assert_eq!(log.finished_at, Some(pts(60)));
    assert_eq!(log.frames.len(), 1);
}

#[test]
fn calls_outside_their_state_are_invalid() {
    let mut session = EncodingSession::new(RecordingEncoder::new(), fast_retry(), CancelToken::new());
    assert!(matches!(
        session.append(&buffer(), pts(0)),
        Err(GifMotionError::InvalidState(_))
    ));
    assert!(matches!(
        session.start_writing(),
        Err(GifMotionError::InvalidState(_))
    ));
    session.configure(canvas(), CodecParams::default()).unwrap();
    assert!(matches!(
        session.configure(canvas(), CodecParams::default()),
        Err(GifMotionError::InvalidState(_))
    ));
    assert!(matches!(
        session.finish(pts(0)),
        Err(GifMotionError::InvalidState(_))
    ));
}

#[test]
fn ready_on_thirtieth_poll_is_accepted() {
    let enc = RecordingEncoder::new().with_readiness(|poll| poll >= 29);
    let log = enc.recording();
    let mut session = writing_session(enc);

    let outcome = session.append(&buffer(), pts(0)).unwrap();
    assert_eq!(outcome, AppendOutcome::Accepted { attempts: 30 });
    assert_eq!(log.lock().unwrap().ready_polls, 30);
}

#[test]
fn never_ready_drops_frame_and_next_frame_is_attempted() {
    let enc = RecordingEncoder::new().with_readiness(|poll| poll >= 30);
    let log = enc.recording();
    let mut session = writing_session(enc);

    let first = session.append(&buffer(), pts(0)).unwrap();
    assert_eq!(first, AppendOutcome::DroppedAfterTimeout { attempts: 30 });

    let second = session.append(&buffer(), pts(60)).unwrap();
    assert_eq!(second, AppendOutcome::Accepted { attempts: 1 });

    let log = log.lock().unwrap();
    assert_eq!(log.append_calls, 1);
    assert_eq!(log.frames[0].pts, pts(60));
}

#[test]
fn hard_rejection_is_not_retried() {
    let enc = RecordingEncoder::new()
        .with_rejections(|call| (call == 0).then(|| "codec refused sample".to_string()));
    let log = enc.recording();
    let mut session = writing_session(enc);

    let outcome = session.append(&buffer(), pts(0)).unwrap();
    assert_eq!(
        outcome,
        AppendOutcome::HardRejected {
            reason: "codec refused sample".to_string()
        }
    );
    assert_eq!(log.lock().unwrap().ready_polls, 1);
    assert_eq!(log.lock().unwrap().append_calls, 1);

    assert!(session.append(&buffer(), pts(60)).unwrap().is_accepted());
}

#[test]
fn rejected_configuration_errors_and_aborts_on_drop() {
    let enc = RecordingEncoder::new().rejecting_configuration("odd width");
    let log = enc.recording();
    let mut session = EncodingSession::new(enc, fast_retry(), CancelToken::new());

    let err = session
        .configure(canvas(), CodecParams::default())
        .unwrap_err();
    assert!(matches!(err, GifMotionError::Configuration(_)));
    assert_eq!(session.state(), SessionState::Errored);
    drop(session);

    let log = log.lock().unwrap();
    assert!(log.aborted);
    assert!(log.frames.is_empty());
}

#[test]
fn finalize_failure_is_fatal() {
    let enc = RecordingEncoder::new().failing_finalize("moov atom write failed");
    let log = enc.recording();
    let mut session = writing_session(enc);
    session.append(&buffer(), pts(0)).unwrap();

    let err = session.finish(pts(60)).unwrap_err();
    assert!(matches!(err, GifMotionError::Finalize(_)));
    assert!(err.to_string().contains("moov atom"));
    assert_eq!(session.state(), SessionState::Errored);
    drop(session);
    assert!(log.lock().unwrap().aborted);
}

#[test]
fn dropping_an_open_session_aborts() {
    let enc = RecordingEncoder::new();
    let log = enc.recording();
    let mut session = writing_session(enc);
    session.append(&buffer(), pts(0)).unwrap();
    drop(session);
    assert!(log.lock().unwrap().aborted);
}

#[test]
fn timestamps_must_not_go_backwards() {
    let mut session = writing_session(RecordingEncoder::new());
    session.append(&buffer(), pts(120)).unwrap();
    assert!(matches!(
        session.append(&buffer(), pts(60)),
        Err(GifMotionError::InvalidState(_))
    ));
    let other_scale = Pts::from_ticks(200, Timescale::new(1000).unwrap());
    assert!(matches!(
        session.append(&buffer(), other_scale),
        Err(GifMotionError::InvalidState(_))
    ));
}

#[test]
fn buffer_size_must_match_canvas() {
    let mut session = writing_session(RecordingEncoder::new());
    let wrong = RenderableBuffer::allocate(
        CanvasSize::new(2, 2).unwrap(),
        PixelFormat::Argb32Premul,
    )
    .unwrap();
    assert!(matches!(
        session.append(&wrong, pts(0)),
        Err(GifMotionError::InvalidState(_))
    ));
}

#[test]
fn cancellation_interrupts_retry_wait() {
    let cancel = CancelToken::new();
    let remote = cancel.clone();
    let enc = RecordingEncoder::new().with_readiness(move |poll| {
        if poll == 2 {
            remote.cancel();
        }
        false
    });
    let mut session = EncodingSession::new(
        enc,
        RetryPolicy {
            max_attempts: 30,
            interval_ms: 1,
        },
        cancel,
    );
    session.configure(canvas(), CodecParams::default()).unwrap();
    session.start_writing().unwrap();

    let err = session.append(&buffer(), pts(0)).unwrap_err();
    assert!(matches!(err, GifMotionError::Cancelled));
    assert_eq!(session.state(), SessionState::Errored);
}

#[test]
fn retry_with_zero_attempts_still_polls_once() {
    let mut enc = RecordingEncoder::new();
    let outcome = append_with_retry(
        &mut enc,
        &buffer(),
        pts(0),
        &RetryPolicy {
            max_attempts: 0,
            interval_ms: 0,
        },
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(outcome, AppendOutcome::Accepted { attempts: 1 });
}
