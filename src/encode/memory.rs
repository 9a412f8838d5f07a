use std::sync::{Arc, Mutex, MutexGuard};

use crate::convert::buffer::RenderableBuffer;
use crate::encode::encoder::{CodecParams, FinalizeCompletion, VideoEncoder};
use crate::foundation::core::{CanvasSize, Pts};
use crate::foundation::error::{GifMotionError, GifMotionResult};
use crate::foundation::math::Fnv1a64;

/// One buffer accepted by a [`RecordingEncoder`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedFrame {
    /// Presentation timestamp passed to `append`.
    pub pts: Pts,
    /// Buffer dimensions.
    pub canvas: CanvasSize,
    /// FNV-1a fingerprint of the buffer bytes.
    pub fingerprint: u64,
}

/// Everything a [`RecordingEncoder`] observed.
#[derive(Clone, Debug, Default)]
pub struct Recording {
    /// Parameters accepted by `configure`.
    pub configured: Option<(CanvasSize, CodecParams)>,
    /// Whether `start` was called.
    pub started: bool,
    /// Accepted buffers in order.
    pub frames: Vec<RecordedFrame>,
    /// Readiness polls answered.
    pub ready_polls: u64,
    /// `append` calls made (accepted or refused).
    pub append_calls: u64,
    /// End passed to `mark_input_finished`.
    pub finished_at: Option<Pts>,
    /// Whether finalization completed successfully.
    pub finalized: bool,
    /// Whether the encoder was aborted.
    pub aborted: bool,
}

type ReadinessFn = Box<dyn FnMut(u64) -> bool + Send>;
type RejectFn = Box<dyn FnMut(u64) -> Option<String> + Send>;

/// In-memory encoder for tests and dry runs.
///
/// Readiness, rejection and finalize failure are scriptable; observations are shared through
/// [`RecordingEncoder::recording`] so they stay readable after the encoder moved into a session.
pub struct RecordingEncoder {
    log: Arc<Mutex<Recording>>,
    readiness: ReadinessFn,
    reject: RejectFn,
    reject_configuration: Option<String>,
    fail_finalize: Option<String>,
    last_error: Option<String>,
}

impl Default for RecordingEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingEncoder {
    /// An encoder that is always ready and accepts everything.
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Recording::default())),
            readiness: Box::new(|_| true),
            reject: Box::new(|_| None),
            reject_configuration: None,
            fail_finalize: None,
            last_error: None,
        }
    }

    /// Answer readiness polls with `f(poll_number)`, counting from 0 across the session.
    pub fn with_readiness(mut self, f: impl FnMut(u64) -> bool + Send + 'static) -> Self {
        self.readiness = Box::new(f);
        self
    }

    /// Refuse `append` call `n` (0-based) whenever `f(n)` returns a reason.
    pub fn with_rejections(
        mut self,
        f: impl FnMut(u64) -> Option<String> + Send + 'static,
    ) -> Self {
        self.reject = Box::new(f);
        self
    }

    /// Reject `configure` with `reason`.
    pub fn rejecting_configuration(mut self, reason: impl Into<String>) -> Self {
        self.reject_configuration = Some(reason.into());
        self
    }

    /// Fail finalization with `reason`.
    pub fn failing_finalize(mut self, reason: impl Into<String>) -> Self {
        self.fail_finalize = Some(reason.into());
        self
    }

    /// Shared handle to the observations.
    pub fn recording(&self) -> Arc<Mutex<Recording>> {
        Arc::clone(&self.log)
    }

    fn log(&self) -> MutexGuard<'_, Recording> {
        match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl VideoEncoder for RecordingEncoder {
    fn configure(&mut self, canvas: CanvasSize, params: &CodecParams) -> GifMotionResult<()> {
        if let Some(reason) = &self.reject_configuration {
            return Err(GifMotionError::configuration(reason.clone()));
        }
        self.log().configured = Some((canvas, *params));
        Ok(())
    }

    fn start(&mut self) -> GifMotionResult<()> {
        self.log().started = true;
        Ok(())
    }

    fn is_ready_for_more_data(&mut self) -> bool {
        let poll = {
            let mut log = self.log();
            let poll = log.ready_polls;
            log.ready_polls += 1;
            poll
        };
        (self.readiness)(poll)
    }

    fn append(&mut self, buffer: &RenderableBuffer, pts: Pts) -> bool {
        let call = {
            let mut log = self.log();
            let call = log.append_calls;
            log.append_calls += 1;
            call
        };
        if let Some(reason) = (self.reject)(call) {
            self.last_error = Some(reason);
            return false;
        }

        let mut hasher = Fnv1a64::new_default();
        hasher.write_bytes(buffer.data());
        self.log().frames.push(RecordedFrame {
            pts,
            canvas: buffer.canvas(),
            fingerprint: hasher.finish(),
        });
        true
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }

    fn mark_input_finished(&mut self, end: Pts) {
        self.log().finished_at = Some(end);
    }

    fn finalize(&mut self, completion: FinalizeCompletion) {
        let log = Arc::clone(&self.log);
        let failure = self.fail_finalize.clone();
        std::thread::spawn(move || {
            let res = match failure {
                Some(reason) => Err(GifMotionError::finalize(reason)),
                None => {
                    match log.lock() {
                        Ok(mut guard) => guard.finalized = true,
                        Err(poisoned) => poisoned.into_inner().finalized = true,
                    }
                    Ok(())
                }
            };
            completion(res);
        });
    }

    fn abort(&mut self) {
        self.log().aborted = true;
    }
}
