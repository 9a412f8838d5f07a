use std::sync::mpsc;
use std::time::Duration;

use crate::convert::buffer::RenderableBuffer;
use crate::encode::encoder::{CodecParams, VideoEncoder};
use crate::foundation::cancel::CancelToken;
use crate::foundation::core::{CanvasSize, Pts};
use crate::foundation::error::{GifMotionError, GifMotionResult};

/// Lifecycle of an [`EncodingSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Handle allocated, nothing configured.
    Created,
    /// Canvas and codec parameters accepted by the encoder.
    Configured,
    /// Track started; buffers may be appended.
    Writing,
    /// Input closed, container finalization in progress.
    Finalizing,
    /// Output complete.
    Closed,
    /// A fatal error occurred; the output is invalid.
    Errored,
}

/// Readiness polling budget for a single append.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Readiness polls before the buffer is dropped (at least one poll is always made).
    pub max_attempts: u32,
    /// Pause between polls, in milliseconds.
    pub interval_ms: u64,
}

impl RetryPolicy {
    /// Pause between polls.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval_ms: 100,
        }
    }
}

/// Result of one append.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The encoder took the buffer on poll `attempts`.
    Accepted {
        /// Readiness polls used.
        attempts: u32,
    },
    /// The encoder never became ready; the buffer was dropped.
    DroppedAfterTimeout {
        /// Readiness polls used.
        attempts: u32,
    },
    /// The encoder was ready but refused the buffer. Not retried.
    HardRejected {
        /// Encoder-reported reason.
        reason: String,
    },
}

impl AppendOutcome {
    /// Return `true` when the buffer reached the encoder.
    pub fn is_accepted(&self) -> bool {
        matches!(self, AppendOutcome::Accepted { .. })
    }
}

/// Poll `encoder` until it is ready, then append once.
///
/// A refused append is reported as [`AppendOutcome::HardRejected`] immediately; only "not ready"
/// consumes the retry budget.
pub fn append_with_retry<E: VideoEncoder + ?Sized>(
    encoder: &mut E,
    buffer: &RenderableBuffer,
    pts: Pts,
    retry: &RetryPolicy,
    cancel: &CancelToken,
) -> GifMotionResult<AppendOutcome> {
    let max_attempts = retry.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        cancel.check()?;
        if encoder.is_ready_for_more_data() {
            if encoder.append(buffer, pts) {
                return Ok(AppendOutcome::Accepted { attempts: attempt });
            }
            let reason = encoder
                .last_error()
                .unwrap_or_else(|| "encoder refused the buffer without an error".to_string());
            return Ok(AppendOutcome::HardRejected { reason });
        }

        tracing::trace!(%pts, attempt, "encoder not ready");
        if attempt < max_attempts {
            cancel.sleep(retry.interval())?;
        }
    }
    Ok(AppendOutcome::DroppedAfterTimeout {
        attempts: max_attempts,
    })
}

/// Single-track encoding session owning its encoder handle.
///
/// Dropping a session that has not reached [`SessionState::Closed`] aborts the encoder and
/// discards partial output.
pub struct EncodingSession<E: VideoEncoder> {
    encoder: E,
    state: SessionState,
    canvas: Option<CanvasSize>,
    params: Option<CodecParams>,
    retry: RetryPolicy,
    cancel: CancelToken,
    last_pts: Option<Pts>,
}

impl<E: VideoEncoder> EncodingSession<E> {
    /// Wrap an encoder handle.
    pub fn new(encoder: E, retry: RetryPolicy, cancel: CancelToken) -> Self {
        Self {
            encoder,
            state: SessionState::Created,
            canvas: None,
            params: None,
            retry,
            cancel,
            last_pts: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Borrow the encoder handle.
    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Canvas accepted by `configure`.
    pub fn canvas(&self) -> Option<CanvasSize> {
        self.canvas
    }

    /// Apply canvas and codec parameters.
    pub fn configure(&mut self, canvas: CanvasSize, params: CodecParams) -> GifMotionResult<()> {
        self.expect_state(SessionState::Created, "configure")?;
        if let Err(e) = self.encoder.configure(canvas, &params) {
            self.state = SessionState::Errored;
            return Err(match e {
                GifMotionError::Configuration(_) => e,
                other => GifMotionError::configuration(other.to_string()),
            });
        }
        self.canvas = Some(canvas);
        self.params = Some(params);
        self.state = SessionState::Configured;
        tracing::debug!(%canvas, bitrate = params.bitrate_bps, timescale = params.timescale.get(), "encoder configured");
        Ok(())
    }

    /// Start the track at timestamp zero.
    pub fn start_writing(&mut self) -> GifMotionResult<()> {
        self.expect_state(SessionState::Configured, "start_writing")?;
        if let Err(e) = self.encoder.start() {
            self.state = SessionState::Errored;
            return Err(e);
        }
        self.state = SessionState::Writing;
        Ok(())
    }

    /// Append one buffer at `pts` with bounded readiness retry.
    pub fn append(
        &mut self,
        buffer: &RenderableBuffer,
        pts: Pts,
    ) -> GifMotionResult<AppendOutcome> {
        self.expect_state(SessionState::Writing, "append")?;
        self.check_pts(pts)?;
        if Some(buffer.canvas()) != self.canvas {
            return Err(GifMotionError::invalid_state(format!(
                "buffer is {} but the session canvas is {}",
                buffer.canvas(),
                self.canvas
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unset".to_string())
            )));
        }

        let outcome =
            match append_with_retry(&mut self.encoder, buffer, pts, &self.retry, &self.cancel) {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.state = SessionState::Errored;
                    return Err(e);
                }
            };
        if outcome.is_accepted() {
            self.last_pts = Some(pts);
        }
        Ok(outcome)
    }

    /// Close the track at `end`, finalize the container and wait for completion.
    pub fn finish(&mut self, end: Pts) -> GifMotionResult<()> {
        self.expect_state(SessionState::Writing, "finish")?;
        self.check_pts(end)?;

        self.state = SessionState::Finalizing;
        self.encoder.mark_input_finished(end);

        let (tx, rx) = mpsc::channel();
        self.encoder.finalize(Box::new(move |res| {
            let _ = tx.send(res);
        }));
        let res = rx.recv().unwrap_or_else(|_| {
            Err(GifMotionError::finalize(
                "encoder dropped the finalize completion without reporting",
            ))
        });

        match res {
            Ok(()) => {
                self.state = SessionState::Closed;
                tracing::debug!(%end, "encoding session closed");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Errored;
                Err(match e {
                    GifMotionError::Finalize(_) => e,
                    other => GifMotionError::finalize(other.to_string()),
                })
            }
        }
    }

    /// Mark the session as failed; the encoder is aborted on drop.
    pub fn fail(&mut self) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Errored;
        }
    }

    fn expect_state(&self, expected: SessionState, op: &str) -> GifMotionResult<()> {
        if self.state != expected {
            return Err(GifMotionError::invalid_state(format!(
                "{op} requires session state {expected:?}, found {:?}",
                self.state
            )));
        }
        Ok(())
    }

    fn check_pts(&self, pts: Pts) -> GifMotionResult<()> {
        if let Some(params) = self.params
            && pts.timescale != params.timescale
        {
            return Err(GifMotionError::invalid_state(format!(
                "timestamp {pts} does not use the session timescale {}",
                params.timescale.get()
            )));
        }
        if let Some(last) = self.last_pts
            && pts.ticks < last.ticks
        {
            return Err(GifMotionError::invalid_state(format!(
                "timestamp {pts} is earlier than the previous append at {last}"
            )));
        }
        Ok(())
    }
}

impl<E: VideoEncoder> Drop for EncodingSession<E> {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            tracing::debug!(state = ?self.state, "aborting unfinished encoding session");
            self.encoder.abort();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/session.rs"]
mod tests;
