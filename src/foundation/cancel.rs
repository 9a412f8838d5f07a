use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::foundation::error::{GifMotionError, GifMotionResult};

const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Cooperative cancellation flag shared between a conversion and its controller.
///
/// Checked once per frame and at every retry sleep.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Return `true` once [`CancelToken::cancel`] was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` when cancellation was requested.
    pub fn check(&self) -> GifMotionResult<()> {
        if self.is_cancelled() {
            return Err(GifMotionError::Cancelled);
        }
        Ok(())
    }

    /// Sleep for `dur`, waking early with `Err(Cancelled)` on cancellation.
    pub fn sleep(&self, dur: Duration) -> GifMotionResult<()> {
        let deadline = Instant::now() + dur;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/cancel.rs"]
mod tests;
