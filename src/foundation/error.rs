/// Convenience result type used across gifmotion.
pub type GifMotionResult<T> = Result<T, GifMotionError>;

/// Fatal error taxonomy for a conversion.
///
/// Recoverable per-frame conditions (append timeouts, hard rejections) are not errors; they are
/// collected as [`crate::FrameIssue`] values in the conversion report.
#[derive(thiserror::Error, Debug)]
pub enum GifMotionError {
    /// The source asset is missing or is not a readable animated GIF.
    #[error("decode error: {0}")]
    Decode(String),

    /// The encoder rejected the session parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A frame buffer could not be allocated.
    #[error("buffer allocation error: {0}")]
    BufferAllocation(String),

    /// The encoder refused a buffer and the conversion was configured to stop on rejections.
    #[error("encoder rejected frame {frame_index}: {reason}")]
    AppendRejected {
        /// Source frame whose buffer was refused.
        frame_index: usize,
        /// Encoder-reported reason.
        reason: String,
    },

    /// The container could not be finalized after all frames were submitted.
    #[error("finalize error: {0}")]
    Finalize(String),

    /// An encoding session operation was called outside its valid state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Invalid user-provided options.
    #[error("validation error: {0}")]
    Validation(String),

    /// The conversion was cancelled through its [`crate::CancelToken`].
    #[error("conversion cancelled")]
    Cancelled,

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GifMotionError {
    /// Build a [`GifMotionError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`GifMotionError::Configuration`] value.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a [`GifMotionError::BufferAllocation`] value.
    pub fn buffer_allocation(msg: impl Into<String>) -> Self {
        Self::BufferAllocation(msg.into())
    }

    /// Build a [`GifMotionError::Finalize`] value.
    pub fn finalize(msg: impl Into<String>) -> Self {
        Self::Finalize(msg.into())
    }

    /// Build a [`GifMotionError::InvalidState`] value.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Build a [`GifMotionError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Return `true` for errors raised before any frame reached the encoder.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::Configuration(_) | Self::Validation(_)
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
