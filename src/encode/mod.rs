//! Encoder abstraction, encoding session and concrete encoders.

/// Encoder trait and codec parameters.
pub mod encoder;
/// `ffmpeg`-backed H.264 encoder.
pub mod ffmpeg;
/// In-memory recording encoder.
pub mod memory;
/// Session state machine with bounded readiness retry.
pub mod session;
