//! Error types for the audio layer.

use thiserror::Error;

/// Errors that can occur while driving audio output
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// No output device available
    #[error("no audio output device found")]
    NoOutputDevice,

    /// Device configuration query failed
    #[error("failed to get audio config: {0}")]
    Config(String),

    /// Output stream could not be built
    #[error("failed to build audio stream: {0}")]
    BuildStream(String),

    /// Playback was refused (device busy, autoplay policy, ...)
    #[error("failed to start audio: {0}")]
    Start(String),

    /// The start request was dropped before it completed
    #[error("audio start was cancelled")]
    StartCancelled,

    /// Glicol rejected the generated composition
    #[error("glicol engine error: {0}")]
    Engine(String),
}
