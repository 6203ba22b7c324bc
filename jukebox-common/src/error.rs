//! Common error types for the jukebox

use thiserror::Error;

/// Common result type for jukebox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the session controller and its callers
///
/// Admission-time errors (`InsufficientCredits`, `InvalidAmount`,
/// `EngineRejected`) are returned synchronously and leave no state behind.
/// `Engine` is a runtime playback failure handled inside the controller and
/// only surfaced to observers as an `ErrorRaised` event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Balance too low for the requested deduction
    #[error("Insufficient credits: need {need}, have {have}")]
    InsufficientCredits { need: u32, have: u32 },

    /// Zero or negative credit amount where a positive one is required
    #[error("Invalid credit amount: {0}")]
    InvalidAmount(i64),

    /// The media engine refused a track at admission time (credit refunded)
    #[error("Media engine rejected track: {0}")]
    EngineRejected(String),

    /// Runtime playback failure reported by the media engine
    #[error("Media engine error: {0}")]
    Engine(String),

    /// Admin removal index out of range
    #[error("Invalid queue index {index} (queue has {len} entries)")]
    InvalidIndex { index: usize, len: usize },

    /// Nothing queued or playing; the operation was a no-op
    #[error("Queue is empty")]
    QueueEmpty,

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error
    #[error("IO error: {0}")]
    Io(String),

    /// The controller loop is no longer running
    #[error("Session controller unavailable")]
    ControllerUnavailable,
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl Error {
    /// True for errors a kiosk UI should present to the patron rather
    /// than treat as a fault
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::InsufficientCredits { .. }
                | Error::InvalidAmount(_)
                | Error::EngineRejected(_)
                | Error::InvalidIndex { .. }
                | Error::QueueEmpty
        )
    }
}
