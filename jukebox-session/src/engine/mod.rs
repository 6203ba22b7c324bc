//! Media engine contract
//!
//! The session controller drives playback exclusively through this
//! interface; the actual decode/render pipeline is an external
//! collaborator. The engine keeps its own internal playback list, but it
//! is never the source of truth for ordering — the controller's
//! `PlaybackQueue` is.
//!
//! Events arrive from an engine-owned execution context on the channel
//! the engine is handed at construction, never on the caller's task. The
//! controller forwards them into its own serialized command stream.

pub mod sim;

use async_trait::async_trait;
use jukebox_common::{Track, TrackId};
use thiserror::Error;

/// Failure reported by the media engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Point-in-time engine status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Opening,
    Buffering,
    Playing,
    Paused,
    Ended,
}

/// Asynchronous engine notifications
///
/// Delivered out-of-band from control calls; ordering relative to the
/// caller's own invocations is not guaranteed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The engine began a specific queued track
    Advanced(TrackId),
    /// A track finished playing
    Ended(TrackId),
    /// Playback failed; the track may be unknown mid-transition
    Error {
        track: Option<TrackId>,
        message: String,
    },
}

/// The playback backend the session controller drives
///
/// Implementations must not block inside these methods: control calls are
/// awaited from the controller's single-writer loop, so long-running work
/// belongs on the engine's own thread or task.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Append a track to the engine's internal playback list; may be
    /// called while something is playing
    async fn enqueue(&self, track: &Track) -> Result<(), EngineError>;

    /// Start or resume consumption of the internal list if idle
    async fn play(&self) -> Result<(), EngineError>;

    /// Stop playback and discard the internal list; best effort. The
    /// controller re-feeds the list before the next `play`.
    async fn stop(&self);

    /// Suspend playback; best effort
    async fn pause(&self);

    /// Set output volume, 0..=100; best effort
    async fn set_volume(&self, volume: u8);

    /// Point-in-time state query
    fn state(&self) -> EngineState;
}
