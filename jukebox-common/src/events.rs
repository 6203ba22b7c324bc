//! Event types for the jukebox event system
//!
//! One central enum for type safety and exhaustive matching. Events are
//! broadcast via `EventBus` and can be serialized for SSE transmission.

use crate::model::{PlaybackState, QueueSnapshot, Track};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// What caused a queue mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueChangeTrigger {
    /// A paid admission appended an entry
    Admission,
    /// The engine confirmed the head entry started playing
    Started,
    /// A track finished naturally
    Completion,
    /// The offending entry was dropped after an engine failure
    EngineError,
    /// Patron or admin skipped the current track
    Skip,
    /// Admin removed a specific entry (no refund)
    AdminRemove,
    /// Admin cleared the whole queue (no refund)
    AdminClear,
}

/// Jukebox event types, pushed to observers (UI) over the event bus
///
/// Every mutation the controller performs is announced here; observers
/// never poll controller internals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JukeboxEvent {
    /// The now-playing track changed (None when playback stopped)
    NowPlayingChanged {
        track: Option<Track>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The pending queue changed; carries a full ordered snapshot
    QueueChanged {
        queue: QueueSnapshot,
        trigger: QueueChangeTrigger,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The credit balance changed
    BalanceChanged {
        balance: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback state machine transition (UI parity with NowPlayingChanged)
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Entered idle mode after the configured quiet period
    ///
    /// Emitted at most once per continuous idle span.
    IdleEntered {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Left idle mode (admission, skip, or playback start)
    IdleExited {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A playback error was handled internally; informational for the UI
    ErrorRaised {
        cause: String,
        track: Option<Track>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl JukeboxEvent {
    /// Stable event-type label used as the SSE `event:` field
    pub fn type_str(&self) -> &'static str {
        match self {
            JukeboxEvent::NowPlayingChanged { .. } => "NowPlayingChanged",
            JukeboxEvent::QueueChanged { .. } => "QueueChanged",
            JukeboxEvent::BalanceChanged { .. } => "BalanceChanged",
            JukeboxEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            JukeboxEvent::IdleEntered { .. } => "IdleEntered",
            JukeboxEvent::IdleExited { .. } => "IdleExited",
            JukeboxEvent::ErrorRaised { .. } => "ErrorRaised",
        }
    }
}

/// Central event distribution bus
///
/// Wraps `tokio::broadcast`: non-blocking publish, multiple concurrent
/// subscribers, automatic cleanup when subscribers drop, lag detection
/// for slow consumers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<JukeboxEvent>,
}

impl EventBus {
    /// Create a bus buffering `capacity` events before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<JukeboxEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// A send error only means no subscriber is listening, which is fine.
    pub fn emit(&self, event: JukeboxEvent) {
        let _ = self.tx.send(event);
    }
}
