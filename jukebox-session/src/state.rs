//! Shared observable state
//!
//! Read-only mirrors of the controller's state for the API layer and
//! other observers, plus the event bus. Only the session controller's
//! single-writer loop writes here; everyone else reads copies.

use jukebox_common::events::{EventBus, JukeboxEvent};
use jukebox_common::model::{PlaybackState, QueueSnapshot, Track};
use tokio::sync::{broadcast, RwLock};

/// State mirrors accessible by all components
///
/// Uses RwLock for concurrent read access with rare writes.
pub struct SharedState {
    /// Current playback state machine position
    playback: RwLock<PlaybackState>,

    /// Current credit balance
    balance: RwLock<u32>,

    /// Pending queue snapshot (most-recent-append last)
    queue: RwLock<QueueSnapshot>,

    /// Whether the controller has announced idle mode
    idle: RwLock<bool>,

    /// Event broadcaster for observers (UI, SSE)
    bus: EventBus,
}

impl SharedState {
    pub fn new(bus: EventBus) -> Self {
        Self {
            playback: RwLock::new(PlaybackState::Idle),
            balance: RwLock::new(0),
            queue: RwLock::new(QueueSnapshot::default()),
            idle: RwLock::new(false),
            bus,
        }
    }

    /// Broadcast an event to all observers
    pub fn broadcast(&self, event: JukeboxEvent) {
        self.bus.emit(event);
    }

    /// Subscribe to the observer event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<JukeboxEvent> {
        self.bus.subscribe()
    }

    pub async fn playback(&self) -> PlaybackState {
        self.playback.read().await.clone()
    }

    pub async fn set_playback(&self, state: PlaybackState) {
        *self.playback.write().await = state;
    }

    /// The track currently loading, playing, or paused
    pub async fn now_playing(&self) -> Option<Track> {
        self.playback.read().await.active_track().cloned()
    }

    pub async fn balance(&self) -> u32 {
        *self.balance.read().await
    }

    pub async fn set_balance(&self, balance: u32) {
        *self.balance.write().await = balance;
    }

    pub async fn queue(&self) -> QueueSnapshot {
        self.queue.read().await.clone()
    }

    pub async fn set_queue(&self, snapshot: QueueSnapshot) {
        *self.queue.write().await = snapshot;
    }

    pub async fn is_idle(&self) -> bool {
        *self.idle.read().await
    }

    pub async fn set_idle(&self, idle: bool) {
        *self.idle.write().await = idle;
    }
}
