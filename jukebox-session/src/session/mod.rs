//! Session controller
//!
//! The single writer over ledger, queue, and playback state. Every
//! trigger in the system, whether a patron request, an admin override,
//! an engine notification, or an idle timer tick, becomes a
//! `SessionCommand` on one bounded channel and is applied by the
//! controller loop in arrival order. Observers read `SharedState`
//! mirrors and the event bus; nothing outside the loop mutates.

mod admission;
mod controller;

pub use controller::SessionController;

use crate::engine::EngineEvent;
use jukebox_common::model::{QueueEntry, QueueSnapshot};
use jukebox_common::{Error, Result, Track};
use tokio::sync::{mpsc, oneshot};

/// Commands the controller loop applies, one at a time
#[derive(Debug)]
pub enum SessionCommand {
    /// Patron requests a track; deduct-then-enqueue with refund on
    /// engine rejection
    Enqueue {
        track: Track,
        reply: oneshot::Sender<Result<QueueEntry>>,
    },

    /// Coin acceptor or admin credit top-up
    AddCredits {
        amount: u32,
        reply: oneshot::Sender<Result<u32>>,
    },

    /// Admin balance override
    SetBalance {
        amount: u32,
        reply: oneshot::Sender<u32>,
    },

    /// Read the current balance
    Balance { reply: oneshot::Sender<u32> },

    /// Admin removal by pending-queue position; no refund
    RemoveAt {
        index: usize,
        reply: oneshot::Sender<Result<QueueEntry>>,
    },

    /// Admin drop of all pending entries; no refund. Returns the number
    /// of entries dropped.
    ClearQueue { reply: oneshot::Sender<usize> },

    /// Abandon the current track and advance as if it ended
    Skip { reply: oneshot::Sender<Result<()>> },

    /// Suspend the current track
    Pause { reply: oneshot::Sender<Result<()>> },

    /// Resume a paused track
    Resume { reply: oneshot::Sender<Result<()>> },

    /// Forwarded to the engine; best effort
    SetVolume {
        volume: u8,
        reply: oneshot::Sender<()>,
    },

    /// Ordered read of the pending queue
    Snapshot {
        reply: oneshot::Sender<QueueSnapshot>,
    },

    /// Engine notification forwarded by the pump task
    Engine(EngineEvent),

    /// Periodic idle-detection tick
    IdleTick,

    /// Stop the loop; the engine is stopped on the way out
    Shutdown,
}

/// Clonable sender half of the controller's command channel
///
/// All methods await both channel admission (backpressure when the
/// controller is busy) and the controller's reply.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { tx }
    }

    async fn request<T>(
        &self,
        cmd: SessionCommand,
        rx: oneshot::Receiver<T>,
    ) -> Result<T> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| Error::ControllerUnavailable)?;
        rx.await.map_err(|_| Error::ControllerUnavailable)
    }

    pub async fn enqueue(&self, track: Track) -> Result<QueueEntry> {
        let (tx, rx) = oneshot::channel();
        self.request(SessionCommand::Enqueue { track, reply: tx }, rx)
            .await?
    }

    pub async fn add_credits(&self, amount: u32) -> Result<u32> {
        let (tx, rx) = oneshot::channel();
        self.request(SessionCommand::AddCredits { amount, reply: tx }, rx)
            .await?
    }

    pub async fn set_balance(&self, amount: u32) -> Result<u32> {
        let (tx, rx) = oneshot::channel();
        self.request(SessionCommand::SetBalance { amount, reply: tx }, rx)
            .await
    }

    pub async fn balance(&self) -> Result<u32> {
        let (tx, rx) = oneshot::channel();
        self.request(SessionCommand::Balance { reply: tx }, rx).await
    }

    pub async fn remove_at(&self, index: usize) -> Result<QueueEntry> {
        let (tx, rx) = oneshot::channel();
        self.request(SessionCommand::RemoveAt { index, reply: tx }, rx)
            .await?
    }

    pub async fn clear_queue(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.request(SessionCommand::ClearQueue { reply: tx }, rx)
            .await
    }

    pub async fn skip(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.request(SessionCommand::Skip { reply: tx }, rx).await?
    }

    pub async fn pause(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.request(SessionCommand::Pause { reply: tx }, rx).await?
    }

    pub async fn resume(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.request(SessionCommand::Resume { reply: tx }, rx).await?
    }

    pub async fn set_volume(&self, volume: u8) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.request(SessionCommand::SetVolume { volume, reply: tx }, rx)
            .await
    }

    pub async fn queue_snapshot(&self) -> Result<QueueSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.request(SessionCommand::Snapshot { reply: tx }, rx).await
    }

    /// Ask the loop to stop; returns once the command is accepted
    pub async fn shutdown(&self) {
        let _ = self.tx.send(SessionCommand::Shutdown).await;
    }
}
