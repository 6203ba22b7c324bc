//! Single-writer controller loop
//!
//! Owns the ledger, the queue, and the playback state machine. Commands
//! arrive on one bounded channel and are applied in order; engine
//! notifications and idle ticks are forwarded into the same channel by
//! helper tasks, so there is exactly one interleaving and no locks
//! around the mutable core.
//!
//! The engine keeps a shadow of the pending list (appended at
//! admission). In the plain FIFO flow both lists advance in step. Admin
//! removals leave the removed track in the engine's shadow; its id goes
//! into a suppression list, and when the engine later reports it
//! started, the controller stops the engine and re-feeds it from the
//! queue. The queue is always the truth.

use super::{SessionCommand, SessionHandle};
use crate::engine::{EngineEvent, MediaEngine};
use crate::ledger::CreditLedger;
use crate::queue::PlaybackQueue;
use crate::state::SharedState;
use jukebox_common::config::Settings;
use jukebox_common::events::{JukeboxEvent, QueueChangeTrigger};
use jukebox_common::model::{PlaybackState, QueueEntry};
use jukebox_common::{Error, Result, Track, TrackId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct SessionController {
    pub(super) settings: Settings,
    pub(super) engine: Arc<dyn MediaEngine>,
    pub(super) shared: Arc<SharedState>,
    pub(super) ledger: CreditLedger,
    pub(super) queue: PlaybackQueue,
    pub(super) playback: PlaybackState,

    /// Entry handed to the engine; stays in `queue` while Loading, out
    /// of it once Playing or Paused
    pub(super) current: Option<QueueEntry>,

    /// Track ids removed from the queue that the engine's shadow list
    /// may still contain; a multiset since duplicate admissions share a
    /// track id
    suppressed: Vec<TrackId>,

    consecutive_errors: u32,
    idle_since: Instant,
    idle_announced: bool,
    last_now_playing: Option<TrackId>,
}

impl SessionController {
    /// Spawn the controller loop plus its engine pump and idle ticker;
    /// returns the handle everything else talks through
    pub fn spawn(
        settings: Settings,
        engine: Arc<dyn MediaEngine>,
        engine_rx: mpsc::UnboundedReceiver<EngineEvent>,
        shared: Arc<SharedState>,
    ) -> SessionHandle {
        let (tx, rx) = mpsc::channel(settings.command_channel_capacity);

        // Engine notifications join the serialized command stream
        let pump_tx = tx.clone();
        tokio::spawn(async move {
            let mut engine_rx = engine_rx;
            while let Some(event) = engine_rx.recv().await {
                if pump_tx.send(SessionCommand::Engine(event)).await.is_err() {
                    break;
                }
            }
            debug!("Engine event pump stopped");
        });

        // Idle ticks, a few per timeout so announcement lag stays small
        let tick_tx = tx.clone();
        let tick_every =
            Duration::from_millis((settings.idle_timeout_ms / 4).clamp(10, 1_000));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tick_tx.send(SessionCommand::IdleTick).await.is_err() {
                    break;
                }
            }
            debug!("Idle ticker stopped");
        });

        let controller = Self {
            ledger: CreditLedger::new(settings.initial_credits),
            queue: PlaybackQueue::new(),
            playback: PlaybackState::Idle,
            current: None,
            suppressed: Vec::new(),
            consecutive_errors: 0,
            idle_since: Instant::now(),
            idle_announced: false,
            last_now_playing: None,
            settings,
            engine,
            shared,
        };
        tokio::spawn(controller.run(rx));

        SessionHandle::new(tx)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<SessionCommand>) {
        info!("Session controller started");
        self.shared.set_balance(self.ledger.balance()).await;

        while let Some(cmd) = rx.recv().await {
            if !self.apply(cmd).await {
                break;
            }
        }

        self.engine.stop().await;
        info!("Session controller stopped");
    }

    /// Apply one command; returns false on shutdown
    async fn apply(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::Enqueue { track, reply } => {
                self.touch();
                let result = self.admit(track).await;
                if result.is_ok() {
                    self.exit_idle().await;
                    if self.playback.is_idle_like() {
                        self.advance_to_head().await;
                    }
                }
                let _ = reply.send(result);
            }
            SessionCommand::AddCredits { amount, reply } => {
                self.touch();
                let result = self.ledger.add(amount);
                if result.is_ok() {
                    self.publish_balance().await;
                }
                let _ = reply.send(result);
            }
            SessionCommand::SetBalance { amount, reply } => {
                self.touch();
                self.ledger.set_balance(amount);
                self.publish_balance().await;
                let _ = reply.send(self.ledger.balance());
            }
            SessionCommand::Balance { reply } => {
                let _ = reply.send(self.ledger.balance());
            }
            SessionCommand::RemoveAt { index, reply } => {
                self.touch();
                let result = self.remove_at(index).await;
                let _ = reply.send(result);
            }
            SessionCommand::ClearQueue { reply } => {
                self.touch();
                let dropped = self.clear_queue().await;
                let _ = reply.send(dropped);
            }
            SessionCommand::Skip { reply } => {
                self.touch();
                let result = self.skip_current().await;
                if result.is_ok() {
                    self.exit_idle().await;
                }
                let _ = reply.send(result);
            }
            SessionCommand::Pause { reply } => {
                self.touch();
                let _ = reply.send(self.pause().await);
            }
            SessionCommand::Resume { reply } => {
                self.touch();
                let _ = reply.send(self.resume().await);
            }
            SessionCommand::SetVolume { volume, reply } => {
                self.touch();
                self.engine.set_volume(volume).await;
                let _ = reply.send(());
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.queue.snapshot(None));
            }
            SessionCommand::Engine(event) => {
                self.on_engine_event(event).await;
            }
            SessionCommand::IdleTick => {
                self.idle_tick().await;
            }
            SessionCommand::Shutdown => {
                info!("Shutdown requested");
                return false;
            }
        }
        true
    }

    // ---- engine events -------------------------------------------------

    async fn on_engine_event(&mut self, event: EngineEvent) {
        debug!("Engine event: {:?}", event);
        match event {
            EngineEvent::Advanced(track_id) => self.on_advanced(track_id).await,
            EngineEvent::Ended(track_id) => self.on_ended(track_id).await,
            EngineEvent::Error { track, message } => {
                self.on_engine_failure(track, message).await
            }
        }
    }

    async fn on_advanced(&mut self, track_id: TrackId) {
        if let Some(pos) = self.suppressed.iter().position(|id| *id == track_id) {
            // The engine started a track that was admin-removed; re-feed
            // it from the queue
            self.suppressed.remove(pos);
            warn!("Engine started a removed track, resyncing");
            self.resync_engine_and_play().await;
            return;
        }

        let Some(current) = self.current.clone() else {
            warn!("Engine advanced with nothing in flight, resyncing");
            self.resync_engine_and_play().await;
            return;
        };
        if current.track.id != track_id {
            // The queue is the truth; treat this as the head starting
            warn!(
                "Engine advanced to {} while {} was expected",
                track_id, current.track.id
            );
        }

        // Confirmed start: the entry leaves the pending view
        self.queue.remove_by_entry_id(current.entry_id);
        self.consecutive_errors = 0;
        info!("Now playing: {}", current.track.display());
        self.set_state(PlaybackState::Playing {
            track: current.track.clone(),
        })
        .await;
        self.publish_now_playing(Some(current.track)).await;
        self.publish_queue(QueueChangeTrigger::Started).await;
        self.exit_idle().await;
        self.touch();
    }

    async fn on_ended(&mut self, track_id: TrackId) {
        let Some(current) = self.current.take() else {
            debug!("Ended for {} with nothing in flight", track_id);
            return;
        };
        if current.track.id != track_id {
            warn!(
                "Engine ended {} while {} was current",
                track_id, current.track.id
            );
        }
        info!("Finished: {}", current.track.display());
        self.publish_queue(QueueChangeTrigger::Completion).await;
        self.touch();
        self.advance_to_head().await;
    }

    /// Drop the offending entry, count the failure, and either retry the
    /// next head or settle in the Error state once the bound is hit
    async fn on_engine_failure(&mut self, track_id: Option<TrackId>, message: String) {
        let offender = match self.current.take() {
            Some(cur) if track_id.map_or(true, |id| id == cur.track.id) => {
                // May still be in the queue if the failure hit while loading
                self.queue.remove_by_entry_id(cur.entry_id);
                Some(cur)
            }
            Some(cur) => {
                // Failure names a track that is not current; playback of
                // the current track continues
                let named = track_id.and_then(|id| self.queue.remove_by_track_id(id));
                self.current = Some(cur);
                named
            }
            None => track_id.and_then(|id| self.queue.remove_by_track_id(id)),
        };

        let offender_track = offender.map(|e| e.track);
        self.consecutive_errors += 1;
        warn!(
            "Engine failure ({} consecutive): {}",
            self.consecutive_errors, message
        );
        self.publish_error(message.clone(), offender_track.clone()).await;
        self.publish_queue(QueueChangeTrigger::EngineError).await;

        if self.current.is_some() {
            return;
        }
        if self.consecutive_errors >= self.settings.max_consecutive_engine_errors {
            warn!(
                "Giving up after {} consecutive engine failures",
                self.consecutive_errors
            );
            self.set_state(PlaybackState::Error {
                track: offender_track,
                cause: message,
            })
            .await;
            self.publish_now_playing(None).await;
            self.touch();
            return;
        }
        self.advance_to_head().await;
    }

    // ---- playback advancement ------------------------------------------

    /// Hand the head of the queue to the engine, or settle idle. Play
    /// rejections are consumed here so retries stay iterative.
    async fn advance_to_head(&mut self) {
        loop {
            let Some(entry) = self.queue.peek_head().cloned() else {
                self.current = None;
                self.settle_idle().await;
                return;
            };

            self.current = Some(entry.clone());
            self.set_state(PlaybackState::Loading {
                track: entry.track.clone(),
            })
            .await;

            // Confirmation arrives later as Advanced; a no-op when the
            // engine is already consuming its list
            if let Err(e) = self.engine.play().await {
                self.current = None;
                self.queue.remove_by_entry_id(entry.entry_id);
                self.consecutive_errors += 1;
                warn!(
                    "Engine refused to play {} ({} consecutive): {}",
                    entry.track.display(),
                    self.consecutive_errors,
                    e
                );
                self.publish_error(e.to_string(), Some(entry.track.clone())).await;
                self.publish_queue(QueueChangeTrigger::EngineError).await;
                if self.consecutive_errors >= self.settings.max_consecutive_engine_errors {
                    self.set_state(PlaybackState::Error {
                        track: Some(entry.track),
                        cause: e.to_string(),
                    })
                    .await;
                    self.publish_now_playing(None).await;
                    self.touch();
                    return;
                }
                continue;
            }
            return;
        }
    }

    /// Stop the engine, re-feed its list from the queue, and continue
    async fn resync_engine_and_play(&mut self) {
        self.engine.stop().await;
        self.suppressed.clear();

        let entries = self.queue.snapshot(None).entries;
        let mut rejected = Vec::new();
        for entry in &entries {
            if let Err(e) = self.engine.enqueue(&entry.track).await {
                warn!(
                    "Engine refused {} during resync: {}",
                    entry.track.display(),
                    e
                );
                rejected.push((entry.clone(), e));
            }
        }
        for (entry, e) in rejected {
            // Already paid for; a playback failure, not an admission one
            self.queue.remove_by_entry_id(entry.entry_id);
            self.publish_error(e.to_string(), Some(entry.track)).await;
            self.publish_queue(QueueChangeTrigger::EngineError).await;
        }

        self.advance_to_head().await;
    }

    async fn settle_idle(&mut self) {
        self.set_state(PlaybackState::Idle).await;
        self.publish_now_playing(None).await;
        self.touch();
    }

    // ---- admin and patron operations -----------------------------------

    /// Skip the in-flight track and advance as if it ended. In a
    /// settled error state with entries still pending, skip restarts
    /// playback from the head instead.
    async fn skip_current(&mut self) -> Result<()> {
        match self.current.take() {
            Some(current) => {
                info!("Skipping: {}", current.track.display());
                // A loading head is still in the pending queue
                self.queue.remove_by_entry_id(current.entry_id);
                self.publish_queue(QueueChangeTrigger::Skip).await;
                self.resync_engine_and_play().await;
                Ok(())
            }
            None if !self.queue.is_empty() => {
                info!("Skip restarting playback from the pending queue");
                self.consecutive_errors = 0;
                self.resync_engine_and_play().await;
                Ok(())
            }
            None => Err(Error::QueueEmpty),
        }
    }

    /// Admin removal by pending-view position; no refund
    async fn remove_at(&mut self, index: usize) -> Result<QueueEntry> {
        let entry = self.queue.remove_at(index)?;
        let was_loading_head = self
            .current
            .as_ref()
            .map_or(false, |c| c.entry_id == entry.entry_id);
        self.publish_queue(QueueChangeTrigger::AdminRemove).await;

        if was_loading_head {
            self.current = None;
            self.resync_engine_and_play().await;
        } else {
            // The engine's shadow list still holds it
            self.suppressed.push(entry.track.id);
        }
        Ok(entry)
    }

    /// Admin drop of every pending entry; a confirmed-playing track is
    /// not pending and plays on
    async fn clear_queue(&mut self) -> usize {
        let dropped = self.queue.len();
        for entry in &self.queue.snapshot(None).entries {
            self.suppressed.push(entry.track.id);
        }
        self.queue.clear();

        if matches!(self.playback, PlaybackState::Loading { .. }) {
            // The loading head counted as pending too
            self.current = None;
            self.engine.stop().await;
            self.suppressed.clear();
            self.settle_idle().await;
        }
        self.publish_queue(QueueChangeTrigger::AdminClear).await;
        dropped
    }

    async fn pause(&mut self) -> Result<()> {
        match self.playback.clone() {
            PlaybackState::Playing { track } => {
                self.engine.pause().await;
                self.set_state(PlaybackState::Paused { track }).await;
                Ok(())
            }
            PlaybackState::Paused { .. } | PlaybackState::Loading { .. } => Ok(()),
            _ => Err(Error::QueueEmpty),
        }
    }

    async fn resume(&mut self) -> Result<()> {
        match self.playback.clone() {
            PlaybackState::Paused { track } => {
                self.engine
                    .play()
                    .await
                    .map_err(|e| Error::Engine(e.to_string()))?;
                self.set_state(PlaybackState::Playing { track }).await;
                Ok(())
            }
            PlaybackState::Playing { .. } | PlaybackState::Loading { .. } => Ok(()),
            _ => Err(Error::QueueEmpty),
        }
    }

    // ---- idle detection ------------------------------------------------

    /// Restart the quiet-period clock
    pub(super) fn touch(&mut self) {
        self.idle_since = Instant::now();
    }

    async fn exit_idle(&mut self) {
        if !self.idle_announced {
            return;
        }
        info!("Idle mode exited");
        self.idle_announced = false;
        self.shared.set_idle(false).await;
        self.shared.broadcast(JukeboxEvent::IdleExited {
            timestamp: chrono::Utc::now(),
        });
    }

    async fn idle_tick(&mut self) {
        if self.idle_announced
            || self.current.is_some()
            || !self.queue.is_empty()
            || !self.playback.is_idle_like()
        {
            return;
        }
        if self.idle_since.elapsed() < Duration::from_millis(self.settings.idle_timeout_ms) {
            return;
        }
        info!(
            "Idle mode entered after {} ms of inactivity",
            self.settings.idle_timeout_ms
        );
        self.idle_announced = true;
        self.shared.set_idle(true).await;
        self.shared.broadcast(JukeboxEvent::IdleEntered {
            timestamp: chrono::Utc::now(),
        });
    }

    // ---- publication ---------------------------------------------------

    async fn set_state(&mut self, new: PlaybackState) {
        if self.playback == new {
            return;
        }
        let old = std::mem::replace(&mut self.playback, new.clone());
        debug!("Playback: {:?} -> {:?}", old, new);
        self.shared.set_playback(new.clone()).await;
        self.shared.broadcast(JukeboxEvent::PlaybackStateChanged {
            old_state: old,
            new_state: new,
            timestamp: chrono::Utc::now(),
        });
    }

    pub(super) async fn publish_queue(&self, trigger: QueueChangeTrigger) {
        let snapshot = self.queue.snapshot(None);
        self.shared.set_queue(snapshot.clone()).await;
        self.shared.broadcast(JukeboxEvent::QueueChanged {
            queue: snapshot,
            trigger,
            timestamp: chrono::Utc::now(),
        });
    }

    pub(super) async fn publish_balance(&self) {
        let balance = self.ledger.balance();
        self.shared.set_balance(balance).await;
        self.shared.broadcast(JukeboxEvent::BalanceChanged {
            balance,
            timestamp: chrono::Utc::now(),
        });
    }

    async fn publish_now_playing(&mut self, track: Option<Track>) {
        if self.last_now_playing == track.as_ref().map(|t| t.id) {
            return;
        }
        self.last_now_playing = track.as_ref().map(|t| t.id);
        self.shared.broadcast(JukeboxEvent::NowPlayingChanged {
            track,
            timestamp: chrono::Utc::now(),
        });
    }

    pub(super) async fn publish_error(&self, cause: String, track: Option<Track>) {
        self.shared.broadcast(JukeboxEvent::ErrorRaised {
            cause,
            track,
            timestamp: chrono::Utc::now(),
        });
    }
}
