//! Simulated media engine
//!
//! In-process stand-in for the real playback backend (VLC-class player).
//! Consumes its internal list on `play()`, reports `Advanced`/`Ended` on a
//! timer from its own task, and can be scripted to reject enqueues or fail
//! specific tracks. Used by the binary's demo mode and by tests.

use super::{EngineError, EngineEvent, EngineState, MediaEngine};
use async_trait::async_trait;
use jukebox_common::{Track, TrackId};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::debug;

/// Delay between starting a track and confirming it (simulated open)
const OPEN_DELAY: Duration = Duration::from_millis(5);

struct Inner {
    list: VecDeque<Track>,
    state: EngineState,
    /// Bumped on stop and on each new consumption run; stale tasks bail
    generation: u64,
    volume: u8,
    fail_tracks: HashSet<TrackId>,
}

/// Timer-driven engine with a scriptable failure surface
pub struct SimulatedEngine {
    inner: Arc<Mutex<Inner>>,
    events: mpsc::UnboundedSender<EngineEvent>,
    track_duration: Duration,
    reject_enqueues: AtomicBool,
}

impl SimulatedEngine {
    /// Create the engine and the event stream the controller consumes
    pub fn new(track_duration: Duration) -> (Arc<Self>, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            inner: Arc::new(Mutex::new(Inner {
                list: VecDeque::new(),
                state: EngineState::Idle,
                generation: 0,
                volume: 80,
                fail_tracks: HashSet::new(),
            })),
            events: tx,
            track_duration,
            reject_enqueues: AtomicBool::new(false),
        });
        (engine, rx)
    }

    /// Script: refuse all subsequent enqueue calls
    pub fn set_reject_enqueues(&self, reject: bool) {
        self.reject_enqueues.store(reject, Ordering::Relaxed);
    }

    /// Script: the next playback of this track fails instead of advancing
    pub fn fail_track(&self, track_id: TrackId) {
        self.inner.lock().unwrap().fail_tracks.insert(track_id);
    }
}

/// One consumption run: play list items back to back until the list is
/// empty, a failure occurs, or the run is superseded (generation bumped).
async fn consume(
    inner: Arc<Mutex<Inner>>,
    events: mpsc::UnboundedSender<EngineEvent>,
    track_duration: Duration,
    generation: u64,
) {
    loop {
        let track = {
            let mut guard = inner.lock().unwrap();
            if guard.generation != generation {
                return;
            }
            match guard.list.pop_front() {
                Some(track) => {
                    guard.state = EngineState::Opening;
                    track
                }
                None => {
                    guard.state = EngineState::Idle;
                    return;
                }
            }
        };

        sleep(OPEN_DELAY).await;
        {
            let mut guard = inner.lock().unwrap();
            if guard.generation != generation {
                return;
            }
            if guard.fail_tracks.remove(&track.id) {
                debug!("Simulated failure for {}", track.display());
                guard.state = EngineState::Idle;
                let _ = events.send(EngineEvent::Error {
                    track: Some(track.id),
                    message: "simulated decode failure".to_string(),
                });
                // Consumption stops here; the controller restarts it.
                return;
            }
            guard.state = EngineState::Playing;
            let _ = events.send(EngineEvent::Advanced(track.id));
        }

        sleep(track_duration).await;
        {
            let mut guard = inner.lock().unwrap();
            if guard.generation != generation {
                return;
            }
            guard.state = EngineState::Ended;
            let _ = events.send(EngineEvent::Ended(track.id));
        }
        // Loop around to auto-advance, media-list style; the controller's
        // follow-up play() is a harmless no-op while we are consuming.
    }
}

#[async_trait]
impl MediaEngine for SimulatedEngine {
    async fn enqueue(&self, track: &Track) -> Result<(), EngineError> {
        if self.reject_enqueues.load(Ordering::Relaxed) {
            return Err(EngineError::new("engine refused enqueue"));
        }
        let mut inner = self.inner.lock().unwrap();
        inner.list.push_back(track.clone());
        debug!("Engine list += {}", track.display());
        Ok(())
    }

    async fn play(&self) -> Result<(), EngineError> {
        let generation = {
            let mut inner = self.inner.lock().unwrap();
            match inner.state {
                EngineState::Idle | EngineState::Ended => {
                    if inner.list.is_empty() {
                        inner.state = EngineState::Idle;
                        return Ok(());
                    }
                    inner.generation += 1;
                    inner.generation
                }
                EngineState::Paused => {
                    inner.state = EngineState::Playing;
                    return Ok(());
                }
                // already consuming
                _ => return Ok(()),
            }
        };

        tokio::spawn(consume(
            Arc::clone(&self.inner),
            self.events.clone(),
            self.track_duration,
            generation,
        ));
        Ok(())
    }

    async fn stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.generation += 1; // cancel the in-flight consumption run
        inner.list.clear();
        inner.state = EngineState::Idle;
    }

    async fn pause(&self) {
        // Best effort: the simulated countdown keeps running while paused.
        let mut inner = self.inner.lock().unwrap();
        if inner.state == EngineState::Playing {
            inner.state = EngineState::Paused;
        }
    }

    async fn set_volume(&self, volume: u8) {
        self.inner.lock().unwrap().volume = volume.min(100);
    }

    fn state(&self) -> EngineState {
        self.inner.lock().unwrap().state
    }
}
