//! End-to-end controller behavior over the command channel, driven by
//! the simulated engine.

use jukebox_common::config::Settings;
use jukebox_common::events::{EventBus, JukeboxEvent};
use jukebox_common::model::PlaybackState;
use jukebox_common::{Error, Track};
use jukebox_session::engine::sim::SimulatedEngine;
use jukebox_session::session::SessionController;
use jukebox_session::state::SharedState;
use jukebox_session::SessionHandle;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use uuid::Uuid;

fn track(title: &str) -> Track {
    Track {
        id: Uuid::new_v4(),
        artist: "Artist".to_string(),
        title: title.to_string(),
        source: PathBuf::from(format!("Artist - {}.mp4", title)),
        cost: None,
    }
}

fn spawn(
    settings: Settings,
    track_duration: Duration,
) -> (
    SessionHandle,
    Arc<SimulatedEngine>,
    Arc<SharedState>,
    broadcast::Receiver<JukeboxEvent>,
) {
    let shared = Arc::new(SharedState::new(EventBus::new(settings.event_bus_capacity)));
    let events = shared.subscribe_events();
    let (engine, engine_rx) = SimulatedEngine::new(track_duration);
    let handle = SessionController::spawn(
        settings,
        engine.clone(),
        engine_rx,
        Arc::clone(&shared),
    );
    (handle, engine, shared, events)
}

async fn next_matching(
    rx: &mut broadcast::Receiver<JukeboxEvent>,
    pred: impl Fn(&JukeboxEvent) -> bool,
) -> JukeboxEvent {
    timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.unwrap();
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn wait_now_playing(
    rx: &mut broadcast::Receiver<JukeboxEvent>,
) -> Option<Track> {
    match next_matching(rx, |e| matches!(e, JukeboxEvent::NowPlayingChanged { .. })).await {
        JukeboxEvent::NowPlayingChanged { track, .. } => track,
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn insufficient_credits_rejects_without_side_effects() {
    let settings = Settings {
        initial_credits: 2,
        ..Settings::default()
    };
    let (handle, _engine, shared, _events) = spawn(settings, Duration::from_secs(60));

    let err = handle.enqueue(track("a")).await.unwrap_err();
    assert_eq!(err, Error::InsufficientCredits { need: 3, have: 2 });

    assert_eq!(handle.balance().await.unwrap(), 2);
    assert!(handle.queue_snapshot().await.unwrap().is_empty());
    assert_eq!(shared.playback().await, PlaybackState::Idle);
}

#[tokio::test]
async fn admission_deducts_and_starts_playback() {
    let (handle, _engine, shared, mut events) =
        spawn(Settings::default(), Duration::from_secs(60));

    handle.add_credits(10).await.unwrap();
    let t = track("a");
    let entry = handle.enqueue(t.clone()).await.unwrap();
    assert_eq!(entry.track.id, t.id);
    assert_eq!(handle.balance().await.unwrap(), 7);

    let playing = wait_now_playing(&mut events).await.unwrap();
    assert_eq!(playing.id, t.id);
    assert_eq!(
        shared.playback().await,
        PlaybackState::Playing { track: t }
    );
}

#[tokio::test]
async fn engine_rejection_refunds_the_deduction() {
    let (handle, engine, _shared, _events) =
        spawn(Settings::default(), Duration::from_secs(60));

    handle.add_credits(5).await.unwrap();
    engine.set_reject_enqueues(true);

    let err = handle.enqueue(track("a")).await.unwrap_err();
    assert!(matches!(err, Error::EngineRejected(_)));

    // Refunded in the same command, no partial state
    assert_eq!(handle.balance().await.unwrap(), 5);
    assert!(handle.queue_snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn tracks_play_in_admission_order() {
    let (handle, _engine, shared, mut events) =
        spawn(Settings::default(), Duration::from_millis(20));

    handle.add_credits(9).await.unwrap();
    let (a, b, c) = (track("a"), track("b"), track("c"));
    handle.enqueue(a.clone()).await.unwrap();
    handle.enqueue(b.clone()).await.unwrap();
    handle.enqueue(c.clone()).await.unwrap();

    assert_eq!(wait_now_playing(&mut events).await.unwrap().id, a.id);
    assert_eq!(wait_now_playing(&mut events).await.unwrap().id, b.id);
    assert_eq!(wait_now_playing(&mut events).await.unwrap().id, c.id);
    assert!(wait_now_playing(&mut events).await.is_none());
    assert_eq!(shared.playback().await, PlaybackState::Idle);
}

#[tokio::test]
async fn pending_view_excludes_the_confirmed_playing_track() {
    let (handle, _engine, _shared, mut events) =
        spawn(Settings::default(), Duration::from_secs(60));

    handle.add_credits(6).await.unwrap();
    let (a, b) = (track("a"), track("b"));
    handle.enqueue(a.clone()).await.unwrap();
    wait_now_playing(&mut events).await;

    // a started, so only b is pending
    handle.enqueue(b.clone()).await.unwrap();
    let snap = handle.queue_snapshot().await.unwrap();
    assert_eq!(snap.len(), 1);
    assert_eq!(snap.entries[0].track.id, b.id);
}

#[tokio::test]
async fn failed_track_is_dropped_and_playback_continues() {
    let (handle, engine, _shared, mut events) =
        spawn(Settings::default(), Duration::from_millis(20));

    handle.add_credits(9).await.unwrap();
    let (a, b, c) = (track("a"), track("b"), track("c"));
    engine.fail_track(b.id);
    handle.enqueue(a.clone()).await.unwrap();
    handle.enqueue(b.clone()).await.unwrap();
    handle.enqueue(c.clone()).await.unwrap();

    assert_eq!(wait_now_playing(&mut events).await.unwrap().id, a.id);

    let raised =
        next_matching(&mut events, |e| matches!(e, JukeboxEvent::ErrorRaised { .. })).await;
    match raised {
        JukeboxEvent::ErrorRaised { track, .. } => {
            assert_eq!(track.map(|t| t.id), Some(b.id))
        }
        _ => unreachable!(),
    }

    // b was dropped without a refund; c plays next
    assert_eq!(wait_now_playing(&mut events).await.unwrap().id, c.id);
    assert_eq!(handle.balance().await.unwrap(), 0);
}

#[tokio::test]
async fn consecutive_failures_settle_in_error_state() {
    let settings = Settings {
        max_consecutive_engine_errors: 2,
        ..Settings::default()
    };
    let (handle, engine, shared, mut events) = spawn(settings, Duration::from_millis(20));

    handle.add_credits(9).await.unwrap();
    let (a, b, c) = (track("a"), track("b"), track("c"));
    engine.fail_track(a.id);
    engine.fail_track(b.id);
    handle.enqueue(a.clone()).await.unwrap();
    handle.enqueue(b.clone()).await.unwrap();
    handle.enqueue(c.clone()).await.unwrap();

    next_matching(&mut events, |e| matches!(e, JukeboxEvent::ErrorRaised { .. })).await;
    next_matching(&mut events, |e| matches!(e, JukeboxEvent::ErrorRaised { .. })).await;

    // Bound hit after b; c stays pending and nothing plays
    next_matching(&mut events, |e| {
        matches!(
            e,
            JukeboxEvent::PlaybackStateChanged {
                new_state: PlaybackState::Error { .. },
                ..
            }
        )
    })
    .await;
    assert!(matches!(
        shared.playback().await,
        PlaybackState::Error { .. }
    ));
    let snap = handle.queue_snapshot().await.unwrap();
    assert_eq!(snap.len(), 1);
    assert_eq!(snap.entries[0].track.id, c.id);

    // A fresh admission recovers playback
    handle.add_credits(3).await.unwrap();
    let d = track("d");
    handle.enqueue(d).await.unwrap();
    assert_eq!(wait_now_playing(&mut events).await.unwrap().id, c.id);
}

#[tokio::test]
async fn skip_restarts_playback_after_the_error_bound_settles() {
    let settings = Settings {
        max_consecutive_engine_errors: 1,
        ..Settings::default()
    };
    let (handle, engine, shared, mut events) = spawn(settings, Duration::from_secs(60));

    handle.add_credits(6).await.unwrap();
    let (a, b) = (track("a"), track("b"));
    engine.fail_track(a.id);
    handle.enqueue(a.clone()).await.unwrap();
    handle.enqueue(b.clone()).await.unwrap();

    next_matching(&mut events, |e| {
        matches!(
            e,
            JukeboxEvent::PlaybackStateChanged {
                new_state: PlaybackState::Error { .. },
                ..
            }
        )
    })
    .await;

    // b is still paid for and pending; skip restarts consumption
    handle.skip().await.unwrap();
    assert_eq!(wait_now_playing(&mut events).await.unwrap().id, b.id);
    assert!(matches!(
        shared.playback().await,
        PlaybackState::Playing { .. }
    ));
}

#[tokio::test]
async fn skip_abandons_current_and_advances() {
    let (handle, _engine, shared, mut events) =
        spawn(Settings::default(), Duration::from_secs(60));

    handle.add_credits(6).await.unwrap();
    let (a, b) = (track("a"), track("b"));
    handle.enqueue(a.clone()).await.unwrap();
    handle.enqueue(b.clone()).await.unwrap();

    assert_eq!(wait_now_playing(&mut events).await.unwrap().id, a.id);
    handle.skip().await.unwrap();
    assert_eq!(wait_now_playing(&mut events).await.unwrap().id, b.id);

    handle.skip().await.unwrap();
    assert!(wait_now_playing(&mut events).await.is_none());
    assert_eq!(shared.playback().await, PlaybackState::Idle);

    // Nothing left to skip
    assert_eq!(handle.skip().await.unwrap_err(), Error::QueueEmpty);
}

#[tokio::test]
async fn admin_remove_drops_pending_entry_without_refund() {
    let (handle, _engine, _shared, mut events) =
        spawn(Settings::default(), Duration::from_secs(60));

    handle.add_credits(9).await.unwrap();
    let (a, b, c) = (track("a"), track("b"), track("c"));
    handle.enqueue(a.clone()).await.unwrap();
    handle.enqueue(b.clone()).await.unwrap();
    handle.enqueue(c.clone()).await.unwrap();
    wait_now_playing(&mut events).await;

    // Pending view is [b, c]; remove b
    let removed = handle.remove_at(0).await.unwrap();
    assert_eq!(removed.track.id, b.id);
    assert_eq!(handle.balance().await.unwrap(), 0);

    let snap = handle.queue_snapshot().await.unwrap();
    assert_eq!(snap.len(), 1);
    assert_eq!(snap.entries[0].track.id, c.id);

    // Out-of-range removal is a no-op error
    assert_eq!(
        handle.remove_at(5).await.unwrap_err(),
        Error::InvalidIndex { index: 5, len: 1 }
    );
}

#[tokio::test]
async fn skipping_past_a_removed_entry_plays_the_next_survivor() {
    let (handle, _engine, _shared, mut events) =
        spawn(Settings::default(), Duration::from_secs(60));

    handle.add_credits(9).await.unwrap();
    let (a, b, c) = (track("a"), track("b"), track("c"));
    handle.enqueue(a.clone()).await.unwrap();
    handle.enqueue(b.clone()).await.unwrap();
    handle.enqueue(c.clone()).await.unwrap();
    assert_eq!(wait_now_playing(&mut events).await.unwrap().id, a.id);

    // b is gone from the queue even though the engine was handed it
    handle.remove_at(0).await.unwrap();
    handle.skip().await.unwrap();
    assert_eq!(wait_now_playing(&mut events).await.unwrap().id, c.id);
}

#[tokio::test]
async fn natural_advance_skips_a_removed_entry() {
    let (handle, _engine, _shared, mut events) =
        spawn(Settings::default(), Duration::from_millis(50));

    handle.add_credits(9).await.unwrap();
    let (a, b, c) = (track("a"), track("b"), track("c"));
    handle.enqueue(a.clone()).await.unwrap();
    handle.enqueue(b.clone()).await.unwrap();
    handle.enqueue(c.clone()).await.unwrap();
    assert_eq!(wait_now_playing(&mut events).await.unwrap().id, a.id);

    // The engine still holds b internally; when a ends it must not play
    handle.remove_at(0).await.unwrap();
    assert_eq!(wait_now_playing(&mut events).await.unwrap().id, c.id);
}

#[tokio::test]
async fn clear_queue_keeps_the_playing_track() {
    let (handle, _engine, shared, mut events) =
        spawn(Settings::default(), Duration::from_secs(60));

    handle.add_credits(9).await.unwrap();
    let (a, b, c) = (track("a"), track("b"), track("c"));
    handle.enqueue(a.clone()).await.unwrap();
    handle.enqueue(b).await.unwrap();
    handle.enqueue(c).await.unwrap();
    assert_eq!(wait_now_playing(&mut events).await.unwrap().id, a.id);

    let dropped = handle.clear_queue().await.unwrap();
    assert_eq!(dropped, 2);
    assert!(handle.queue_snapshot().await.unwrap().is_empty());
    assert_eq!(
        shared.playback().await,
        PlaybackState::Playing { track: a }
    );
}

#[tokio::test]
async fn pause_and_resume_flip_the_state() {
    let (handle, _engine, shared, mut events) =
        spawn(Settings::default(), Duration::from_secs(60));

    handle.add_credits(3).await.unwrap();
    let a = track("a");
    handle.enqueue(a.clone()).await.unwrap();
    wait_now_playing(&mut events).await;

    handle.pause().await.unwrap();
    assert_eq!(
        shared.playback().await,
        PlaybackState::Paused { track: a.clone() }
    );

    handle.resume().await.unwrap();
    assert_eq!(shared.playback().await, PlaybackState::Playing { track: a });

    // Nothing active after the queue drains
    handle.skip().await.unwrap();
    assert_eq!(handle.pause().await.unwrap_err(), Error::QueueEmpty);
}

#[tokio::test]
async fn idle_is_announced_once_and_exits_on_admission() {
    let settings = Settings {
        idle_timeout_ms: 100,
        initial_credits: 3,
        ..Settings::default()
    };
    let (handle, _engine, shared, mut events) = spawn(settings, Duration::from_millis(20));

    next_matching(&mut events, |e| matches!(e, JukeboxEvent::IdleEntered { .. })).await;
    assert!(shared.is_idle().await);

    handle.enqueue(track("a")).await.unwrap();
    next_matching(&mut events, |e| matches!(e, JukeboxEvent::IdleExited { .. })).await;
    assert!(!shared.is_idle().await);

    // After the track ends the quiet period restarts and idle is
    // announced again
    next_matching(&mut events, |e| matches!(e, JukeboxEvent::IdleEntered { .. })).await;
}

#[tokio::test]
async fn per_track_cost_overrides_the_default() {
    let (handle, _engine, _shared, _events) =
        spawn(Settings::default(), Duration::from_secs(60));

    handle.add_credits(5).await.unwrap();
    let mut premium = track("premium");
    premium.cost = Some(5);
    handle.enqueue(premium).await.unwrap();
    assert_eq!(handle.balance().await.unwrap(), 0);

    // Free tracks bypass the ledger
    let mut free = track("free");
    free.cost = Some(0);
    handle.enqueue(free).await.unwrap();
    assert_eq!(handle.balance().await.unwrap(), 0);
}

#[tokio::test]
async fn racing_admissions_resolve_deterministically() {
    let settings = Settings {
        initial_credits: 5,
        ..Settings::default()
    };
    let (handle, _engine, _shared, _events) = spawn(settings, Duration::from_secs(60));

    let mut a = track("a");
    a.cost = Some(5);
    let mut b = track("b");
    b.cost = Some(5);

    // Both requests hit the same serialized loop; exactly one deduction
    // can succeed
    let (ra, rb) = tokio::join!(handle.enqueue(a), handle.enqueue(b));
    let (ok, err) = match (ra, rb) {
        (Ok(ok), Err(err)) | (Err(err), Ok(ok)) => (ok, err),
        other => panic!("expected one success and one failure, got {:?}", other),
    };
    assert_eq!(ok.track.cost, Some(5));
    assert_eq!(err, Error::InsufficientCredits { need: 5, have: 0 });
    assert_eq!(handle.balance().await.unwrap(), 0);
}

#[tokio::test]
async fn set_balance_overrides_unconditionally() {
    let (handle, _engine, _shared, _events) =
        spawn(Settings::default(), Duration::from_secs(60));

    handle.add_credits(7).await.unwrap();
    assert_eq!(handle.set_balance(100).await.unwrap(), 100);
    assert_eq!(handle.set_balance(0).await.unwrap(), 0);
    assert_eq!(handle.balance().await.unwrap(), 0);
}
