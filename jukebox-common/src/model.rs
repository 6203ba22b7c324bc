//! Immutable data model shared by the controller and its observers
//!
//! `Track` is created once at the catalog boundary and referenced by id
//! thereafter. `QueueEntry` wraps an admitted track; it exists from
//! admission until dequeue, removal, or controller shutdown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Catalog-assigned track identifier
pub type TrackId = Uuid;

/// A playable item as described by the catalog
///
/// Immutable; required-field validation happens once at the catalog
/// boundary, never in consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Catalog-assigned id
    pub id: TrackId,
    /// Performing artist
    pub artist: String,
    /// Track title
    pub title: String,
    /// Source reference handed to the media engine (file path here)
    pub source: PathBuf,
    /// Credit cost; falls back to the configured default when unset
    pub cost: Option<u32>,
}

impl Track {
    /// Cost to admit this track given the configured default
    pub fn cost_or(&self, default_cost: u32) -> u32 {
        self.cost.unwrap_or(default_cost)
    }

    /// "Artist - Title" display form used in queue listings
    pub fn display(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

/// A track instance admitted into the playback queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Fresh id per admission; the same track admitted twice yields two
    /// distinct entries
    pub entry_id: Uuid,
    /// The admitted track
    pub track: Track,
    /// When the admission controller accepted the track
    pub admitted_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(track: Track) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            track,
            admitted_at: Utc::now(),
        }
    }
}

/// Read-only ordered view of the pending queue
///
/// Always a copy; observers never hold live references into controller
/// state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub entries: Vec<QueueEntry>,
}

impl QueueSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Playback state machine published by the session controller
///
/// Exactly one instance exists, owned by the controller's single-writer
/// loop. `Error` is idle-like: the idle timer runs and admissions are
/// accepted; it clears on the next successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum PlaybackState {
    /// Nothing queued or playing
    Idle,
    /// Head of queue handed to the engine, start not yet confirmed
    Loading { track: Track },
    /// Engine confirmed this track is playing
    Playing { track: Track },
    /// Playback suspended on this track
    Paused { track: Track },
    /// Settled after bounded consecutive engine failures
    Error {
        track: Option<Track>,
        cause: String,
    },
}

impl PlaybackState {
    /// The track currently loading, playing, or paused
    pub fn active_track(&self) -> Option<&Track> {
        match self {
            PlaybackState::Loading { track }
            | PlaybackState::Playing { track }
            | PlaybackState::Paused { track } => Some(track),
            _ => None,
        }
    }

    /// True when nothing is in flight (Idle or settled Error)
    pub fn is_idle_like(&self) -> bool {
        matches!(self, PlaybackState::Idle | PlaybackState::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(artist: &str, title: &str, cost: Option<u32>) -> Track {
        Track {
            id: Uuid::new_v4(),
            artist: artist.to_string(),
            title: title.to_string(),
            source: PathBuf::from(format!("{} - {}.mp4", artist, title)),
            cost,
        }
    }

    #[test]
    fn cost_falls_back_to_default() {
        assert_eq!(track("A", "B", None).cost_or(3), 3);
        assert_eq!(track("A", "B", Some(5)).cost_or(3), 5);
    }

    #[test]
    fn queue_entries_are_unique_per_admission() {
        let t = track("A", "B", None);
        let e1 = QueueEntry::new(t.clone());
        let e2 = QueueEntry::new(t);
        assert_ne!(e1.entry_id, e2.entry_id);
    }

    #[test]
    fn active_track_by_state() {
        let t = track("A", "B", None);
        assert!(PlaybackState::Idle.active_track().is_none());
        assert_eq!(
            PlaybackState::Playing { track: t.clone() }.active_track(),
            Some(&t)
        );
        assert!(PlaybackState::Error {
            track: Some(t),
            cause: "x".into()
        }
        .is_idle_like());
    }
}
