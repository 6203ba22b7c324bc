//! Playback queue
//!
//! Ordered collection of admitted entries, FIFO by admission order except
//! for explicit admin removal. All mutations happen on the session
//! controller's single-writer loop; observers only ever see snapshots.
//!
//! The head entry handed to the media engine stays in this queue until
//! the engine confirms it started (`Advanced`) or failed; the controller
//! removes it at that point.

use jukebox_common::model::{QueueEntry, QueueSnapshot};
use jukebox_common::{Error, Result, TrackId};
use std::collections::VecDeque;
use tracing::{info, warn};
use uuid::Uuid;

/// FIFO queue of admitted entries
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    entries: VecDeque<QueueEntry>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Append an admitted entry at the tail
    pub fn append(&mut self, entry: QueueEntry) {
        info!(
            "Queued: {} (entry {})",
            entry.track.display(),
            entry.entry_id
        );
        self.entries.push_back(entry);
    }

    /// Admin removal by position; out-of-range is a no-op error
    pub fn remove_at(&mut self, index: usize) -> Result<QueueEntry> {
        let len = self.entries.len();
        match self.entries.remove(index) {
            Some(entry) => {
                info!("Removed queue index {}: {}", index, entry.track.display());
                Ok(entry)
            }
            None => {
                warn!("Remove at invalid index {} (len {})", index, len);
                Err(Error::InvalidIndex { index, len })
            }
        }
    }

    /// Remove the first entry for this entry id; used by the controller
    /// when a track completes, errors, or is skipped
    pub fn remove_by_entry_id(&mut self, entry_id: Uuid) -> Option<QueueEntry> {
        let pos = self.entries.iter().position(|e| e.entry_id == entry_id)?;
        self.entries.remove(pos)
    }

    /// Remove the first entry whose track matches; engines report track
    /// ids, not entry ids
    pub fn remove_by_track_id(&mut self, track_id: TrackId) -> Option<QueueEntry> {
        let pos = self.entries.iter().position(|e| e.track.id == track_id)?;
        self.entries.remove(pos)
    }

    pub fn peek_head(&self) -> Option<&QueueEntry> {
        self.entries.front()
    }

    /// Ordered read-only view, most-recent-append last
    pub fn snapshot(&self, limit: Option<usize>) -> QueueSnapshot {
        let take = limit.unwrap_or(self.entries.len());
        QueueSnapshot {
            entries: self.entries.iter().take(take).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        info!("Queue cleared ({} entries dropped)", self.entries.len());
        self.entries.clear();
    }
}
