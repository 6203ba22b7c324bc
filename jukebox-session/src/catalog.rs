//! Media catalog
//!
//! Scans the library directory once at startup and exposes an immutable
//! track list. File names follow the kiosk convention
//! `Artist - Title.ext`; files without the separator fall back to an
//! unknown artist so they stay selectable.

use jukebox_common::config::Settings;
use jukebox_common::{Track, TrackId};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Container formats the kiosk player handles
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm", "m4v", "mpg"];

const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Immutable track listing built from one library scan
pub struct Catalog {
    tracks: Vec<Track>,
    by_id: HashMap<TrackId, usize>,
}

impl Catalog {
    /// Walk the library directory and build the catalog
    ///
    /// Unreadable entries are skipped with a warning; a missing or empty
    /// library yields an empty catalog rather than an error.
    pub fn scan(settings: &Settings) -> Self {
        let root = &settings.library_dir;
        if root.as_os_str().is_empty() {
            warn!("No library directory configured, catalog is empty");
            return Self::from_tracks(Vec::new());
        }

        let mut tracks = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !has_video_extension(path) {
                continue;
            }
            if settings.blocked_tracks.iter().any(|b| path.ends_with(b)) {
                debug!("Blocked track: {}", path.display());
                continue;
            }

            let (artist, title) = parse_stem(path);
            if settings
                .blocked_artists
                .iter()
                .any(|b| b.eq_ignore_ascii_case(&artist))
            {
                debug!("Blocked artist: {}", artist);
                continue;
            }

            tracks.push(Track {
                id: Uuid::new_v4(),
                artist,
                title,
                source: path.to_path_buf(),
                cost: None,
            });
        }

        tracks.sort_by(|a, b| {
            (a.artist.to_lowercase(), a.title.to_lowercase())
                .cmp(&(b.artist.to_lowercase(), b.title.to_lowercase()))
        });
        info!(
            "Catalog scan of {} found {} tracks",
            root.display(),
            tracks.len()
        );
        Self::from_tracks(tracks)
    }

    fn from_tracks(tracks: Vec<Track>) -> Self {
        let by_id = tracks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id, i))
            .collect();
        Self { tracks, by_id }
    }

    pub fn all(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, id: &TrackId) -> Option<&Track> {
        self.by_id.get(id).map(|&i| &self.tracks[i])
    }

    /// Case-insensitive substring match against artist and title
    pub fn search(&self, query: &str) -> Vec<&Track> {
        let needle = query.to_lowercase();
        self.tracks
            .iter()
            .filter(|t| {
                t.artist.to_lowercase().contains(&needle)
                    || t.title.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Distinct artists in catalog order
    pub fn artists(&self) -> Vec<&str> {
        let mut artists: Vec<&str> = Vec::new();
        for track in &self.tracks {
            if artists.last() != Some(&track.artist.as_str()) {
                artists.push(&track.artist);
            }
        }
        artists
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

fn has_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|v| v.eq_ignore_ascii_case(e))
        })
        .unwrap_or(false)
}

/// Split a file stem on the first " - " into artist and title
fn parse_stem(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    match stem.split_once(" - ") {
        Some((artist, title)) if !artist.trim().is_empty() && !title.trim().is_empty() => {
            (artist.trim().to_string(), title.trim().to_string())
        }
        _ => (UNKNOWN_ARTIST.to_string(), stem.trim().to_string()),
    }
}
