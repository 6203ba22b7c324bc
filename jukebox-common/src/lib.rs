//! # Jukebox Common Library
//!
//! Shared code for the jukebox session controller and its observers:
//! - Error taxonomy (`Error` enum, `Result` alias)
//! - Event types (`JukeboxEvent` enum) and the `EventBus`
//! - Immutable data model (`Track`, `QueueEntry`, `PlaybackState`)
//! - Settings loading and resolution

pub mod config;
pub mod error;
pub mod events;
pub mod model;

pub use error::{Error, Result};
pub use events::{EventBus, JukeboxEvent};
pub use model::{PlaybackState, QueueEntry, QueueSnapshot, Track, TrackId};
