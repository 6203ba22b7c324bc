//! # Jukebox Session Controller (jukebox-session)
//!
//! Credit-gated playback orchestration for a kiosk video jukebox.
//!
//! **Purpose:** reconcile the credit ledger, the playback queue, and the
//! live status of an external media engine whose events arrive
//! asynchronously and out-of-band from user actions.
//!
//! **Architecture:** one single-writer control loop owns all mutable
//! state; every external trigger (admission, engine event, admin command,
//! idle tick) becomes a message on a bounded command channel consumed only
//! by that loop. Observers receive copies via the event bus and the shared
//! state mirrors; the HTTP/SSE layer is a thin veneer over the controller
//! handle.

pub mod api;
pub mod catalog;
pub mod engine;
pub mod ledger;
pub mod queue;
pub mod session;
pub mod state;

pub use jukebox_common::{Error, Result};
pub use session::{SessionController, SessionHandle};
pub use state::SharedState;
