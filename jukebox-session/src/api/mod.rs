//! REST API for the session controller
//!
//! All mutations go through the `SessionHandle`; reads come from the
//! `SharedState` mirrors and the catalog. Event push is SSE.

pub mod handlers;
pub mod sse;

use crate::catalog::Catalog;
use crate::session::SessionHandle;
use crate::state::SharedState;
use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Command channel into the controller loop
    pub handle: SessionHandle,
    /// Immutable track listing
    pub catalog: Arc<Catalog>,
    /// Controller state mirrors and event bus
    pub shared: Arc<SharedState>,
    /// Server port, reported by the health endpoint
    pub port: u16,
    /// Library root, reported by the health endpoint
    pub library_dir: String,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(health_check))
        // API v1 routes
        .nest(
            "/api/v1",
            Router::new()
                // Status and queue reads
                .route("/status", get(handlers::get_status))
                .route("/queue", get(handlers::get_queue))
                // Credit endpoints
                .route("/credits", get(handlers::get_credits))
                .route("/credits", post(handlers::add_credits))
                .route("/credits/balance", post(handlers::set_balance))
                // Playback control
                .route("/playback/enqueue", post(handlers::enqueue))
                .route("/playback/skip", post(handlers::skip))
                .route("/playback/pause", post(handlers::pause))
                .route("/playback/resume", post(handlers::resume))
                .route("/playback/volume", post(handlers::set_volume))
                // Admin queue management
                .route("/queue/:index", delete(handlers::remove_at))
                .route("/queue/clear", post(handlers::clear_queue))
                // Catalog browsing
                .route("/catalog", get(handlers::get_catalog))
                .route("/catalog/search", get(handlers::search_catalog))
                .route("/catalog/artists", get(handlers::get_artists))
                // SSE events
                .route("/events", get(sse::event_stream)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "jukebox-session",
        "version": env!("CARGO_PKG_VERSION"),
        "port": state.port,
        "library_dir": state.library_dir,
        "catalog_tracks": state.catalog.len(),
    }))
}
