//! HTTP request handlers
//!
//! Thin adapters between HTTP and the controller's command channel.
//! Domain errors map onto status codes in `error_response`; handlers
//! never interpret controller state themselves.

use crate::api::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use jukebox_common::model::{PlaybackState, QueueEntry, Track};
use jukebox_common::Error;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    state: PlaybackState,
    now_playing: Option<Track>,
    balance: u32,
    queue_length: usize,
    idle: bool,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    queue: Vec<QueueEntry>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    balance: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreditsRequest {
    amount: u32,
}

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    track_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    status: String,
    entry_id: Uuid,
    track: Track,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    volume: u8, // 0-100 user-facing scale
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    status: String,
    dropped: usize,
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    status: String,
    removed: QueueEntry,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: String,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    tracks: Vec<Track>,
}

#[derive(Debug, Serialize)]
pub struct ArtistsResponse {
    artists: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a domain error onto an HTTP status
///
/// User-facing errors (declined admissions, bad indexes) are normal
/// kiosk traffic; anything else is logged as a fault.
fn error_response(e: Error) -> ApiError {
    if !e.is_user_facing() {
        error!("Request failed: {}", e);
    }
    let status = match &e {
        Error::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
        Error::InvalidAmount(_) => StatusCode::BAD_REQUEST,
        Error::EngineRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::InvalidIndex { .. } => StatusCode::NOT_FOUND,
        Error::QueueEmpty => StatusCode::CONFLICT,
        Error::ControllerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

fn ok() -> Json<AckResponse> {
    Json(AckResponse {
        status: "ok".to_string(),
    })
}

// ============================================================================
// Status and Queue
// ============================================================================

/// GET /status - Playback state, now playing, balance, idle flag
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let playback = state.shared.playback().await;
    let now_playing = playback.active_track().cloned();
    Json(StatusResponse {
        now_playing,
        balance: state.shared.balance().await,
        queue_length: state.shared.queue().await.len(),
        idle: state.shared.is_idle().await,
        state: playback,
    })
}

/// GET /queue - Ordered pending queue snapshot
pub async fn get_queue(State(state): State<AppState>) -> Result<Json<QueueResponse>, ApiError> {
    let snapshot = state
        .handle
        .queue_snapshot()
        .await
        .map_err(error_response)?;
    Ok(Json(QueueResponse {
        queue: snapshot.entries,
    }))
}

// ============================================================================
// Credits
// ============================================================================

/// GET /credits - Current balance
pub async fn get_credits(
    State(state): State<AppState>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.handle.balance().await.map_err(error_response)?;
    Ok(Json(BalanceResponse { balance }))
}

/// POST /credits - Add credits (coin acceptor, attendant top-up)
pub async fn add_credits(
    State(state): State<AppState>,
    Json(req): Json<CreditsRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state
        .handle
        .add_credits(req.amount)
        .await
        .map_err(error_response)?;
    Ok(Json(BalanceResponse { balance }))
}

/// POST /credits/balance - Admin balance override
pub async fn set_balance(
    State(state): State<AppState>,
    Json(req): Json<CreditsRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    info!("Admin balance override to {}", req.amount);
    let balance = state
        .handle
        .set_balance(req.amount)
        .await
        .map_err(error_response)?;
    Ok(Json(BalanceResponse { balance }))
}

// ============================================================================
// Playback Control
// ============================================================================

/// POST /playback/enqueue - Paid admission of a catalog track
pub async fn enqueue(
    State(state): State<AppState>,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<EnqueueResponse>, ApiError> {
    let track = state.catalog.get(&req.track_id).cloned().ok_or((
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("unknown track {}", req.track_id),
        }),
    ))?;

    let entry = state.handle.enqueue(track).await.map_err(error_response)?;
    Ok(Json(EnqueueResponse {
        status: "queued".to_string(),
        entry_id: entry.entry_id,
        track: entry.track,
    }))
}

/// POST /playback/skip - Abandon the current track and advance
pub async fn skip(State(state): State<AppState>) -> Result<Json<AckResponse>, ApiError> {
    state.handle.skip().await.map_err(error_response)?;
    Ok(ok())
}

/// POST /playback/pause
pub async fn pause(State(state): State<AppState>) -> Result<Json<AckResponse>, ApiError> {
    state.handle.pause().await.map_err(error_response)?;
    Ok(ok())
}

/// POST /playback/resume
pub async fn resume(State(state): State<AppState>) -> Result<Json<AckResponse>, ApiError> {
    state.handle.resume().await.map_err(error_response)?;
    Ok(ok())
}

/// POST /playback/volume
pub async fn set_volume(
    State(state): State<AppState>,
    Json(req): Json<VolumeRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    state
        .handle
        .set_volume(req.volume.min(100))
        .await
        .map_err(error_response)?;
    Ok(ok())
}

// ============================================================================
// Admin Queue Management
// ============================================================================

/// DELETE /queue/:index - Remove a pending entry by position; no refund
pub async fn remove_at(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<RemoveResponse>, ApiError> {
    let removed = state
        .handle
        .remove_at(index)
        .await
        .map_err(error_response)?;
    Ok(Json(RemoveResponse {
        status: "removed".to_string(),
        removed,
    }))
}

/// POST /queue/clear - Drop all pending entries; no refund
pub async fn clear_queue(
    State(state): State<AppState>,
) -> Result<Json<ClearResponse>, ApiError> {
    let dropped = state.handle.clear_queue().await.map_err(error_response)?;
    Ok(Json(ClearResponse {
        status: "cleared".to_string(),
        dropped,
    }))
}

// ============================================================================
// Catalog
// ============================================================================

/// GET /catalog - Full track listing
pub async fn get_catalog(State(state): State<AppState>) -> Json<CatalogResponse> {
    Json(CatalogResponse {
        tracks: state.catalog.all().to_vec(),
    })
}

/// GET /catalog/search?q= - Case-insensitive substring search
pub async fn search_catalog(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<CatalogResponse> {
    Json(CatalogResponse {
        tracks: state
            .catalog
            .search(&params.q)
            .into_iter()
            .cloned()
            .collect(),
    })
}

/// GET /catalog/artists - Distinct artists
pub async fn get_artists(State(state): State<AppState>) -> Json<ArtistsResponse> {
    Json(ArtistsResponse {
        artists: state
            .catalog
            .artists()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}
