//! HTTP handlers for the request/response channel.
//!
//! Each handler decodes its parameters, calls the [`SyncService`] and maps
//! the result onto a JSON body. Decode failures become
//! [`ApiError::BadRequest`] rather than Axum's plain-text rejections, so
//! every error a client sees is an [`ErrorBody`](gridsync_types::ErrorBody).
//!
//! [`SyncService`]: crate::sync::SyncService

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use gridsync_types::{
    AckBody, CellsBody, ChunkParams, PositionParams, RadiusParams, SetCellParams,
};
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /api/getChunk
// ---------------------------------------------------------------------------

/// Read a rectangular chunk.
///
/// # Query Parameters
///
/// - `x`, `y`: top-left corner
/// - `width`, `height`: extra columns and rows, inclusive
pub async fn get_chunk(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ChunkParams>, QueryRejection>,
) -> Result<Json<CellsBody>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let cells = state
        .sync
        .get_chunk(&params, state.sync.republish_reads())
        .await?;
    debug!(cells = cells.len(), "getChunk served");
    Ok(Json(CellsBody { cells }))
}

// ---------------------------------------------------------------------------
// GET /api/getChunkByRadius
// ---------------------------------------------------------------------------

/// Read the square of side `2 * radius + 1` centered on `(x, y)`.
pub async fn get_chunk_by_radius(
    State(state): State<Arc<AppState>>,
    params: Result<Query<RadiusParams>, QueryRejection>,
) -> Result<Json<CellsBody>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let cells = state
        .sync
        .get_chunk_by_radius(&params, state.sync.republish_reads())
        .await?;
    debug!(cells = cells.len(), "getChunkByRadius served");
    Ok(Json(CellsBody { cells }))
}

// ---------------------------------------------------------------------------
// POST /api/setCell
// ---------------------------------------------------------------------------

/// Upsert one cell.
pub async fn set_cell(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SetCellParams>, JsonRejection>,
) -> Result<Json<AckBody>, ApiError> {
    let Json(params) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    state.sync.set_cell(&params).await?;
    Ok(Json(AckBody { ok: true }))
}

// ---------------------------------------------------------------------------
// POST /api/removeCell
// ---------------------------------------------------------------------------

/// Delete one cell. Deleting an empty position succeeds.
pub async fn remove_cell(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PositionParams>, JsonRejection>,
) -> Result<Json<AckBody>, ApiError> {
    let Json(params) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    state.sync.remove_cell(&params).await?;
    Ok(Json(AckBody { ok: true }))
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

/// Liveness report.
#[derive(Debug, Clone, Serialize)]
pub struct HealthBody {
    /// Always `"ok"`.
    pub status: &'static str,
    /// Live subscriptions on the mutation bus.
    pub subscribers: usize,
    /// Process start time.
    pub started_at: DateTime<Utc>,
    /// Seconds since start.
    pub uptime_secs: i64,
}

/// Report liveness and the number of live subscribers.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        subscribers: state.sync.bus().subscriber_count(),
        started_at: state.started_at,
        uptime_secs: state.uptime_secs(),
    })
}
