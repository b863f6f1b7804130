//! Axum router construction for both channels.
//!
//! The request/response channel and the streaming channel are served from
//! separate listeners, so each gets its own [`Router`] over the same
//! [`AppState`].

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the request/response router.
///
/// - `GET /api/getChunk` -- rectangular read
/// - `GET /api/getChunkByRadius` -- square read around a center
/// - `POST /api/setCell` -- upsert one cell
/// - `POST /api/removeCell` -- delete one cell
/// - `GET /api/health` -- liveness and subscriber count
///
/// CORS allows any origin so browser viewers on another port can call it.
pub fn build_http_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/getChunk", get(handlers::get_chunk))
        .route("/api/getChunkByRadius", get(handlers::get_chunk_by_radius))
        .route("/api/setCell", post(handlers::set_cell))
        .route("/api/removeCell", post(handlers::remove_cell))
        .route("/api/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the streaming router: `GET /ws` upgrades to a `WebSocket`.
pub fn build_stream_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
