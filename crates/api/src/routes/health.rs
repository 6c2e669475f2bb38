use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Jobs waiting for an agent.
    pub todo: usize,
    /// Jobs handed to an agent and not yet completed.
    pub assigned: usize,
    /// Status streams reserved or attached.
    pub streams: usize,
}

/// GET /health -- returns service status and queue sizes.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let counts = state.store.counts().await;

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        todo: counts.todo,
        assigned: counts.assigned,
        streams: state.streams.stream_count().await,
    })
}

/// Mount health check routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
