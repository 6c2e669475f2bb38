//! Report submission from agents.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;

use crate::engine::ingest::Ack;
use crate::error::AppResult;
use crate::state::AppState;

/// POST /api/report
///
/// Receive, validate and acknowledge synchronously; scoring, digesting and
/// persistence continue on a tracked background task whose progress
/// reaches the requester through the status stream.
pub async fn submit(State(state): State<AppState>, body: Bytes) -> AppResult<Json<Ack>> {
    let report = state.pipeline.receive(&body)?;
    let ack = state.pipeline.accept(&report).await?;

    let pipeline = state.pipeline.clone();
    state.tasks.spawn(async move {
        // Failures are logged and announced on the stream by `finish`.
        let _ = pipeline.finish(report).await;
    });

    Ok(Json(ack))
}
