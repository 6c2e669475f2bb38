//! Agent-facing routes: job pulls and granular progress.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use crate::error::AppResult;
use crate::query::{AgentQuery, JobIdQuery};
use crate::state::AppState;

/// GET /api/job?agent=
///
/// The oldest waiting job as JSON, or `{}` when nothing is waiting.
/// Unknown or missing agents get 401 and never a job.
pub async fn pull(
    State(state): State<AppState>,
    Query(query): Query<AgentQuery>,
) -> AppResult<Response> {
    let job = state.dispatcher.pull(query.agent.as_deref()).await?;
    Ok(match job {
        Some(job) => Json(job).into_response(),
        None => Json(json!({})).into_response(),
    })
}

/// GET /api/granular?jobID=&...
///
/// Relay the remaining query parameters to the job's status stream as a
/// single-line JSON object. Always 200 once `jobID` is valid; events for
/// jobs without a stream are dropped.
pub async fn granular(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<StatusCode> {
    let mut job_id = None;
    let mut fields = Map::new();
    for (key, value) in pairs {
        if key == "jobID" {
            job_id = Some(value);
        } else {
            fields.insert(key, Value::String(value));
        }
    }
    let job_id = JobIdQuery { job_id }.require()?;

    let line = Value::Object(fields).to_string();
    let delivered = state.streams.relay(&job_id, &line).await;
    tracing::debug!(job_id = %job_id, delivered, "Granular progress relayed");
    Ok(StatusCode::OK)
}
