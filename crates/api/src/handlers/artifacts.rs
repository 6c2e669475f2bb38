//! Persisted digests and scored reports.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use testu_core::error::CoreError;

use crate::error::{PageError, PageResult};
use crate::query::JobIdQuery;
use crate::state::AppState;

/// GET /digest?jobID=
pub async fn digest(
    State(state): State<AppState>,
    Query(query): Query<JobIdQuery>,
) -> PageResult<Html<String>> {
    let job_id = query.require()?;
    match state.pipeline.archive().read_digest(&job_id).await? {
        Some(html) => Ok(Html(html)),
        None => Err(not_found("Digest", job_id)),
    }
}

/// GET /report?jobID=
pub async fn report(
    State(state): State<AppState>,
    Query(query): Query<JobIdQuery>,
) -> PageResult<Response> {
    let job_id = query.require()?;
    match state.pipeline.archive().read_report(&job_id).await? {
        Some(json) => Ok(([(header::CONTENT_TYPE, "application/json")], json).into_response()),
        None => Err(not_found("Report", job_id)),
    }
}

fn not_found(entity: &'static str, id: String) -> PageError {
    CoreError::NotFound { entity, id }.into()
}
