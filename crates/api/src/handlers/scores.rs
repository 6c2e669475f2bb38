//! Comparison of every persisted scored report.

use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};

use crate::error::{AppError, PageResult};
use crate::state::AppState;

/// GET /scores, GET /scores/index.html
pub async fn compare(State(state): State<AppState>) -> PageResult<Response> {
    let reports = state.pipeline.archive().scored_reports().await?;
    let html = state.comparer.compare(&reports).map_err(AppError::from)?;
    tracing::debug!(reports = reports.len(), "Score comparison served");

    Ok(([(header::CONTENT_LOCATION, "/scores/result")], Html(html)).into_response())
}
