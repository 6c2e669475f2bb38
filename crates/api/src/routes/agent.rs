use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{agent, report};
use crate::state::AppState;

/// Testing-agent routes under `/api`.
///
/// `report_body_limit` caps the size of posted reports.
pub fn router(report_body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/api/job", get(agent::pull))
        .route("/api/granular", get(agent::granular))
        .route(
            "/api/report",
            post(report::submit).layer(DefaultBodyLimit::max(report_body_limit)),
        )
}
