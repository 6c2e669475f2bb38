pub mod agent;
pub mod health;
pub mod pages;

use axum::Router;

use crate::state::AppState;

/// Build the full route tree.
///
/// ```text
/// GET  /                      submission form
/// GET  /style.css             stylesheet
/// GET  /favicon.ico           site icon
/// POST /result.html           submit a target, placeholder page
/// GET  /status?jobID=         status stream (SSE)
/// GET  /digest?jobID=         persisted digest
/// GET  /report?jobID=         persisted scored report
/// GET  /scores                comparison of every scored report
/// GET  /scores/index.html     same
/// GET  /health                liveness and queue counts
///
/// GET  /api/job?agent=        pull the oldest waiting job
/// GET  /api/granular?jobID=   relay granular progress
/// POST /api/report            submit a report
/// ```
pub fn app_routes(report_body_limit: usize) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(pages::router())
        .merge(agent::router(report_body_limit))
}
