use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{artifacts, intake, scores};
use crate::pages;
use crate::state::AppState;
use crate::stream;

async fn index() -> Html<&'static str> {
    Html(pages::index_page())
}

async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], pages::STYLESHEET)
}

async fn favicon() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/x-icon")], pages::FAVICON)
}

/// Requester-facing routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/style.css", get(stylesheet))
        .route("/favicon.ico", get(favicon))
        .route("/result.html", post(intake::submit))
        .route("/status", get(stream::status_handler))
        .route("/digest", get(artifacts::digest))
        .route("/report", get(artifacts::report))
        .route("/scores", get(scores::compare))
        .route("/scores/index.html", get(scores::compare))
}
