use std::time::Duration;

use axum::http::{HeaderName, StatusCode, Uri};
use axum::middleware::from_fn;
use axum::Router;
use testu_core::error::CoreError;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::error::PageError;
use crate::middleware::method_guard::reject_unsupported_methods;
use crate::middleware::trailing_slash::redirect_trailing_slash;
use crate::routes;
use crate::state::AppState;

/// Build the application router with its full middleware stack.
///
/// Shared by `main.rs` and the integration tests so both exercise the
/// same layers.
pub fn build_app(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    routes::app_routes(state.config.report_body_limit)
        .fallback(not_found)
        // -- Middleware stack (applied bottom-up) --
        // Redirect `/path/` to `/path`.
        .layer(from_fn(redirect_trailing_slash))
        // Only GET and POST are served.
        .layer(from_fn(reject_unsupported_methods))
        // Panic recovery: catch panics and return 500.
        .layer(CatchPanicLayer::new())
        // Time to response headers; status streams are not cut off.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}

async fn not_found(uri: Uri) -> PageError {
    CoreError::NotFound {
        entity: "Page",
        id: uri.path().to_string(),
    }
    .into()
}
