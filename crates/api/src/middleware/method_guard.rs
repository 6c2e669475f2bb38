use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Answer any method other than GET and POST with an empty 405.
pub async fn reject_unsupported_methods(request: Request, next: Next) -> Response {
    let method = request.method();
    if method == Method::GET || method == Method::POST {
        return next.run(request).await;
    }
    tracing::warn!(method = %method, path = %request.uri().path(), "Unsupported request method");
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}
