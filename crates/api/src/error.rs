use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde_json::json;
use testu_core::error::{CollaboratorError, CoreError};

use crate::engine::ingest::IngestError;
use crate::pages;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `testu_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A report rejected or abandoned by the ingestion pipeline.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Reading or writing persisted artifacts failed.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The comparer could not rank the persisted reports.
    #[error("Score comparison failed: {0}")]
    Comparison(#[from] CollaboratorError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// HTTP status, machine-readable code and client-safe message.
    ///
    /// Internal causes are logged here and replaced by a generic message.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Core(core) => core_parts(core),

            AppError::Ingest(ingest) => match ingest {
                IngestError::Malformed(msg) => (
                    StatusCode::BAD_REQUEST,
                    "MALFORMED_REPORT",
                    format!("Report is not valid JSON: {msg}"),
                ),
                IngestError::Rejected(core) => core_parts(core),
                IngestError::Duplicate(_) => {
                    (StatusCode::CONFLICT, "CONFLICT", ingest.to_string())
                }
                IngestError::Collaborator { .. } | IngestError::Storage { .. } => {
                    tracing::error!(error = %ingest, stage = %ingest.stage(), "Report pipeline error");
                    internal()
                }
            },

            AppError::Storage(err) => {
                tracing::error!(error = %err, "Storage error");
                internal()
            }

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),

            AppError::Comparison(err) => {
                tracing::error!(error = %err, "Score comparison failed");
                internal()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn core_parts(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// [`AppError`] rendered as an HTML error page, for routes a browser
/// navigates to.
#[derive(Debug)]
pub struct PageError(pub AppError);

/// Result type for HTML page handlers.
pub type PageResult<T> = Result<T, PageError>;

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        PageError(err)
    }
}

impl From<CoreError> for PageError {
    fn from(err: CoreError) -> Self {
        PageError(err.into())
    }
}

impl From<std::io::Error> for PageError {
    fn from(err: std::io::Error) -> Self {
        PageError(err.into())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, _, message) = self.0.parts();
        (status, Html(pages::error_page(status, &message))).into_response()
    }
}
