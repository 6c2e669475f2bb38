//! HTML pages served to requesters.
//!
//! Templates are compiled into the binary; `{{name}}` placeholders are
//! replaced with HTML-escaped values.

use axum::http::StatusCode;
use testu_core::digest::escape_html;
use testu_core::job::Target;

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");
const RESULT_TEMPLATE: &str = include_str!("../templates/result.html");
const ERROR_TEMPLATE: &str = include_str!("../templates/error.html");

/// Stylesheet shared by every page.
pub const STYLESHEET: &str = include_str!("../templates/style.css");

/// Site icon.
pub const FAVICON: &[u8] = include_bytes!("../templates/favicon.ico");

/// The target submission form.
pub fn index_page() -> &'static str {
    INDEX_TEMPLATE
}

/// Placeholder returned after a submission. Its script subscribes to the
/// job's status stream.
pub fn result_page(job_id: &str, target: &Target) -> String {
    fill(
        RESULT_TEMPLATE,
        &[
            ("jobID", job_id),
            ("what", target.what.as_str()),
            ("url", target.which.as_str()),
        ],
    )
}

/// Error page for browser-facing routes.
pub fn error_page(status: StatusCode, message: &str) -> String {
    let title = match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    };
    fill(
        ERROR_TEMPLATE,
        &[("status", title.as_str()), ("message", message)],
    )
}

fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |page, (name, value)| {
            page.replace(&format!("{{{{{name}}}}}"), &escape_html(value))
        })
}
