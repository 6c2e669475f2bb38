//! Target submissions from the web form (`POST /result.html`).

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use validator::{Validate, ValidationErrors};

use crate::error::CoreError;
use crate::job::Target;

static WEB_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://").expect("URL scheme pattern is valid"));

/// The submitted form fields. Absent fields decode as empty strings so
/// they fail validation rather than extraction.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TargetSubmission {
    #[serde(rename = "pageURL", default)]
    #[validate(
        length(min = 1, message = "pageURL is required"),
        regex(path = *WEB_URL, message = "pageURL must begin with the URL scheme http:// or https://")
    )]
    pub page_url: String,

    #[serde(rename = "pageWhat", default)]
    #[validate(length(min = 1, message = "pageWhat is required"))]
    pub page_what: String,
}

impl TargetSubmission {
    /// Trim, validate and convert into a [`Target`].
    pub fn into_target(self) -> Result<Target, CoreError> {
        let trimmed = Self {
            page_url: self.page_url.trim().to_string(),
            page_what: self.page_what.trim().to_string(),
        };
        trimmed.validate().map_err(describe)?;
        Ok(Target {
            what: trimmed.page_what,
            which: trimmed.page_url,
        })
    }
}

fn describe(errors: ValidationErrors) -> CoreError {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect();
    messages.sort();
    messages.dedup();
    CoreError::Validation(messages.join("; "))
}
