//! Agent reports and their validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::job::is_safe_id;

/// Top-level fields every report must carry.
pub const REQUIRED_FIELDS: [&str; 9] = [
    "id",
    "what",
    "strict",
    "timeLimit",
    "acts",
    "sources",
    "creationTime",
    "timeStamp",
    "jobData",
];

/// `sources` of a report: the job's sources plus the producing agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSources {
    pub agent: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// A completed job as returned by an agent.
///
/// Fields the server does not interpret are kept in `extra` and written
/// back unchanged when the report is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub what: String,
    pub strict: bool,
    pub time_limit: u64,
    pub acts: Vec<Value>,
    pub sources: ReportSources,
    pub creation_time: Value,
    pub time_stamp: String,
    pub job_data: Value,
    /// Set by the scorer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Report {
    /// The tested page's URL, when the report's sources name one.
    pub fn target_url(&self) -> Option<&str> {
        self.sources
            .rest
            .get("target")
            .and_then(|t| t.get("which"))
            .and_then(Value::as_str)
    }

    /// The tested page's label, falling back to the report's own `what`.
    pub fn target_label(&self) -> &str {
        self.sources
            .rest
            .get("target")
            .and_then(|t| t.get("what"))
            .and_then(Value::as_str)
            .unwrap_or(&self.what)
    }
}

/// Required fields absent from a parsed report body, in canonical order.
///
/// A body that is not a JSON object lacks every field.
pub fn missing_fields(body: &Value) -> Vec<&'static str> {
    let Some(object) = body.as_object() else {
        return REQUIRED_FIELDS.to_vec();
    };
    let mut missing: Vec<&'static str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !object.contains_key(*field))
        .collect();
    if object.contains_key("sources")
        && object
            .get("sources")
            .and_then(|s| s.get("agent"))
            .is_none()
    {
        missing.push("sources.agent");
    }
    missing
}

/// Decode a parsed body into a [`Report`], rejecting absent fields, wrong
/// types and identifiers that are not safe file names.
pub fn validate_report(body: Value) -> Result<Report, CoreError> {
    let missing = missing_fields(&body);
    if !missing.is_empty() {
        return Err(CoreError::Validation(format!(
            "Report is missing required fields: {}",
            missing.join(", ")
        )));
    }
    let report: Report = serde_json::from_value(body)
        .map_err(|e| CoreError::Validation(format!("Report has an invalid field: {e}")))?;
    if !is_safe_id(&report.id) {
        return Err(CoreError::Validation(format!(
            "Report id {:?} is not a valid job identifier",
            report.id
        )));
    }
    if report.sources.agent.trim().is_empty() {
        return Err(CoreError::Validation(
            "Report sources.agent must not be empty".to_string(),
        ));
    }
    Ok(report)
}
