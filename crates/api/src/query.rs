//! Shared query parameter types for handlers.

use serde::Deserialize;
use testu_core::job::is_safe_id;

use crate::error::AppError;

/// `?jobID=` on the artifact, granular and status routes.
#[derive(Debug, Deserialize)]
pub struct JobIdQuery {
    #[serde(rename = "jobID")]
    pub job_id: Option<String>,
}

impl JobIdQuery {
    /// The job identifier, or `BadRequest` when it is missing or could not
    /// have been issued by this server.
    pub fn require(self) -> Result<String, AppError> {
        match self.job_id {
            None => Err(AppError::BadRequest("jobID is required".into())),
            Some(id) if id.trim().is_empty() => Err(AppError::BadRequest("jobID is required".into())),
            Some(id) if !is_safe_id(&id) => Err(AppError::BadRequest(format!("jobID {id:?} is invalid"))),
            Some(id) => Ok(id),
        }
    }
}

/// `?agent=` on `GET /api/job`.
#[derive(Debug, Deserialize)]
pub struct AgentQuery {
    pub agent: Option<String>,
}
