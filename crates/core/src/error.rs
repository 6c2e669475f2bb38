#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure raised by a pluggable report collaborator (scorer, digester or
/// comparer).
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The report does not have the shape the collaborator needs.
    #[error("Report is not usable: {0}")]
    InvalidReport(String),

    /// The collaborator itself failed.
    #[error("{0}")]
    Failed(String),
}
