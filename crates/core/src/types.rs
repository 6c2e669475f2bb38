/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Job identifiers are opaque strings whose lexicographic order is their
/// creation order (see [`crate::job::JobIdGenerator`]).
pub type JobId = String;
