//! Job model and identifier generation.
//!
//! A [`Job`] is what an agent receives from `GET /api/job`. Its wire form
//! uses the agent protocol's camelCase names (`timeLimit`, `creationTime`,
//! `timeStamp`, ...).

use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// `chrono` format of the compact stamp that prefixes every job identifier.
pub const STAMP_FORMAT: &str = "%y%m%dT%H%M%S";

/// Maximum length of an externally supplied job identifier.
const MAX_ID_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// The page under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Human-readable label.
    pub what: String,
    /// URL of the page.
    pub which: String,
}

/// Which rule results an agent should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StandardPolicy {
    /// Native tool results plus standardized results.
    Also,
    /// Standardized results only.
    Only,
    /// Native tool results only.
    No,
}

/// Where a job came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSources {
    /// Identifier of the script the acts were taken from.
    pub script: String,
    /// Identifier of the batch the target belongs to.
    pub batch: String,
    pub target: Target,
    /// Address to notify, if any.
    pub requester: String,
    /// Whether this is the last job of its batch.
    pub last_target: bool,
}

/// A unit of testing work handed to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub what: String,
    /// Treat redirections as failures.
    pub strict: bool,
    /// Run each test act in a fresh browser context.
    pub isolate: bool,
    pub standard: StandardPolicy,
    /// Report granular progress to `/api/granular`.
    pub observe: bool,
    /// Seconds the agent may spend on the whole job.
    pub time_limit: u64,
    /// Ordered act list, opaque to the server.
    pub acts: Vec<serde_json::Value>,
    pub sources: JobSources,
    pub creation_time: Timestamp,
    /// Compact stamp shared with the identifier prefix.
    pub time_stamp: String,
}

/// Fixed job configuration applied when a job is built from a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobPolicy {
    pub isolate: bool,
    pub standard: StandardPolicy,
    pub observe: bool,
}

impl JobPolicy {
    /// Policy for jobs created from the web submission form: isolated tests,
    /// standardized-only reporting, granular progress enabled.
    pub const fn intake() -> Self {
        Self {
            isolate: true,
            standard: StandardPolicy::Only,
            observe: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Generates job identifiers whose lexicographic order is creation order.
///
/// Identifiers look like `261018T143005-00000042`: a UTC stamp that never
/// moves backwards within the process, then a process-wide sequence
/// number. Stamp and sequence are taken under one lock so concurrent
/// callers cannot interleave them out of order.
#[derive(Debug, Default)]
pub struct JobIdGenerator {
    state: Mutex<GeneratorState>,
}

#[derive(Debug, Default)]
struct GeneratorState {
    last_stamp: String,
    seq: u64,
}

impl JobIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next identifier, stamped with the current time.
    pub fn next(&self) -> JobId {
        self.next_at(Utc::now())
    }

    /// Next identifier, stamped with `now` unless an earlier call used a
    /// later stamp.
    pub fn next_at(&self, now: Timestamp) -> JobId {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let stamp = now.format(STAMP_FORMAT).to_string();
        if stamp > state.last_stamp {
            state.last_stamp = stamp;
        }
        state.seq += 1;
        format!("{}-{:08}", state.last_stamp, state.seq)
    }
}

/// The stamp part of an identifier produced by [`JobIdGenerator`].
pub fn stamp_of(id: &str) -> &str {
    id.split_once('-').map_or(id, |(stamp, _)| stamp)
}

/// Whether `id` is usable as a job identifier arriving from outside.
///
/// Identifiers name files in the report directory, so only ASCII
/// alphanumerics, hyphen and underscore are accepted.
pub fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 10, 18, h, m, s).unwrap()
    }

    #[test]
    fn identifiers_sort_in_creation_order() {
        let ids = JobIdGenerator::new();
        let a = ids.next_at(at(9, 0, 0));
        let b = ids.next_at(at(9, 0, 0));
        let c = ids.next_at(at(9, 0, 1));

        assert_eq!(a, "261018T090000-00000001");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn clock_stepping_back_keeps_order() {
        let ids = JobIdGenerator::new();
        let later = ids.next_at(at(12, 0, 0));
        let earlier_clock = ids.next_at(at(11, 59, 0));

        assert!(later < earlier_clock);
        assert_eq!(stamp_of(&earlier_clock), "261018T120000");
    }

    #[test]
    fn stamp_of_without_separator_is_whole_id() {
        assert_eq!(stamp_of("J1"), "J1");
    }

    #[test]
    fn safe_ids() {
        assert!(is_safe_id("261018T090000-00000001"));
        assert!(is_safe_id("J1"));
        assert!(!is_safe_id(""));
        assert!(!is_safe_id("../etc/passwd"));
        assert!(!is_safe_id("a b"));
        assert!(!is_safe_id(&"x".repeat(MAX_ID_LEN + 1)));
    }

    #[test]
    fn job_serializes_with_agent_field_names() {
        let job = Job {
            id: "J1".into(),
            what: "Example".into(),
            strict: true,
            isolate: true,
            standard: StandardPolicy::Only,
            observe: true,
            time_limit: 60,
            acts: vec![],
            sources: JobSources {
                script: "default".into(),
                batch: "b".into(),
                target: Target {
                    what: "Example".into(),
                    which: "https://example.org".into(),
                },
                requester: String::new(),
                last_target: true,
            },
            creation_time: at(9, 0, 0),
            time_stamp: "261018T090000".into(),
        };

        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["timeLimit"], 60);
        assert_eq!(json["standard"], "only");
        assert_eq!(json["sources"]["lastTarget"], true);
        assert_eq!(json["sources"]["target"]["which"], "https://example.org");
        assert!(json["creationTime"].is_string());
    }
}
