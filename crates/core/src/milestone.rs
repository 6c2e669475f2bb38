//! Status messages relayed to a requester's status stream.

use std::fmt;

/// A discrete pipeline transition for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Milestone {
    /// The job was created; results will follow.
    Received { job_id: String },
    /// An agent pulled the job.
    Assigned { agent: String },
    /// The agent's report passed validation.
    ReportReceived { agent: String },
    /// The report was scored and its JSON persisted.
    Scored,
    /// The digest was persisted and can be viewed at `url`.
    Digested { url: String },
    /// The job will not complete.
    Failed { stage: String, reason: String },
}

impl Milestone {
    /// Short machine-readable name of the milestone.
    pub fn kind(&self) -> &'static str {
        match self {
            Milestone::Received { .. } => "received",
            Milestone::Assigned { .. } => "assigned",
            Milestone::ReportReceived { .. } => "report_received",
            Milestone::Scored => "scored",
            Milestone::Digested { .. } => "digested",
            Milestone::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Milestone::Received { job_id } => {
                write!(f, "Job {job_id} received. Wait for results.")
            }
            Milestone::Assigned { agent } => write!(f, "Job assigned to testing agent {agent}."),
            Milestone::ReportReceived { agent } => {
                write!(f, "Report received from testing agent {agent}.")
            }
            Milestone::Scored => write!(f, "Report scored."),
            Milestone::Digested { url } => write!(f, "Report digested. Digest: {url}"),
            Milestone::Failed { stage, reason } => {
                write!(f, "Job failed during {stage}: {}", single_line(reason))
            }
        }
    }
}

/// Collapse line breaks so the text fits one event line.
pub fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
