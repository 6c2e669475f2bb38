//! Agent pull protocol.
//!
//! Agents poll `GET /api/job`; nothing is pushed to them. An authorized
//! pull moves the oldest waiting job to `assigned` and tells the job's
//! requester which agent took it.

use std::sync::Arc;

use testu_core::error::CoreError;
use testu_core::job::Job;
use testu_core::milestone::Milestone;

use crate::engine::roster::AgentRoster;
use crate::engine::store::JobStore;
use crate::stream::StreamRegistry;

/// Hands waiting jobs to authorized agents.
pub struct JobDispatcher {
    store: Arc<JobStore>,
    streams: Arc<StreamRegistry>,
    roster: Arc<AgentRoster>,
}

impl JobDispatcher {
    pub fn new(
        store: Arc<JobStore>,
        streams: Arc<StreamRegistry>,
        roster: Arc<AgentRoster>,
    ) -> Self {
        Self {
            store,
            streams,
            roster,
        }
    }

    /// Serve one pull.
    ///
    /// Unauthorized agents get `Unauthorized` and the store is not
    /// touched. `Ok(None)` means nothing is waiting.
    pub async fn pull(&self, agent: Option<&str>) -> Result<Option<Job>, CoreError> {
        let agent = self.roster.authorize(agent).inspect_err(|e| {
            tracing::warn!(agent = agent.unwrap_or(""), error = %e, "Job pull refused");
        })?;

        let Some(job) = self.store.take_oldest(agent).await else {
            tracing::trace!(agent, "No job available");
            return Ok(None);
        };

        tracing::info!(job_id = %job.id, agent, "Job assigned");
        self.streams
            .notify(
                &job.id,
                &Milestone::Assigned {
                    agent: agent.to_string(),
                },
            )
            .await;
        Ok(Some(job))
    }
}
