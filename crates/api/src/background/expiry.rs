//! Periodic expiry of abandoned work.
//!
//! A job whose agent never posts a report would otherwise stay in
//! `assigned` forever, and a status stream nobody closes would hold its
//! channel. Both are dropped once older than `ASSIGNED_TTL_SECS`; the
//! requester of an expired job is told before its stream closes. Streams
//! of jobs still waiting for an agent are kept however old they are.

use std::time::Duration;

use chrono::Utc;
use testu_core::milestone::Milestone;
use testu_core::types::Timestamp;
use tokio_util::sync::CancellationToken;

use crate::engine::ingest::Stage;
use crate::state::AppState;

/// What one sweep removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub expired_jobs: usize,
    pub expired_streams: usize,
}

/// Run the expiry loop until `cancel` is triggered.
pub async fn run(state: AppState, cancel: CancellationToken) {
    let ttl = i64::try_from(state.config.assigned_ttl_secs)
        .ok()
        .and_then(chrono::TimeDelta::try_seconds)
        .unwrap_or(chrono::TimeDelta::MAX);
    let period = Duration::from_secs(state.config.sweep_interval_secs.max(1));

    tracing::info!(
        ttl_secs = state.config.assigned_ttl_secs,
        interval_secs = period.as_secs(),
        "Expiry sweep started"
    );

    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Expiry sweep stopping");
                break;
            }
            _ = interval.tick() => {
                let cutoff = Utc::now()
                    .checked_sub_signed(ttl)
                    .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
                let stats = sweep(&state, cutoff).await;
                if stats == SweepStats::default() {
                    tracing::debug!("Expiry sweep: nothing to remove");
                } else {
                    tracing::info!(
                        expired_jobs = stats.expired_jobs,
                        expired_streams = stats.expired_streams,
                        "Expiry sweep: removed stale state"
                    );
                }
            }
        }
    }
}

/// Remove assigned jobs older than `cutoff`, and status streams older
/// than `cutoff` whose job is gone.
pub async fn sweep(state: &AppState, cutoff: Timestamp) -> SweepStats {
    let expired = state.store.expire_assigned(cutoff).await;
    for assignment in &expired {
        let job_id = assignment.job.id.as_str();
        tracing::warn!(job_id, agent = %assignment.agent, "Assigned job expired without a report");
        state
            .streams
            .notify(
                job_id,
                &Milestone::Failed {
                    stage: Stage::Complete.to_string(),
                    reason: "expired".into(),
                },
            )
            .await;
        state.streams.close(job_id).await;
    }

    let live = state.store.live_ids().await;
    SweepStats {
        expired_jobs: expired.len(),
        expired_streams: state
            .streams
            .expire(cutoff, |job_id| live.contains(job_id))
            .await,
    }
}
