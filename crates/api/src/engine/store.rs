//! In-memory job store.
//!
//! Holds jobs awaiting an agent (`todo`) and jobs already handed out
//! (`assigned`). A job identifier lives in at most one of the two maps.
//! Every operation runs inside a single lock acquisition with no await
//! point between reading and mutating, so concurrent pulls can never
//! receive the same job.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use serde::Serialize;
use testu_core::error::CoreError;
use testu_core::job::Job;
use testu_core::types::{JobId, Timestamp};
use tokio::sync::Mutex;

/// A job handed to an agent.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub job: Job,
    pub agent: String,
    pub assigned_at: Timestamp,
}

/// Queue depth, as reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub todo: usize,
    pub assigned: usize,
}

#[derive(Default)]
struct StoreInner {
    /// Ordered by identifier, which is creation order.
    todo: BTreeMap<JobId, Job>,
    assigned: HashMap<JobId, Assignment>,
}

/// Jobs awaiting assignment and jobs already assigned. No persistence.
#[derive(Default)]
pub struct JobStore {
    inner: Mutex<StoreInner>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job to `todo`.
    ///
    /// Fails with `Conflict` when the identifier is already known, which
    /// means the identifier generator was bypassed.
    pub async fn enqueue(&self, job: Job) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().await;
        if inner.todo.contains_key(&job.id) || inner.assigned.contains_key(&job.id) {
            tracing::error!(job_id = %job.id, "Duplicate job identifier rejected");
            return Err(CoreError::Conflict(format!(
                "Job {} is already queued or assigned",
                job.id
            )));
        }
        tracing::debug!(job_id = %job.id, "Job enqueued");
        inner.todo.insert(job.id.clone(), job);
        Ok(())
    }

    /// Move the job with the smallest identifier from `todo` to `assigned`
    /// and return it, or `None` when nothing is waiting.
    pub async fn take_oldest(&self, agent: &str) -> Option<Job> {
        let mut inner = self.inner.lock().await;
        let (id, job) = inner.todo.pop_first()?;
        inner.assigned.insert(
            id,
            Assignment {
                job: job.clone(),
                agent: agent.to_string(),
                assigned_at: Utc::now(),
            },
        );
        Some(job)
    }

    /// Forget an assigned job whose pipeline has finished or failed.
    pub async fn complete(&self, job_id: &str) -> Option<Assignment> {
        self.inner.lock().await.assigned.remove(job_id)
    }

    /// Remove and return assignments made before `cutoff`.
    pub async fn expire_assigned(&self, cutoff: Timestamp) -> Vec<Assignment> {
        let mut inner = self.inner.lock().await;
        let expired: Vec<JobId> = inner
            .assigned
            .iter()
            .filter(|(_, a)| a.assigned_at < cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        expired
            .iter()
            .filter_map(|id| inner.assigned.remove(id))
            .collect()
    }

    /// Whether the job is waiting or assigned.
    pub async fn contains(&self, job_id: &str) -> bool {
        let inner = self.inner.lock().await;
        inner.todo.contains_key(job_id) || inner.assigned.contains_key(job_id)
    }

    /// Identifiers of every waiting or assigned job.
    pub async fn live_ids(&self) -> HashSet<JobId> {
        let inner = self.inner.lock().await;
        inner
            .todo
            .keys()
            .chain(inner.assigned.keys())
            .cloned()
            .collect()
    }

    pub async fn is_pending(&self, job_id: &str) -> bool {
        self.inner.lock().await.todo.contains_key(job_id)
    }

    pub async fn is_assigned(&self, job_id: &str) -> bool {
        self.inner.lock().await.assigned.contains_key(job_id)
    }

    /// Agent holding an assigned job.
    pub async fn assignee(&self, job_id: &str) -> Option<String> {
        self.inner
            .lock()
            .await
            .assigned
            .get(job_id)
            .map(|a| a.agent.clone())
    }

    pub async fn counts(&self) -> StoreCounts {
        let inner = self.inner.lock().await;
        StoreCounts {
            todo: inner.todo.len(),
            assigned: inner.assigned.len(),
        }
    }

    #[cfg(test)]
    async fn backdate(&self, job_id: &str, at: Timestamp) {
        if let Some(a) = self.inner.lock().await.assigned.get_mut(job_id) {
            a.assigned_at = at;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use testu_core::job::{JobSources, StandardPolicy, Target};

    use super::*;

    fn job(id: &str) -> Job {
        Job {
            id: id.to_string(),
            what: "test".into(),
            strict: true,
            isolate: true,
            standard: StandardPolicy::Only,
            observe: true,
            time_limit: 60,
            acts: vec![],
            sources: JobSources {
                script: "default".into(),
                batch: "web".into(),
                target: Target {
                    what: "Example".into(),
                    which: "https://example.org".into(),
                },
                requester: String::new(),
                last_target: true,
            },
            creation_time: Utc::now(),
            time_stamp: "s".into(),
        }
    }

    #[tokio::test]
    async fn take_oldest_returns_smallest_identifier() {
        let store = JobStore::new();
        for id in ["J3", "J1", "J4", "J2"] {
            store.enqueue(job(id)).await.unwrap();
        }

        for expected in ["J1", "J2", "J3", "J4"] {
            let taken = store.take_oldest("agent-a").await.unwrap();
            assert_eq!(taken.id, expected);
            assert!(!store.is_pending(expected).await);
            assert!(store.is_assigned(expected).await);
        }
        assert!(store.take_oldest("agent-a").await.is_none());
        assert_eq!(
            store.counts().await,
            StoreCounts {
                todo: 0,
                assigned: 4
            }
        );
    }

    #[tokio::test]
    async fn identifiers_are_never_in_both_maps() {
        let store = JobStore::new();
        let ids = ["A", "B", "C"];
        for id in ids {
            store.enqueue(job(id)).await.unwrap();
        }
        store.take_oldest("agent-a").await.unwrap();

        for id in ids {
            let pending = store.is_pending(id).await;
            let assigned = store.is_assigned(id).await;
            assert!(pending ^ assigned, "{id} must be in exactly one map");
        }
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_rejected() {
        let store = JobStore::new();
        store.enqueue(job("J1")).await.unwrap();
        assert_matches!(store.enqueue(job("J1")).await, Err(CoreError::Conflict(_)));

        store.take_oldest("agent-a").await.unwrap();
        assert_matches!(store.enqueue(job("J1")).await, Err(CoreError::Conflict(_)));
        assert_eq!(store.counts().await.todo, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_pulls_never_share_a_job() {
        let store = Arc::new(JobStore::new());
        store.enqueue(job("J1")).await.unwrap();

        let a = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.take_oldest("agent-a").await }
        });
        let b = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.take_oldest("agent-b").await }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        assert!(a.is_some() ^ b.is_some());
        assert_eq!(store.counts().await.assigned, 1);
    }

    #[tokio::test]
    async fn complete_removes_assignment() {
        let store = JobStore::new();
        store.enqueue(job("J1")).await.unwrap();
        store.take_oldest("agent-a").await.unwrap();

        assert_eq!(store.assignee("J1").await.as_deref(), Some("agent-a"));
        let done = store.complete("J1").await.unwrap();
        assert_eq!(done.agent, "agent-a");
        assert!(!store.contains("J1").await);
        assert!(store.complete("J1").await.is_none());
    }

    #[tokio::test]
    async fn expire_assigned_drops_only_old_assignments() {
        let store = JobStore::new();
        store.enqueue(job("J1")).await.unwrap();
        store.enqueue(job("J2")).await.unwrap();
        store.take_oldest("agent-a").await.unwrap();
        store.take_oldest("agent-a").await.unwrap();

        let long_ago = Utc::now() - chrono::Duration::hours(48);
        store.backdate("J1", long_ago).await;

        let expired = store
            .expire_assigned(Utc::now() - chrono::Duration::hours(24))
            .await;
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].job.id, "J1");
        assert!(store.is_assigned("J2").await);
    }
}
