//! Report ingestion pipeline.
//!
//! A posted report moves through [`Stage`]s strictly in order:
//! receive → validate → acknowledge → score → persist JSON → digest →
//! persist digest → complete. The first three run while the agent waits
//! ([`ReportPipeline::receive`], [`ReportPipeline::accept`]); the rest run
//! in [`ReportPipeline::finish`], normally on a spawned task.
//!
//! Failure policy after acknowledgement: a scoring failure persists
//! nothing; a digest failure keeps the scored JSON, which is complete on
//! its own. Either way the requester's stream gets a `Failed` milestone
//! and is closed, and the job leaves `assigned`. A collaborator that panics
//! counts as a failure of the stage it was running. The server never
//! retries.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use testu_core::digest::Digester;
use testu_core::error::{CollaboratorError, CoreError};
use testu_core::milestone::Milestone;
use testu_core::report::{validate_report, Report};
use testu_core::scoring::Scorer;

use crate::engine::archive::ReportArchive;
use crate::engine::roster::AgentRoster;
use crate::engine::store::JobStore;
use crate::stream::StreamRegistry;

// ---------------------------------------------------------------------------
// Stages and errors
// ---------------------------------------------------------------------------

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Receive,
    Validate,
    Acknowledge,
    Score,
    PersistJson,
    Digest,
    PersistDigest,
    Complete,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Receive => "receive",
            Stage::Validate => "validate",
            Stage::Acknowledge => "acknowledge",
            Stage::Score => "score",
            Stage::PersistJson => "persist_json",
            Stage::Digest => "digest",
            Stage::PersistDigest => "persist_digest",
            Stage::Complete => "complete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The body is not JSON.
    #[error("Report is not valid JSON: {0}")]
    Malformed(String),

    /// Missing or mistyped fields, or an agent not on the roster.
    #[error(transparent)]
    Rejected(#[from] CoreError),

    /// A report for this job was already persisted.
    #[error("A report for job {0} has already been received")]
    Duplicate(String),

    /// The scorer or digester failed.
    #[error("{stage} failed: {source}")]
    Collaborator {
        stage: Stage,
        #[source]
        source: CollaboratorError,
    },

    /// Reading or writing the report directory failed.
    #[error("{stage} failed: {source}")]
    Storage {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    /// The stage the pipeline stopped at.
    pub fn stage(&self) -> Stage {
        match self {
            IngestError::Malformed(_) => Stage::Receive,
            IngestError::Rejected(_) => Stage::Validate,
            IngestError::Duplicate(_) => Stage::Acknowledge,
            IngestError::Collaborator { stage, .. } | IngestError::Storage { stage, .. } => *stage,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Acknowledgement returned to the posting agent.
#[derive(Debug, Clone, Serialize)]
pub struct Ack {
    pub message: String,
    #[serde(rename = "jobID")]
    pub job_id: String,
}

/// What a completed pipeline produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub job_id: String,
    pub report_path: PathBuf,
    pub digest_path: PathBuf,
    pub digest_url: String,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Turns agent reports into persisted, scored, digested artifacts while
/// keeping the requester's status stream informed.
pub struct ReportPipeline {
    store: Arc<JobStore>,
    streams: Arc<StreamRegistry>,
    roster: Arc<AgentRoster>,
    archive: ReportArchive,
    scorer: Arc<dyn Scorer>,
    digester: Arc<dyn Digester>,
    app_url: String,
}

impl ReportPipeline {
    pub fn new(
        store: Arc<JobStore>,
        streams: Arc<StreamRegistry>,
        roster: Arc<AgentRoster>,
        archive: ReportArchive,
        scorer: Arc<dyn Scorer>,
        digester: Arc<dyn Digester>,
        app_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            streams,
            roster,
            archive,
            scorer,
            digester,
            app_url: app_url.into(),
        }
    }

    pub fn archive(&self) -> &ReportArchive {
        &self.archive
    }

    /// Deep link to a job's digest.
    pub fn digest_url(&self, job_id: &str) -> String {
        format!(
            "{}/digest?jobID={job_id}",
            self.app_url.trim_end_matches('/')
        )
    }

    /// Receive and validate: parse the body and check the required fields.
    ///
    /// Nothing is relayed to the requester on failure.
    pub fn receive(&self, body: &[u8]) -> Result<Report, IngestError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            tracing::warn!(error = %e, "Report body is not JSON");
            IngestError::Malformed(e.to_string())
        })?;
        validate_report(value).map_err(|e| {
            tracing::warn!(error = %e, "Report rejected");
            IngestError::from(e)
        })
    }

    /// Acknowledge: check the producing agent and write-once rule, then
    /// relay "report received".
    pub async fn accept(&self, report: &Report) -> Result<Ack, IngestError> {
        let job_id = report.id.as_str();
        let agent = report.sources.agent.as_str();

        self.roster.authorize(Some(agent)).map_err(|e| {
            tracing::warn!(job_id, agent, "Report from unauthorized agent refused");
            IngestError::from(e)
        })?;

        let exists = self
            .archive
            .has_report(job_id)
            .await
            .map_err(|source| IngestError::Storage {
                stage: Stage::Acknowledge,
                source,
            })?;
        if exists {
            tracing::warn!(job_id, agent, "Duplicate report refused");
            return Err(IngestError::Duplicate(job_id.to_string()));
        }

        match self.store.assignee(job_id).await {
            None => tracing::warn!(job_id, agent, "Report for a job that is not assigned"),
            Some(holder) if holder != agent => {
                tracing::warn!(job_id, agent, assigned_to = %holder, "Report from a different agent than the assignee");
            }
            Some(_) => {}
        }

        self.streams
            .notify(
                job_id,
                &Milestone::ReportReceived {
                    agent: agent.to_string(),
                },
            )
            .await;
        tracing::info!(job_id, agent, "Report accepted");

        Ok(Ack {
            message: format!("Report for job {job_id} received"),
            job_id: job_id.to_string(),
        })
    }

    /// Score, persist, digest and complete.
    ///
    /// On success or terminal failure the job leaves `assigned` and its
    /// stream is closed; a failure is announced on the stream first. A
    /// report that lost a race with a duplicate leaves both untouched.
    pub async fn finish(&self, report: Report) -> Result<PipelineOutcome, IngestError> {
        let job_id = report.id.clone();
        let mut reached = Stage::Score;
        let caught = AssertUnwindSafe(self.run_stages(report, &mut reached))
            .catch_unwind()
            .await;
        let result = caught.unwrap_or_else(|panic| {
            Err(IngestError::Collaborator {
                stage: reached,
                source: CollaboratorError::Failed(format!(
                    "panicked: {}",
                    panic_message(panic.as_ref())
                )),
            })
        });

        match &result {
            Ok(outcome) => {
                tracing::info!(job_id = %job_id, digest_url = %outcome.digest_url, "Report pipeline complete");
            }
            Err(IngestError::Duplicate(_)) => {
                tracing::warn!(job_id = %job_id, "Report pipeline abandoned for a duplicate report");
                return result;
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, stage = %e.stage(), error = %e, "Report pipeline failed");
                self.streams
                    .notify(
                        &job_id,
                        &Milestone::Failed {
                            stage: e.stage().to_string(),
                            reason: e.to_string(),
                        },
                    )
                    .await;
            }
        }

        self.store.complete(&job_id).await;
        self.streams.close(&job_id).await;
        result
    }

    async fn run_stages(
        &self,
        mut report: Report,
        reached: &mut Stage,
    ) -> Result<PipelineOutcome, IngestError> {
        let job_id = report.id.clone();

        self.scorer
            .score(&mut report)
            .map_err(|source| IngestError::Collaborator {
                stage: Stage::Score,
                source,
            })?;
        tracing::debug!(job_id = %job_id, "Report scored");

        *reached = Stage::PersistJson;
        let json = serde_json::to_string_pretty(&report).map_err(|e| IngestError::Storage {
            stage: Stage::PersistJson,
            source: e.into(),
        })?;
        let report_path = match self.archive.write_report(&job_id, &json).await {
            Ok(path) => path,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(IngestError::Duplicate(job_id));
            }
            Err(source) => {
                return Err(IngestError::Storage {
                    stage: Stage::PersistJson,
                    source,
                })
            }
        };
        self.streams.notify(&job_id, &Milestone::Scored).await;

        *reached = Stage::Digest;
        let html = self
            .digester
            .digest(&report)
            .map_err(|source| IngestError::Collaborator {
                stage: Stage::Digest,
                source,
            })?;
        *reached = Stage::PersistDigest;
        let digest_path = self
            .archive
            .write_digest(&job_id, &html)
            .await
            .map_err(|source| IngestError::Storage {
                stage: Stage::PersistDigest,
                source,
            })?;

        let digest_url = self.digest_url(&job_id);
        self.streams
            .notify(
                &job_id,
                &Milestone::Digested {
                    url: digest_url.clone(),
                },
            )
            .await;

        Ok(PipelineOutcome {
            job_id,
            report_path,
            digest_path,
            digest_url,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;
    use testu_core::digest::HtmlDigester;
    use testu_core::job::{Job, JobSources, StandardPolicy, Target};
    use testu_core::scoring::TallyScorer;

    use super::*;

    struct BrokenScorer;

    impl Scorer for BrokenScorer {
        fn score(&self, _report: &mut Report) -> Result<(), CollaboratorError> {
            Err(CollaboratorError::Failed("scoring exploded".into()))
        }
    }

    struct PanickingScorer;

    impl Scorer for PanickingScorer {
        fn score(&self, _report: &mut Report) -> Result<(), CollaboratorError> {
            panic!("scorer bug")
        }
    }

    struct BrokenDigester;

    impl Digester for BrokenDigester {
        fn digest(&self, _report: &Report) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::Failed("template missing".into()))
        }
    }

    struct Fixture {
        pipeline: ReportPipeline,
        streams: Arc<StreamRegistry>,
        _dir: tempfile::TempDir,
    }

    fn fixture(scorer: Arc<dyn Scorer>, digester: Arc<dyn Digester>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let streams = Arc::new(StreamRegistry::new());
        let pipeline = ReportPipeline::new(
            Arc::new(JobStore::new()),
            Arc::clone(&streams),
            Arc::new(AgentRoster::new(["agent-a"])),
            ReportArchive::new(dir.path().join("reports")),
            scorer,
            digester,
            "http://localhost:3000/",
        );
        Fixture {
            pipeline,
            streams,
            _dir: dir,
        }
    }

    fn working() -> Fixture {
        fixture(Arc::new(TallyScorer), Arc::new(HtmlDigester))
    }

    fn body(agent: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "J1",
            "what": "Example",
            "strict": true,
            "timeLimit": 60,
            "acts": [
                {"type": "test", "which": "axe", "standardResult": {"totals": [0, 1, 0, 0]}}
            ],
            "sources": {"agent": agent, "target": {"what": "Example", "which": "https://example.org"}},
            "creationTime": "261018T0900",
            "timeStamp": "261018T090000",
            "jobData": {}
        }))
        .unwrap()
    }

    fn job(id: &str) -> Job {
        Job {
            id: id.to_string(),
            what: "Example".into(),
            strict: true,
            isolate: true,
            standard: StandardPolicy::Only,
            observe: false,
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
            creation_time: chrono::Utc::now(),
            time_stamp: "261018T090000".into(),
        }
    }

    async fn drain(mut rx: crate::stream::StreamReceiver) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn full_pipeline_persists_and_streams_in_order() {
        let f = working();
        let rx = f.streams.open("J1").await;

        let report = f.pipeline.receive(&body("agent-a")).unwrap();
        let ack = f.pipeline.accept(&report).await.unwrap();
        assert_eq!(ack.job_id, "J1");
        let outcome = f.pipeline.finish(report).await.unwrap();

        assert!(outcome.report_path.exists());
        assert!(outcome.digest_path.exists());
        assert_eq!(outcome.digest_url, "http://localhost:3000/digest?jobID=J1");

        let lines = drain(rx).await;
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("received. Wait"));
        assert!(lines[1].contains("Report received"));
        assert!(lines[2].contains("scored"));
        assert!(lines[3].contains("digest?jobID=J1"));
        assert!(!f.streams.is_registered("J1").await);

        let saved: Value =
            serde_json::from_str(&std::fs::read_to_string(&outcome.report_path).unwrap()).unwrap();
        assert_eq!(saved["score"]["summary"]["total"], 2);
    }

    #[test]
    fn malformed_body_stops_at_receive() {
        let f = working();
        let err = f.pipeline.receive(b"{not json").unwrap_err();
        assert_matches!(err, IngestError::Malformed(_));
        assert_eq!(err.stage(), Stage::Receive);
    }

    #[tokio::test]
    async fn missing_field_is_rejected_without_artifacts() {
        let f = working();
        let mut value: Value = serde_json::from_slice(&body("agent-a")).unwrap();
        value.as_object_mut().unwrap().remove("jobData");

        let err = f
            .pipeline
            .receive(&serde_json::to_vec(&value).unwrap())
            .unwrap_err();

        assert_matches!(err, IngestError::Rejected(CoreError::Validation(msg)) if msg.contains("jobData"));
        assert!(!f.pipeline.archive().has_report("J1").await.unwrap());
    }

    #[tokio::test]
    async fn unauthorized_agent_is_refused() {
        let f = working();
        let report = f.pipeline.receive(&body("stranger")).unwrap();
        assert_matches!(
            f.pipeline.accept(&report).await,
            Err(IngestError::Rejected(CoreError::Unauthorized(_)))
        );
    }

    #[tokio::test]
    async fn second_report_is_a_duplicate() {
        let f = working();
        let report = f.pipeline.receive(&body("agent-a")).unwrap();
        f.pipeline.accept(&report).await.unwrap();
        f.pipeline.finish(report.clone()).await.unwrap();

        assert_matches!(
            f.pipeline.accept(&report).await,
            Err(IngestError::Duplicate(id)) if id == "J1"
        );
        assert_matches!(
            f.pipeline.finish(report).await,
            Err(IngestError::Duplicate(_))
        );
    }

    #[tokio::test]
    async fn scoring_failure_writes_nothing_and_announces_failure() {
        let f = fixture(Arc::new(BrokenScorer), Arc::new(HtmlDigester));
        let rx = f.streams.open("J1").await;
        let report = f.pipeline.receive(&body("agent-a")).unwrap();

        let err = f.pipeline.finish(report).await.unwrap_err();

        assert_eq!(err.stage(), Stage::Score);
        assert!(!f.pipeline.archive().has_report("J1").await.unwrap());
        let lines = drain(rx).await;
        assert!(lines.last().unwrap().contains("failed during score"));
    }

    #[tokio::test]
    async fn panicking_scorer_fails_the_job_and_closes_its_stream() {
        let f = fixture(Arc::new(PanickingScorer), Arc::new(HtmlDigester));
        let rx = f.streams.open("J1").await;
        let report = f.pipeline.receive(&body("agent-a")).unwrap();

        let err = f.pipeline.finish(report).await.unwrap_err();

        assert_matches!(
            &err,
            IngestError::Collaborator { stage: Stage::Score, source: CollaboratorError::Failed(msg) }
                if msg.contains("scorer bug")
        );
        assert!(!f.pipeline.archive().has_report("J1").await.unwrap());
        assert!(!f.streams.is_registered("J1").await);
        let lines = drain(rx).await;
        assert!(lines.last().unwrap().contains("failed during score"));
    }

    #[tokio::test]
    async fn overflowing_totals_fail_the_job() {
        let f = working();
        let store = Arc::clone(&f.pipeline.store);
        store.enqueue(job("J1")).await.unwrap();
        store.take_oldest("agent-a").await.unwrap();
        let mut value: Value = serde_json::from_slice(&body("agent-a")).unwrap();
        value["acts"][0]["standardResult"]["totals"] = json!([0, 0, 0, u64::MAX]);
        let rx = f.streams.open("J1").await;
        let report = f
            .pipeline
            .receive(&serde_json::to_vec(&value).unwrap())
            .unwrap();

        let err = f.pipeline.finish(report).await.unwrap_err();

        assert_matches!(
            err,
            IngestError::Collaborator { stage: Stage::Score, source: CollaboratorError::InvalidReport(_) }
        );
        assert!(!store.is_assigned("J1").await);
        assert!(!f.pipeline.archive().has_report("J1").await.unwrap());
        let lines = drain(rx).await;
        assert!(lines.last().unwrap().contains("failed during score"));
    }

    #[tokio::test]
    async fn digest_failure_keeps_scored_json() {
        let f = fixture(Arc::new(TallyScorer), Arc::new(BrokenDigester));
        let rx = f.streams.open("J1").await;
        let report = f.pipeline.receive(&body("agent-a")).unwrap();

        let err = f.pipeline.finish(report).await.unwrap_err();

        assert_eq!(err.stage(), Stage::Digest);
        let archive = f.pipeline.archive();
        assert!(archive.has_report("J1").await.unwrap());
        assert!(archive.read_digest("J1").await.unwrap().is_none());
        let lines = drain(rx).await;
        assert!(lines.iter().any(|l| l.contains("scored")));
        assert!(lines.last().unwrap().contains("failed during digest"));
    }
}
