use std::sync::Arc;

use testu_core::compare::{Comparer, RankingComparer};
use testu_core::digest::{Digester, HtmlDigester};
use testu_core::job::JobIdGenerator;
use testu_core::scoring::{Scorer, TallyScorer};
use tokio_util::task::TaskTracker;

use crate::config::ServerConfig;
use crate::engine::archive::ReportArchive;
use crate::engine::dispatcher::JobDispatcher;
use crate::engine::ingest::ReportPipeline;
use crate::engine::roster::AgentRoster;
use crate::engine::scripts::ScriptLibrary;
use crate::engine::store::JobStore;
use crate::stream::StreamRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Waiting and assigned jobs.
    pub store: Arc<JobStore>,
    /// Requester status streams (SSE).
    pub streams: Arc<StreamRegistry>,
    /// Serves agent pulls.
    pub dispatcher: Arc<JobDispatcher>,
    /// Turns posted reports into scored reports and digests.
    pub pipeline: Arc<ReportPipeline>,
    /// Ranks persisted reports for the score comparison page.
    pub comparer: Arc<dyn Comparer>,
    /// Scripts new jobs are built from.
    pub scripts: ScriptLibrary,
    /// Job identifier source, shared by every intake request.
    pub job_ids: Arc<JobIdGenerator>,
    /// Report pipelines still running after their acknowledgement;
    /// drained before the process exits.
    pub tasks: TaskTracker,
}

impl AppState {
    /// Wire up state with the built-in scorer, digester and comparer.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(TallyScorer),
            Arc::new(HtmlDigester),
            Arc::new(RankingComparer),
        )
    }

    /// Wire up state with the given scoring, digesting and comparing
    /// collaborators.
    pub fn with_collaborators(
        config: ServerConfig,
        scorer: Arc<dyn Scorer>,
        digester: Arc<dyn Digester>,
        comparer: Arc<dyn Comparer>,
    ) -> Self {
        let store = Arc::new(JobStore::new());
        let streams = Arc::new(StreamRegistry::new());
        let roster = Arc::new(AgentRoster::new(&config.agents));
        if roster.is_empty() {
            tracing::warn!("No agents configured; every job pull will be refused");
        } else {
            tracing::info!(agents = roster.len(), "Agent roster loaded");
        }

        let dispatcher = Arc::new(JobDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&streams),
            Arc::clone(&roster),
        ));
        let pipeline = Arc::new(ReportPipeline::new(
            Arc::clone(&store),
            Arc::clone(&streams),
            roster,
            ReportArchive::new(config.report_dir.clone()),
            scorer,
            digester,
            config.app_url.clone(),
        ));

        Self {
            scripts: ScriptLibrary::new(config.scripts_dir.clone()),
            config: Arc::new(config),
            store,
            streams,
            dispatcher,
            pipeline,
            comparer,
            job_ids: Arc::new(JobIdGenerator::new()),
            tasks: TaskTracker::new(),
        }
    }
}
