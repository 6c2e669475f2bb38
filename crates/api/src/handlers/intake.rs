//! Target submission from the web form.

use axum::extract::State;
use axum::response::Html;
use axum::Form;
use chrono::Utc;
use testu_core::batch::{batch, merge};
use testu_core::error::CoreError;
use testu_core::job::JobPolicy;
use testu_core::submission::TargetSubmission;

use crate::error::PageResult;
use crate::pages;
use crate::state::AppState;

/// Batch identifier for jobs created from the form.
const INTAKE_BATCH_ID: &str = "web";

/// POST /result.html
///
/// Build a job for the submitted page, queue it, reserve its status
/// stream and return the placeholder page that subscribes to it. Nothing
/// is queued when validation or job construction fails.
pub async fn submit(
    State(state): State<AppState>,
    Form(submission): Form<TargetSubmission>,
) -> PageResult<Html<String>> {
    let target = submission.into_target().inspect_err(|e| {
        tracing::warn!(error = %e, "Target submission rejected");
    })?;

    let script = state.scripts.load(&state.config.script_id).await?;
    let targets = batch(INTAKE_BATCH_ID, target.what.clone(), vec![target.clone()]);
    let jobs = merge(
        &script,
        &targets,
        JobPolicy::intake(),
        &state.config.requester,
        &state.job_ids,
        Utc::now(),
    )?;
    let Some(job_id) = jobs.first().map(|job| job.id.clone()) else {
        return Err(CoreError::Internal("Merge produced no job".into()).into());
    };

    for job in jobs {
        // The stream must exist before the job can be pulled.
        state.streams.reserve(&job.id).await;
        let id = job.id.clone();
        if let Err(e) = state.store.enqueue(job).await {
            state.streams.close(&id).await;
            return Err(e.into());
        }
        tracing::info!(job_id = %id, url = %target.which, "Job queued");
    }

    Ok(Html(pages::result_page(&job_id, &target)))
}
