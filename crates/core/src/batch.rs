//! Batch and merge helpers: turning targets plus a script into jobs.
//!
//! These are the default job-construction collaborators. They are pure:
//! identifiers and the creation time are supplied by the caller.

use serde_json::{json, Value};

use crate::error::CoreError;
use crate::job::{stamp_of, Job, JobIdGenerator, JobPolicy, JobSources, Target};
use crate::script::Script;
use crate::types::Timestamp;

/// A named list of targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub id: String,
    pub what: String,
    pub targets: Vec<Target>,
}

/// Build a batch from targets.
pub fn batch(id: impl Into<String>, what: impl Into<String>, targets: Vec<Target>) -> Batch {
    Batch {
        id: id.into(),
        what: what.into(),
        targets,
    }
}

/// Merge a script with a batch, producing one job per target.
///
/// `launch` acts are pointed at each job's target. With `policy.isolate`,
/// every test act after the first is preceded by a copy of the latest
/// launch act so it runs in a fresh browser.
pub fn merge(
    script: &Script,
    batch: &Batch,
    policy: JobPolicy,
    requester: &str,
    ids: &JobIdGenerator,
    now: Timestamp,
) -> Result<Vec<Job>, CoreError> {
    if batch.targets.is_empty() {
        return Err(CoreError::Validation(format!(
            "Batch {} has no targets",
            batch.id
        )));
    }
    if script.acts.is_empty() {
        return Err(CoreError::Validation(format!(
            "Script {} has no acts",
            script.id
        )));
    }

    let last = batch.targets.len() - 1;
    let jobs = batch
        .targets
        .iter()
        .enumerate()
        .map(|(index, target)| {
            let id = ids.next_at(now);
            Job {
                time_stamp: stamp_of(&id).to_string(),
                id,
                what: script.what.clone(),
                strict: script.strict,
                isolate: policy.isolate,
                standard: policy.standard,
                observe: policy.observe,
                time_limit: script.time_limit,
                acts: target_acts(&script.acts, target, policy.isolate),
                sources: JobSources {
                    script: script.id.clone(),
                    batch: batch.id.clone(),
                    target: target.clone(),
                    requester: requester.to_string(),
                    last_target: index == last,
                },
                creation_time: now,
            }
        })
        .collect();
    Ok(jobs)
}

fn act_type(act: &Value) -> Option<&str> {
    act.get("type").and_then(Value::as_str)
}

/// The script's acts specialised for one target.
fn target_acts(acts: &[Value], target: &Target, isolate: bool) -> Vec<Value> {
    let target_json = json!({ "what": target.what, "which": target.which });
    let mut out = Vec::with_capacity(acts.len() + 1);
    let mut launch: Option<Value> = None;
    let mut seen_test = false;

    if !acts.iter().any(|act| act_type(act) == Some("launch")) {
        let act = json!({ "type": "launch", "which": "chromium", "target": target_json });
        launch = Some(act.clone());
        out.push(act);
    }

    for act in acts {
        let mut act = act.clone();
        match act_type(&act) {
            Some("launch") => {
                act["target"] = target_json.clone();
                launch = Some(act.clone());
            }
            Some("test") => {
                if isolate && seen_test {
                    if let Some(fresh) = &launch {
                        out.push(fresh.clone());
                    }
                }
                seen_test = true;
            }
            _ => {}
        }
        out.push(act);
    }
    out
}
