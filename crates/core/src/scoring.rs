//! Report scoring contract and the default tally scorer.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::CollaboratorError;
use crate::report::Report;

/// Weight of each standardized severity ordinal (0 = minor .. 3 = critical).
pub const SEVERITY_WEIGHTS: [u64; 4] = [1, 2, 3, 4];

/// Score added for each tool that was prevented from running.
pub const PREVENTION_WEIGHT: u64 = 50;

/// Identifier written into `score.scoreProcID` by [`TallyScorer`].
pub const TALLY_PROC_ID: &str = "tally";

/// Augments a report with computed score fields.
///
/// Implementations must be pure functions of the report.
pub trait Scorer: Send + Sync {
    fn score(&self, report: &mut Report) -> Result<(), CollaboratorError>;
}

/// Weighted tally of standardized severity totals. Lower is better.
#[derive(Debug, Clone, Copy, Default)]
pub struct TallyScorer;

#[derive(Debug, Default, Serialize)]
struct Summary {
    total: u64,
    severities: [u64; 4],
    tools: BTreeMap<String, u64>,
    prevented: u64,
}

impl Summary {
    fn add(&mut self, tool: String, score: u64, index: usize) -> Result<(), CollaboratorError> {
        let current = self.tools.get(&tool).copied().unwrap_or(0);
        let (Some(total), Some(tool_total)) =
            (self.total.checked_add(score), current.checked_add(score))
        else {
            return Err(overflow(index, &tool));
        };
        self.total = total;
        self.tools.insert(tool, tool_total);
        Ok(())
    }
}

fn overflow(index: usize, tool: &str) -> CollaboratorError {
    CollaboratorError::InvalidReport(format!("act {index} ({tool}) totals overflow the score"))
}

impl Scorer for TallyScorer {
    fn score(&self, report: &mut Report) -> Result<(), CollaboratorError> {
        let mut summary = Summary::default();

        for (index, act) in report.acts.iter().enumerate() {
            if act.get("type").and_then(Value::as_str) != Some("test") {
                continue;
            }
            let tool = act
                .get("which")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();

            if act.pointer("/data/prevented").and_then(Value::as_bool) == Some(true) {
                summary.prevented += 1;
                summary.add(tool, PREVENTION_WEIGHT, index)?;
                continue;
            }

            let Some(totals) = act.pointer("/standardResult/totals") else {
                continue;
            };
            let totals = severity_totals(totals).ok_or_else(|| {
                CollaboratorError::InvalidReport(format!(
                    "act {index} ({tool}) has malformed standardResult.totals"
                ))
            })?;

            let mut tool_score: u64 = 0;
            for (ordinal, count) in totals.iter().enumerate() {
                tool_score = count
                    .checked_mul(SEVERITY_WEIGHTS[ordinal])
                    .and_then(|weighted| tool_score.checked_add(weighted))
                    .ok_or_else(|| overflow(index, &tool))?;
                summary.severities[ordinal] = summary.severities[ordinal]
                    .checked_add(*count)
                    .ok_or_else(|| overflow(index, &tool))?;
            }
            summary.add(tool, tool_score, index)?;
        }

        let summary = serde_json::to_value(summary)
            .map_err(|e| CollaboratorError::Failed(format!("cannot encode score: {e}")))?;
        report.score = Some(serde_json::json!({
            "scoreProcID": TALLY_PROC_ID,
            "summary": summary,
        }));
        Ok(())
    }
}

fn severity_totals(value: &Value) -> Option<[u64; 4]> {
    let items = value.as_array()?;
    if items.len() != 4 {
        return None;
    }
    let mut totals = [0; 4];
    for (slot, item) in totals.iter_mut().zip(items) {
        // Some tools report fractional totals; round them.
        *slot = item
            .as_u64()
            .or_else(|| item.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))?;
    }
    Some(totals)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::report::validate_report;

    fn report(acts: Value) -> Report {
        validate_report(json!({
            "id": "J1",
            "what": "Example",
            "strict": true,
            "timeLimit": 60,
            "acts": acts,
            "sources": {"agent": "a"},
            "creationTime": "t",
            "timeStamp": "s",
            "jobData": {}
        }))
        .unwrap()
    }

    #[test]
    fn tallies_weighted_severities_per_tool() {
        let mut r = report(json!([
            {"type": "launch"},
            {"type": "test", "which": "axe", "standardResult": {"totals": [1, 0, 2, 1]}},
            {"type": "test", "which": "ibm", "standardResult": {"totals": [0, 3, 0, 0]}}
        ]));

        TallyScorer.score(&mut r).unwrap();

        let score = r.score.unwrap();
        assert_eq!(score["scoreProcID"], "tally");
        assert_eq!(score["summary"]["tools"]["axe"], 1 + 6 + 4);
        assert_eq!(score["summary"]["tools"]["ibm"], 6);
        assert_eq!(score["summary"]["total"], 17);
        assert_eq!(score["summary"]["severities"], json!([1, 3, 2, 1]));
    }

    #[test]
    fn prevented_tools_cost_a_fixed_weight() {
        let mut r = report(json!([
            {"type": "test", "which": "alfa", "data": {"prevented": true}}
        ]));

        TallyScorer.score(&mut r).unwrap();

        let score = r.score.unwrap();
        assert_eq!(score["summary"]["prevented"], 1);
        assert_eq!(score["summary"]["total"], PREVENTION_WEIGHT);
    }

    #[test]
    fn malformed_totals_fail() {
        let mut r = report(json!([
            {"type": "test", "which": "axe", "standardResult": {"totals": [1, 2]}}
        ]));
        assert_matches!(
            TallyScorer.score(&mut r),
            Err(CollaboratorError::InvalidReport(_))
        );
        assert!(r.score.is_none());
    }

    #[test]
    fn oversized_totals_are_rejected() {
        let mut r = report(json!([
            {"type": "test", "which": "axe", "standardResult": {"totals": [0, 0, 0, u64::MAX]}}
        ]));
        assert_matches!(
            TallyScorer.score(&mut r),
            Err(CollaboratorError::InvalidReport(msg)) if msg.contains("overflow")
        );
        assert!(r.score.is_none());
    }

    #[test]
    fn totals_overflowing_across_tools_are_rejected() {
        let big = u64::MAX / 4;
        let mut r = report(json!([
            {"type": "test", "which": "axe", "standardResult": {"totals": [0, 0, 0, big]}},
            {"type": "test", "which": "ibm", "standardResult": {"totals": [0, 0, 0, big]}}
        ]));
        assert_matches!(
            TallyScorer.score(&mut r),
            Err(CollaboratorError::InvalidReport(_))
        );
    }

    #[test]
    fn report_without_tests_scores_zero() {
        let mut r = report(json!([]));
        TallyScorer.score(&mut r).unwrap();
        assert_eq!(r.score.unwrap()["summary"]["total"], 0);
    }
}
