//! Score comparison contract and the default ranking comparer.

use std::fmt::Write;

use serde_json::Value;

use crate::digest::{escape_html, is_web_url};
use crate::error::CollaboratorError;
use crate::report::Report;

/// Identifier of [`RankingComparer`].
pub const RANKING_COMPARER_ID: &str = "ranking";

/// Turns a set of scored reports into one HTML comparison page.
pub trait Comparer: Send + Sync {
    fn compare(&self, reports: &[Report]) -> Result<String, CollaboratorError>;
}

/// One row of a ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranked {
    pub id: String,
    pub label: String,
    pub url: Option<String>,
    pub total: u64,
}

/// Orders scored reports by `score.summary.total`, best (lowest) first.
///
/// Reports without a total are left out. Equal totals keep job identifier
/// order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingComparer;

impl RankingComparer {
    pub fn ranking(&self, reports: &[Report]) -> Vec<Ranked> {
        let mut rows: Vec<Ranked> = reports
            .iter()
            .filter_map(|report| {
                let total = report
                    .score
                    .as_ref()
                    .and_then(|s| s.pointer("/summary/total"))
                    .and_then(Value::as_u64)?;
                Some(Ranked {
                    id: report.id.clone(),
                    label: report.target_label().to_string(),
                    url: report.target_url().map(str::to_string),
                    total,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.total.cmp(&b.total).then_with(|| a.id.cmp(&b.id)));
        rows
    }
}

impl Comparer for RankingComparer {
    fn compare(&self, reports: &[Report]) -> Result<String, CollaboratorError> {
        let rows = self.ranking(reports);

        let mut html = String::from(
            "<!DOCTYPE html>\n<html lang=\"en-US\">\n<head>\n\
             <meta charset=\"utf-8\">\n\
             <title>Accessibility score comparison</title>\n\
             <link rel=\"stylesheet\" href=\"/style.css\">\n\
             </head>\n<body>\n<main>\n\
             <h1>Accessibility score comparison</h1>\n",
        );
        let _ = writeln!(
            html,
            "<p>{} scored page(s), lowest score (best) first. Comparer: {RANKING_COMPARER_ID}.</p>",
            rows.len()
        );

        if !rows.is_empty() {
            html.push_str(
                "<table>\n<thead><tr><th>Rank</th><th>Page</th><th>Score</th><th>Digest</th></tr></thead>\n<tbody>\n",
            );
            for (rank, row) in rows.iter().enumerate() {
                let label = escape_html(&row.label);
                let page = match row.url.as_deref() {
                    Some(url) if is_web_url(url) => {
                        format!("<a href=\"{}\">{label}</a>", escape_html(url))
                    }
                    _ => label,
                };
                let _ = writeln!(
                    html,
                    "<tr><td>{}</td><td>{page}</td><td>{}</td><td><a href=\"/digest?jobID={id}\">{id}</a></td></tr>",
                    rank + 1,
                    row.total,
                    id = escape_html(&row.id),
                );
            }
            html.push_str("</tbody>\n</table>\n");
        }

        html.push_str("</main>\n</body>\n</html>\n");
        Ok(html)
    }
}
