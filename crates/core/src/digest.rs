//! Report digesting contract and the default HTML digester.

use std::fmt::Write;

use serde_json::Value;

use crate::error::CollaboratorError;
use crate::report::Report;

/// Severity labels by standardized ordinal.
const SEVERITY_LABELS: [&str; 4] = ["Minor", "Moderate", "Serious", "Critical"];

/// Turns a scored report into one human-readable HTML document.
pub trait Digester: Send + Sync {
    fn digest(&self, report: &Report) -> Result<String, CollaboratorError>;
}

/// Self-contained HTML summary of a report scored by
/// [`TallyScorer`](crate::scoring::TallyScorer).
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlDigester;

impl Digester for HtmlDigester {
    fn digest(&self, report: &Report) -> Result<String, CollaboratorError> {
        let summary = report
            .score
            .as_ref()
            .and_then(|s| s.get("summary"))
            .ok_or_else(|| CollaboratorError::InvalidReport("report has not been scored".into()))?;
        let total = summary.get("total").and_then(Value::as_u64).unwrap_or(0);

        let label = escape_html(report.target_label());
        let page = match report.target_url() {
            Some(url) if is_web_url(url) => format!("<a href=\"{}\">{label}</a>", escape_html(url)),
            Some(url) => format!("{label} ({})", escape_html(url)),
            None => label.clone(),
        };
        let id = escape_html(&report.id);

        let mut html = String::new();
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html lang=\"en-US\">\n<head>\n\
             <meta charset=\"utf-8\">\n\
             <title>Accessibility digest: {label}</title>\n\
             <link rel=\"stylesheet\" href=\"/style.css\">\n\
             </head>\n<body>\n<main>\n\
             <h1>Accessibility digest</h1>\n\
             <p>Page: {page}</p>\n\
             <p>Job: {id}. Tested by {agent}.</p>\n\
             <h2>Score</h2>\n\
             <p>Total score: <strong>{total}</strong> (lower is better).</p>\n",
            agent = escape_html(&report.sources.agent),
        );

        if let Some(tools) = summary.get("tools").and_then(Value::as_object) {
            html.push_str("<h2>Scores by tool</h2>\n<table>\n<thead><tr><th>Tool</th><th>Score</th></tr></thead>\n<tbody>\n");
            for (tool, score) in tools {
                let _ = writeln!(
                    html,
                    "<tr><td>{}</td><td>{}</td></tr>",
                    escape_html(tool),
                    score.as_u64().unwrap_or(0)
                );
            }
            html.push_str("</tbody>\n</table>\n");
        }

        if let Some(severities) = summary.get("severities").and_then(Value::as_array) {
            html.push_str("<h2>Issue instances by severity</h2>\n<ul>\n");
            for (label, count) in SEVERITY_LABELS.iter().zip(severities).rev() {
                let _ = writeln!(html, "<li>{label}: {}</li>", count.as_u64().unwrap_or(0));
            }
            html.push_str("</ul>\n");
        }

        if let Some(prevented) = summary.get("prevented").and_then(Value::as_u64) {
            if prevented > 0 {
                let _ = writeln!(
                    html,
                    "<p>{prevented} tool(s) were prevented from testing the page.</p>"
                );
            }
        }

        let _ = write!(
            html,
            "<p><a href=\"/report?jobID={id}\">Full scored report (JSON)</a></p>\n\
             </main>\n</body>\n</html>\n"
        );
        Ok(html)
    }
}

/// Whether `url` is an `http` or `https` address, safe to use as a link.
pub fn is_web_url(url: &str) -> bool {
    let scheme = url.split_once("://").map(|(scheme, _)| scheme);
    matches!(scheme, Some(s) if s.eq_ignore_ascii_case("http") || s.eq_ignore_ascii_case("https"))
}

/// Escape text for inclusion in HTML content or a quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
