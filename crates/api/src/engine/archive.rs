//! Persisted report artifacts: `{id}.json` (scored report) and `{id}.html`
//! (digest) in the report directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use testu_core::report::Report;
use tokio::io::AsyncWriteExt;

/// File-backed store of scored reports and digests, keyed by job id.
///
/// Callers must pass identifiers accepted by
/// [`is_safe_id`](testu_core::job::is_safe_id); they become file names.
#[derive(Debug, Clone)]
pub struct ReportArchive {
    dir: PathBuf,
}

impl ReportArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn json_path(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{job_id}.json"))
    }

    pub fn digest_path(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{job_id}.html"))
    }

    /// Whether a scored report has been persisted for the job.
    pub async fn has_report(&self, job_id: &str) -> std::io::Result<bool> {
        tokio::fs::try_exists(self.json_path(job_id)).await
    }

    /// Write the scored report. Fails with `AlreadyExists` rather than
    /// overwriting an earlier report.
    pub async fn write_report(&self, job_id: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.json_path(job_id);
        self.write_new(&path, contents).await?;
        Ok(path)
    }

    /// Write the digest. Fails with `AlreadyExists` rather than
    /// overwriting an earlier digest.
    pub async fn write_digest(&self, job_id: &str, html: &str) -> std::io::Result<PathBuf> {
        let path = self.digest_path(job_id);
        self.write_new(&path, html).await?;
        Ok(path)
    }

    /// Read the scored report, `None` when it does not exist.
    pub async fn read_report(&self, job_id: &str) -> std::io::Result<Option<String>> {
        read_optional(&self.json_path(job_id)).await
    }

    /// Read the digest, `None` when it does not exist.
    pub async fn read_digest(&self, job_id: &str) -> std::io::Result<Option<String>> {
        read_optional(&self.digest_path(job_id)).await
    }

    /// Every persisted scored report, in file name order.
    ///
    /// A missing directory holds no reports. Files that do not decode as
    /// reports are skipped with a warning.
    pub async fn scored_reports(&self) -> std::io::Result<Vec<Report>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            let text = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<Report>(&text) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable scored report");
                }
            }
        }
        Ok(reports)
    }

    async fn write_new(&self, path: &Path, contents: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        file.write_all(contents.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

async fn read_optional(path: &Path) -> std::io::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
