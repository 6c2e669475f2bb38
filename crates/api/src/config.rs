use std::path::PathBuf;

use testu_core::script::BUILTIN_SCRIPT_ID;

/// Transport the server listens with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protocol {
    Http,
    /// TLS with PEM key and certificate files.
    Https { key_path: PathBuf, cert_path: PathBuf },
}

/// Invalid or incomplete configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set when PROTOCOL is https")]
    MissingTls(&'static str),
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Plain or TLS transport (default: plain).
    pub protocol: Protocol,
    /// Agent identifiers allowed to pull jobs, from comma-separated `AGENTS`.
    pub agents: Vec<String>,
    /// Base URL of this application, used in digest links.
    pub app_url: String,
    /// Directory for scored reports and digests (default: `reports`).
    pub report_dir: PathBuf,
    /// Directory of `{id}.json` scripts; the built-in script when unset.
    pub scripts_dir: Option<PathBuf>,
    /// Script new jobs are built from (default: `default`).
    pub script_id: String,
    /// Requester recorded in job sources (default: empty).
    pub requester: String,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Largest accepted report body in bytes (default: 32 MiB).
    pub report_body_limit: usize,
    /// Seconds an assigned job or idle status stream is kept (default: one day).
    pub assigned_ttl_secs: u64,
    /// Seconds between expiry sweeps (default: `300`).
    pub sweep_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                    |
    /// |---------------------------|----------------------------|
    /// | `HOST`                    | `0.0.0.0`                  |
    /// | `PORT`                    | `3000`                     |
    /// | `PROTOCOL`                | `http`                     |
    /// | `KEY_PATH`, `CERT_PATH`   | required for `https`       |
    /// | `AGENTS`                  | empty                      |
    /// | `APP_URL`                 | `http://localhost:{PORT}`  |
    /// | `REPORT_DIR`              | `reports`                  |
    /// | `SCRIPTS_DIR`             | unset                      |
    /// | `SCRIPT`                  | `default`                  |
    /// | `REQUESTER`               | empty                      |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                       |
    /// | `REPORT_BODY_LIMIT_BYTES` | `33554432`                 |
    /// | `ASSIGNED_TTL_SECS`       | `86400`                    |
    /// | `SWEEP_INTERVAL_SECS`     | `300`                      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse(&lookup, "PORT", 3000)?;

        let protocol = match var("PROTOCOL").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("http") => Protocol::Http,
            Some("https") => Protocol::Https {
                key_path: var("KEY_PATH")
                    .map(PathBuf::from)
                    .ok_or(ConfigError::MissingTls("KEY_PATH"))?,
                cert_path: var("CERT_PATH")
                    .map(PathBuf::from)
                    .ok_or(ConfigError::MissingTls("CERT_PATH"))?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "PROTOCOL",
                    value: other.to_string(),
                    reason: "expected http or https".into(),
                })
            }
        };

        let agents: Vec<String> = var("AGENTS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let app_url = var("APP_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            host,
            port,
            protocol,
            agents,
            app_url,
            report_dir: var("REPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("reports")),
            scripts_dir: var("SCRIPTS_DIR").map(PathBuf::from),
            script_id: var("SCRIPT").unwrap_or_else(|| BUILTIN_SCRIPT_ID.to_string()),
            requester: var("REQUESTER").unwrap_or_default(),
            request_timeout_secs: parse(&lookup, "REQUEST_TIMEOUT_SECS", 30)?,
            report_body_limit: parse(&lookup, "REPORT_BODY_LIMIT_BYTES", 32 * 1024 * 1024)?,
            assigned_ttl_secs: parse(&lookup, "ASSIGNED_TTL_SECS", 86_400)?,
            sweep_interval_secs: parse(&lookup, "SWEEP_INTERVAL_SECS", 300)?,
        })
    }
}

fn parse<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var).filter(|v| !v.trim().is_empty()) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}
