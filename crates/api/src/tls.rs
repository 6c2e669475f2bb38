//! TLS material loading for `PROTOCOL=https`.

use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;

/// Error type for TLS configuration issues.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("Certificate not found: {0}")]
    CertNotFound(PathBuf),

    #[error("Private key not found: {0}")]
    KeyNotFound(PathBuf),

    #[error("Failed to load TLS material: {0}")]
    Load(#[from] std::io::Error),
}

/// Install the process-wide rustls crypto provider.
///
/// Must run once before any TLS configuration is built. Installing twice
/// is harmless.
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }
}

/// Load a PEM certificate chain and private key.
///
/// # Errors
///
/// Returns an error if either file does not exist or cannot be parsed.
pub async fn load(key_path: &Path, cert_path: &Path) -> Result<RustlsConfig, TlsError> {
    if !cert_path.exists() {
        return Err(TlsError::CertNotFound(cert_path.to_path_buf()));
    }
    if !key_path.exists() {
        return Err(TlsError::KeyNotFound(key_path.to_path_buf()));
    }

    let config = RustlsConfig::from_pem_file(cert_path, key_path).await?;
    tracing::info!(cert = %cert_path.display(), "TLS certificate loaded");
    Ok(config)
}
