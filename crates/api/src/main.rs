use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use testu_api::config::{Protocol, ServerConfig};
use testu_api::stream::StreamRegistry;
use testu_api::{app, background, state, tls};

use state::AppState;

/// Seconds in-flight requests get to finish once shutdown starts.
const SHUTDOWN_GRACE_SECS: u64 = 10;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "testu_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        host = %config.host,
        port = config.port,
        https = matches!(config.protocol, Protocol::Https { .. }),
        agents = config.agents.len(),
        report_dir = %config.report_dir.display(),
        "Loaded server configuration"
    );

    // --- App state ---
    let state = AppState::new(config.clone());
    let streams = Arc::clone(&state.streams);
    let tasks = state.tasks.clone();

    // --- Expiry sweep ---
    let sweep_cancel = CancellationToken::new();
    let sweep_handle = tokio::spawn(background::expiry::run(state.clone(), sweep_cancel.clone()));

    // --- Router ---
    let app = app::build_app(state);

    // --- Start server ---
    let addr = match config.host.parse() {
        Ok(ip) => SocketAddr::new(ip, config.port),
        Err(e) => {
            tracing::error!(host = %config.host, error = %e, "Invalid HOST address");
            std::process::exit(1);
        }
    };

    let served = match &config.protocol {
        Protocol::Http => {
            tracing::info!(%addr, "Starting HTTP server");
            match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown(Arc::clone(&streams)))
                    .await,
                Err(e) => Err(e),
            }
        }
        Protocol::Https {
            key_path,
            cert_path,
        } => {
            tls::install_crypto_provider();
            let rustls_config = match tls::load(key_path, cert_path).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(error = %e, "Cannot load TLS configuration");
                    std::process::exit(1);
                }
            };

            let handle = axum_server::Handle::new();
            tokio::spawn({
                let handle = handle.clone();
                let streams = Arc::clone(&streams);
                async move {
                    shutdown(streams).await;
                    handle.graceful_shutdown(Some(Duration::from_secs(SHUTDOWN_GRACE_SECS)));
                }
            });

            tracing::info!(%addr, "Starting HTTPS server");
            axum_server::bind_rustls(addr, rustls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
    };

    if let Err(e) = served {
        tracing::error!(error = %e, "Server error");
    }

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweep_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweep_handle).await;
    tracing::info!("Expiry sweep stopped");

    tasks.close();
    if tokio::time::timeout(Duration::from_secs(5), tasks.wait())
        .await
        .is_err()
    {
        tracing::warn!(
            pending = tasks.len(),
            "Report pipelines still running at exit"
        );
    } else {
        tracing::info!("Report pipelines drained");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal, then end every status stream so
/// long-lived responses finish and the server can drain.
async fn shutdown(streams: Arc<StreamRegistry>) {
    shutdown_signal().await;
    streams.shutdown_all().await;
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
