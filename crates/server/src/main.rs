use tracing_subscriber::EnvFilter;

use archon_domain::config::Config;

/// Thin process entry point. All of the substrate's logic lives in the
/// `archon_server` library (`bootstrap::build`, `health::check_all`) so an
/// external HTTP or CLI surface can embed it the same way; this binary just
/// boots the substrate and keeps the worker supervisor running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    tracing::info!("archon starting");

    let config = load_config()?;
    let system = archon_server::bootstrap::build(config).await?;
    system.supervisor.start();

    let report = archon_server::health::check_all(&system).await;
    tracing::info!(status = ?report.status, "initial health check");

    shutdown_signal().await;
    tracing::info!("shutdown signal received, stopping workers");
    system.supervisor.stop().await;
    tracing::info!("archon stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,archon_server=debug")),
        )
        .json()
        .init();
}

/// Reads `ARCHON_CONFIG` if set, falling back to defaults for every
/// sub-config (spec.md §6 environment configuration).
fn load_config() -> anyhow::Result<Config> {
    match std::env::var("ARCHON_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("reading config at {path}: {e}"))?;
            Ok(Config::from_toml_str(&raw)?)
        }
        Err(_) => {
            tracing::info!("ARCHON_CONFIG not set, using default configuration");
            Ok(Config::default())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
