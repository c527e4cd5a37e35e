//! Process bootstrap: logging, the data directory's non-persistent wipe,
//! and graceful shutdown signal handling.

use dcron_core::{DcronError, DcronResult};
use std::path::Path;
use tokio::signal;
use tracing::info;

/// Installs the global `tracing` subscriber. Respects `RUST_LOG`, otherwise
/// falls back to a default filter tuned for this node's own crates.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dcron=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Removes and recreates this node's data directory. The embedded log
/// engine is non-persistent by design, so every start begins from empty
/// state; wiping the directory is this node's responsibility, not the
/// engine's.
pub fn prepare_data_dir(dir: &Path) -> DcronResult<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)
            .map_err(|e| DcronError::Internal(format!("failed to wipe data dir {}: {e}", dir.display())))?;
    }
    std::fs::create_dir_all(dir)
        .map_err(|e| DcronError::Internal(format!("failed to create data dir {}: {e}", dir.display())))?;
    Ok(())
}

/// Resolves once either a Ctrl+C or (on unix) a terminate signal arrives.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            info!("received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_data_dir_wipes_existing_contents() {
        let base = std::env::temp_dir().join(format!("dcron-test-{}", std::process::id()));
        let stale = base.join("stale.txt");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(&stale, b"leftover").unwrap();

        prepare_data_dir(&base).unwrap();

        assert!(base.exists());
        assert!(!stale.exists());

        std::fs::remove_dir_all(&base).ok();
    }
}
