//! Shard API server
//!
//! Endpoints:
//! - Nodes: list, available workers, health, label, cordon, uncordon, drain
//! - Models: deploy, status, infer, metrics, cleanup

use std::future::Future;
use std::io;

use tracing::{info, warn};

mod handlers;
mod state;

pub use handlers::{
    create_router, ApiError, DeployRequest, DeployResponse, DrainResponse, NodeHealth,
    OperationStatus, ResourceList,
};
pub use state::{ShardApiState, SharedStrategy};

/// Resolve once `signal` fires, for use with graceful shutdown
///
/// A signal that cannot be installed is logged and treated as a shutdown.
pub async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_shutdown_on_signal() {
        let fired = async { Ok::<(), io::Error>(()) };
        tokio::time::timeout(Duration::from_secs(1), shutdown_on(fired))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_when_signal_install_fails() {
        let failing = async { Err::<(), _>(io::Error::other("signal handler unavailable")) };
        tokio::time::timeout(Duration::from_secs(1), shutdown_on(failing))
            .await
            .unwrap();
    }
}
