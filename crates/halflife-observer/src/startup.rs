//! Observer startup helper for embedding in the collector.
//!
//! [`spawn_observer`] binds eagerly, then serves on a background task that
//! stops when the shutdown watch flips to `true`.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError, bind, serve};
use crate::state::AppState;

/// Spawn the Observer HTTP server on a background Tokio task.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address cannot be bound. Errors
/// after startup are logged by the task.
pub async fn spawn_observer(
    config: &ServerConfig,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>, ServerError> {
    let listener = bind(config).await?;

    let handle = tokio::spawn(async move {
        let signal = async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        };
        if let Err(e) = serve(listener, state, signal).await {
            tracing::error!(error = %e, "Observer server exited with error");
        }
        tracing::info!("Observer server stopped");
    });

    tracing::info!(host = %config.host, port = config.port, "Observer server spawned on background task");
    Ok(handle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stops_when_shutdown_flips() {
        let (tx, rx) = watch::channel(false);
        let config = ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 0,
        };
        let handle = spawn_observer(&config, Arc::new(AppState::default()), rx)
            .await
            .unwrap();

        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn invalid_address_fails_eagerly() {
        let (_tx, rx) = watch::channel(false);
        let config = ServerConfig {
            host: "not an address".to_owned(),
            port: 80,
        };
        let err = spawn_observer(&config, Arc::new(AppState::default()), rx)
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Bind(_)));
    }
}
