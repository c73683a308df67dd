//! RPC Connection Manager — holds at most one live connection per
//! [`ExecutorKind`] and decides whether a spawn failure is fatal.
//!
//! The primary executor is required: if it fails to spawn or initialize,
//! that failure propagates to the caller (startup treats it as fatal).
//! The secondary executor is optional: a failure there is logged and the
//! manager simply has no connection for that kind, rather than aborting
//! startup over one misbehaving child process.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use akd_domain::config::ExecutorsConfig;
use akd_domain::session::ExecutorKind;
use akd_protocol::jsonrpc::JsonRpcNotification;

use crate::connection::AgentConnection;
use crate::transport::StdioConnection;

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("required executor {0}: {1}")]
    RequiredExecutorFailed(ExecutorKind, String),
}

#[derive(Debug, Clone)]
pub struct TapEvent {
    pub executor_kind: ExecutorKind,
    pub notification: JsonRpcNotification,
}

pub struct ConnectionManager {
    connections: RwLock<HashMap<ExecutorKind, Arc<AgentConnection>>>,
    /// Observability tap: every notification a connection receives is also
    /// replayed here for protocol-debug panels and tests, without
    /// perturbing the live request/response path.
    tap_tx: broadcast::Sender<TapEvent>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        let (tap_tx, _rx) = broadcast::channel(256);
        Self {
            connections: RwLock::new(HashMap::new()),
            tap_tx,
        }
    }

    pub fn subscribe_tap(&self) -> broadcast::Receiver<TapEvent> {
        self.tap_tx.subscribe()
    }

    /// Spawn both configured executors. The primary's failure is
    /// propagated; the secondary's failure is logged and skipped.
    pub async fn start(&self, config: &ExecutorsConfig) -> Result<(), ManagerError> {
        for kind in ExecutorKind::all() {
            let executor_cfg = config.get(kind);
            if executor_cfg.command.is_empty() {
                if executor_cfg.required {
                    return Err(ManagerError::RequiredExecutorFailed(
                        kind,
                        "no command configured".into(),
                    ));
                }
                tracing::info!(%kind, "no command configured, skipping optional executor");
                continue;
            }

            let transport = match StdioConnection::spawn(executor_cfg) {
                Ok(t) => t,
                Err(e) => {
                    if executor_cfg.required {
                        return Err(ManagerError::RequiredExecutorFailed(kind, e.to_string()));
                    }
                    tracing::warn!(%kind, error = %e, "optional executor failed to spawn, skipping");
                    continue;
                }
            };

            let conn = Arc::new(AgentConnection::new(transport));
            self.tap_connection(kind, &conn);

            if let Err(e) = conn.initialize().await {
                if executor_cfg.required {
                    return Err(ManagerError::RequiredExecutorFailed(kind, e.to_string()));
                }
                tracing::warn!(%kind, error = %e, "optional executor failed to initialize, dropping");
                continue;
            }

            self.connections.write().insert(kind, conn);
        }
        Ok(())
    }

    fn tap_connection(&self, kind: ExecutorKind, conn: &Arc<AgentConnection>) {
        let mut rx = conn.notifications();
        let tap_tx = self.tap_tx.clone();
        tokio::spawn(async move {
            while let Ok(notification) = rx.recv().await {
                let _ = tap_tx.send(TapEvent { executor_kind: kind, notification });
            }
        });
    }

    pub fn get(&self, kind: ExecutorKind) -> Option<Arc<AgentConnection>> {
        self.connections.read().get(&kind).cloned()
    }

    pub fn is_connected(&self, kind: ExecutorKind) -> bool {
        self.connections
            .read()
            .get(&kind)
            .map(|c| c.is_alive())
            .unwrap_or(false)
    }

    pub async fn shutdown_all(&self, grace: std::time::Duration) {
        let conns: Vec<_> = self.connections.write().drain().map(|(_, c)| c).collect();
        for conn in conns {
            match Arc::try_unwrap(conn) {
                Ok(conn) => conn.into_transport().shutdown(grace).await,
                Err(conn) => {
                    tracing::debug!("connection still referenced elsewhere, skipping graceful shutdown");
                    drop(conn);
                }
            }
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_required_primary_command_is_fatal() {
        let mgr = ConnectionManager::new();
        let config = ExecutorsConfig::default();
        let result = mgr.start(&config).await;
        assert!(result.is_err(), "primary executor has no command and is required");
    }

    #[tokio::test]
    async fn missing_optional_secondary_command_is_not_fatal() {
        let mgr = ConnectionManager::new();
        let mut config = ExecutorsConfig::default();
        config.primary.command = "true".into();
        config.primary.required = false;
        let result = mgr.start(&config).await;
        assert!(result.is_ok());
        assert!(!mgr.is_connected(ExecutorKind::Secondary));
    }
}
