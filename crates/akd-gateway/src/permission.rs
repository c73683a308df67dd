//! Server-initiated requests from the agent: `requestPermission` is
//! forwarded to clients and parked until `resolve_permission` answers it;
//! `readTextFile`/`writeTextFile` are filesystem operations the daemon
//! performs directly on the agent's behalf and answers immediately.

use std::sync::Arc;

use akd_domain::event::{BroadcastEvent, PermissionOption};
use akd_domain::session::ExecutorKind;
use akd_protocol::jsonrpc::{JsonRpcError, JsonRpcNotification};
use akd_protocol::methods::{
    ReadTextFileParams, RequestPermissionParams, WriteTextFileParams, METHOD_READ_TEXT_FILE,
    METHOD_REQUEST_PERMISSION, METHOD_WRITE_TEXT_FILE,
};
use akd_sessions::permissions::OpenPermissionRequest;

use crate::daemon::Daemon;

impl Daemon {
    /// Route one server-initiated request observed on the connection tap.
    /// A no-op for any method that isn't one of the three this component
    /// owns.
    pub async fn handle_inbound_request(
        self: &Arc<Self>,
        kind: ExecutorKind,
        notification: JsonRpcNotification,
    ) {
        let Some(id) = notification.id else { return };
        let params = notification.params.unwrap_or(serde_json::Value::Null);

        match notification.method.as_str() {
            METHOD_REQUEST_PERMISSION => self.handle_request_permission(kind, id, params).await,
            METHOD_READ_TEXT_FILE => self.handle_read_text_file(kind, id, params).await,
            METHOD_WRITE_TEXT_FILE => self.handle_write_text_file(kind, id, params).await,
            _ => {}
        }
    }

    async fn handle_request_permission(self: &Arc<Self>, kind: ExecutorKind, id: u64, params: serde_json::Value) {
        let parsed: RequestPermissionParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unparseable requestPermission");
                return;
            }
        };

        self.permissions.track(
            parsed.request_id.clone(),
            OpenPermissionRequest { session_id: parsed.session_id.clone(), executor_kind: kind, rpc_id: id },
        );

        self.broadcast(BroadcastEvent::PermissionRequest {
            session_id: parsed.session_id,
            request_id: parsed.request_id,
            tool_call_id: parsed.tool_call_id,
            tool_name: parsed.tool_name,
            options: parsed
                .options
                .into_iter()
                .map(|o| PermissionOption { option_id: o.option_id, option_name: o.option_name })
                .collect(),
        });
    }

    async fn handle_read_text_file(&self, kind: ExecutorKind, id: u64, params: serde_json::Value) {
        let Ok(parsed) = serde_json::from_value::<ReadTextFileParams>(params) else { return };
        let Some(conn) = self.connections.get(kind) else { return };
        let result = match tokio::fs::read_to_string(&parsed.path).await {
            Ok(content) => Ok(serde_json::json!({ "content": content })),
            Err(e) => Err(JsonRpcError { code: -32001, message: e.to_string(), data: None }),
        };
        let _ = conn.respond(id, result).await;
    }

    async fn handle_write_text_file(&self, kind: ExecutorKind, id: u64, params: serde_json::Value) {
        let Ok(parsed) = serde_json::from_value::<WriteTextFileParams>(params) else { return };
        let Some(conn) = self.connections.get(kind) else { return };
        let result = match tokio::fs::write(&parsed.path, &parsed.content).await {
            Ok(()) => Ok(serde_json::json!({})),
            Err(e) => Err(JsonRpcError { code: -32001, message: e.to_string(), data: None }),
        };
        let _ = conn.respond(id, result).await;
    }

    /// The client command forwarding a user's permission choice to the
    /// agent. `option_id`/`option_name` of `None` denies the request.
    pub async fn resolve_permission(
        self: &Arc<Self>,
        request_id: &str,
        option_id: Option<String>,
        option_name: Option<String>,
    ) -> bool {
        let Some(open) = self.permissions.take(request_id) else { return false };
        self.reply_to_permission(&open, option_id.clone(), option_name).await;
        self.broadcast(BroadcastEvent::PermissionResolved {
            session_id: open.session_id,
            request_id: request_id.to_string(),
            option_id,
        });
        true
    }

    async fn reply_to_permission(
        &self,
        open: &OpenPermissionRequest,
        option_id: Option<String>,
        option_name: Option<String>,
    ) {
        let Some(conn) = self.connections.get(open.executor_kind) else { return };
        let result = Ok(serde_json::json!({ "optionId": option_id, "optionName": option_name }));
        let _ = conn.respond(open.rpc_id, result).await;
    }

    /// §5's cancellation invariant: any open permission requests for a
    /// session are released — denied once — before the `cancel` RPC is
    /// sent.
    pub async fn release_session_permissions(&self, session_id: &str) {
        for (request_id, open) in self.permissions.release_session(session_id) {
            self.reply_to_permission(&open, None, None).await;
            self.broadcast(BroadcastEvent::PermissionResolved {
                session_id: session_id.to_string(),
                request_id,
                option_id: None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use akd_domain::config::Config;
    use akd_pool::WorkerPool;
    use akd_rpc::manager::ConnectionManager;
    use akd_sessions::{KanbanStore, QueueRegistry, SessionRegistry};

    use super::*;

    fn test_daemon(state_dir: &std::path::Path) -> Arc<Daemon> {
        let kanban = KanbanStore::load(state_dir, 1).expect("kanban load");
        Daemon::new(
            Arc::new(Config::default()),
            Arc::new(ConnectionManager::new()),
            Arc::new(SessionRegistry::new()),
            Arc::new(QueueRegistry::new()),
            Arc::new(kanban),
            Arc::new(WorkerPool::new(Default::default())),
        )
    }

    #[tokio::test]
    async fn resolve_permission_is_false_for_unknown_request() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = test_daemon(dir.path());
        assert!(!daemon.resolve_permission("no-such-request", None, None).await);
    }

    #[tokio::test]
    async fn release_session_permissions_is_noop_with_nothing_open() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = test_daemon(dir.path());
        daemon.release_session_permissions("s1").await;
        assert_eq!(daemon.permissions.open_count("s1"), 0);
    }
}
