//! The daemon's public command surface — everything a transport invokes
//! on behalf of a connected client. Mostly thin wrappers: the real logic
//! lives in `turn.rs` (prompt state machine) and `broadcast.rs`
//! (coalesced session list).

use std::sync::Arc;

use akd_domain::error::{Error, Result};
use akd_domain::event::BroadcastEvent;
use akd_domain::session::ExecutorKind;
use akd_protocol::session_gone::is_session_gone;

use crate::daemon::Daemon;

pub struct CreateSessionResult {
    pub session_id: String,
}

impl Daemon {
    pub async fn create_session(self: &Arc<Self>, executor: ExecutorKind, project_path: Option<String>) -> Result<CreateSessionResult> {
        let Some(conn) = self.connections.get(executor) else {
            return Err(Error::Executor { kind: executor.to_string(), message: "no connection".into() });
        };
        let created = conn.new_session(project_path.clone()).await?;
        self.sessions.register(created.session_id.clone(), executor);
        self.kanban.set_session_executor_type(&created.session_id, executor)?;
        self.kanban.register_managed_session(
            &created.session_id,
            akd_sessions::ManagedSessionInfo { project_path },
        )?;
        Ok(CreateSessionResult { session_id: created.session_id })
    }

    /// Idempotent — a no-op if the session is already registered and live.
    /// Otherwise performs a real `session/resume` RPC against the
    /// session's recorded executor kind and registers the session on
    /// success.
    pub async fn resume_session(&self, session_id: &str) -> Result<()> {
        if self.sessions.with_session(session_id, |s| s.live).unwrap_or(false) {
            return Ok(());
        }
        let kind = self
            .kanban
            .get_session_executor_type(session_id)
            .or_else(|| self.sessions.executor_kind(session_id))
            .unwrap_or(ExecutorKind::Primary);
        let Some(conn) = self.connections.get(kind) else {
            return Err(Error::Executor { kind: kind.to_string(), message: "no connection".into() });
        };
        conn.resume_session(session_id.to_string()).await?;
        if !self.sessions.contains(session_id) {
            self.sessions.register(session_id.to_string(), kind);
        }
        self.sessions.set_live(session_id, true);
        Ok(())
    }

    /// Routed through the pre-warmed worker pool for latency-critical
    /// task starts, bypassing the full RPC session lifecycle.
    pub async fn pool_prompt(&self, prompt: &str) -> Result<Vec<akd_pool::PoolStreamChunk>> {
        self.pool.stream(prompt).await
    }

    pub fn enqueue_message(&self, session_id: &str, text: String) {
        let queued = self.queues.enqueue(session_id, text.clone());
        self.broadcast(BroadcastEvent::MessageQueued {
            session_id: session_id.to_string(),
            queue_id: queued.id,
            text,
        });
    }

    /// No-op if the queue doesn't contain `queue_id`. Emits
    /// `queue_cancelled` on a successful cancel (§4.4).
    pub fn cancel_queued_message(&self, session_id: &str, queue_id: &str) -> bool {
        let cancelled = self.queues.cancel_queued(session_id, queue_id);
        if cancelled {
            self.broadcast(BroadcastEvent::QueueCancelled {
                session_id: session_id.to_string(),
                queue_id: queue_id.to_string(),
            });
        }
        cancelled
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<Vec<String>> {
        let Some(kind) = self.sessions.executor_kind(session_id) else {
            return Err(Error::SessionNotFound(session_id.to_string()));
        };
        if let Some(conn) = self.connections.get(kind) {
            let result = conn.ext_method("sessions/delete".into(), serde_json::json!({ "sessionId": session_id })).await;
            if let Err(e) = result {
                if !is_session_gone(&e) {
                    return Err(e);
                }
            }
        }
        self.sessions.remove(session_id);
        Ok(vec![session_id.to_string()])
    }

    /// Decide whether `text` continues the current session or should
    /// start a fresh one, via the worker pool's fast classification
    /// model. Whitelisted utterances are handled entirely inside
    /// `WorkerPool::route` and never reach the model.
    pub async fn route_with_fast_model(&self, text: &str, session_title: Option<&str>, last_summary: Option<&str>) -> bool {
        self.pool.route(text, session_title, last_summary).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use akd_domain::config::Config;
    use akd_domain::session::ExecutorKind;
    use akd_pool::WorkerPool;
    use akd_rpc::manager::ConnectionManager;
    use akd_sessions::{KanbanStore, QueueRegistry, SessionRegistry};

    use crate::daemon::Daemon;

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
    async fn resume_session_rejects_unregistered_id() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = test_daemon(dir.path());
        assert!(daemon.resume_session("nope").await.is_err());
    }

    #[tokio::test]
    async fn resume_session_is_noop_for_registered_id() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = test_daemon(dir.path());
        daemon.sessions.register("s1", ExecutorKind::Primary);
        assert!(daemon.resume_session("s1").await.is_ok());
    }

    #[tokio::test]
    async fn delete_session_removes_local_state_without_a_live_connection() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = test_daemon(dir.path());
        daemon.sessions.register("s1", ExecutorKind::Primary);

        let deleted = daemon.delete_session("s1").await.expect("delete should succeed");
        assert_eq!(deleted, vec!["s1".to_string()]);
        assert!(!daemon.sessions.contains("s1"));
    }

    #[tokio::test]
    async fn delete_session_fails_for_unknown_session() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = test_daemon(dir.path());
        assert!(daemon.delete_session("ghost").await.is_err());
    }

    #[test]
    fn cancel_queued_message_is_false_for_unknown_queue_id() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = test_daemon(dir.path());
        assert!(!daemon.cancel_queued_message("s1", "no-such-id"));
    }
}
