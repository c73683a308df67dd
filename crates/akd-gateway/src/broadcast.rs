//! `broadcastSessions` (§4.2.2): queries every connected executor's own
//! `sessions/list` concurrently, merges the results with the locally
//! managed set, tags liveness and `managedButUnlisted`, and prunes the
//! kanban op log of any entry whose session id has fallen out of the
//! locally valid set. Coalesced so at most one round trip is in flight at
//! a time.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;

use akd_domain::event::{BroadcastEvent, ExecutorConnectionState, SessionSummary};
use akd_domain::session::{ExecutorKind, TurnStatus};

use crate::daemon::Daemon;

impl Daemon {
    /// Coalesced session-list broadcast. If a call is already in flight
    /// and hasn't gone stale, this is a no-op — the caller that started
    /// the in-flight call will broadcast on everyone's behalf.
    pub async fn broadcast_sessions(self: &Arc<Self>) {
        if !self.coalescer.should_run() {
            return;
        }
        self.do_broadcast_sessions().await;
        self.coalescer.finish();
    }

    async fn do_broadcast_sessions(self: &Arc<Self>) {
        let local_ids: HashSet<String> = self.sessions.ids().into_iter().collect();
        let listed = self.query_agent_sessions().await;

        let mut all_ids: HashSet<&String> = local_ids.iter().collect();
        all_ids.extend(listed.keys());

        let mut summaries = Vec::with_capacity(all_ids.len());
        for id in all_ids {
            let is_listed = listed.contains_key(id);
            if let Some((executor_kind, live, turn)) = self.sessions.summary(id) {
                summaries.push(SessionSummary {
                    id: id.clone(),
                    executor_kind,
                    live: live || is_listed,
                    status: turn.status,
                    activity: turn.activity,
                    approx_tokens: turn.approx_tokens,
                    thinking_duration_ms: turn.thinking_duration_ms,
                    managed_but_unlisted: !is_listed,
                });
            } else if let Some(&executor_kind) = listed.get(id) {
                // The agent knows about this session but the daemon doesn't
                // manage it locally (e.g. pre-existing at startup) — surface
                // it anyway rather than hiding it from the list.
                summaries.push(SessionSummary {
                    id: id.clone(),
                    executor_kind,
                    live: true,
                    status: TurnStatus::Idle,
                    activity: None,
                    approx_tokens: 0,
                    thinking_duration_ms: 0,
                    managed_but_unlisted: false,
                });
            }
        }

        self.broadcast(BroadcastEvent::Sessions { sessions: summaries });

        match self.kanban.clean_stale(&local_ids) {
            Ok(true) => self.broadcast(BroadcastEvent::KanbanStateChanged { entries: Vec::new() }),
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "failed to prune kanban store"),
        }
    }

    /// Query every connected executor's `sessions/list` ext method
    /// concurrently and merge the results into one id → executor-kind map.
    /// A connection with no live connection, or one whose call fails, is
    /// skipped rather than failing the whole broadcast.
    async fn query_agent_sessions(&self) -> HashMap<String, ExecutorKind> {
        let calls = ExecutorKind::all().into_iter().map(|kind| async move {
            let Some(conn) = self.connections.get(kind) else {
                return (kind, Vec::new());
            };
            match conn.ext_method("sessions/list".to_string(), serde_json::json!({})).await {
                Ok(value) => (kind, parse_session_ids(value)),
                Err(e) => {
                    tracing::debug!(%kind, error = %e, "sessions/list failed, treating as empty");
                    (kind, Vec::new())
                }
            }
        });

        let mut merged = HashMap::new();
        for (kind, ids) in join_all(calls).await {
            for id in ids {
                merged.insert(id, kind);
            }
        }
        merged
    }

    /// Report an executor connection's liveness change by broadcasting a
    /// fresh snapshot of every executor's connection state — the
    /// connection manager is the source of truth for which are live, so
    /// the arguments only identify which one triggered the report.
    pub fn report_executor_connection(&self, kind: ExecutorKind, connected: bool) {
        tracing::info!(%kind, connected, "executor connection state changed");
        let connections = ExecutorKind::all()
            .into_iter()
            .map(|k| ExecutorConnectionState { executor_kind: k, connected: self.connections.is_connected(k) })
            .collect();
        self.broadcast(BroadcastEvent::Executors { connections });
    }
}

fn parse_session_ids(value: serde_json::Value) -> Vec<String> {
    #[derive(serde::Deserialize)]
    struct Entry {
        #[serde(rename = "sessionId")]
        session_id: String,
    }
    #[derive(serde::Deserialize, Default)]
    struct ListResult {
        #[serde(default)]
        sessions: Vec<Entry>,
    }
    serde_json::from_value::<ListResult>(value)
        .map(|r| r.sessions.into_iter().map(|e| e.session_id).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use akd_domain::config::Config;
    use akd_domain::event::BroadcastEvent;
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
    async fn broadcast_sessions_emits_every_registered_session() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = test_daemon(dir.path());
        daemon.sessions.register("s1", ExecutorKind::Primary);
        daemon.sessions.register("s2", ExecutorKind::Secondary);

        let seen: Arc<Mutex<Vec<BroadcastEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        daemon.set_event_sink(Arc::new(move |event| sink.lock().unwrap().push(event)));

        daemon.broadcast_sessions().await;

        let events = seen.lock().unwrap();
        let snapshot = events.iter().find_map(|e| match e {
            BroadcastEvent::Sessions { sessions } => Some(sessions),
            _ => None,
        });
        let sessions = snapshot.expect("a Sessions event was broadcast");
        assert_eq!(sessions.len(), 2);
    }

    #[tokio::test]
    async fn sessions_with_no_live_connection_are_managed_but_unlisted() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = test_daemon(dir.path());
        daemon.sessions.register("s1", ExecutorKind::Primary);

        let seen: Arc<Mutex<Vec<BroadcastEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        daemon.set_event_sink(Arc::new(move |event| sink.lock().unwrap().push(event)));

        daemon.broadcast_sessions().await;

        let events = seen.lock().unwrap();
        let sessions = events
            .iter()
            .find_map(|e| match e {
                BroadcastEvent::Sessions { sessions } => Some(sessions.clone()),
                _ => None,
            })
            .unwrap();
        assert!(sessions[0].managed_but_unlisted, "no connection means the agent never listed it");
    }

    #[tokio::test]
    async fn report_executor_connection_emits_a_full_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = test_daemon(dir.path());

        let seen: Arc<Mutex<Vec<BroadcastEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        daemon.set_event_sink(Arc::new(move |event| sink.lock().unwrap().push(event)));

        daemon.report_executor_connection(ExecutorKind::Primary, false);

        let events = seen.lock().unwrap();
        let connections = events
            .iter()
            .find_map(|e| match e {
                BroadcastEvent::Executors { connections } => Some(connections.clone()),
                _ => None,
            })
            .expect("an Executors event was broadcast");
        assert_eq!(connections.len(), 2);
        assert!(connections.iter().all(|c| !c.connected));
    }
}
