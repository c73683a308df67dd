//! Daemon construction extracted from `main.rs`.
//!
//! This module exposes the shared "boot" path used by the `serve` and
//! `chat` subcommands so both can start the full runtime — connection
//! manager, session registry, kanban store, worker pool — without either
//! one duplicating the wiring.

use std::sync::Arc;

use anyhow::Context;

use akd_domain::config::{Config, ConfigSeverity};
use akd_pool::WorkerPool;
use akd_rpc::manager::ConnectionManager;
use akd_sessions::{KanbanStore, QueueRegistry, SessionRegistry};

use crate::daemon::Daemon;

/// Validate config, initialize every subsystem, run startup recovery and
/// return an installed [`Daemon`].
pub async fn build_daemon(config: Arc<Config>) -> anyhow::Result<Arc<Daemon>> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Connection manager (primary/secondary agent subprocesses) ───
    let connections = Arc::new(ConnectionManager::new());
    connections
        .start(&config.executors)
        .await
        .context("starting executor connections")?;
    tracing::info!(
        primary = connections.is_connected(akd_domain::session::ExecutorKind::Primary),
        secondary = connections.is_connected(akd_domain::session::ExecutorKind::Secondary),
        "executor connections ready"
    );

    // ── Session registry, queues, kanban store ───────────────────────
    let sessions = Arc::new(SessionRegistry::new());
    let queues = Arc::new(QueueRegistry::new());
    let kanban = Arc::new(
        KanbanStore::load(std::path::Path::new(&config.state.state_dir), config.state.schema_version)
            .context("loading kanban store")?,
    );
    tracing::info!(state_dir = %config.state.state_dir, "session registry + kanban store ready");

    // ── Startup recovery: resume in-progress sessions, or mark them
    // interrupted if the agent can't pick them back up (§4.6) ─────────
    let recovered = akd_sessions::recover_on_startup(&sessions, &kanban, &connections).await;
    if !recovered.is_empty() {
        tracing::info!(count = recovered.len(), "ran startup recovery over in-progress sessions");
    }

    // ── Worker pool (pre-warmed fast-model connection) ───────────────
    let pool = Arc::new(WorkerPool::new(config.worker_pool.clone()));
    if let Err(e) = pool.warmup(&config.executors.secondary).await {
        tracing::warn!(error = %e, "worker pool warmup failed — pool calls will cold-start");
    } else {
        tracing::info!("worker pool warmed");
    }

    let daemon = Daemon::new(config, connections, sessions, queues, kanban, pool);
    Daemon::install(daemon.clone());

    // ── Streaming notification forwarding ────────────────────────────
    // Every `session/update` notification from either executor is routed
    // to the daemon's turn-state machine, regardless of which connection
    // it arrived on — the session registry, not the tap, is the source
    // of truth for which session owns it.
    {
        let daemon_for_updates = daemon.clone();
        let mut tap = daemon_for_updates.connections.subscribe_tap();
        tokio::spawn(async move {
            while let Ok(event) = tap.recv().await {
                if event.notification.is_request() {
                    daemon_for_updates
                        .handle_inbound_request(event.executor_kind, event.notification)
                        .await;
                    continue;
                }
                if event.notification.method != "session/update" {
                    continue;
                }
                let Some(params) = event.notification.params else { continue };
                let update: akd_protocol::methods::SessionUpdate = match serde_json::from_value(params.clone()) {
                    Ok(u) => u,
                    Err(e) => {
                        tracing::debug!(error = %e, "ignoring unparseable session/update");
                        continue;
                    }
                };
                let session_id = session_id_of(&update).to_string();
                daemon_for_updates.handle_session_update(&session_id, update, params);
            }
        });
    }

    // ── Periodic idle-session pruning ─────────────────────────────────
    {
        let daemon_for_prune = daemon.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                let stale_after = std::time::Duration::from_secs(daemon_for_prune.config.state.stale_session_secs);
                let pruned = akd_sessions::prune_stale_sessions(&daemon_for_prune.sessions, stale_after);
                if !pruned.is_empty() {
                    tracing::info!(count = pruned.len(), "pruned idle sessions");
                    daemon_for_prune.broadcast_sessions().await;
                }
            }
        });
    }

    Ok(daemon)
}

fn session_id_of(update: &akd_protocol::methods::SessionUpdate) -> &str {
    use akd_protocol::methods::SessionUpdate;
    match update {
        SessionUpdate::TextChunk { session_id, .. }
        | SessionUpdate::ThoughtChunk { session_id, .. }
        | SessionUpdate::ToolCall { session_id, .. }
        | SessionUpdate::ToolCallUpdate { session_id, .. }
        | SessionUpdate::Plan { session_id, .. }
        | SessionUpdate::TurnEnded { session_id, .. }
        | SessionUpdate::Usage { session_id, .. } => session_id,
    }
}

#[cfg(test)]
mod tests {
    use super::session_id_of;
    use akd_protocol::methods::SessionUpdate;

    #[test]
    fn session_id_of_covers_every_variant() {
        let variants = vec![
            SessionUpdate::TextChunk { session_id: "s1".into(), turn_id: "t1".into(), text: "hi".into() },
            SessionUpdate::ThoughtChunk { session_id: "s2".into(), turn_id: "t2".into(), text: "hmm".into() },
            SessionUpdate::ToolCall {
                session_id: "s3".into(),
                turn_id: "t3".into(),
                tool_call_id: "tc1".into(),
                tool_name: "Bash".into(),
                tool_kind: None,
            },
            SessionUpdate::ToolCallUpdate {
                session_id: "s4".into(),
                turn_id: "t4".into(),
                tool_call_id: "tc1".into(),
                status: "completed".into(),
            },
            SessionUpdate::Plan { session_id: "s5".into(), turn_id: "t5".into() },
            SessionUpdate::TurnEnded { session_id: "s6".into(), turn_id: "t6".into(), reason: "end_turn".into() },
            SessionUpdate::Usage { session_id: "s7".into(), turn_id: "t7".into(), approx_tokens: 1, thinking_ms: 2 },
        ];
        let expected = ["s1", "s2", "s3", "s4", "s5", "s6", "s7"];
        for (update, id) in variants.iter().zip(expected) {
            assert_eq!(session_id_of(update), id);
        }
    }
}
