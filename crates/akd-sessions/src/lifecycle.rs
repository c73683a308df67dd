//! Startup recovery and idle-session pruning.
//!
//! On startup, every session the kanban overlay still marks `in_progress`
//! was mid-turn when the process died. §4.6 says to attempt a real
//! `session/resume` against the agent for each of those; only the ones
//! that fail to resume get moved to `in_review` with a synthetic error
//! turn and `StopReason::ServerRestart`. Idle pruning runs periodically
//! thereafter to keep the registry from growing without bound.

use std::time::Duration;

use akd_domain::kanban::{Column, KanbanOp};
use akd_domain::session::{ExecutorKind, StopReason};
use akd_rpc::manager::ConnectionManager;

use crate::kanban_store::KanbanStore;
use crate::registry::SessionRegistry;

/// What happened to one session evaluated during startup recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Session had no `in_progress` override; left as-is.
    Untouched,
    /// The agent successfully resumed the session's conversation.
    Resumed,
    /// Resume failed (or no connection was available); the session was
    /// moved to `in_review` with a synthetic error turn.
    MarkedInterrupted,
}

/// Reconcile the registry against a restart: every session the kanban
/// overlay left in the `in_progress` column gets a real resume attempt
/// against its executor. Sessions with no executor-kind record, no live
/// connection, or a failing resume call are moved to `in_review` and
/// given a synthetic error turn with `stopReason=server_restart`; this
/// never panics the boot sequence — the daemon must still come up even
/// if every resume fails.
pub async fn recover_on_startup(
    registry: &SessionRegistry,
    kanban: &KanbanStore,
    connections: &ConnectionManager,
) -> Vec<(String, RecoveryOutcome)> {
    let snapshot = kanban.snapshot();
    let mut outcomes = Vec::new();

    for (session_id, column) in &snapshot.column_overrides {
        if *column != Column::InProgress {
            continue;
        }

        let kind = kanban.get_session_executor_type(session_id).unwrap_or(ExecutorKind::Primary);
        if !registry.contains(session_id) {
            registry.register(session_id.clone(), kind);
            registry.set_live(session_id, false);
        }

        let resumed = match connections.get(kind) {
            Some(conn) => conn.resume_session(session_id.clone()).await.is_ok(),
            None => false,
        };

        if resumed {
            registry.set_live(session_id, true);
            outcomes.push((session_id.clone(), RecoveryOutcome::Resumed));
        } else {
            registry.set_live(session_id, false);
            registry.force_synthetic_error_turn(session_id, StopReason::ServerRestart);
            let _ = kanban.apply_batch(vec![KanbanOp::SetColumn {
                session_id: session_id.clone(),
                column: Column::InReview,
            }]);
            outcomes.push((session_id.clone(), RecoveryOutcome::MarkedInterrupted));
        }
    }

    outcomes
}

/// Remove sessions that have been idle longer than `stale_after`. Returns
/// the ids removed, so the caller can prune the same ids from the kanban
/// store's `valid` set in the same pass.
pub fn prune_stale_sessions(registry: &SessionRegistry, stale_after: Duration) -> Vec<String> {
    let stale = registry.stale_ids(stale_after);
    for id in &stale {
        registry.remove(id);
    }
    stale
}

#[cfg(test)]
mod tests {
    use super::*;
    use akd_domain::kanban::KanbanOp;

    #[tokio::test]
    async fn session_with_no_in_progress_override_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let reg = SessionRegistry::new();
        let kanban = KanbanStore::load(dir.path(), 1).unwrap();
        let connections = ConnectionManager::new();

        let outcomes = recover_on_startup(&reg, &kanban, &connections).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn in_progress_override_with_no_connection_is_marked_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let reg = SessionRegistry::new();
        let kanban = KanbanStore::load(dir.path(), 1).unwrap();
        kanban
            .apply_batch(vec![KanbanOp::SetColumn { session_id: "s1".into(), column: Column::InProgress }])
            .unwrap();
        let connections = ConnectionManager::new();

        let outcomes = recover_on_startup(&reg, &kanban, &connections).await;
        assert_eq!(outcomes, vec![("s1".to_string(), RecoveryOutcome::MarkedInterrupted)]);
        assert_eq!(
            reg.with_turn("s1", |t| t.stop_reason).unwrap(),
            Some(StopReason::ServerRestart)
        );
        assert_eq!(kanban.snapshot().column_overrides["s1"], Column::InReview);
        assert_eq!(reg.with_session("s1", |s| s.live).unwrap(), false);
    }

    #[test]
    fn idle_session_is_pruned() {
        let reg = SessionRegistry::new();
        reg.register("s1", ExecutorKind::Primary);
        let removed = prune_stale_sessions(&reg, Duration::from_secs(0));
        assert_eq!(removed, vec!["s1".to_string()]);
        assert!(!reg.contains("s1"));
    }

    #[test]
    fn fresh_session_is_not_pruned() {
        let reg = SessionRegistry::new();
        reg.register("s1", ExecutorKind::Primary);
        let removed = prune_stale_sessions(&reg, Duration::from_secs(3600));
        assert!(removed.is_empty());
        assert!(reg.contains("s1"));
    }
}
