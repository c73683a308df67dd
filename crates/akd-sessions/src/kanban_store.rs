//! Durable kanban overlay + executor/managed-session registries — wraps
//! [`KanbanSnapshot`] plus the persisted executor-kind and managed-session
//! maps (§4.6) with JSON-file persistence under
//! `<state_dir>/state/kanban.json`. Uses an atomic write-then-rename: a
//! write goes to a sibling `.tmp` path first and is renamed into place so
//! a crash mid-write never leaves a half-written snapshot on disk.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use akd_domain::error::{Error, Result};
use akd_domain::kanban::{KanbanLogEntry, KanbanOp, KanbanSnapshot};
use akd_domain::session::ExecutorKind;
use parking_lot::RwLock;

/// Metadata the daemon keeps about a session it manages outside the live
/// agent registry — enough to recreate or resume it without a live
/// connection (§4.6 `registerManagedSession`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagedSessionInfo {
    #[serde(default)]
    pub project_path: Option<String>,
}

/// Everything persisted under `kanban.json`: the kanban column overlay,
/// which executor kind each session belongs to, and the managed-session
/// registry startup recovery reads from.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedState {
    kanban: KanbanSnapshot,
    #[serde(default)]
    executor_kinds: HashMap<String, ExecutorKind>,
    #[serde(default)]
    managed_sessions: HashMap<String, ManagedSessionInfo>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            kanban: KanbanSnapshot::default(),
            executor_kinds: HashMap::new(),
            managed_sessions: HashMap::new(),
        }
    }
}

pub struct KanbanStore {
    path: PathBuf,
    expected_schema_version: u32,
    state: RwLock<PersistedState>,
}

impl KanbanStore {
    /// Load the snapshot at `state_dir/state/kanban.json`, or start empty
    /// if the file doesn't exist or its schema version doesn't match
    /// `expected_schema_version` — on mismatch the log replays from empty
    /// rather than attempting to migrate.
    pub fn load(state_dir: &Path, expected_schema_version: u32) -> Result<Self> {
        let path = state_dir.join("state").join("kanban.json");
        let state = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<PersistedState>(&raw) {
                Ok(s) if s.kanban.schema_version == expected_schema_version => s,
                Ok(_) => {
                    tracing::warn!("kanban snapshot schema mismatch, replaying from empty");
                    PersistedState::default()
                }
                Err(e) => {
                    tracing::warn!(error = %e, "kanban snapshot corrupt, replaying from empty");
                    PersistedState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PersistedState::default(),
            Err(e) => return Err(Error::Io(e)),
        };

        Ok(Self {
            path,
            expected_schema_version,
            state: RwLock::new(state),
        })
    }

    pub fn snapshot(&self) -> KanbanSnapshot {
        self.state.read().kanban.clone()
    }

    /// Apply a batch transactionally and persist the result.
    pub fn apply_batch(&self, ops: Vec<KanbanOp>) -> Result<Vec<KanbanLogEntry>> {
        let entries = {
            let mut state = self.state.write();
            state.kanban.apply_batch(ops).map_err(Error::Other)?
        };
        self.flush()?;
        Ok(entries)
    }

    /// Drop overlay entries, executor-kind mappings, and managed-session
    /// entries whose session id has fallen out of `valid`. Returns `true`
    /// if anything was removed.
    pub fn clean_stale(&self, valid: &std::collections::HashSet<String>) -> Result<bool> {
        let removed = {
            let mut state = self.state.write();
            let kanban_changed = state.kanban.clean_stale(valid);
            let before_kinds = state.executor_kinds.len();
            state.executor_kinds.retain(|id, _| valid.contains(id));
            let before_managed = state.managed_sessions.len();
            state.managed_sessions.retain(|id, _| valid.contains(id));
            kanban_changed
                || state.executor_kinds.len() != before_kinds
                || state.managed_sessions.len() != before_managed
        };
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }

    // ── §4.6 executor-kind registry ───────────────────────────────────

    pub fn set_session_executor_type(&self, session_id: &str, kind: ExecutorKind) -> Result<()> {
        self.state.write().executor_kinds.insert(session_id.to_string(), kind);
        self.flush()
    }

    pub fn get_session_executor_type(&self, session_id: &str) -> Option<ExecutorKind> {
        self.state.read().executor_kinds.get(session_id).copied()
    }

    pub fn get_all_session_executor_types(&self) -> HashMap<String, ExecutorKind> {
        self.state.read().executor_kinds.clone()
    }

    pub fn delete_session_executor_type(&self, session_id: &str) -> Result<()> {
        self.state.write().executor_kinds.remove(session_id);
        self.flush()
    }

    // ── §4.6 managed-session registry ─────────────────────────────────

    pub fn register_managed_session(&self, session_id: &str, info: ManagedSessionInfo) -> Result<()> {
        self.state.write().managed_sessions.insert(session_id.to_string(), info);
        self.flush()
    }

    pub fn get_managed_session_info(&self, session_id: &str) -> Option<ManagedSessionInfo> {
        self.state.read().managed_sessions.get(session_id).cloned()
    }

    pub fn get_managed_session_ids(&self) -> Vec<String> {
        self.state.read().managed_sessions.keys().cloned().collect()
    }

    pub fn delete_managed_session(&self, session_id: &str) -> Result<()> {
        self.state.write().managed_sessions.remove(session_id);
        self.flush()
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let state = self.state.read();
        let json = serde_json::to_string_pretty(&*state)?;
        drop(state);

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn schema_version(&self) -> u32 {
        self.expected_schema_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use akd_domain::kanban::Column;
    use std::collections::HashSet;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = KanbanStore::load(dir.path(), 1).unwrap();
        store
            .apply_batch(vec![KanbanOp::SetColumn { session_id: "s1".into(), column: Column::Backlog }])
            .unwrap();

        let reloaded = KanbanStore::load(dir.path(), 1).unwrap();
        assert_eq!(reloaded.snapshot().column_overrides.len(), 1);
    }

    #[test]
    fn schema_mismatch_replays_from_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = KanbanStore::load(dir.path(), 1).unwrap();
        store
            .apply_batch(vec![KanbanOp::SetColumn { session_id: "s1".into(), column: Column::Backlog }])
            .unwrap();

        let reloaded = KanbanStore::load(dir.path(), 2).unwrap();
        assert_eq!(reloaded.snapshot().column_overrides.len(), 0);
    }

    #[test]
    fn clean_stale_removes_unreferenced_overlay_and_registries() {
        let dir = tempfile::tempdir().unwrap();
        let store = KanbanStore::load(dir.path(), 1).unwrap();
        store
            .apply_batch(vec![
                KanbanOp::SetColumn { session_id: "c1".into(), column: Column::Backlog },
                KanbanOp::SetColumn { session_id: "c2".into(), column: Column::Backlog },
            ])
            .unwrap();
        store.set_session_executor_type("c1", ExecutorKind::Primary).unwrap();
        store.set_session_executor_type("c2", ExecutorKind::Primary).unwrap();

        let mut valid = HashSet::new();
        valid.insert("c1".to_string());
        let removed = store.clean_stale(&valid).unwrap();
        assert!(removed);
        assert_eq!(store.snapshot().column_overrides.len(), 1);
        assert_eq!(store.get_all_session_executor_types().len(), 1);

        let removed_again = store.clean_stale(&valid).unwrap();
        assert!(!removed_again);
    }

    #[test]
    fn managed_session_registry_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = KanbanStore::load(dir.path(), 1).unwrap();
        store
            .register_managed_session("s1", ManagedSessionInfo { project_path: Some("/repo".into()) })
            .unwrap();
        assert_eq!(store.get_managed_session_ids(), vec!["s1".to_string()]);
        assert_eq!(store.get_managed_session_info("s1").unwrap().project_path, Some("/repo".into()));

        store.delete_managed_session("s1").unwrap();
        assert!(store.get_managed_session_info("s1").is_none());
    }
}
