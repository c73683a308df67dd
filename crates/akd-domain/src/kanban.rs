use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Kanban op log — a session-column overlay, not an independent board.
//
// Every entity here is a session id; there is no card/title/body of its
// own. `columnOverrides` says which column a session's row currently
// sits in (absence means the client falls back to deriving a column from
// turn state); `sortOrders` is the manual drag order within one column;
// `pendingPrompts` holds a draft the user typed into a session's box
// before sending it.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Backlog,
    InProgress,
    InReview,
    Recurring,
    Completed,
}

impl Column {
    pub fn all() -> [Column; 5] {
        [
            Column::Backlog,
            Column::InProgress,
            Column::InReview,
            Column::Recurring,
            Column::Completed,
        ]
    }
}

/// A single optimistic edit a client can make against the overlay.
/// `bulk_set_columns`/`bulk_remove_sort_entries` move many sessions in one
/// user gesture — each is journaled as one `KanbanOp`, not one per
/// session, so undo/redo and pruning treat it atomically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KanbanOp {
    SetColumn { session_id: String, column: Column },
    RemoveColumn { session_id: String },
    SetSortOrder { column: Column, order: Vec<String> },
    SetPendingPrompt { session_id: String, text: String },
    RemovePendingPrompt { session_id: String },
    BulkSetColumns { entries: Vec<(String, Column)> },
    BulkRemoveSortEntries { session_ids: Vec<String> },
}

/// One entry in the ordered op log: the op itself, a monotonic sequence
/// number, and when it was applied. `seq` is what clients use to detect
/// they've fallen behind the server-authoritative snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KanbanLogEntry {
    pub seq: u64,
    pub op: KanbanOp,
    pub applied_at: chrono::DateTime<chrono::Utc>,
}

/// The full, server-authoritative overlay state plus the log tail clients
/// reconcile their optimistic view against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KanbanSnapshot {
    pub schema_version: u32,
    pub column_overrides: HashMap<String, Column>,
    pub sort_orders: HashMap<Column, Vec<String>>,
    pub pending_prompts: HashMap<String, String>,
    pub next_seq: u64,
}

impl Default for KanbanSnapshot {
    fn default() -> Self {
        Self {
            schema_version: 1,
            column_overrides: HashMap::new(),
            sort_orders: HashMap::new(),
            pending_prompts: HashMap::new(),
            next_seq: 1,
        }
    }
}

impl KanbanSnapshot {
    /// Apply a batch of ops transactionally: every op in the batch is an
    /// unconditional overlay write (no "unknown card" failure mode is
    /// possible against this shape), so the batch always succeeds and is
    /// journaled as one entry per op.
    pub fn apply_batch(&mut self, ops: Vec<KanbanOp>) -> Result<Vec<KanbanLogEntry>, String> {
        let mut entries = Vec::with_capacity(ops.len());
        let now = chrono::Utc::now();

        for op in ops {
            self.apply_one(&op);
            entries.push(KanbanLogEntry {
                seq: self.next_seq,
                op,
                applied_at: now,
            });
            self.next_seq += 1;
        }

        Ok(entries)
    }

    fn apply_one(&mut self, op: &KanbanOp) {
        match op {
            KanbanOp::SetColumn { session_id, column } => {
                self.column_overrides.insert(session_id.clone(), *column);
            }
            KanbanOp::RemoveColumn { session_id } => {
                self.column_overrides.remove(session_id);
            }
            KanbanOp::SetSortOrder { column, order } => {
                self.sort_orders.insert(*column, order.clone());
            }
            KanbanOp::SetPendingPrompt { session_id, text } => {
                self.pending_prompts.insert(session_id.clone(), text.clone());
            }
            KanbanOp::RemovePendingPrompt { session_id } => {
                self.pending_prompts.remove(session_id);
            }
            KanbanOp::BulkSetColumns { entries } => {
                for (session_id, column) in entries {
                    self.column_overrides.insert(session_id.clone(), *column);
                }
            }
            KanbanOp::BulkRemoveSortEntries { session_ids } => {
                for order in self.sort_orders.values_mut() {
                    order.retain(|id| !session_ids.contains(id));
                }
            }
        }
    }

    /// Drop every overlay entry referencing a session id outside `valid`.
    /// Returns `true` if anything changed.
    pub fn clean_stale(&mut self, valid: &std::collections::HashSet<String>) -> bool {
        let before_columns = self.column_overrides.len();
        self.column_overrides.retain(|id, _| valid.contains(id));
        let columns_changed = self.column_overrides.len() != before_columns;

        let before_prompts = self.pending_prompts.len();
        self.pending_prompts.retain(|id, _| valid.contains(id));
        let prompts_changed = self.pending_prompts.len() != before_prompts;

        let mut sort_changed = false;
        for order in self.sort_orders.values_mut() {
            let before = order.len();
            order.retain(|id| valid.contains(id));
            sort_changed |= order.len() != before;
        }

        columns_changed || prompts_changed || sort_changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_column_then_remove() {
        let mut snap = KanbanSnapshot::default();
        let entries = snap
            .apply_batch(vec![KanbanOp::SetColumn { session_id: "s1".into(), column: Column::InProgress }])
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].seq, 1);
        assert_eq!(snap.next_seq, 2);
        assert_eq!(snap.column_overrides["s1"], Column::InProgress);

        snap.apply_batch(vec![KanbanOp::RemoveColumn { session_id: "s1".into() }]).unwrap();
        assert!(!snap.column_overrides.contains_key("s1"));
    }

    #[test]
    fn bulk_set_columns_is_one_log_entry() {
        let mut snap = KanbanSnapshot::default();
        let entries = snap
            .apply_batch(vec![KanbanOp::BulkSetColumns {
                entries: vec![("s1".into(), Column::Completed), ("s2".into(), Column::Completed)],
            }])
            .unwrap();

        assert_eq!(entries.len(), 1, "bulk move must journal as a single op");
        assert_eq!(snap.column_overrides["s1"], Column::Completed);
        assert_eq!(snap.column_overrides["s2"], Column::Completed);
    }

    #[test]
    fn set_sort_order_then_bulk_remove_entries() {
        let mut snap = KanbanSnapshot::default();
        snap.apply_batch(vec![KanbanOp::SetSortOrder {
            column: Column::Backlog,
            order: vec!["s1".into(), "s2".into(), "s3".into()],
        }])
        .unwrap();
        assert_eq!(snap.sort_orders[&Column::Backlog], vec!["s1", "s2", "s3"]);

        snap.apply_batch(vec![KanbanOp::BulkRemoveSortEntries { session_ids: vec!["s2".into()] }])
            .unwrap();
        assert_eq!(snap.sort_orders[&Column::Backlog], vec!["s1", "s3"]);
    }

    #[test]
    fn pending_prompt_set_and_removed() {
        let mut snap = KanbanSnapshot::default();
        snap.apply_batch(vec![KanbanOp::SetPendingPrompt { session_id: "s1".into(), text: "draft".into() }])
            .unwrap();
        assert_eq!(snap.pending_prompts["s1"], "draft");

        snap.apply_batch(vec![KanbanOp::RemovePendingPrompt { session_id: "s1".into() }]).unwrap();
        assert!(!snap.pending_prompts.contains_key("s1"));
    }

    #[test]
    fn clean_stale_removes_overlay_entries_for_unknown_sessions() {
        let mut snap = KanbanSnapshot::default();
        snap.apply_batch(vec![
            KanbanOp::SetColumn { session_id: "s1".into(), column: Column::Backlog },
            KanbanOp::SetColumn { session_id: "s2".into(), column: Column::Backlog },
            KanbanOp::SetSortOrder { column: Column::Backlog, order: vec!["s1".into(), "s2".into()] },
            KanbanOp::SetPendingPrompt { session_id: "s2".into(), text: "draft".into() },
        ])
        .unwrap();

        let mut valid = std::collections::HashSet::new();
        valid.insert("s1".to_string());
        let changed = snap.clean_stale(&valid);
        assert!(changed);
        assert!(!snap.column_overrides.contains_key("s2"));
        assert!(!snap.pending_prompts.contains_key("s2"));
        assert_eq!(snap.sort_orders[&Column::Backlog], vec!["s1"]);

        assert!(!snap.clean_stale(&valid));
    }
}
