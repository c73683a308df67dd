//! Side-channel framing: lines tagged `SC01` carry large streamed payloads
//! (e.g. tool output) outside the JSON-RPC request/response cycle, keyed by
//! an opaque `task_id`.
//!
//! If the child process exits while a task is still open, the store
//! reports it as `EndedWithoutConfirmation` rather than silently dropping
//! it — callers waiting on that task's completion need to know the stream
//! never reached a terminal `end` marker.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub const SIDE_CHANNEL_TAG: &str = "SC01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideChannelKind {
    Start,
    Chunk,
    End,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideChannelHeader {
    pub task_id: String,
    pub kind: SideChannelKind,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideChannelOutcome {
    Ended,
    EndedWithoutConfirmation,
}

#[derive(Default)]
pub struct SideChannelStore {
    open: Mutex<HashMap<String, Vec<String>>>,
}

impl SideChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw line, returning `Some` only when it carried the side
    /// channel tag. Updates open-task bookkeeping as a side effect.
    pub fn handle_line(&self, line: &str) -> Option<SideChannelHeader> {
        let rest = line.strip_prefix(SIDE_CHANNEL_TAG)?;
        let header: SideChannelHeader = serde_json::from_str(rest.trim()).ok()?;
        let mut open = self.open.lock();
        match header.kind {
            SideChannelKind::Start => {
                open.insert(header.task_id.clone(), Vec::new());
            }
            SideChannelKind::Chunk => {
                if let Some(buf) = open.get_mut(&header.task_id) {
                    buf.push(header.data.clone());
                }
            }
            SideChannelKind::End => {
                open.remove(&header.task_id);
            }
        }
        Some(header)
    }

    /// Called when the owning connection observes the child process exit.
    /// Any task still open at that point ended without a proper `end`
    /// marker.
    pub fn flush_on_exit(&self) -> Vec<(String, SideChannelOutcome)> {
        let mut open = self.open.lock();
        open.drain()
            .map(|(task_id, _)| (task_id, SideChannelOutcome::EndedWithoutConfirmation))
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(task_id: &str, kind: SideChannelKind, data: &str) -> String {
        let header = SideChannelHeader { task_id: task_id.into(), kind, data: data.into() };
        format!("{SIDE_CHANNEL_TAG}{}", serde_json::to_string(&header).unwrap())
    }

    #[test]
    fn non_tagged_line_is_ignored() {
        let store = SideChannelStore::new();
        assert!(store.handle_line(r#"{"jsonrpc":"2.0","id":1}"#).is_none());
    }

    #[test]
    fn start_chunk_end_closes_task() {
        let store = SideChannelStore::new();
        store.handle_line(&line("t1", SideChannelKind::Start, "")).unwrap();
        assert_eq!(store.open_count(), 1);
        store.handle_line(&line("t1", SideChannelKind::Chunk, "hello")).unwrap();
        store.handle_line(&line("t1", SideChannelKind::End, "")).unwrap();
        assert_eq!(store.open_count(), 0);
    }

    #[test]
    fn exit_with_open_task_reports_unconfirmed() {
        let store = SideChannelStore::new();
        store.handle_line(&line("t1", SideChannelKind::Start, "")).unwrap();
        store.handle_line(&line("t2", SideChannelKind::Start, "")).unwrap();
        store.handle_line(&line("t2", SideChannelKind::End, "")).unwrap();

        let outcomes = store.flush_on_exit();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0], ("t1".to_string(), SideChannelOutcome::EndedWithoutConfirmation));
        assert_eq!(store.open_count(), 0);
    }
}
