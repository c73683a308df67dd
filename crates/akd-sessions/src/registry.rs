//! Session registry — owns every live [`Session`] and its [`TurnState`],
//! enforces the at-most-one-in-progress-turn invariant, and accumulates the
//! in-turn replay buffer a late-joining client needs to catch up on.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;

use akd_domain::error::{Error, Result};
use akd_domain::session::{
    Activity, ExecutorKind, Session, StopReason, TurnMeta, TurnState, TurnStatus,
};

use crate::turn::{derive_activity, derive_stop_reason};

/// Everything the registry tracks for one session: its identity, its turn
/// state machine, and the bookkeeping a late-joining client needs.
pub struct SessionRecord {
    pub session: Session,
    pub turn: TurnState,
    /// Bufferable updates since the current turn started; cleared on
    /// `turn_end`, replayed verbatim to clients that join mid-turn.
    pub replay_buffer: Vec<Value>,
    /// Session metadata (session_info / system / commands) replayed to new
    /// clients on session switch, independent of turn lifecycle.
    pub meta: HashMap<String, Value>,
}

impl SessionRecord {
    fn new(session: Session) -> Self {
        Self {
            session,
            turn: TurnState::default(),
            replay_buffer: Vec::new(),
            meta: HashMap::new(),
        }
    }
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, session_id: impl Into<String>, executor_kind: ExecutorKind) {
        let id = session_id.into();
        let session = Session::new(id.clone(), executor_kind);
        self.sessions.write().insert(id, SessionRecord::new(session));
    }

    pub fn remove(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.write().remove(session_id)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    pub fn executor_kind(&self, session_id: &str) -> Option<ExecutorKind> {
        self.sessions.read().get(session_id).map(|r| r.session.executor_kind)
    }

    pub fn ids(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    pub fn with_session<T>(&self, session_id: &str, f: impl FnOnce(&Session) -> T) -> Option<T> {
        self.sessions.read().get(session_id).map(|r| f(&r.session))
    }

    pub fn with_turn<T>(&self, session_id: &str, f: impl FnOnce(&TurnState) -> T) -> Option<T> {
        self.sessions.read().get(session_id).map(|r| f(&r.turn))
    }

    pub fn turn_status(&self, session_id: &str) -> Option<TurnStatus> {
        self.sessions.read().get(session_id).map(|r| r.turn.status)
    }

    /// Mark a session live/not-live — set on successful/failed resume
    /// during startup recovery, and on transparent replacement.
    pub fn set_live(&self, session_id: &str, live: bool) {
        if let Some(record) = self.sessions.write().get_mut(session_id) {
            record.session.live = live;
        }
    }

    /// The slim, read-only view `broadcastSessions` needs per session:
    /// executor kind, liveness, and the turn state in full (activity,
    /// token/thinking counters, completion stats).
    pub fn summary(&self, session_id: &str) -> Option<(ExecutorKind, bool, TurnState)> {
        self.sessions
            .read()
            .get(session_id)
            .map(|r| (r.session.executor_kind, r.session.live, r.turn.clone()))
    }

    /// Begin a new turn. Fails if one is already in progress for this
    /// session — the at-most-one-in-progress-turn invariant.
    pub fn start_turn(&self, session_id: &str, turn_id: impl Into<String>) -> Result<()> {
        let mut sessions = self.sessions.write();
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        if record.turn.is_in_progress() {
            return Err(Error::Other(format!(
                "session {session_id} already has a turn in progress"
            )));
        }
        record.turn = TurnState {
            status: TurnStatus::Processing,
            turn_id: Some(turn_id.into()),
            started_at: Some(chrono::Utc::now()),
            ..TurnState::default()
        };
        record.replay_buffer.clear();
        Ok(())
    }

    pub fn begin_cancelling(&self, session_id: &str) {
        if let Some(record) = self.sessions.write().get_mut(session_id) {
            if record.turn.status == TurnStatus::Processing {
                record.turn.status = TurnStatus::Cancelling;
            }
        }
    }

    /// End the current turn, filling in the agent's completion stats (if
    /// any) and `endedAt`/`durationMs` alongside the stop reason.
    pub fn end_turn(&self, session_id: &str, stop_reason: StopReason, meta: TurnMeta) {
        if let Some(record) = self.sessions.write().get_mut(session_id) {
            let now = chrono::Utc::now();
            record.turn.status = TurnStatus::TurnEnd;
            record.turn.stop_reason = Some(stop_reason);
            record.turn.ended_at = Some(now);
            record.turn.output_tokens = meta.output_tokens;
            record.turn.cost_usd = meta.cost_usd;
            record.turn.duration_ms = meta.duration_ms.or_else(|| {
                record
                    .turn
                    .started_at
                    .map(|start| now.signed_duration_since(start).num_milliseconds().max(0) as u64)
            });
            record.replay_buffer.clear();
        }
    }

    /// Force a session straight to a terminal, synthetic error turn —
    /// used by startup recovery for sessions that failed to resume, where
    /// there was never a live turn to end normally.
    pub fn force_synthetic_error_turn(&self, session_id: &str, stop_reason: StopReason) {
        let mut sessions = self.sessions.write();
        if let Some(record) = sessions.get_mut(session_id) {
            record.turn = TurnState {
                status: TurnStatus::TurnEnd,
                stop_reason: Some(stop_reason),
                ended_at: Some(chrono::Utc::now()),
                ..TurnState::default()
            };
        }
    }

    pub fn reset_to_idle(&self, session_id: &str) {
        if let Some(record) = self.sessions.write().get_mut(session_id) {
            record.turn = TurnState::default();
        }
    }

    /// Apply one streaming session update: derive activity, update token
    /// and thinking-duration counters, and buffer it if it's a bufferable
    /// type. Returns the derived activity, if any changed.
    pub fn apply_update(
        &self,
        session_id: &str,
        update: &akd_protocol::methods::SessionUpdate,
        raw: Value,
    ) -> Option<Activity> {
        use akd_protocol::methods::SessionUpdate;

        let mut sessions = self.sessions.write();
        let record = sessions.get_mut(session_id)?;

        let activity = derive_activity(update);
        if let Some((a, detail)) = &activity {
            record.turn.activity = Some(*a);
            record.turn.activity_detail = detail.clone();
        }
        if let Some(reason) = derive_stop_reason(update) {
            record.turn.stop_reason = Some(reason);
        }

        match update {
            SessionUpdate::TextChunk { text, .. } => {
                record.turn.approx_tokens += tokens_for(text);
            }
            SessionUpdate::ThoughtChunk { text, .. } => {
                record.turn.approx_tokens += tokens_for(text);
                let gap = chrono::Utc::now()
                    .signed_duration_since(
                        record.turn.thinking_last_chunk_at.unwrap_or(record.session.last_activity_at),
                    )
                    .num_milliseconds()
                    .max(0) as u64;
                record.turn.thinking_duration_ms += gap;
                record.turn.thinking_last_chunk_at = Some(chrono::Utc::now());
            }
            SessionUpdate::Usage { approx_tokens, thinking_ms, .. } => {
                record.turn.approx_tokens = record.turn.approx_tokens.max(*approx_tokens);
                record.turn.thinking_duration_ms = record.turn.thinking_duration_ms.max(*thinking_ms);
            }
            _ => {}
        }
        record.session.last_activity_at = chrono::Utc::now();

        if is_bufferable(update) {
            record.replay_buffer.push(raw);
        }

        activity.map(|(a, _)| a)
    }

    pub fn replay_buffer(&self, session_id: &str) -> Vec<Value> {
        self.sessions
            .read()
            .get(session_id)
            .map(|r| r.replay_buffer.clone())
            .unwrap_or_default()
    }

    /// Move a session's record to a new id wholesale — used when a session
    /// is transparently replaced after a "session gone" error. The old id
    /// is dropped from the registry entirely.
    pub fn replace(&self, old_id: &str, new_id: impl Into<String>) -> Option<()> {
        let mut sessions = self.sessions.write();
        let mut record = sessions.remove(old_id)?;
        let new_id = new_id.into();
        record.session.id = new_id.clone();
        sessions.insert(new_id, record);
        Some(())
    }

    pub fn set_meta(&self, session_id: &str, key: impl Into<String>, value: Value) {
        if let Some(record) = self.sessions.write().get_mut(session_id) {
            record.meta.insert(key.into(), value);
        }
    }

    pub fn meta(&self, session_id: &str) -> HashMap<String, Value> {
        self.sessions
            .read()
            .get(session_id)
            .map(|r| r.meta.clone())
            .unwrap_or_default()
    }

    /// Sessions idle longer than `max_idle`, for startup/periodic pruning.
    pub fn stale_ids(&self, max_idle: Duration) -> Vec<String> {
        let now = chrono::Utc::now();
        self.sessions
            .read()
            .iter()
            .filter_map(|(id, record)| {
                let idle = now.signed_duration_since(record.session.last_activity_at);
                if idle.to_std().unwrap_or_default() >= max_idle {
                    Some(id.clone())
                } else {
                    None
                }
            })
            .collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn tokens_for(text: &str) -> u64 {
    ((text.len() as u64) + 3) / 4
}

fn is_bufferable(update: &akd_protocol::methods::SessionUpdate) -> bool {
    use akd_protocol::methods::SessionUpdate;
    matches!(
        update,
        SessionUpdate::ThoughtChunk { .. }
            | SessionUpdate::TextChunk { .. }
            | SessionUpdate::ToolCall { .. }
            | SessionUpdate::ToolCallUpdate { .. }
            | SessionUpdate::Plan { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use akd_protocol::methods::SessionUpdate;

    #[test]
    fn at_most_one_turn_in_progress() {
        let reg = SessionRegistry::new();
        reg.register("s1", ExecutorKind::Primary);
        reg.start_turn("s1", "t1").unwrap();
        let err = reg.start_turn("s1", "t2");
        assert!(err.is_err());
    }

    #[test]
    fn end_turn_clears_replay_buffer() {
        let reg = SessionRegistry::new();
        reg.register("s1", ExecutorKind::Primary);
        reg.start_turn("s1", "t1").unwrap();
        let update = SessionUpdate::TextChunk {
            session_id: "s1".into(),
            turn_id: "t1".into(),
            text: "hello".into(),
        };
        reg.apply_update("s1", &update, serde_json::json!({"x": 1}));
        assert_eq!(reg.replay_buffer("s1").len(), 1);
        reg.end_turn("s1", StopReason::EndTurn, TurnMeta::default());
        assert_eq!(reg.replay_buffer("s1").len(), 0);
    }

    #[test]
    fn end_turn_fills_duration_from_started_at_when_meta_has_none() {
        let reg = SessionRegistry::new();
        reg.register("s1", ExecutorKind::Primary);
        reg.start_turn("s1", "t1").unwrap();
        reg.end_turn("s1", StopReason::EndTurn, TurnMeta::default());
        let duration = reg.with_turn("s1", |t| t.duration_ms).unwrap();
        assert!(duration.is_some());
    }

    #[test]
    fn approx_tokens_monotone_during_turn() {
        let reg = SessionRegistry::new();
        reg.register("s1", ExecutorKind::Primary);
        reg.start_turn("s1", "t1").unwrap();
        for chunk in ["abcd", "efgh", "ijkl"] {
            let update = SessionUpdate::TextChunk {
                session_id: "s1".into(),
                turn_id: "t1".into(),
                text: chunk.into(),
            };
            reg.apply_update("s1", &update, serde_json::json!({}));
        }
        let tokens = reg.with_turn("s1", |t| t.approx_tokens).unwrap();
        assert!(tokens >= 3);
    }

    #[test]
    fn tool_call_sets_activity_detail_on_brewing_fallback() {
        let reg = SessionRegistry::new();
        reg.register("s1", ExecutorKind::Primary);
        reg.start_turn("s1", "t1").unwrap();
        let update = SessionUpdate::ToolCall {
            session_id: "s1".into(),
            turn_id: "t1".into(),
            tool_call_id: "tc1".into(),
            tool_name: "CustomTool".into(),
            tool_kind: None,
        };
        reg.apply_update("s1", &update, serde_json::json!({}));
        let detail = reg.with_turn("s1", |t| t.activity_detail.clone()).unwrap();
        assert_eq!(detail, Some("CustomTool".into()));
    }

    #[test]
    fn replace_moves_record_to_new_id() {
        let reg = SessionRegistry::new();
        reg.register("old", ExecutorKind::Primary);
        reg.replace("old", "new").unwrap();
        assert!(!reg.contains("old"));
        assert!(reg.contains("new"));
        assert_eq!(
            reg.with_session("new", |s| s.id.clone()).unwrap(),
            "new"
        );
    }
}
