use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ExecutorKind
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which agent child process family a session belongs to. The set is
/// closed at compile time; whether a given kind's connection is actually
/// live at runtime is a property of the RPC connection manager, not of
/// this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    Primary,
    Secondary,
}

impl ExecutorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutorKind::Primary => "primary",
            ExecutorKind::Secondary => "secondary",
        }
    }

    pub fn all() -> [ExecutorKind; 2] {
        [ExecutorKind::Primary, ExecutorKind::Secondary]
    }
}

impl std::fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub executor_kind: ExecutorKind,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_activity_at: chrono::DateTime<chrono::Utc>,
    pub cwd: Option<String>,
    /// Whether the agent process currently holds an open conversational
    /// channel for this id. A session can exist on disk without being
    /// live, in which case it must be resumed before use.
    pub live: bool,
}

impl Session {
    pub fn new(id: String, executor_kind: ExecutorKind) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            executor_kind,
            created_at: now,
            last_activity_at: now,
            cwd: None,
            live: true,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn state machine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The turn lifecycle. Exactly one session is ever `Processing` or
/// `Cancelling` at a time per session id — the at-most-one-in-progress-turn
/// invariant is enforced by the registry, not by this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Idle,
    Queued,
    Processing,
    Cancelling,
    TurnEnd,
}

/// Fine-grained activity within `Processing`, derived from the streaming
/// notification taxonomy the agent process emits (§4.3's dispatch table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Brewing,
    Thinking,
    Responding,
    Reading,
    Editing,
    Running,
    Searching,
    Delegating,
    Planning,
    Compacting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    Error,
    MaxTokens,
    Cancelled,
    ServerRestart,
    Disconnected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnState {
    pub status: TurnStatus,
    pub activity: Option<Activity>,
    pub activity_detail: Option<String>,
    pub turn_id: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Running estimate accumulated during the turn; `1 token ≈ 4 chars`
    /// of streamed text/thought. Monotone non-decreasing until `turn_end`.
    pub approx_tokens: u64,
    pub thinking_duration_ms: u64,
    pub thinking_last_chunk_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Filled at completion from the agent's RPC meta, not derived from
    /// streaming notifications.
    pub output_tokens: Option<u64>,
    pub cost_usd: Option<f64>,
    pub duration_ms: Option<u64>,
    pub stop_reason: Option<StopReason>,
}

impl Default for TurnState {
    fn default() -> Self {
        Self {
            status: TurnStatus::Idle,
            activity: None,
            activity_detail: None,
            turn_id: None,
            started_at: None,
            ended_at: None,
            approx_tokens: 0,
            thinking_duration_ms: 0,
            thinking_last_chunk_at: None,
            output_tokens: None,
            cost_usd: None,
            duration_ms: None,
            stop_reason: None,
        }
    }
}

impl TurnState {
    pub fn is_in_progress(&self) -> bool {
        matches!(self.status, TurnStatus::Processing | TurnStatus::Cancelling)
    }
}

/// Completion stats an agent's `prompt` RPC result carries, filled into
/// the turn state at `turn_end` (§3 TurnState: `outputTokens, costUsd,
/// durationMs`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnMeta {
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub cost_usd: Option<f64>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_kind_round_trips_through_serde() {
        for kind in ExecutorKind::all() {
            let json = serde_json::to_string(&kind).unwrap();
            let back: ExecutorKind = serde_json::from_str(&json).unwrap();
            assert_eq!(kind, back);
        }
    }

    #[test]
    fn turn_state_default_is_idle_and_not_in_progress() {
        let state = TurnState::default();
        assert_eq!(state.status, TurnStatus::Idle);
        assert!(!state.is_in_progress());
    }

    #[test]
    fn processing_and_cancelling_are_in_progress() {
        let mut state = TurnState::default();
        state.status = TurnStatus::Processing;
        assert!(state.is_in_progress());
        state.status = TurnStatus::Cancelling;
        assert!(state.is_in_progress());
        state.status = TurnStatus::TurnEnd;
        assert!(!state.is_in_progress());
    }
}
