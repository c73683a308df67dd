use serde::{Deserialize, Serialize};

use crate::kanban::KanbanLogEntry;
use crate::session::{Activity, ExecutorKind, StopReason};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Broadcast events — the daemon's outward event surface
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A permission option an agent offers the user when requesting
/// authorization to run a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOption {
    pub option_id: String,
    pub option_name: String,
}

/// Events the daemon pushes to the active `EventSink`. A sum type over
/// event variants, not a dynamic tagged envelope: every distinct wire
/// message the daemon can emit gets its own variant and its own typed
/// payload, so there is no `Value` blob standing in for an un-modeled
/// shape anywhere on this surface. `session_id: None` means app-wide.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastEvent {
    Text { session_id: String, turn_id: String, text: String },
    Thought { session_id: String, turn_id: String, text: String },
    ToolCall {
        session_id: String,
        turn_id: String,
        tool_call_id: String,
        tool_name: String,
    },
    ToolCallUpdate {
        session_id: String,
        turn_id: String,
        tool_call_id: String,
        status: String,
    },
    Plan { session_id: String, turn_id: String },

    PermissionRequest {
        session_id: String,
        request_id: String,
        tool_call_id: String,
        tool_name: String,
        options: Vec<PermissionOption>,
    },
    PermissionResolved {
        session_id: String,
        request_id: String,
        option_id: Option<String>,
    },

    Error { session_id: Option<String>, message: String },

    TurnStart { session_id: String, turn_id: String },
    TurnActivity {
        session_id: String,
        activity: Activity,
        activity_detail: Option<String>,
    },
    TurnEnd {
        session_id: String,
        turn_id: String,
        stop_reason: StopReason,
        duration_ms: Option<u64>,
    },

    SessionInfo { session_id: String, title: Option<String>, cwd: Option<String> },
    SessionTitleUpdate { session_id: String, title: String },

    /// The merged, live-tagged session list (§4.2.2 `broadcastSessions`).
    Sessions { sessions: Vec<SessionSummary> },
    /// The old session id stops receiving events the moment this fires —
    /// no further events tagged with the old id may follow it.
    SessionReplaced {
        old_session_id: String,
        new_session_id: String,
        reason: String,
    },

    KanbanStateChanged { entries: Vec<KanbanLogEntry> },

    MessageQueued { session_id: String, queue_id: String, text: String },
    QueueDrainStart { session_id: String, queue_id: String },
    QueueCancelled { session_id: String, queue_id: String },

    Executors { connections: Vec<ExecutorConnectionState> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConnectionState {
    pub executor_kind: ExecutorKind,
    pub connected: bool,
}

/// Slim per-session view used in `Sessions`. Distinct from the full
/// `Session`/`TurnState` records so the broadcast payload stays small,
/// but still carries the liveness flag and turn activity/stats clients
/// need to render the list without a follow-up round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub executor_kind: ExecutorKind,
    pub live: bool,
    pub status: crate::session::TurnStatus,
    pub activity: Option<Activity>,
    pub approx_tokens: u64,
    pub thinking_duration_ms: u64,
    /// Set for sessions the daemon manages locally but that haven't
    /// appeared in the agent's own `sessions/list` response yet.
    #[serde(default)]
    pub managed_but_unlisted: bool,
}
