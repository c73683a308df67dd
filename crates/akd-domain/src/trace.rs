use serde::Serialize;

/// Structured trace events emitted across all akd crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
        executor_kind: String,
    },
    SessionReplaced {
        old_session_id: String,
        new_session_id: String,
        reason: String,
    },
    TurnStarted {
        session_id: String,
        turn_id: String,
    },
    TurnEnded {
        session_id: String,
        turn_id: String,
        stop_reason: String,
        duration_ms: u64,
    },
    QueueCoalesced {
        session_id: String,
        dropped: usize,
    },
    KanbanOpApplied {
        session_id: String,
        op_count: usize,
        seq: u64,
    },
    RpcConnectionSpawned {
        executor_kind: String,
        required: bool,
    },
    RpcConnectionLost {
        executor_kind: String,
        reason: String,
    },
    WorkerPoolWarmup {
        duration_ms: u64,
        warm_count: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "akd_event");
    }
}
