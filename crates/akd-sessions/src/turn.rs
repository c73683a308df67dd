//! Activity derivation: maps the agent's streaming notification taxonomy
//! onto the [`Activity`] the turn state machine exposes to clients, per
//! the dispatch table in §4.3. Kept as a pure function so every row of the
//! mapping table is independently unit-testable.

use akd_domain::session::{Activity, StopReason};
use akd_protocol::methods::SessionUpdate;

/// What a given `SessionUpdate` means for the session's current activity,
/// plus the `activityDetail` string to carry alongside it (only set for
/// the `Brewing` fallback, where the detail is the tool's own name).
/// `None` means the update doesn't change activity (e.g. it only affects
/// token counters).
pub fn derive_activity(update: &SessionUpdate) -> Option<(Activity, Option<String>)> {
    match update {
        SessionUpdate::TextChunk { .. } => Some((Activity::Responding, None)),
        SessionUpdate::ThoughtChunk { .. } => Some((Activity::Thinking, None)),
        SessionUpdate::Plan { .. } => Some((Activity::Planning, None)),
        SessionUpdate::ToolCall { tool_name, tool_kind, .. } => {
            Some(activity_for_tool_call(tool_name, tool_kind.as_deref()))
        }
        SessionUpdate::ToolCallUpdate { status, .. } => {
            if status == "completed" {
                Some((Activity::Responding, None))
            } else {
                None
            }
        }
        SessionUpdate::TurnEnded { .. } => None,
        SessionUpdate::Usage { .. } => None,
    }
}

/// §4.3's name/kind dispatch table for `tool_call` updates. `tool_kind`
/// (the agent's own classification) takes priority over name-based
/// dispatch when it names `thinking` or `plan`.
fn activity_for_tool_call(tool_name: &str, tool_kind: Option<&str>) -> (Activity, Option<String>) {
    match tool_kind {
        Some("thinking") => return (Activity::Thinking, None),
        Some("plan") => return (Activity::Planning, None),
        _ => {}
    }
    match tool_name {
        "Task" => (Activity::Delegating, None),
        "TodoWrite" => (Activity::Planning, None),
        "Bash" => (Activity::Running, None),
        "Read" => (Activity::Reading, None),
        "Glob" | "Grep" | "WebSearch" | "WebFetch" => (Activity::Searching, None),
        "Write" | "Edit" | "NotebookEdit" => (Activity::Editing, None),
        other => (Activity::Brewing, Some(other.to_string())),
    }
}

pub fn derive_stop_reason(update: &SessionUpdate) -> Option<StopReason> {
    match update {
        SessionUpdate::TurnEnded { reason, .. } => Some(match reason.as_str() {
            "cancelled" => StopReason::Cancelled,
            "error" => StopReason::Error,
            "max_tokens" => StopReason::MaxTokens,
            "server_restart" => StopReason::ServerRestart,
            "disconnected" => StopReason::Disconnected,
            _ => StopReason::EndTurn,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thought_chunk_maps_to_thinking() {
        let u = SessionUpdate::ThoughtChunk {
            session_id: "s".into(),
            turn_id: "t".into(),
            text: "hmm".into(),
        };
        assert_eq!(derive_activity(&u), Some((Activity::Thinking, None)));
    }

    #[test]
    fn text_chunk_maps_to_responding() {
        let u = SessionUpdate::TextChunk {
            session_id: "s".into(),
            turn_id: "t".into(),
            text: "hi".into(),
        };
        assert_eq!(derive_activity(&u), Some((Activity::Responding, None)));
    }

    #[test]
    fn tool_call_dispatches_by_name() {
        let cases = [
            ("Task", Activity::Delegating),
            ("TodoWrite", Activity::Planning),
            ("Bash", Activity::Running),
            ("Read", Activity::Reading),
            ("Glob", Activity::Searching),
            ("Grep", Activity::Searching),
            ("WebSearch", Activity::Searching),
            ("WebFetch", Activity::Searching),
            ("Write", Activity::Editing),
            ("Edit", Activity::Editing),
            ("NotebookEdit", Activity::Editing),
        ];
        for (name, expected) in cases {
            let u = SessionUpdate::ToolCall {
                session_id: "s".into(),
                turn_id: "t".into(),
                tool_call_id: "tc1".into(),
                tool_name: name.into(),
                tool_kind: None,
            };
            assert_eq!(derive_activity(&u), Some((expected, None)), "tool {name}");
        }
    }

    #[test]
    fn unknown_tool_call_falls_back_to_brewing_with_detail() {
        let u = SessionUpdate::ToolCall {
            session_id: "s".into(),
            turn_id: "t".into(),
            tool_call_id: "tc1".into(),
            tool_name: "CustomTool".into(),
            tool_kind: None,
        };
        assert_eq!(
            derive_activity(&u),
            Some((Activity::Brewing, Some("CustomTool".into())))
        );
    }

    #[test]
    fn tool_kind_thinking_overrides_name_dispatch() {
        let u = SessionUpdate::ToolCall {
            session_id: "s".into(),
            turn_id: "t".into(),
            tool_call_id: "tc1".into(),
            tool_name: "Bash".into(),
            tool_kind: Some("thinking".into()),
        };
        assert_eq!(derive_activity(&u), Some((Activity::Thinking, None)));
    }

    #[test]
    fn tool_call_update_completed_maps_to_responding() {
        let u = SessionUpdate::ToolCallUpdate {
            session_id: "s".into(),
            turn_id: "t".into(),
            tool_call_id: "tc1".into(),
            status: "completed".into(),
        };
        assert_eq!(derive_activity(&u), Some((Activity::Responding, None)));
    }

    #[test]
    fn tool_call_update_in_progress_does_not_change_activity() {
        let u = SessionUpdate::ToolCallUpdate {
            session_id: "s".into(),
            turn_id: "t".into(),
            tool_call_id: "tc1".into(),
            status: "in_progress".into(),
        };
        assert_eq!(derive_activity(&u), None);
    }

    #[test]
    fn turn_ended_reason_maps_to_stop_reason() {
        let ended = SessionUpdate::TurnEnded {
            session_id: "s".into(),
            turn_id: "t".into(),
            reason: "cancelled".into(),
        };
        assert_eq!(derive_stop_reason(&ended), Some(StopReason::Cancelled));
        assert_eq!(derive_activity(&ended), None);
    }

    #[test]
    fn usage_update_does_not_change_activity() {
        let usage = SessionUpdate::Usage {
            session_id: "s".into(),
            turn_id: "t".into(),
            approx_tokens: 10,
            thinking_ms: 5,
        };
        assert_eq!(derive_activity(&usage), None);
        assert_eq!(derive_stop_reason(&usage), None);
    }
}
