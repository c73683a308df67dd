//! The agent RPC dialect's method surface.
//!
//! Known methods are a closed enum; anything under the `ext/` namespace is
//! carried as a generic ext sub-method name rather than grown as new enum
//! variants — this is the encoding the redesign notes call for, so that
//! adding an ext method never requires a protocol-crate release.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use akd_domain::session::ExecutorKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Initialize,
    NewSession,
    ResumeSession,
    Prompt,
    Cancel,
    Ext(String),
}

impl Method {
    pub fn as_wire(&self) -> String {
        match self {
            Method::Initialize => "initialize".into(),
            Method::NewSession => "session/new".into(),
            Method::ResumeSession => "session/resume".into(),
            Method::Prompt => "session/prompt".into(),
            Method::Cancel => "session/cancel".into(),
            Method::Ext(name) => format!("ext/{name}"),
        }
    }

    pub fn from_wire(s: &str) -> Self {
        match s {
            "initialize" => Method::Initialize,
            "session/new" => Method::NewSession,
            "session/resume" => Method::ResumeSession,
            "session/prompt" => Method::Prompt,
            "session/cancel" => Method::Cancel,
            other => match other.strip_prefix("ext/") {
                Some(sub) => Method::Ext(sub.to_string()),
                None => Method::Ext(other.to_string()),
            },
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// initialize
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub client_name: String,
    pub client_version: String,
}

pub fn initialize_params() -> InitializeParams {
    InitializeParams {
        protocol_version: "1".into(),
        client_name: "akd-daemon".into(),
        client_version: env!("CARGO_PKG_VERSION").into(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub agent_name: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// session/new, session/resume
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionResult {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSessionParams {
    pub session_id: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// session/prompt, session/cancel
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptParams {
    pub session_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

/// The agent's completion stats for the turn, carried back on the
/// `session/prompt` response (§3 TurnState: `outputTokens, costUsd,
/// durationMs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptResult {
    pub turn_id: String,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub cost_usd: Option<f64>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl From<&PromptResult> for akd_domain::session::TurnMeta {
    fn from(r: &PromptResult) -> Self {
        akd_domain::session::TurnMeta {
            output_tokens: r.output_tokens,
            cost_usd: r.cost_usd,
            duration_ms: r.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelParams {
    pub session_id: String,
}

/// Server-initiated streaming notification — the payloads the activity
/// derivation table (§4.3) matches against. `kind` on `ToolCall` carries
/// the agent's own classification (e.g. `"thinking"`, `"plan"`) when it
/// has one, taking priority over the name-based dispatch table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionUpdate {
    TextChunk {
        session_id: String,
        turn_id: String,
        text: String,
    },
    ThoughtChunk {
        session_id: String,
        turn_id: String,
        text: String,
    },
    ToolCall {
        session_id: String,
        turn_id: String,
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        tool_kind: Option<String>,
    },
    ToolCallUpdate {
        session_id: String,
        turn_id: String,
        tool_call_id: String,
        status: String,
    },
    Plan {
        session_id: String,
        turn_id: String,
    },
    TurnEnded {
        session_id: String,
        turn_id: String,
        reason: String,
    },
    Usage {
        session_id: String,
        turn_id: String,
        approx_tokens: u64,
        thinking_ms: u64,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Permissions (§6.1, §6.3) — requestPermission/readTextFile/writeTextFile
// arrive as server-initiated requests from the agent; resolve_permission
// is the client→daemon→agent reply path.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const METHOD_REQUEST_PERMISSION: &str = "session/requestPermission";
pub const METHOD_READ_TEXT_FILE: &str = "fs/readTextFile";
pub const METHOD_WRITE_TEXT_FILE: &str = "fs/writeTextFile";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOptionWire {
    pub option_id: String,
    pub option_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPermissionParams {
    pub session_id: String,
    pub request_id: String,
    pub tool_call_id: String,
    pub tool_name: String,
    pub options: Vec<PermissionOptionWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadTextFileParams {
    pub session_id: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteTextFileParams {
    pub session_id: String,
    pub path: String,
    pub content: String,
}

/// `resolve_permission{requestId, optionId, optionName}` — the client
/// command that forwards the user's choice back to the agent. `None`
/// `option_id`/`option_name` means the request was denied (e.g. released
/// by a cancel, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvePermissionParams {
    pub request_id: String,
    pub option_id: Option<String>,
    pub option_name: Option<String>,
}

/// An ext sub-method call's opaque payload — core pathways never invoke
/// ext methods themselves; they are transport-visible passthroughs only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtParams {
    pub sub_method: String,
    #[serde(default)]
    pub payload: Value,
}

/// Which executor kind an RPC call targets, carried alongside the method
/// so the connection manager can route to the right child process.
#[derive(Debug, Clone, Copy)]
pub struct RouteTo(pub ExecutorKind);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_methods_round_trip_through_wire_strings() {
        let methods = [
            Method::Initialize,
            Method::NewSession,
            Method::ResumeSession,
            Method::Prompt,
            Method::Cancel,
        ];
        for m in methods {
            assert_eq!(Method::from_wire(&m.as_wire()), m);
        }
    }

    #[test]
    fn ext_method_carries_sub_method_name() {
        let m = Method::Ext("workspace/list".into());
        assert_eq!(m.as_wire(), "ext/workspace/list");
        assert_eq!(Method::from_wire("ext/workspace/list"), m);
    }

    #[test]
    fn unrecognized_method_falls_back_to_ext() {
        assert_eq!(Method::from_wire("something/weird"), Method::Ext("something/weird".into()));
    }
}
