use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// QueuedMessage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A prompt waiting in a session's per-session FIFO. Messages queued while
/// a turn is in flight are delivered once that turn ends; the drainer
/// coalesces everything currently queued into one new prompt (see
/// `akd_sessions::queue`): texts joined with a blank-line separator,
/// images and files concatenated in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: String,
    pub session_id: String,
    pub text: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    pub added_at: chrono::DateTime<chrono::Utc>,
    /// Set when this message was produced by `interruptAndPrompt` — it
    /// jumps ahead of anything already queued rather than appending
    /// (`QueueRegistry::enqueue_priority`).
    #[serde(default)]
    pub priority: bool,
}

impl QueuedMessage {
    pub fn new(session_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            text: text.into(),
            images: Vec::new(),
            files: Vec::new(),
            added_at: chrono::Utc::now(),
            priority: false,
        }
    }

    pub fn with_attachments(
        session_id: impl Into<String>,
        text: impl Into<String>,
        images: Vec<String>,
        files: Vec<String>,
    ) -> Self {
        Self {
            images,
            files,
            ..Self::new(session_id, text)
        }
    }
}
