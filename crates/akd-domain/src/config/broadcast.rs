use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Broadcast coalescing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// A `broadcastSessions` request already in flight absorbs further
    /// requests for up to this many milliseconds (single-flight coalescing).
    #[serde(default = "d_debounce_ms")]
    pub debounce_ms: u64,
    /// A coalesced broadcast is forced through if this many milliseconds
    /// have elapsed since the last one actually went out, even if requests
    /// keep arriving.
    #[serde(default = "d_staleness_cutoff_ms")]
    pub staleness_cutoff_ms: u64,
    #[serde(default = "d_content_replay_buffer_size")]
    pub content_replay_buffer_size: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            debounce_ms: d_debounce_ms(),
            staleness_cutoff_ms: d_staleness_cutoff_ms(),
            content_replay_buffer_size: d_content_replay_buffer_size(),
        }
    }
}

fn d_debounce_ms() -> u64 {
    50
}
fn d_staleness_cutoff_ms() -> u64 {
    15_000
}
fn d_content_replay_buffer_size() -> usize {
    500
}
