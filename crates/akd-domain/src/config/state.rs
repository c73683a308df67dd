use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Persistence / state directory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "d_state_dir")]
    pub state_dir: String,
    /// Schema version stamped into every on-disk JSON document.
    #[serde(default = "d_schema_version")]
    pub schema_version: u32,
    /// Sessions idle longer than this are pruned by cleanStaleSessions.
    #[serde(default = "d_stale_session_secs")]
    pub stale_session_secs: u64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            state_dir: d_state_dir(),
            schema_version: d_schema_version(),
            stale_session_secs: d_stale_session_secs(),
        }
    }
}

fn d_state_dir() -> String {
    "./data/akd".into()
}
fn d_schema_version() -> u32 {
    1
}
fn d_stale_session_secs() -> u64 {
    24 * 60 * 60
}
