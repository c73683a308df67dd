use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::session::ExecutorKind;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Executors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One executor's spawn recipe: the command line that starts an agent
/// child process speaking the RPC dialect over stdio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// If true, failure to spawn this executor at startup is fatal.
    /// The primary executor is required by default; the secondary is not.
    #[serde(default)]
    pub required: bool,
    #[serde(default = "d_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ExecutorConfig {
    fn default_for(kind: ExecutorKind) -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            env: HashMap::new(),
            required: matches!(kind, ExecutorKind::Primary),
            request_timeout_ms: d_request_timeout_ms(),
        }
    }
}

fn d_request_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorsConfig {
    #[serde(default = "d_primary")]
    pub primary: ExecutorConfig,
    #[serde(default = "d_secondary")]
    pub secondary: ExecutorConfig,
}

impl Default for ExecutorsConfig {
    fn default() -> Self {
        Self {
            primary: d_primary(),
            secondary: d_secondary(),
        }
    }
}

impl ExecutorsConfig {
    pub fn get(&self, kind: ExecutorKind) -> &ExecutorConfig {
        match kind {
            ExecutorKind::Primary => &self.primary,
            ExecutorKind::Secondary => &self.secondary,
        }
    }
}

fn d_primary() -> ExecutorConfig {
    ExecutorConfig::default_for(ExecutorKind::Primary)
}
fn d_secondary() -> ExecutorConfig {
    ExecutorConfig::default_for(ExecutorKind::Secondary)
}
