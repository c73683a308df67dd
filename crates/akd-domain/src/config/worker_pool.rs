use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Worker pool (pre-warmed short-call subprocesses)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    #[serde(default = "d_warm_count")]
    pub warm_count: usize,
    #[serde(default = "d_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    #[serde(default = "d_metrics_ring_size")]
    pub metrics_ring_size: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            warm_count: d_warm_count(),
            shutdown_grace_ms: d_shutdown_grace_ms(),
            metrics_ring_size: d_metrics_ring_size(),
        }
    }
}

fn d_warm_count() -> usize {
    2
}
fn d_shutdown_grace_ms() -> u64 {
    5_000
}
fn d_metrics_ring_size() -> usize {
    200
}
