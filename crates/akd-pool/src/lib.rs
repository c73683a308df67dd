//! Pre-warmed fast-model worker pool: eliminates cold-start latency for
//! routing decisions, title generation, and short bounded task prompts.

pub mod metrics;
pub mod pool;
pub mod whitelist;

pub use metrics::{MetricsRing, PoolMetricEntry};
pub use pool::{PoolStreamChunk, WorkerPool};
pub use whitelist::is_whitelisted_utterance;
