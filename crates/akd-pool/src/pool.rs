//! Pre-warmed fast-model worker pool.
//!
//! Eliminates cold-start latency for short, bounded model calls — routing
//! decisions, title suggestions, snappy task prompts — by holding a single
//! live streaming conversation open against a small/cheap model, separate
//! from the per-session agent connections the RPC connection manager owns.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use akd_domain::config::{ExecutorConfig, WorkerPoolConfig};
use akd_domain::error::{Error, Result};
use akd_rpc::connection::AgentConnection;
use akd_rpc::transport::StdioConnection;

use crate::metrics::{MetricsRing, PoolMetricEntry};
use crate::whitelist::is_whitelisted_utterance;

/// One chunk of a streamed task response.
#[derive(Debug, Clone)]
pub enum PoolStreamChunk {
    Text(String),
    Thinking(String),
}

pub struct WorkerPool {
    config: WorkerPoolConfig,
    connection: RwLock<Option<Arc<AgentConnection>>>,
    metrics: MetricsRing,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        let metrics = MetricsRing::new(config.metrics_ring_size);
        Self {
            config,
            connection: RwLock::new(None),
            metrics,
        }
    }

    pub fn is_warm(&self) -> bool {
        self.connection
            .read()
            .as_ref()
            .map(|c| c.is_alive())
            .unwrap_or(false)
    }

    /// Spawn the hot subprocess and run its `initialize` handshake. Safe
    /// to call again after a crash to re-warm the pool.
    pub async fn warmup(&self, executor_config: &ExecutorConfig) -> Result<()> {
        let started = Instant::now();
        let transport = StdioConnection::spawn(executor_config)
            .map_err(|e| Error::Executor { kind: "pool".into(), message: e.to_string() })?;
        let conn = Arc::new(AgentConnection::new(transport));
        conn.initialize()
            .await
            .map_err(|e| Error::Executor { kind: "pool".into(), message: e.to_string() })?;
        *self.connection.write() = Some(conn);
        akd_domain::trace::TraceEvent::WorkerPoolWarmup {
            duration_ms: started.elapsed().as_millis() as u64,
            warm_count: 1,
        }
        .emit();
        Ok(())
    }

    fn connection(&self) -> Result<Arc<AgentConnection>> {
        self.connection
            .read()
            .clone()
            .ok_or_else(|| Error::Executor { kind: "pool".into(), message: "pool is not warm".into() })
    }

    /// Classify whether a new user utterance continues the current session
    /// or should start a fresh one. Whitelisted utterances never reach the
    /// model.
    pub async fn route(&self, text: &str, title: Option<&str>, summary: Option<&str>) -> bool {
        if is_whitelisted_utterance(text) {
            return true;
        }
        let started = Instant::now();
        let payload = serde_json::json!({
            "text": text,
            "title": title,
            "summary": summary,
        });
        let result = match self.connection() {
            Ok(conn) => conn.ext_method("pool/route".into(), payload).await,
            Err(e) => Err(e),
        };
        let ok = result.is_ok();
        let continues = result
            .ok()
            .and_then(|v| v.get("continue").and_then(|b| b.as_bool()))
            .unwrap_or(true);
        self.record_metric("route", started.elapsed(), ok);
        continues
    }

    pub async fn generate_title(&self, cwd: &str, user_message: &str) -> Option<String> {
        let started = Instant::now();
        let payload = serde_json::json!({ "cwd": cwd, "userMessage": user_message });
        let result = match self.connection() {
            Ok(conn) => conn.ext_method("pool/generateTitle".into(), payload).await,
            Err(e) => Err(e),
        };
        let ok = result.is_ok();
        let title = result
            .ok()
            .and_then(|v| v.get("title").and_then(|t| t.as_str().map(str::to_string)));
        self.record_metric("generateTitle", started.elapsed(), ok);
        title
    }

    /// Stream a task response without going through the full session
    /// protocol. Returns every chunk collected; a real transport would
    /// forward each as it arrives rather than buffering, but the pool's
    /// contract only guarantees in-order delivery.
    pub async fn stream(&self, prompt: &str) -> Result<Vec<PoolStreamChunk>> {
        let started = Instant::now();
        let conn = self.connection()?;
        let payload = serde_json::json!({ "prompt": prompt });
        let result = conn.ext_method("pool/stream".into(), payload).await;
        let ok = result.is_ok();
        self.record_metric("stream", started.elapsed(), ok);

        let value = result.map_err(|e| Error::Rpc(e.to_string()))?;
        let chunks = value
            .get("chunks")
            .and_then(|c| c.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(chunks
            .into_iter()
            .filter_map(|c| {
                let kind = c.get("type")?.as_str()?;
                let text = c.get("text")?.as_str()?.to_string();
                match kind {
                    "thinking" => Some(PoolStreamChunk::Thinking(text)),
                    _ => Some(PoolStreamChunk::Text(text)),
                }
            })
            .collect())
    }

    pub fn record_metric(&self, operation: &str, duration: Duration, ok: bool) {
        self.metrics.record(PoolMetricEntry {
            operation: operation.to_string(),
            duration_ms: duration.as_millis() as u64,
            ok,
            recorded_at: chrono::Utc::now(),
        });
    }

    pub fn get_metrics(&self) -> Vec<PoolMetricEntry> {
        self.metrics.snapshot()
    }

    /// Graceful shutdown: close stdin and wait up to the configured grace
    /// period for the child to exit on its own before killing it outright.
    pub async fn shutdown(&self) {
        let Some(conn) = self.connection.write().take() else {
            return;
        };
        match Arc::try_unwrap(conn) {
            Ok(conn) => {
                conn.into_transport()
                    .shutdown(Duration::from_millis(self.config.shutdown_grace_ms))
                    .await
            }
            Err(_) => tracing::debug!("pool connection still referenced elsewhere, skipping graceful shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unwarmed_pool_route_falls_back_to_continue_on_error() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        assert!(!pool.is_warm());
        let result = pool.route("please refactor the parser", None, None).await;
        assert!(result, "no connection means route() degrades to 'continue'");
    }

    #[tokio::test]
    async fn whitelisted_utterance_skips_the_model_entirely() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        assert!(pool.route("/compact", None, None).await);
        assert!(pool.get_metrics().is_empty(), "whitelisted route should not record a metric");
    }

    #[tokio::test]
    async fn metrics_ring_records_failed_calls() {
        let pool = WorkerPool::new(WorkerPoolConfig::default());
        let _ = pool.generate_title("/tmp", "add a test").await;
        let metrics = pool.get_metrics();
        assert_eq!(metrics.len(), 1);
        assert!(!metrics[0].ok);
    }
}
