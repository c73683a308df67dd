//! Stdio transport for a single agent child process.
//!
//! Unlike a one-shot request/response call, a connection here is
//! long-lived: many sessions share it concurrently, and the child pushes
//! notifications at any time. A background reader task demultiplexes the
//! single stdout stream by JSON-RPC id into a pending-request map (mirrors
//! the router's oneshot-per-request pattern) and forwards id-less lines to
//! a notification broadcast channel. A single `request_lock` around the
//! whole cycle — the approach that works for one-shot MCP calls — would
//! serialize every session behind the slowest in-flight turn, so it is not
//! used here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::{broadcast, oneshot, Mutex};

use akd_domain::config::ExecutorConfig;
use akd_protocol::jsonrpc::{IncomingLine, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

use crate::sidechannel::{SideChannelOutcome, SideChannelStore};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("agent process has exited")]
    ProcessExited,

    #[error("timeout waiting for response")]
    Timeout,
}

/// Maximum number of non-JSON lines to skip before declaring the process broken.
const MAX_SKIP_LINES: usize = 1000;

struct PendingMap {
    next_id: AtomicU64,
    pending: SyncMutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>,
}

impl PendingMap {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: SyncMutex::new(HashMap::new()),
        }
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn register(&self, id: u64) -> oneshot::Receiver<JsonRpcResponse> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        rx
    }

    fn complete(&self, resp: JsonRpcResponse) {
        if let Some(tx) = self.pending.lock().remove(&resp.id) {
            let _ = tx.send(resp);
        } else {
            tracing::warn!(id = resp.id, "received response for unknown request id");
        }
    }

    /// Fail every in-flight request (called when the process exits).
    fn fail_all(&self) {
        let mut pending = self.pending.lock();
        for (id, tx) in pending.drain() {
            let _ = tx.send(JsonRpcResponse {
                jsonrpc: "2.0".into(),
                id,
                result: None,
                error: Some(akd_protocol::jsonrpc::JsonRpcError {
                    code: -32000,
                    message: "agent process exited before responding".into(),
                    data: None,
                }),
            });
        }
    }
}

/// One stdio connection to a running agent child process.
pub struct StdioConnection {
    stdin: Mutex<ChildStdin>,
    child: Mutex<Child>,
    pending: Arc<PendingMap>,
    side_channel: Arc<SideChannelStore>,
    notifications_tx: broadcast::Sender<JsonRpcNotification>,
    alive: Arc<AtomicBool>,
    request_timeout: std::time::Duration,
}

impl StdioConnection {
    /// Spawn the child process and start its background reader task.
    pub fn spawn(config: &ExecutorConfig) -> Result<Self, TransportError> {
        let mut cmd = tokio::process::Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Io(broken_pipe("stdin")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Io(broken_pipe("stdout")))?;

        let pending = Arc::new(PendingMap::new());
        let side_channel = Arc::new(SideChannelStore::new());
        let (notifications_tx, _rx) = broadcast::channel(256);
        let alive = Arc::new(AtomicBool::new(true));

        spawn_reader_task(
            BufReader::new(stdout),
            pending.clone(),
            side_channel.clone(),
            notifications_tx.clone(),
            alive.clone(),
        );

        Ok(Self {
            stdin: Mutex::new(stdin),
            child: Mutex::new(child),
            pending,
            side_channel,
            notifications_tx,
            alive,
            request_timeout: std::time::Duration::from_millis(config.request_timeout_ms),
        })
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<JsonRpcNotification> {
        self.notifications_tx.subscribe()
    }

    pub fn open_side_channel_count(&self) -> usize {
        self.side_channel.open_count()
    }

    /// Send a request and await its response. Multiple callers may have
    /// requests in flight at once — each gets its own oneshot, keyed by id.
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, TransportError> {
        if !self.is_alive() {
            return Err(TransportError::ProcessExited);
        }

        let id = self.pending.next_request_id();
        let rx = self.pending.register(id);
        let req = JsonRpcRequest::new(id, method, params);
        let json = serde_json::to_string(&req)?;

        self.write_line(&json).await?;

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) => Err(TransportError::ProcessExited),
            Err(_) => Err(TransportError::Timeout),
        }
    }

    /// Reply to a server-initiated request (one that arrived on the
    /// notification stream with an `id` — §6.3 `requestPermission` /
    /// `readTextFile` / `writeTextFile`). There is no pending-map entry
    /// for these since we never sent the matching request ourselves, so
    /// this writes the response line directly rather than going through
    /// `PendingMap`.
    pub async fn send_response(
        &self,
        id: u64,
        result: std::result::Result<Value, akd_protocol::jsonrpc::JsonRpcError>,
    ) -> Result<(), TransportError> {
        let resp = match result {
            Ok(value) => akd_protocol::jsonrpc::JsonRpcResponse {
                jsonrpc: "2.0".into(),
                id,
                result: Some(value),
                error: None,
            },
            Err(error) => akd_protocol::jsonrpc::JsonRpcResponse {
                jsonrpc: "2.0".into(),
                id,
                result: None,
                error: Some(error),
            },
        };
        let json = serde_json::to_string(&resp)?;
        self.write_line(&json).await
    }

    pub async fn send_notification(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(), TransportError> {
        let notif = JsonRpcNotification::new(method, params);
        let json = serde_json::to_string(&notif)?;
        self.write_line(&json).await
    }

    async fn write_line(&self, json: &str) -> Result<(), TransportError> {
        if !self.is_alive() {
            return Err(TransportError::ProcessExited);
        }
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Graceful shutdown: close stdin, wait up to `grace`, then kill.
    pub async fn shutdown(&self, grace: std::time::Duration) {
        self.alive.store(false, Ordering::SeqCst);
        self.pending.fail_all();
        {
            let mut stdin = self.stdin.lock().await;
            let _ = stdin.shutdown().await;
        }
        let mut child = self.child.lock().await;
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(?status, "agent process exited"),
            Ok(Err(e)) => tracing::warn!(error = %e, "error waiting for agent process"),
            Err(_) => {
                tracing::warn!("agent process did not exit within grace period, killing");
                let _ = child.kill().await;
            }
        }
        for (task_id, outcome) in self.side_channel.flush_on_exit() {
            if outcome == SideChannelOutcome::EndedWithoutConfirmation {
                tracing::warn!(task_id, "side channel task ended without confirmation");
            }
        }
    }
}

fn broken_pipe(which: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("failed to capture child {which}"),
    )
}

fn spawn_reader_task(
    mut stdout: BufReader<ChildStdout>,
    pending: Arc<PendingMap>,
    side_channel: Arc<SideChannelStore>,
    notifications_tx: broadcast::Sender<JsonRpcNotification>,
    alive: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        let mut skipped = 0usize;
        loop {
            let mut line = String::new();
            match stdout.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "error reading agent stdout");
                    break;
                }
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if side_channel.handle_line(trimmed).is_some() {
                continue;
            }
            match IncomingLine::parse(trimmed) {
                Ok(IncomingLine::Response(resp)) => pending.complete(resp),
                Ok(IncomingLine::Notification(notif)) => {
                    let _ = notifications_tx.send(notif);
                }
                Err(_) => {
                    skipped += 1;
                    if skipped >= MAX_SKIP_LINES {
                        tracing::warn!("agent produced too many unparseable lines, giving up");
                        break;
                    }
                    tracing::debug!(line = %trimmed, "skipping unparseable line from agent stdout");
                }
            }
        }
        alive.store(false, Ordering::SeqCst);
        pending.fail_all();
        tracing::info!("agent reader task ended, connection marked dead");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_against_dead_connection_fails_fast() {
        // Spawn something that exits immediately so reads return EOF.
        let config = ExecutorConfig {
            command: "true".into(),
            args: vec![],
            env: Default::default(),
            required: false,
            request_timeout_ms: 200,
        };
        let conn = StdioConnection::spawn(&config).unwrap();
        // Give the reader task a moment to observe EOF.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let result = conn.send_request("initialize", None).await;
        assert!(result.is_err());
    }
}
