//! WebSocket transport for local clients (editor extensions, dashboards).
//!
//! Flow:
//! 1. Client connects to `/v1/ws?token=<pre-shared-token>`
//! 2. Gateway installs this connection as the daemon's event sink and
//!    starts forwarding every `BroadcastEvent` to it
//! 3. Client sends JSON [`ClientCommand`]s; the daemon's reaction is
//!    always observed as broadcast events, never a direct RPC-style reply

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use akd_domain::event::BroadcastEvent;
use akd_domain::session::ExecutorKind;

use crate::daemon::Daemon;

/// Constant-time token comparison via SHA-256 digest. Hashing normalizes
/// lengths so `ct_eq` always compares 32 bytes.
fn token_eq(a: &str, b: &str) -> bool {
    let ha = Sha256::digest(a.as_bytes());
    let hb = Sha256::digest(b.as_bytes());
    ha.ct_eq(&hb).into()
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClientCommand {
    CreateSession { executor: ExecutorKind, cwd: Option<String> },
    Prompt { session_id: String, text: String },
    Interrupt { session_id: String },
    InterruptAndPrompt { session_id: String, text: String },
    EnqueueMessage { session_id: String, text: String },
    CancelQueuedMessage { session_id: String, queue_id: String },
    ResolvePermission { request_id: String, option_id: Option<String>, option_name: Option<String> },
    DeleteSession { session_id: String },
    BroadcastSessions,
}

/// `GET /v1/ws` — upgrade to WebSocket.
///
/// Authentication: if `AKD_CLIENT_TOKEN` is set, the query `token` must
/// match it (constant-time compare). If unset, the endpoint is open —
/// the expected dev-workstation posture, bound to `127.0.0.1` by default.
pub async fn client_ws(
    ws: WebSocketUpgrade,
    State(daemon): State<Arc<Daemon>>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    if let Ok(expected) = std::env::var("AKD_CLIENT_TOKEN") {
        let provided = query.token.as_deref().unwrap_or("");
        if !token_eq(provided, &expected) {
            return (axum::http::StatusCode::UNAUTHORIZED, "invalid or missing token").into_response();
        }
    }

    ws.on_upgrade(move |socket| handle_socket(socket, daemon)).into_response()
}

async fn handle_socket(socket: WebSocket, daemon: Arc<Daemon>) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    let (outbound_tx, mut outbound_rx) = tokio::sync::mpsc::unbounded_channel::<BroadcastEvent>();
    daemon.set_event_sink(Arc::new(move |event| {
        let _ = outbound_tx.send(event);
    }));

    let writer = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            if send_event(&mut ws_sink, &event).await.is_err() {
                break;
            }
        }
    });

    daemon.broadcast_sessions().await;

    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(cmd) => handle_command(&daemon, cmd).await,
                Err(e) => tracing::debug!(error = %e, "ignoring unparseable client command"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    writer.abort();
    tracing::info!("client disconnected");
}

async fn handle_command(daemon: &Arc<Daemon>, cmd: ClientCommand) {
    match cmd {
        ClientCommand::CreateSession { executor, cwd } => {
            if let Err(e) = daemon.create_session(executor, cwd).await {
                tracing::warn!(error = %e, "createSession failed");
            }
            daemon.broadcast_sessions().await;
        }
        ClientCommand::Prompt { session_id, text } => {
            if let Err(e) = daemon.prompt(session_id, text).await {
                tracing::warn!(error = %e, "prompt failed");
            }
        }
        ClientCommand::Interrupt { session_id } => {
            daemon.interrupt(&session_id).await;
        }
        ClientCommand::InterruptAndPrompt { session_id, text } => {
            daemon.interrupt_and_prompt(&session_id, text).await;
        }
        ClientCommand::EnqueueMessage { session_id, text } => {
            daemon.enqueue_message(&session_id, text);
        }
        ClientCommand::CancelQueuedMessage { session_id, queue_id } => {
            daemon.cancel_queued_message(&session_id, &queue_id);
        }
        ClientCommand::ResolvePermission { request_id, option_id, option_name } => {
            daemon.resolve_permission(&request_id, option_id, option_name).await;
        }
        ClientCommand::DeleteSession { session_id } => {
            if let Err(e) = daemon.delete_session(&session_id).await {
                tracing::warn!(error = %e, "deleteSession failed");
            }
            daemon.broadcast_sessions().await;
        }
        ClientCommand::BroadcastSessions => {
            daemon.broadcast_sessions().await;
        }
    }
}

async fn send_event(sink: &mut (impl SinkExt<Message> + Unpin), event: &BroadcastEvent) -> Result<(), ()> {
    let json = serde_json::to_string(event).map_err(|_| ())?;
    sink.send(Message::Text(json)).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::token_eq;

    #[test]
    fn token_eq_matches_identical_tokens() {
        assert!(token_eq("s3cret", "s3cret"));
    }

    #[test]
    fn token_eq_rejects_mismatched_tokens() {
        assert!(!token_eq("s3cret", "wrong"));
    }

    #[test]
    fn token_eq_rejects_different_length_tokens() {
        assert!(!token_eq("short", "a-lot-longer-token"));
    }

    #[test]
    fn token_eq_rejects_empty_against_real_token() {
        assert!(!token_eq("", "s3cret"));
    }
}
