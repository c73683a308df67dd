//! The per-session prompt state machine.
//!
//! ```text
//!       enqueue()                           interrupt()
//! idle ───────────► queued ──drain──► processing ─────────► cancelling
//!   ▲                                       │                  │
//!   │                                       │ ok/err           │ ack
//!   └─────────────── turn_end ◄─────────────┘                  │
//!                                                              ▼
//!                                                         processing
//!                                                         (next queued)
//! ```
//!
//! `cancel` is sent to the agent but the queue drain begins only in the
//! `finally` of the awaited `prompt` call — preserving the timing the
//! redesign notes call out as worth keeping from the original.

use std::sync::Arc;

use akd_domain::error::{Error, Result};
use akd_domain::event::BroadcastEvent;
use akd_domain::session::{ExecutorKind, StopReason, TurnMeta};
use akd_protocol::methods::SessionUpdate;
use akd_protocol::session_gone::is_session_gone;
use serde_json::Value;
use uuid::Uuid;

use crate::daemon::Daemon;

impl Daemon {
    /// Start (or resume-then-start) a turn for `session_id` with `text` as
    /// the prompt. Runs the RPC call in the background; streaming updates
    /// arrive through [`Daemon::handle_session_update`] via whatever
    /// notification-forwarding task the caller has wired up.
    pub async fn prompt(self: &Arc<Self>, session_id: String, text: String) -> Result<()> {
        let in_progress = self.sessions.with_turn(&session_id, |t| t.is_in_progress()).unwrap_or(false);
        if self.queues.len(&session_id) > 0 || in_progress {
            let queued = self.queues.enqueue(&session_id, text.clone());
            self.broadcast(BroadcastEvent::MessageQueued {
                session_id: session_id.clone(),
                queue_id: queued.id,
                text,
            });
            return Ok(());
        }
        self.run_turn(session_id, text, Vec::new(), Vec::new()).await
    }

    fn run_turn(
        self: &Arc<Self>,
        session_id: String,
        text: String,
        images: Vec<String>,
        files: Vec<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>> {
        let this = self.clone();
        Box::pin(async move {
            let turn_id = Uuid::new_v4().to_string();
            this.sessions.start_turn(&session_id, turn_id.clone())?;
            this.broadcast(BroadcastEvent::TurnStart { session_id: session_id.clone(), turn_id: turn_id.clone() });

            let Some(kind) = this.sessions.executor_kind(&session_id) else {
                return Err(Error::SessionNotFound(session_id));
            };
            let Some(conn) = this.connections.get(kind) else {
                return Err(Error::Executor { kind: kind.to_string(), message: "no connection".into() });
            };

            let result = conn.prompt(session_id.clone(), text.clone(), images, files).await;

            match result {
                Ok(prompt_result) => {
                    let meta = TurnMeta::from(&prompt_result);
                    this.finish_turn(&session_id, &turn_id, StopReason::EndTurn, meta).await;
                }
                Err(e) if is_session_gone(&e) => {
                    this.replace_session(&session_id, kind).await?;
                }
                Err(_) => {
                    this.finish_turn(&session_id, &turn_id, StopReason::Error, TurnMeta::default()).await;
                }
            }
            Ok(())
        })
    }

    /// Streaming notification handling: derive activity/token updates and
    /// forward each update as its own typed event.
    pub fn handle_session_update(&self, session_id: &str, update: SessionUpdate, raw: Value) {
        let activity = self.sessions.apply_update(session_id, &update, raw.clone());
        if let Some(activity) = activity {
            let detail = self.sessions.with_turn(session_id, |t| t.activity_detail.clone()).flatten();
            self.broadcast(BroadcastEvent::TurnActivity {
                session_id: session_id.to_string(),
                activity,
                activity_detail: detail,
            });
        }

        match update {
            SessionUpdate::TextChunk { turn_id, text, .. } => {
                self.broadcast(BroadcastEvent::Text { session_id: session_id.to_string(), turn_id, text });
            }
            SessionUpdate::ThoughtChunk { turn_id, text, .. } => {
                self.broadcast(BroadcastEvent::Thought { session_id: session_id.to_string(), turn_id, text });
            }
            SessionUpdate::ToolCall { turn_id, tool_call_id, tool_name, .. } => {
                self.broadcast(BroadcastEvent::ToolCall {
                    session_id: session_id.to_string(),
                    turn_id,
                    tool_call_id,
                    tool_name,
                });
            }
            SessionUpdate::ToolCallUpdate { turn_id, tool_call_id, status, .. } => {
                self.broadcast(BroadcastEvent::ToolCallUpdate {
                    session_id: session_id.to_string(),
                    turn_id,
                    tool_call_id,
                    status,
                });
            }
            SessionUpdate::Plan { turn_id, .. } => {
                self.broadcast(BroadcastEvent::Plan { session_id: session_id.to_string(), turn_id });
            }
            // `TurnEnded`/`Usage` only affect turn state, handled above via
            // `apply_update`; the authoritative `turn_end` event is emitted
            // by `finish_turn` once the RPC call itself returns.
            SessionUpdate::TurnEnded { .. } | SessionUpdate::Usage { .. } => {}
        }
    }

    async fn finish_turn(self: &Arc<Self>, session_id: &str, turn_id: &str, reason: StopReason, meta: TurnMeta) {
        self.sessions.end_turn(session_id, reason, meta);
        let duration_ms = self.sessions.with_turn(session_id, |t| t.duration_ms).flatten();
        self.broadcast(BroadcastEvent::TurnEnd {
            session_id: session_id.to_string(),
            turn_id: turn_id.to_string(),
            stop_reason: reason,
            duration_ms,
        });
        self.sessions.reset_to_idle(session_id);
        self.drain_queue(session_id).await;
    }

    /// Drain the coalesced queue into the next turn, if anything is
    /// waiting.
    async fn drain_queue(self: &Arc<Self>, session_id: &str) {
        if let Some(coalesced) = self.queues.drain_coalesced(session_id) {
            if coalesced.dropped > 0 {
                akd_domain::trace::TraceEvent::QueueCoalesced {
                    session_id: session_id.to_string(),
                    dropped: coalesced.dropped,
                }
                .emit();
            }
            let this = self.clone();
            let session_id = session_id.to_string();
            tokio::spawn(async move {
                let _ = this.run_turn(session_id, coalesced.text, coalesced.images, coalesced.files).await;
            });
        }
    }

    /// Cancel the active turn, if any. Idempotent — a no-op if the
    /// session has no turn in progress. Any open permission requests for
    /// the session are released (denied once) before the `cancel` RPC is
    /// sent (§5).
    pub async fn interrupt(self: &Arc<Self>, session_id: &str) {
        if !self.sessions.with_turn(session_id, |t| t.is_in_progress()).unwrap_or(false) {
            return;
        }
        self.sessions.begin_cancelling(session_id);
        self.release_session_permissions(session_id).await;

        let Some(kind) = self.sessions.executor_kind(session_id) else { return };
        if let Some(conn) = self.connections.get(kind) {
            let _ = conn.cancel(session_id.to_string()).await;
        }
    }

    /// Atomically drop any queued messages, enqueue `text` as the sole
    /// pending message, and request cancellation of the running turn. The
    /// finally-hook of the cancelled turn (`finish_turn` → `drain_queue`)
    /// picks the replacement up.
    pub async fn interrupt_and_prompt(self: &Arc<Self>, session_id: &str, text: String) {
        let dropped = self.queues.interrupt_and_prompt(session_id, text);
        if dropped > 0 {
            akd_domain::trace::TraceEvent::QueueCoalesced { session_id: session_id.to_string(), dropped }.emit();
        }
        self.interrupt(session_id).await;
    }

    /// Transparent "session gone" recovery: mint a replacement session id
    /// under the same executor kind, move all local state to the new id,
    /// and emit `session_replaced` before any other event carries the new
    /// id.
    async fn replace_session(self: &Arc<Self>, old_id: &str, kind: ExecutorKind) -> Result<()> {
        let Some(conn) = self.connections.get(kind) else {
            return Err(Error::Executor { kind: kind.to_string(), message: "no connection".into() });
        };
        let new_session = conn.new_session(None).await?;
        let new_id = new_session.session_id;

        self.sessions.register(new_id.clone(), kind);
        self.sessions.replace(old_id, new_id.clone());

        self.broadcast(BroadcastEvent::SessionReplaced {
            old_session_id: old_id.to_string(),
            new_session_id: new_id.clone(),
            reason: "session gone".to_string(),
        });
        akd_domain::trace::TraceEvent::SessionReplaced {
            old_session_id: old_id.to_string(),
            new_session_id: new_id.clone(),
            reason: "session gone".to_string(),
        }
        .emit();

        let pending = self.queues.drain_coalesced(&new_id);
        if let Some(coalesced) = pending {
            self.run_turn(new_id, coalesced.text, coalesced.images, coalesced.files).await?;
        }
        Ok(())
    }
}

