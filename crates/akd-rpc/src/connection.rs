//! Typed wrapper around a raw [`StdioConnection`]: the agent RPC dialect's
//! `initialize`/`session/new`/`session/resume`/`session/prompt`/`session/cancel`
//! calls plus the generic ext passthrough.

use akd_domain::error::{Error, Result};
use akd_protocol::jsonrpc::JsonRpcNotification;
use akd_protocol::methods::{
    self, CancelParams, InitializeResult, Method, NewSessionParams, NewSessionResult,
    PromptParams, PromptResult, ResumeSessionParams,
};
use tokio::sync::broadcast;

use crate::transport::StdioConnection;

pub struct AgentConnection {
    transport: StdioConnection,
}

impl AgentConnection {
    pub fn new(transport: StdioConnection) -> Self {
        Self { transport }
    }

    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    pub fn into_transport(self) -> StdioConnection {
        self.transport
    }

    pub fn notifications(&self) -> broadcast::Receiver<JsonRpcNotification> {
        self.transport.subscribe_notifications()
    }

    pub async fn initialize(&self) -> Result<InitializeResult> {
        let params = serde_json::to_value(methods::initialize_params())?;
        let resp = self.call(Method::Initialize, Some(params)).await?;
        Ok(serde_json::from_value(resp)?)
    }

    pub async fn new_session(&self, cwd: Option<String>) -> Result<NewSessionResult> {
        let params = serde_json::to_value(NewSessionParams { cwd })?;
        let resp = self.call(Method::NewSession, Some(params)).await?;
        Ok(serde_json::from_value(resp)?)
    }

    pub async fn resume_session(&self, session_id: String) -> Result<()> {
        let params = serde_json::to_value(ResumeSessionParams { session_id })?;
        self.call(Method::ResumeSession, Some(params)).await?;
        Ok(())
    }

    pub async fn prompt(
        &self,
        session_id: String,
        text: String,
        images: Vec<String>,
        files: Vec<String>,
    ) -> Result<PromptResult> {
        let params = serde_json::to_value(PromptParams { session_id, text, images, files })?;
        let resp = self.call(Method::Prompt, Some(params)).await?;
        Ok(serde_json::from_value(resp)?)
    }

    pub async fn cancel(&self, session_id: String) -> Result<()> {
        let params = serde_json::to_value(CancelParams { session_id })?;
        self.call(Method::Cancel, Some(params)).await?;
        Ok(())
    }

    /// Transport-visible passthrough only — never invoked from core
    /// turn/queue/kanban pathways.
    pub async fn ext_method(&self, sub_method: String, payload: serde_json::Value) -> Result<serde_json::Value> {
        self.call(Method::Ext(sub_method), Some(payload)).await
    }

    /// Reply to a server-initiated request from the agent (§6.3
    /// `requestPermission` / `readTextFile` / `writeTextFile`).
    pub async fn respond(
        &self,
        id: u64,
        result: std::result::Result<serde_json::Value, akd_protocol::jsonrpc::JsonRpcError>,
    ) -> Result<()> {
        self.transport
            .send_response(id, result)
            .await
            .map_err(|e| Error::Rpc(e.to_string()))
    }

    async fn call(&self, method: Method, params: Option<serde_json::Value>) -> Result<serde_json::Value> {
        let resp = self
            .transport
            .send_request(&method.as_wire(), params)
            .await
            .map_err(|e| Error::Rpc(e.to_string()))?;
        resp.into_result().map_err(|e| classify_rpc_error(&e))
    }
}

/// §6.3's "session gone" detection: a JSON-RPC error whose message
/// contains "No conversation found" or "Session not found", or whose
/// code is the generic internal-error code -32603, means the agent has
/// lost track of the session entirely — map it to `Error::SessionGone`
/// so callers can transparently replace the session instead of failing
/// the turn outright.
fn classify_rpc_error(err: &akd_protocol::jsonrpc::JsonRpcError) -> Error {
    const SESSION_GONE_MARKERS: [&str; 2] = ["No conversation found", "Session not found"];
    const SESSION_GONE_CODE: i64 = -32603;

    if err.code == SESSION_GONE_CODE || SESSION_GONE_MARKERS.iter().any(|m| err.message.contains(m)) {
        Error::SessionGone(err.message.clone())
    } else {
        Error::Rpc(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use akd_protocol::jsonrpc::JsonRpcError;

    #[test]
    fn message_marker_is_classified_as_session_gone() {
        let err = JsonRpcError { code: -32000, message: "No conversation found for id s1".into(), data: None };
        assert!(matches!(classify_rpc_error(&err), Error::SessionGone(_)));
    }

    #[test]
    fn internal_error_code_is_classified_as_session_gone() {
        let err = JsonRpcError { code: -32603, message: "boom".into(), data: None };
        assert!(matches!(classify_rpc_error(&err), Error::SessionGone(_)));
    }

    #[test]
    fn unrelated_error_stays_rpc() {
        let err = JsonRpcError { code: -32600, message: "invalid request".into(), data: None };
        assert!(matches!(classify_rpc_error(&err), Error::Rpc(_)));
    }
}
