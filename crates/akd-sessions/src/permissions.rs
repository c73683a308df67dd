//! Open permission-request tracking.
//!
//! The agent may ask the daemon to authorize a tool call mid-turn
//! (§6.1/§6.3 `requestPermission`). The daemon forwards the request to
//! clients and waits for `resolve_permission`; in the meantime the
//! request stays "open" here — keyed by the id the agent's JSON-RPC
//! request carried, so the eventual reply can be written back to the
//! right connection — so a cancel can release it (denying once) rather
//! than leave the agent's RPC hanging forever (§5).

use std::collections::HashMap;

use parking_lot::RwLock;

use akd_domain::session::ExecutorKind;

#[derive(Debug, Clone)]
pub struct OpenPermissionRequest {
    pub session_id: String,
    pub executor_kind: ExecutorKind,
    /// The agent's own JSON-RPC request id, needed to address the reply.
    pub rpc_id: u64,
}

pub struct PermissionRegistry {
    by_request_id: RwLock<HashMap<String, OpenPermissionRequest>>,
    /// session_id -> request ids, insertion order preserved, for
    /// `release_session`.
    by_session: RwLock<HashMap<String, Vec<String>>>,
}

impl PermissionRegistry {
    pub fn new() -> Self {
        Self {
            by_request_id: RwLock::new(HashMap::new()),
            by_session: RwLock::new(HashMap::new()),
        }
    }

    pub fn track(&self, request_id: impl Into<String>, request: OpenPermissionRequest) {
        let request_id = request_id.into();
        self.by_session
            .write()
            .entry(request.session_id.clone())
            .or_default()
            .push(request_id.clone());
        self.by_request_id.write().insert(request_id, request);
    }

    /// Remove and return one request's bookkeeping — used once the reply
    /// (user-resolved or released) has been sent to the agent.
    pub fn take(&self, request_id: &str) -> Option<OpenPermissionRequest> {
        let request = self.by_request_id.write().remove(request_id)?;
        if let Some(ids) = self.by_session.write().get_mut(&request.session_id) {
            ids.retain(|id| id != request_id);
        }
        Some(request)
    }

    /// Drain every open request for a session — used right before sending
    /// `cancel` to the agent, so each one can be denied before the turn
    /// is torn down. Returns `(request_id, request)` pairs.
    pub fn release_session(&self, session_id: &str) -> Vec<(String, OpenPermissionRequest)> {
        let ids = self.by_session.write().remove(session_id).unwrap_or_default();
        let mut by_request_id = self.by_request_id.write();
        ids.into_iter().filter_map(|id| by_request_id.remove(&id).map(|r| (id, r))).collect()
    }

    pub fn open_count(&self, session_id: &str) -> usize {
        self.by_session.read().get(session_id).map(|v| v.len()).unwrap_or(0)
    }
}

impl Default for PermissionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(session_id: &str, rpc_id: u64) -> OpenPermissionRequest {
        OpenPermissionRequest { session_id: session_id.into(), executor_kind: ExecutorKind::Primary, rpc_id }
    }

    #[test]
    fn take_removes_only_matching_request() {
        let reg = PermissionRegistry::new();
        reg.track("r1", req("s1", 1));
        reg.track("r2", req("s1", 2));
        assert!(reg.take("r1").is_some());
        assert_eq!(reg.open_count("s1"), 1);
        assert!(reg.take("not-there").is_none());
    }

    #[test]
    fn release_session_drains_all_open_requests() {
        let reg = PermissionRegistry::new();
        reg.track("r1", req("s1", 1));
        reg.track("r2", req("s1", 2));
        let released = reg.release_session("s1");
        assert_eq!(released.len(), 2);
        assert_eq!(reg.open_count("s1"), 0);
    }

    #[test]
    fn release_on_session_with_no_requests_is_empty() {
        let reg = PermissionRegistry::new();
        assert!(reg.release_session("s1").is_empty());
    }
}
