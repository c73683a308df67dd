//! The agent RPC dialect: JSON-RPC framing plus the method/params/result
//! types exchanged with agent child processes over stdio.

pub mod jsonrpc;
pub mod methods;
pub mod session_gone;
