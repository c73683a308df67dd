//! RPC Connection Manager — spawns and holds agent child process
//! connections, one per [`akd_domain::session::ExecutorKind`], and
//! demultiplexes their stdio traffic into request/response pairs and
//! notifications.

pub mod connection;
pub mod manager;
pub mod sidechannel;
pub mod transport;

pub use connection::AgentConnection;
pub use manager::{ConnectionManager, ManagerError, TapEvent};
