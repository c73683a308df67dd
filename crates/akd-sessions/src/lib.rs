//! Session registry, per-session message queue, durable kanban overlay
//! and executor/managed-session registries, open-permission tracking, and
//! startup/idle lifecycle management for the agents daemon.

pub mod kanban_store;
pub mod lifecycle;
pub mod permissions;
pub mod queue;
pub mod registry;
pub mod turn;

pub use kanban_store::{KanbanStore, ManagedSessionInfo};
pub use lifecycle::{recover_on_startup, prune_stale_sessions, RecoveryOutcome};
pub use permissions::PermissionRegistry;
pub use queue::{CoalescedPrompt, QueueRegistry};
pub use registry::{SessionRecord, SessionRegistry};
pub use turn::{derive_activity, derive_stop_reason};
