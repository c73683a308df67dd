//! Event sink indirection.
//!
//! Internal components never call clients directly — they hand events to
//! the daemon's broadcast pipeline, which invokes whatever sink is
//! currently installed. The sink is a plain synchronous function so a
//! transport can swap it out on hot-reload without losing events: the
//! daemon's identity and state persist across the swap, only the callback
//! pointer changes.

use std::sync::Arc;

use akd_domain::event::BroadcastEvent;

pub type EventSink = Arc<dyn Fn(BroadcastEvent) + Send + Sync>;

/// Installed before any transport attaches — drops events on the floor
/// rather than panicking, so daemon startup never depends on a transport
/// being ready first.
pub fn noop_sink() -> EventSink {
    Arc::new(|_event| {})
}
