//! Daemon singleton — global coordinator owning the connection manager,
//! session registry, queues, kanban store, and worker pool.
//!
//! Survives hot-reload of the transport layer: the transport re-acquires
//! this instance from [`global`] and installs a fresh sink via
//! [`Daemon::set_event_sink`]; the daemon's identity and in-memory state
//! are untouched by that swap.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use akd_domain::config::Config;
use akd_domain::event::BroadcastEvent;
use akd_pool::WorkerPool;
use akd_rpc::manager::ConnectionManager;
use akd_sessions::{KanbanStore, PermissionRegistry, QueueRegistry, SessionRegistry};

use crate::sink::{noop_sink, EventSink};

static DAEMON: OnceLock<Arc<Daemon>> = OnceLock::new();

/// `sessions/list` coalescing: at most one call in flight at a time, with
/// a 15s staleness cutoff past which a stuck call is abandoned rather than
/// awaited forever.
pub(crate) struct BroadcastCoalescer {
    in_flight_since: Mutex<Option<Instant>>,
}

impl BroadcastCoalescer {
    const STALENESS_CUTOFF: Duration = Duration::from_secs(15);

    fn new() -> Self {
        Self { in_flight_since: Mutex::new(None) }
    }

    /// Returns `true` if the caller should actually perform the
    /// `sessions/list` round trip (no call in flight, or the existing one
    /// went stale); `false` if it should piggyback on the in-flight call.
    pub(crate) fn should_run(&self) -> bool {
        let mut guard = self.in_flight_since.lock();
        match *guard {
            Some(started) if started.elapsed() < Self::STALENESS_CUTOFF => false,
            _ => {
                *guard = Some(Instant::now());
                true
            }
        }
    }

    pub(crate) fn finish(&self) {
        *self.in_flight_since.lock() = None;
    }
}

pub struct Daemon {
    pub config: Arc<Config>,
    pub connections: Arc<ConnectionManager>,
    pub sessions: Arc<SessionRegistry>,
    pub queues: Arc<QueueRegistry>,
    pub kanban: Arc<KanbanStore>,
    pub pool: Arc<WorkerPool>,
    pub permissions: Arc<PermissionRegistry>,
    sink: RwLock<EventSink>,
    pub(crate) coalescer: BroadcastCoalescer,
}

impl Daemon {
    pub fn new(
        config: Arc<Config>,
        connections: Arc<ConnectionManager>,
        sessions: Arc<SessionRegistry>,
        queues: Arc<QueueRegistry>,
        kanban: Arc<KanbanStore>,
        pool: Arc<WorkerPool>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            connections,
            sessions,
            queues,
            kanban,
            pool,
            permissions: Arc::new(PermissionRegistry::new()),
            sink: RwLock::new(noop_sink()),
            coalescer: BroadcastCoalescer::new(),
        })
    }

    /// Install this daemon in the process-wide registration slot. Panics
    /// if called twice — daemon identity is meant to be set up exactly
    /// once per process.
    pub fn install(daemon: Arc<Daemon>) {
        DAEMON
            .set(daemon)
            .unwrap_or_else(|_| panic!("Daemon::install called more than once"));
    }

    pub fn global() -> Arc<Daemon> {
        DAEMON.get().cloned().expect("Daemon::install was never called")
    }

    /// Replace the active sink. A transport reload calls this after
    /// re-acquiring the daemon via `global()`; no event emitted before or
    /// after the swap is missed because broadcast() always reads through
    /// the same lock.
    pub fn set_event_sink(&self, sink: EventSink) {
        *self.sink.write() = sink;
    }

    /// Every outward-facing event passes through here. Invokes the
    /// installed sink under a read lock so `set_event_sink` can't race a
    /// concurrent broadcast into being lost.
    pub fn broadcast(&self, event: BroadcastEvent) {
        let sink = self.sink.read();
        sink(event);
    }

    pub async fn shutdown(&self) {
        let grace = Duration::from_millis(self.config.worker_pool.shutdown_grace_ms);
        self.pool.shutdown().await;
        self.connections.shutdown_all(grace).await;
    }
}

#[cfg(test)]
mod tests {
    use super::BroadcastCoalescer;

    #[test]
    fn second_concurrent_call_piggybacks() {
        let c = BroadcastCoalescer::new();
        assert!(c.should_run());
        assert!(!c.should_run(), "concurrent call should not re-run while one is in flight");
        c.finish();
        assert!(c.should_run(), "after finish, a fresh call may run");
    }
}
