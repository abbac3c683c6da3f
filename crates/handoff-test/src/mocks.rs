//! In-memory-only coordinator construction, for tests that want the real
//! `ServerCoordinator` logic without binding a socket.

use std::sync::Arc;

use handoff_broadcast::EventBroadcaster;
use handoff_queue::RequestQueue;
use handoff_server::ServerCoordinator;
use handoff_storage::{EventStore, MemoryKvStore, SessionRegistry};

/// Build a `ServerCoordinator` backed entirely by in-memory storage, with no
/// RPC layer attached. Useful for tests that want to drive session/event
/// semantics directly, the way `handoff-server`'s own unit tests do.
#[must_use]
pub fn in_memory_coordinator() -> ServerCoordinator {
    let store = Arc::new(EventStore::new(Arc::new(MemoryKvStore::new())));
    let registry = Arc::new(SessionRegistry::new(Arc::clone(&store)));
    let queue = Arc::new(RequestQueue::new());
    let broadcaster = Arc::new(EventBroadcaster::new(Arc::clone(&store)));
    ServerCoordinator::new(registry, store, queue, broadcaster)
}
