//! Server coordinator: binds the event store, request queue and
//! broadcaster to the six operations in the RPC surface.

use std::collections::HashSet;
use std::sync::Arc;

use handoff_broadcast::{EventBroadcaster, Subscription};
use handoff_core::{
    BridgeResult, EventId, PageCursor, PayloadKind, Session, SessionId, SessionPage, TurnId,
};
use handoff_queue::RequestQueue;
use handoff_storage::{EventStore, SessionRegistry};
use tokio::sync::RwLock;
use tracing::instrument;

/// Composes the Session Registry, Event Store, Request Queue and Event
/// Broadcaster behind the operations the RPC surface exposes.
///
/// Holds no transport-layer state; [`crate::rpc_impl::RpcImpl`] is the thin
/// adapter that exposes this type over `jsonrpsee`.
pub struct ServerCoordinator {
    registry: Arc<SessionRegistry>,
    store: Arc<EventStore>,
    queue: Arc<RequestQueue>,
    broadcaster: Arc<EventBroadcaster>,
    /// Sessions whose request queue has been reconstructed from the event
    /// log since this process started. Reconstruction happens lazily, on
    /// first access, rather than eagerly for every session at startup.
    reconstructed: RwLock<HashSet<SessionId>>,
}

impl ServerCoordinator {
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: Arc<EventStore>,
        queue: Arc<RequestQueue>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Self {
        Self {
            registry,
            store,
            queue,
            broadcaster,
            reconstructed: RwLock::new(HashSet::new()),
        }
    }

    async fn ensure_queue_reconstructed(&self, session_id: SessionId) -> BridgeResult<()> {
        if self.reconstructed.read().await.contains(&session_id) {
            return Ok(());
        }
        self.queue.reconstruct(session_id, &self.store).await?;
        self.reconstructed.write().await.insert(session_id);
        Ok(())
    }

    #[instrument(skip(self, description))]
    pub async fn create_session(&self, description: Option<String>) -> BridgeResult<Session> {
        self.registry.create_session(description).await
    }

    pub async fn list_sessions(
        &self,
        cursor: PageCursor,
        limit: usize,
    ) -> BridgeResult<SessionPage> {
        self.registry.list_sessions(cursor, limit).await
    }

    pub async fn get_session(&self, session_id: SessionId) -> BridgeResult<Session> {
        self.registry.get_session(session_id).await
    }

    /// Appends a request event, enqueues it, and broadcasts it, all before
    /// this call's per-session append lock is released. The event is durable
    /// and broadcast before this call returns; a subsequent `Subscribe` from
    /// the same caller is guaranteed to observe it, and a concurrent
    /// `submit_request`/`submit_response` on the same session cannot notify
    /// out of sequence order — enqueue and notify run inside the same
    /// critical section that allocated this event's sequence number, so they
    /// cannot be interleaved with a second call's enqueue/notify.
    #[instrument(skip(self, payload))]
    pub async fn submit_request(
        &self,
        session_id: SessionId,
        turn_id: TurnId,
        agent_name: String,
        payload: Vec<u8>,
    ) -> BridgeResult<EventId> {
        self.ensure_queue_reconstructed(session_id).await?;
        let queue = Arc::clone(&self.queue);
        let broadcaster = Arc::clone(&self.broadcaster);
        let (event_id, _sequence) = self
            .store
            .append_event_and(
                session_id,
                turn_id,
                agent_name.clone(),
                PayloadKind::Request,
                payload,
                move |event| async move {
                    queue.enqueue(session_id, turn_id, agent_name).await;
                    broadcaster.notify(session_id, event).await;
                },
            )
            .await?;
        Ok(event_id)
    }

    /// Appends a response event, dequeues the answered turn, and broadcasts
    /// it (including back to the originating plugin subscriber), all before
    /// this call's per-session append lock is released; see
    /// [`Self::submit_request`] for why that ordering matters.
    #[instrument(skip(self, payload))]
    pub async fn submit_response(
        &self,
        session_id: SessionId,
        turn_id: TurnId,
        payload: Vec<u8>,
    ) -> BridgeResult<EventId> {
        self.ensure_queue_reconstructed(session_id).await?;
        let agent_name = self
            .queue
            .agent_name_for(session_id, turn_id)
            .await
            .unwrap_or_default();
        let queue = Arc::clone(&self.queue);
        let broadcaster = Arc::clone(&self.broadcaster);
        let (event_id, _sequence) = self
            .store
            .append_event_and(
                session_id,
                turn_id,
                agent_name,
                PayloadKind::Response,
                payload,
                move |event| async move {
                    queue.dequeue(session_id, turn_id).await;
                    broadcaster.notify(session_id, event).await;
                },
            )
            .await?;
        Ok(event_id)
    }

    /// Attach a new subscriber to a session's event stream. `buffer_size`, if
    /// given, is the subscriber's requested channel capacity (see
    /// `EventBroadcaster::subscribe` for when that request can and cannot be
    /// honored).
    pub async fn subscribe(
        &self,
        session_id: SessionId,
        resume_from_sequence: Option<u64>,
        buffer_size: Option<usize>,
    ) -> BridgeResult<Subscription> {
        self.registry.get_session(session_id).await?;
        self.broadcaster
            .subscribe(session_id, resume_from_sequence, buffer_size)
            .await
    }
}
