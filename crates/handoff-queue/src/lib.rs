//! Per-session FIFO of requests awaiting a human response.
//!
//! Exists only in memory; reconstructed at startup (or on first access after
//! a restart) by scanning the [`EventStore`](handoff_storage::EventStore) for
//! requests whose turn has no matching response yet.

#![deny(unsafe_code)]
#![warn(clippy::all)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use handoff_core::{PayloadKind, SessionId, TurnId};
use handoff_storage::EventStore;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub turn_id: TurnId,
    pub agent_name: String,
}

/// Per-session FIFO, keyed by session id.
pub struct RequestQueue {
    sessions: RwLock<HashMap<SessionId, VecDeque<QueueEntry>>>,
}

impl RequestQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn enqueue(&self, session_id: SessionId, turn_id: TurnId, agent_name: String) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id)
            .or_default()
            .push_back(QueueEntry {
                turn_id,
                agent_name,
            });
    }

    /// Removing an already-absent turn is a no-op, not an error: responses
    /// may race a reconnect-triggered `Reconstruct`, and the dequeue must
    /// stay idempotent either way.
    pub async fn dequeue(&self, session_id: SessionId, turn_id: TurnId) {
        let mut sessions = self.sessions.write().await;
        if let Some(queue) = sessions.get_mut(&session_id) {
            queue.retain(|entry| entry.turn_id != turn_id);
        }
    }

    pub async fn head(&self, session_id: SessionId) -> Option<TurnId> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&session_id)
            .and_then(|queue| queue.front())
            .map(|entry| entry.turn_id)
    }

    pub async fn len(&self, session_id: SessionId) -> usize {
        let sessions = self.sessions.read().await;
        sessions.get(&session_id).map_or(0, VecDeque::len)
    }

    /// The agent name recorded for a still-pending turn, if any. The server
    /// coordinator uses this to recover `agent_name` for `SubmitResponse`,
    /// whose wire signature carries only `turn_id`.
    pub async fn agent_name_for(&self, session_id: SessionId, turn_id: TurnId) -> Option<String> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&session_id)?
            .iter()
            .find(|entry| entry.turn_id == turn_id)
            .map(|entry| entry.agent_name.clone())
    }

    /// Scans the event store for every request in `session_id` with no
    /// matching response and rebuilds the in-memory queue from it, in
    /// original enqueue (append) order. Safe to call repeatedly; it replaces
    /// whatever was in memory for that session.
    pub async fn reconstruct(&self, session_id: SessionId, store: &EventStore) -> Result<(), handoff_core::BridgeError> {
        let events = store.read_events_since(session_id, 0).await?;
        let mut answered = std::collections::HashSet::new();
        for event in &events {
            if event.payload_kind == PayloadKind::Response {
                answered.insert(event.turn_id);
            }
        }

        let mut pending = VecDeque::new();
        for event in &events {
            if event.payload_kind == PayloadKind::Request && !answered.contains(&event.turn_id) {
                pending.push_back(QueueEntry {
                    turn_id: event.turn_id,
                    agent_name: event.agent_name.clone(),
                });
            }
        }

        let count = pending.len();
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id, pending);
        debug!(session_id = %session_id, pending = count, "request queue reconstructed");
        Ok(())
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared-ownership handle, the shape every caller actually holds.
pub type SharedRequestQueue = Arc<RequestQueue>;

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_storage::MemoryKvStore;

    fn store() -> Arc<EventStore> {
        Arc::new(EventStore::new(Arc::new(MemoryKvStore::new())))
    }

    #[tokio::test]
    async fn fifo_head_advances_on_dequeue() {
        let queue = RequestQueue::new();
        let session_id = SessionId::new();
        let t1 = TurnId::new();
        let t2 = TurnId::new();
        queue.enqueue(session_id, t1, "a".to_string()).await;
        queue.enqueue(session_id, t2, "b".to_string()).await;

        assert_eq!(queue.head(session_id).await, Some(t1));
        queue.dequeue(session_id, t1).await;
        assert_eq!(queue.head(session_id).await, Some(t2));
        queue.dequeue(session_id, t2).await;
        assert_eq!(queue.head(session_id).await, None);
    }

    #[tokio::test]
    async fn agent_name_for_resolves_a_pending_turn() {
        let queue = RequestQueue::new();
        let session_id = SessionId::new();
        let turn_id = TurnId::new();
        queue.enqueue(session_id, turn_id, "orch".to_string()).await;
        assert_eq!(
            queue.agent_name_for(session_id, turn_id).await,
            Some("orch".to_string())
        );
        queue.dequeue(session_id, turn_id).await;
        assert_eq!(queue.agent_name_for(session_id, turn_id).await, None);
    }

    #[tokio::test]
    async fn dequeue_of_absent_turn_is_a_no_op() {
        let queue = RequestQueue::new();
        let session_id = SessionId::new();
        queue.dequeue(session_id, TurnId::new()).await;
        assert_eq!(queue.head(session_id).await, None);
    }

    #[tokio::test]
    async fn reconstruct_recovers_unanswered_request_across_restart() {
        let store = store();
        let session_id = SessionId::new();
        store.create_session(session_id, None).await.unwrap();
        let t4 = TurnId::new();
        store
            .append_event(
                session_id,
                t4,
                "orch",
                PayloadKind::Request,
                b"REQ4".to_vec(),
            )
            .await
            .unwrap();

        let queue = RequestQueue::new();
        queue.reconstruct(session_id, &store).await.unwrap();
        assert_eq!(queue.head(session_id).await, Some(t4));
    }

    #[tokio::test]
    async fn reconstruct_excludes_already_answered_turns() {
        let store = store();
        let session_id = SessionId::new();
        store.create_session(session_id, None).await.unwrap();
        let t1 = TurnId::new();
        store
            .append_event(session_id, t1, "a", PayloadKind::Request, b"1".to_vec())
            .await
            .unwrap();
        store
            .append_event(session_id, t1, "a", PayloadKind::Response, b"2".to_vec())
            .await
            .unwrap();

        let queue = RequestQueue::new();
        queue.reconstruct(session_id, &store).await.unwrap();
        assert_eq!(queue.head(session_id).await, None);
    }
}
