//! Durable, ordered, append-only log of session events, plus session
//! metadata. See `AppendEvent` / `ReadEventsSince` / `CreateSession` /
//! `GetSession` / `ListSessions` in the coordination spec.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use handoff_core::{
    BridgeError, BridgeResult, EventId, PageCursor, PayloadKind, Session, SessionEvent, SessionId,
    SessionPage, TurnId,
};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument};

use crate::kv::KvStore;

fn session_key(id: SessionId) -> String {
    format!("session:{id}")
}

fn event_key(session_id: SessionId, sequence: u64) -> String {
    format!("event:{session_id}:{sequence:020}")
}

fn event_prefix(session_id: SessionId) -> String {
    format!("event:{session_id}:")
}

fn request_marker_key(session_id: SessionId, turn_id: TurnId) -> String {
    format!("req:{session_id}:{turn_id}")
}

fn response_marker_key(session_id: SessionId, turn_id: TurnId) -> String {
    format!("resp:{session_id}:{turn_id}")
}

fn sequence_counter_key(session_id: SessionId) -> String {
    format!("seqctr:{session_id}")
}

/// Durable log of session events, backed by any [`KvStore`].
///
/// Per-session sequence allocation is serialized through an in-process lock
/// table: two concurrent `append_event` calls for the same session block on
/// each other, but calls for different sessions proceed fully in parallel.
pub struct EventStore {
    kv: Arc<dyn KvStore>,
    session_locks: StdMutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>,
}

impl EventStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            session_locks: StdMutex::new(HashMap::new()),
        }
    }

    fn session_lock(&self, session_id: SessionId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.session_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            locks
                .entry(session_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    #[instrument(skip(self, description))]
    pub async fn create_session(
        &self,
        id: SessionId,
        description: Option<String>,
    ) -> BridgeResult<Session> {
        let session = Session::new(id, Utc::now(), description);
        let bytes = serde_json::to_vec(&session)
            .map_err(|e| BridgeError::internal(format!("failed to encode session: {e}")))?;
        let inserted = self.kv.put_if_absent(&session_key(id), bytes).await?;
        if !inserted {
            return Err(BridgeError::DuplicateSession { session_id: id });
        }
        debug!(session_id = %id, "session created");
        Ok(session)
    }

    pub async fn get_session(&self, id: SessionId) -> BridgeResult<Session> {
        let bytes = self
            .kv
            .get(&session_key(id))
            .await?
            .ok_or(BridgeError::SessionNotFound { session_id: id })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| BridgeError::internal(format!("corrupt session record: {e}")))
    }

    /// Stable ordering by `(created_at, id)`. `cursor` carries the last
    /// session id seen by the caller; an empty cursor starts from the
    /// beginning.
    pub async fn list_sessions(
        &self,
        cursor: PageCursor,
        limit: usize,
    ) -> BridgeResult<SessionPage> {
        let raw = self.kv.scan_prefix("session:").await?;
        let mut sessions = Vec::with_capacity(raw.len());
        for (_, bytes) in raw {
            let session: Session = serde_json::from_slice(&bytes)
                .map_err(|e| BridgeError::internal(format!("corrupt session record: {e}")))?;
            sessions.push(session);
        }
        sessions.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

        let start = match cursor.0 {
            None => 0,
            Some(after_id) => sessions
                .iter()
                .position(|s| s.id.to_string() == after_id)
                .map_or(sessions.len(), |idx| idx + 1),
        };

        let page: Vec<Session> = sessions.iter().skip(start).take(limit).cloned().collect();
        let next_cursor = if start + page.len() < sessions.len() {
            page.last().map(|s| PageCursor(Some(s.id.to_string())))
        } else {
            None
        }
        .unwrap_or_default();

        Ok(SessionPage {
            sessions: page,
            next_cursor,
        })
    }

    /// Atomically allocates the next sequence number for `session_id` and
    /// persists the event. Enforces `DuplicateTurn` on a repeated request and
    /// `UnknownTurn`/`DuplicateResponse` on responses.
    ///
    /// Equivalent to [`Self::append_event_and`] with a no-op callback; use
    /// that method instead when the caller needs to fan the event out to
    /// subscribers, so the notify happens before the per-session append lock
    /// is released.
    pub async fn append_event(
        &self,
        session_id: SessionId,
        turn_id: TurnId,
        agent_name: impl Into<String>,
        payload_kind: PayloadKind,
        payload: Vec<u8>,
    ) -> BridgeResult<(EventId, u64)> {
        self.append_event_and(session_id, turn_id, agent_name, payload_kind, payload, |_| async {})
            .await
    }

    /// Like [`Self::append_event`], but runs `after_append` with the durable
    /// event while the per-session append lock is still held.
    ///
    /// Two concurrent `append_event`/`append_event_and` calls for the same
    /// session serialize their sequence allocation, but releasing the lock
    /// before a caller's own follow-up work (enqueue, broadcast) would let
    /// that follow-up work reorder relative to a second call's — a
    /// subscriber could then observe sequence 2 before sequence 1. Running
    /// `after_append` inside the same critical section that allocated the
    /// sequence keeps visible order and sequence order identical.
    #[instrument(skip(self, payload, after_append))]
    pub async fn append_event_and<F, Fut>(
        &self,
        session_id: SessionId,
        turn_id: TurnId,
        agent_name: impl Into<String>,
        payload_kind: PayloadKind,
        payload: Vec<u8>,
        after_append: F,
    ) -> BridgeResult<(EventId, u64)>
    where
        F: FnOnce(SessionEvent) -> Fut + Send,
        Fut: std::future::Future<Output = ()> + Send,
    {
        self.get_session(session_id).await?;

        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        match payload_kind {
            PayloadKind::Request => {
                let inserted = self
                    .kv
                    .put_if_absent(&request_marker_key(session_id, turn_id), vec![1])
                    .await?;
                if !inserted {
                    return Err(BridgeError::DuplicateTurn {
                        session_id,
                        turn_id,
                    });
                }
            }
            PayloadKind::Response => {
                let request_exists = self
                    .kv
                    .get(&request_marker_key(session_id, turn_id))
                    .await?
                    .is_some();
                if !request_exists {
                    return Err(BridgeError::UnknownTurn {
                        session_id,
                        turn_id,
                    });
                }
                let inserted = self
                    .kv
                    .put_if_absent(&response_marker_key(session_id, turn_id), vec![1])
                    .await?;
                if !inserted {
                    return Err(BridgeError::DuplicateResponse {
                        session_id,
                        turn_id,
                    });
                }
            }
        }

        let sequence = self.allocate_sequence(session_id).await?;
        let event = SessionEvent {
            event_id: EventId::new(),
            session_id,
            sequence,
            timestamp: Utc::now(),
            turn_id,
            agent_name: agent_name.into(),
            payload_kind,
            payload,
        };
        let bytes = serde_json::to_vec(&event)
            .map_err(|e| BridgeError::internal(format!("failed to encode event: {e}")))?;
        self.kv.put(&event_key(session_id, sequence), bytes).await?;
        debug!(session_id = %session_id, turn_id = %turn_id, sequence, kind = ?event.payload_kind, "event appended");
        let event_id = event.event_id;
        after_append(event).await;
        Ok((event_id, sequence))
    }

    async fn allocate_sequence(&self, session_id: SessionId) -> BridgeResult<u64> {
        let key = sequence_counter_key(session_id);
        let current = match self.kv.get(&key).await? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .try_into()
                    .map_err(|_| BridgeError::internal("corrupt sequence counter"))?;
                u64::from_be_bytes(arr)
            }
            None => 0,
        };
        let next = current
            .checked_add(1)
            .ok_or_else(|| BridgeError::internal("sequence counter overflow"))?;
        self.kv.put(&key, next.to_be_bytes().to_vec()).await?;
        Ok(next)
    }

    /// Finite, snapshot-consistent read of every event with
    /// `sequence > after_sequence`, in ascending sequence order.
    pub async fn read_events_since(
        &self,
        session_id: SessionId,
        after_sequence: u64,
    ) -> BridgeResult<Vec<SessionEvent>> {
        let raw = self.kv.scan_prefix(&event_prefix(session_id)).await?;
        let mut events = Vec::with_capacity(raw.len());
        for (_, bytes) in raw {
            let event: SessionEvent = serde_json::from_slice(&bytes)
                .map_err(|e| BridgeError::internal(format!("corrupt event record: {e}")))?;
            if event.sequence > after_sequence {
                events.push(event);
            }
        }
        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }

    /// Current max sequence for a session, or 0 if no events have been
    /// appended yet. Used by the broadcaster to record the replay
    /// high-water mark.
    pub async fn current_sequence(&self, session_id: SessionId) -> BridgeResult<u64> {
        match self.kv.get(&sequence_counter_key(session_id)).await? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .try_into()
                    .map_err(|_| BridgeError::internal("corrupt sequence counter"))?;
                Ok(u64::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_kv::MemoryKvStore;

    fn store() -> EventStore {
        EventStore::new(Arc::new(MemoryKvStore::new()))
    }

    #[tokio::test]
    async fn create_then_get_session() {
        let store = store();
        let id = SessionId::new();
        let created = store
            .create_session(id, Some("demo".to_string()))
            .await
            .unwrap();
        let fetched = store.get_session(id).await.unwrap();
        assert_eq!(created, fetched);
    }

    #[tokio::test]
    async fn duplicate_session_is_rejected() {
        let store = store();
        let id = SessionId::new();
        store.create_session(id, None).await.unwrap();
        let err = store.create_session(id, None).await.unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateSession { .. }));
    }

    #[tokio::test]
    async fn get_session_missing_is_not_found() {
        let store = store();
        let err = store.get_session(SessionId::new()).await.unwrap_err();
        assert!(matches!(err, BridgeError::SessionNotFound { .. }));
    }

    #[tokio::test]
    async fn append_allocates_dense_increasing_sequence() {
        let store = store();
        let session_id = SessionId::new();
        store.create_session(session_id, None).await.unwrap();

        let t1 = TurnId::new();
        let (_, seq1) = store
            .append_event(session_id, t1, "orch", PayloadKind::Request, b"REQ1".to_vec())
            .await
            .unwrap();
        let (_, seq2) = store
            .append_event(
                session_id,
                t1,
                "orch",
                PayloadKind::Response,
                b"RESP1".to_vec(),
            )
            .await
            .unwrap();
        assert_eq!(seq1, 1);
        assert_eq!(seq2, 2);
    }

    #[tokio::test]
    async fn duplicate_request_turn_is_rejected() {
        let store = store();
        let session_id = SessionId::new();
        store.create_session(session_id, None).await.unwrap();
        let turn_id = TurnId::new();
        store
            .append_event(
                session_id,
                turn_id,
                "orch",
                PayloadKind::Request,
                b"A".to_vec(),
            )
            .await
            .unwrap();
        let err = store
            .append_event(
                session_id,
                turn_id,
                "orch",
                PayloadKind::Request,
                b"B".to_vec(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateTurn { .. }));
    }

    #[tokio::test]
    async fn response_without_request_is_unknown_turn() {
        let store = store();
        let session_id = SessionId::new();
        store.create_session(session_id, None).await.unwrap();
        let err = store
            .append_event(
                session_id,
                TurnId::new(),
                "orch",
                PayloadKind::Response,
                b"A".to_vec(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnknownTurn { .. }));
    }

    #[tokio::test]
    async fn second_response_is_rejected() {
        let store = store();
        let session_id = SessionId::new();
        store.create_session(session_id, None).await.unwrap();
        let turn_id = TurnId::new();
        store
            .append_event(
                session_id,
                turn_id,
                "orch",
                PayloadKind::Request,
                b"REQ".to_vec(),
            )
            .await
            .unwrap();
        store
            .append_event(
                session_id,
                turn_id,
                "orch",
                PayloadKind::Response,
                b"A".to_vec(),
            )
            .await
            .unwrap();
        let err = store
            .append_event(
                session_id,
                turn_id,
                "orch",
                PayloadKind::Response,
                b"B".to_vec(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateResponse { .. }));

        let events = store.read_events_since(session_id, 0).await.unwrap();
        let responses: Vec<_> = events
            .iter()
            .filter(|e| e.payload_kind == PayloadKind::Response)
            .collect();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].payload, b"A");
    }

    #[tokio::test]
    async fn read_events_since_respects_resume_point() {
        let store = store();
        let session_id = SessionId::new();
        store.create_session(session_id, None).await.unwrap();
        let t1 = TurnId::new();
        let t2 = TurnId::new();
        store
            .append_event(session_id, t1, "a", PayloadKind::Request, b"1".to_vec())
            .await
            .unwrap();
        store
            .append_event(session_id, t2, "b", PayloadKind::Request, b"2".to_vec())
            .await
            .unwrap();

        let all = store.read_events_since(session_id, 0).await.unwrap();
        assert_eq!(all.len(), 2);

        let tail = store.read_events_since(session_id, 1).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].sequence, 2);
    }

    #[tokio::test]
    async fn list_sessions_orders_by_created_at_then_id() {
        let store = store();
        let ids: Vec<_> = (0..3).map(|_| SessionId::new()).collect();
        for id in &ids {
            store.create_session(*id, None).await.unwrap();
        }
        let page = store
            .list_sessions(PageCursor::default(), 10)
            .await
            .unwrap();
        assert_eq!(page.sessions.len(), 3);
        assert!(page.next_cursor.0.is_none());
    }

    #[tokio::test]
    async fn list_sessions_paginates_with_cursor() {
        let store = store();
        let mut ids: Vec<_> = (0..5).map(|_| SessionId::new()).collect();
        for id in &ids {
            store.create_session(*id, None).await.unwrap();
        }
        let first = store
            .list_sessions(PageCursor::default(), 2)
            .await
            .unwrap();
        assert_eq!(first.sessions.len(), 2);
        assert!(first.next_cursor.0.is_some());

        let second = store.list_sessions(first.next_cursor, 2).await.unwrap();
        assert_eq!(second.sessions.len(), 2);

        ids.sort();
        let seen: Vec<SessionId> = first
            .sessions
            .iter()
            .chain(second.sessions.iter())
            .map(|s| s.id)
            .collect();
        for id in &seen {
            assert!(ids.contains(id));
        }
    }
}
