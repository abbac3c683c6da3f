//! Session identity, kept as a distinct component from the event log.
//!
//! Today this is a thin wrapper that mints ids and forwards to
//! [`EventStore`]; it exists separately because the identity source may
//! later diverge from the event log (for example, sessions registered by an
//! external directory rather than created through this process).

use handoff_core::{BridgeResult, PageCursor, Session, SessionId, SessionPage};

use crate::event_store::EventStore;
use std::sync::Arc;

pub struct SessionRegistry {
    store: Arc<EventStore>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }

    pub async fn create_session(&self, description: Option<String>) -> BridgeResult<Session> {
        let id = SessionId::new();
        self.store.create_session(id, description).await
    }

    pub async fn get_session(&self, id: SessionId) -> BridgeResult<Session> {
        self.store.get_session(id).await
    }

    pub async fn list_sessions(
        &self,
        cursor: PageCursor,
        limit: usize,
    ) -> BridgeResult<SessionPage> {
        self.store.list_sessions(cursor, limit).await
    }
}
