//! Binds [`ServerCoordinator`] to the `jsonrpsee`-generated server trait.

use std::sync::Arc;

use handoff_core::{EventId, PageCursor, Session, SessionEvent, SessionId, SessionPage, TurnId};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::{PendingSubscriptionSink, SubscriptionMessage};
use tracing::warn;

use crate::coordinator::ServerCoordinator;
use crate::rpc::{bridge_error_to_rpc, HandoffRpcServer};

/// The `jsonrpsee` method handler. Holds nothing beyond a handle on the
/// coordinator; every RPC is a thin delegation plus error-kind mapping.
pub struct RpcImpl {
    coordinator: Arc<ServerCoordinator>,
}

impl RpcImpl {
    #[must_use]
    pub fn new(coordinator: Arc<ServerCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[jsonrpsee::core::async_trait]
impl HandoffRpcServer for RpcImpl {
    async fn create_session(
        &self,
        description: Option<String>,
    ) -> Result<Session, ErrorObjectOwned> {
        self.coordinator
            .create_session(description)
            .await
            .map_err(bridge_error_to_rpc)
    }

    async fn list_sessions(
        &self,
        cursor: PageCursor,
        limit: usize,
    ) -> Result<SessionPage, ErrorObjectOwned> {
        self.coordinator
            .list_sessions(cursor, limit)
            .await
            .map_err(bridge_error_to_rpc)
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Session, ErrorObjectOwned> {
        self.coordinator
            .get_session(session_id)
            .await
            .map_err(bridge_error_to_rpc)
    }

    async fn submit_request(
        &self,
        session_id: SessionId,
        turn_id: TurnId,
        agent_name: String,
        payload: Vec<u8>,
    ) -> Result<EventId, ErrorObjectOwned> {
        self.coordinator
            .submit_request(session_id, turn_id, agent_name, payload)
            .await
            .map_err(bridge_error_to_rpc)
    }

    async fn submit_response(
        &self,
        session_id: SessionId,
        turn_id: TurnId,
        payload: Vec<u8>,
    ) -> Result<EventId, ErrorObjectOwned> {
        self.coordinator
            .submit_response(session_id, turn_id, payload)
            .await
            .map_err(bridge_error_to_rpc)
    }

    async fn subscribe(
        &self,
        pending: PendingSubscriptionSink,
        session_id: SessionId,
        resume_from_sequence: Option<u64>,
        buffer_size: Option<usize>,
    ) -> jsonrpsee::core::SubscriptionResult {
        let mut subscription = self
            .coordinator
            .subscribe(session_id, resume_from_sequence, buffer_size)
            .await
            .map_err(|err| jsonrpsee::core::StringError::from(err.to_string()))?;

        let sink = pending.accept().await?;

        tokio::spawn(async move {
            loop {
                let event: SessionEvent = match subscription.recv().await {
                    Ok(Some(event)) => event,
                    Ok(None) => break,
                    Err(err) => {
                        warn!(%err, "subscription terminated");
                        break;
                    }
                };
                match SubscriptionMessage::from_json(&event) {
                    Ok(msg) => {
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(%err, "failed to serialize session event"),
                }
            }
        });

        Ok(())
    }
}
