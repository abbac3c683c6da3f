//! JSON-RPC API definition for UI/plugin ↔ server communication.
//!
//! Uses `jsonrpsee` proc macros to define the RPC interface. The server
//! coordinator implements the server side; the plugin coordinator and any UI
//! client use the generated client side.

use handoff_core::{BridgeError, EventId, PageCursor, Session, SessionEvent, SessionId, SessionPage, TurnId};
use jsonrpsee::core::SubscriptionResult;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;

/// The coordination bridge's RPC API.
///
/// Implemented by the server coordinator (server side). Called by the
/// plugin coordinator and by UI clients (client side).
#[rpc(server, client, namespace = "handoff")]
pub trait HandoffRpc {
    /// Create a new session.
    #[method(name = "createSession")]
    async fn create_session(
        &self,
        description: Option<String>,
    ) -> Result<Session, ErrorObjectOwned>;

    /// List sessions, stably ordered by `(created_at, id)`.
    #[method(name = "listSessions")]
    async fn list_sessions(
        &self,
        cursor: PageCursor,
        limit: usize,
    ) -> Result<SessionPage, ErrorObjectOwned>;

    /// Fetch a single session by id.
    #[method(name = "getSession")]
    async fn get_session(&self, session_id: SessionId) -> Result<Session, ErrorObjectOwned>;

    /// Submit a request event, minted by an intercepting plugin.
    #[method(name = "submitRequest")]
    async fn submit_request(
        &self,
        session_id: SessionId,
        turn_id: TurnId,
        agent_name: String,
        payload: Vec<u8>,
    ) -> Result<EventId, ErrorObjectOwned>;

    /// Submit a response event, supplied by a human (or another automated
    /// client) through a subscribed UI.
    #[method(name = "submitResponse")]
    async fn submit_response(
        &self,
        session_id: SessionId,
        turn_id: TurnId,
        payload: Vec<u8>,
    ) -> Result<EventId, ErrorObjectOwned>;

    /// Subscribe to a session's event stream: historical replay followed by
    /// live delivery. Stays open until the caller unsubscribes or the
    /// subscriber falls too far behind. `buffer_size`, if given, requests the
    /// channel capacity backing this subscription (honored only if this
    /// subscriber is the first to attach to its session; see
    /// `handoff_broadcast::EventBroadcaster::subscribe`).
    #[subscription(name = "subscribe" => "event", unsubscribe = "unsubscribe", item = SessionEvent)]
    async fn subscribe(
        &self,
        session_id: SessionId,
        resume_from_sequence: Option<u64>,
        buffer_size: Option<usize>,
    ) -> SubscriptionResult;
}

/// Stable numeric codes for every [`BridgeError`] variant, carried in the
/// JSON-RPC error object alongside the human-readable message.
pub mod error_codes {
    pub const SESSION_NOT_FOUND: i32 = -32001;
    pub const DUPLICATE_SESSION: i32 = -32002;
    pub const DUPLICATE_TURN: i32 = -32003;
    pub const UNKNOWN_TURN: i32 = -32004;
    pub const DUPLICATE_RESPONSE: i32 = -32005;
    pub const SUBSCRIBER_TOO_SLOW: i32 = -32006;
    pub const CONNECTION_LOST: i32 = -32007;
    pub const CANCELLED: i32 = -32008;
    pub const STORAGE: i32 = -32009;
    pub const INTERNAL: i32 = -32010;
}

/// Maps a [`BridgeError`] onto its stable wire error code and message. Never
/// wraps the error with source-language stack encoding; each kind maps to
/// exactly one code.
#[must_use]
pub fn bridge_error_to_rpc(err: BridgeError) -> ErrorObjectOwned {
    let code = match &err {
        BridgeError::SessionNotFound { .. } => error_codes::SESSION_NOT_FOUND,
        BridgeError::DuplicateSession { .. } => error_codes::DUPLICATE_SESSION,
        BridgeError::DuplicateTurn { .. } => error_codes::DUPLICATE_TURN,
        BridgeError::UnknownTurn { .. } => error_codes::UNKNOWN_TURN,
        BridgeError::DuplicateResponse { .. } => error_codes::DUPLICATE_RESPONSE,
        BridgeError::SubscriberTooSlow { .. } => error_codes::SUBSCRIBER_TOO_SLOW,
        BridgeError::ConnectionLost => error_codes::CONNECTION_LOST,
        BridgeError::Cancelled => error_codes::CANCELLED,
        BridgeError::Storage { .. } => error_codes::STORAGE,
        BridgeError::Internal { .. } => error_codes::INTERNAL,
    };
    ErrorObjectOwned::owned(code, err.to_string(), None::<()>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_session_not_found_to_its_stable_code() {
        let err = BridgeError::SessionNotFound {
            session_id: SessionId::new(),
        };
        let obj = bridge_error_to_rpc(err);
        assert_eq!(obj.code(), error_codes::SESSION_NOT_FOUND);
    }
}
