//! The closed error-kind set visible at every coordinator boundary.
//!
//! Every RPC, storage call and rendezvous operation maps its failures onto
//! exactly one of these variants. Nothing upstream of this enum invents a new
//! kind; callers that need a different kind of failure are using the wrong
//! API.

use crate::ids::{SessionId, TurnId};

/// Error kinds shared by the server coordinator, the plugin coordinator, and
/// every component between them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: SessionId },

    #[error("session already exists: {session_id}")]
    DuplicateSession { session_id: SessionId },

    #[error("turn {turn_id} already used for a request in session {session_id}")]
    DuplicateTurn {
        session_id: SessionId,
        turn_id: TurnId,
    },

    #[error("no request found for turn {turn_id} in session {session_id}")]
    UnknownTurn {
        session_id: SessionId,
        turn_id: TurnId,
    },

    #[error("turn {turn_id} in session {session_id} was already answered")]
    DuplicateResponse {
        session_id: SessionId,
        turn_id: TurnId,
    },

    #[error("subscriber for session {session_id} fell too far behind and was disconnected")]
    SubscriberTooSlow { session_id: SessionId },

    #[error("connection to the server was lost and reconnection attempts were exhausted")]
    ConnectionLost,

    #[error("operation cancelled")]
    Cancelled,

    #[error("storage failure: {message}")]
    Storage { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl BridgeError {
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// A short, stable tag for logging and for mapping onto wire error codes.
    /// Never parsed by callers; use `std::mem::discriminant` or `matches!`
    /// for programmatic dispatch instead.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionNotFound { .. } => "session_not_found",
            Self::DuplicateSession { .. } => "duplicate_session",
            Self::DuplicateTurn { .. } => "duplicate_turn",
            Self::UnknownTurn { .. } => "unknown_turn",
            Self::DuplicateResponse { .. } => "duplicate_response",
            Self::SubscriberTooSlow { .. } => "subscriber_too_slow",
            Self::ConnectionLost => "connection_lost",
            Self::Cancelled => "cancelled",
            Self::Storage { .. } => "storage",
            Self::Internal { .. } => "internal",
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_are_stable() {
        let err = BridgeError::SessionNotFound {
            session_id: SessionId::new(),
        };
        assert_eq!(err.kind(), "session_not_found");
    }

    #[test]
    fn display_messages_name_the_offending_ids() {
        let session_id = SessionId::new();
        let turn_id = TurnId::new();
        let err = BridgeError::DuplicateTurn {
            session_id,
            turn_id,
        };
        let msg = err.to_string();
        assert!(msg.contains(&turn_id.to_string()));
        assert!(msg.contains(&session_id.to_string()));
    }
}
