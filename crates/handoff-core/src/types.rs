//! Core data model: sessions, events, and the opaque payload they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EventId, SessionId, TurnId};

/// A container for a logically related sequence of turns.
///
/// Created once by `CreateSession`, never mutated, never deleted. Identity is
/// stable across server restarts because it is persisted in the event store
/// alongside the log itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub description: Option<String>,
}

impl Session {
    #[must_use]
    pub fn new(id: SessionId, created_at: DateTime<Utc>, description: Option<String>) -> Self {
        Self {
            id,
            created_at,
            description,
        }
    }
}

/// Which half of a turn an event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Request,
    Response,
}

impl PayloadKind {
    #[must_use]
    pub fn is_request(self) -> bool {
        matches!(self, Self::Request)
    }

    #[must_use]
    pub fn is_response(self) -> bool {
        matches!(self, Self::Response)
    }
}

/// A durable, immutable record of either a request or a response submission
/// within a session.
///
/// `sequence` is the only field that defines order; `timestamp` is
/// informational and must never be used to sort events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub event_id: EventId,
    pub session_id: SessionId,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub turn_id: TurnId,
    pub agent_name: String,
    pub payload_kind: PayloadKind,
    #[serde(with = "payload_base64")]
    pub payload: Vec<u8>,
}

/// Opaque payloads cross the wire as base64 inside JSON; the coordinator
/// never looks at the bytes either way.
mod payload_base64 {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}

/// Opaque pagination token for `ListSessions`. Implementation-private; callers
/// pass back exactly what they were given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor(pub Option<String>);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPage {
    pub sessions: Vec<Session>,
    pub next_cursor: PageCursor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips_through_base64_json() {
        let event = SessionEvent {
            event_id: EventId::new(),
            session_id: SessionId::new(),
            sequence: 1,
            timestamp: Utc::now(),
            turn_id: TurnId::new(),
            agent_name: "orch".to_string(),
            payload_kind: PayloadKind::Request,
            payload: b"REQ1".to_vec(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.payload, b"REQ1");
        assert_eq!(back.sequence, 1);
    }

    #[test]
    fn payload_kind_predicates() {
        assert!(PayloadKind::Request.is_request());
        assert!(!PayloadKind::Request.is_response());
        assert!(PayloadKind::Response.is_response());
    }
}
