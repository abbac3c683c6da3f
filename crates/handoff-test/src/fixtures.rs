//! Small, deliberately uninteresting values used across multiple crates'
//! test suites.

use chrono::Utc;
use handoff_core::{EventId, PayloadKind, SessionEvent, SessionId, TurnId};

/// An arbitrary, human-distinguishable byte payload.
#[must_use]
pub fn sample_payload(tag: &str) -> Vec<u8> {
    tag.as_bytes().to_vec()
}

/// Build a `SessionEvent` out of thin air, for tests that exercise
/// broadcast/subscription behavior without going through a real event
/// store.
#[must_use]
pub fn sample_event(session_id: SessionId, sequence: u64, kind: PayloadKind) -> SessionEvent {
    SessionEvent {
        event_id: EventId::new(),
        session_id,
        sequence,
        timestamp: Utc::now(),
        turn_id: TurnId::new(),
        agent_name: "test-agent".to_string(),
        payload_kind: kind,
        payload: sample_payload("payload"),
    }
}

/// Initialize a test-scoped tracing subscriber. Safe to call from many
/// tests; only the first call in a process takes effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_event_carries_the_requested_sequence_and_kind() {
        let session_id = SessionId::new();
        let event = sample_event(session_id, 7, PayloadKind::Response);
        assert_eq!(event.sequence, 7);
        assert_eq!(event.session_id, session_id);
        assert!(event.payload_kind.is_response());
    }
}
