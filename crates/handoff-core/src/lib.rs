//! Shared types and error kinds for the human-in-the-loop interception bridge.
//!
//! Every other crate in the workspace depends on this one for the data model
//! (`Session`, `SessionEvent`, `TurnId`, ...) and the closed error-kind set
//! that crosses every RPC and storage boundary.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod ids;
pub mod types;

pub use error::{BridgeError, BridgeResult};
pub use ids::{EventId, SessionId, TurnId};
pub use types::{PageCursor, PayloadKind, Session, SessionEvent, SessionPage};
