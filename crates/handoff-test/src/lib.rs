//! Shared test fixtures and an in-process server+client harness.
//!
//! Every crate in this workspace that needs to drive a real server over a
//! real socket, rather than exercising `ServerCoordinator` directly,
//! depends on this crate as a dev-dependency and uses [`Harness::start`].

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::{init_tracing, sample_event, sample_payload};
pub use harness::Harness;
pub use mocks::in_memory_coordinator;
