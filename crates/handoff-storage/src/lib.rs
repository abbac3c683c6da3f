//! Durable event log and session registry.
//!
//! Storage is split into two layers: [`kv`] is a small trait seam over an
//! embedded key-value engine (backed by `surrealkv` when the `kv` feature is
//! enabled, or a pure in-memory map for tests and ephemeral sessions), and
//! [`event_store`] layers the session/event contract from the coordination
//! spec on top of it.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod event_store;
pub mod kv;
pub mod memory_kv;
pub mod session_registry;
#[cfg(feature = "kv")]
pub mod surreal_kv;

pub use event_store::EventStore;
pub use kv::KvStore;
pub use memory_kv::MemoryKvStore;
pub use session_registry::SessionRegistry;
#[cfg(feature = "kv")]
pub use surreal_kv::SurrealKvStore;
