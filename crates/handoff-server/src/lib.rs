//! Server coordinator: session lifecycle, queue, broadcast and event log
//! bound to the RPC surface.
//!
//! [`coordinator::ServerCoordinator`] holds all the business logic and has
//! no transport dependency; [`rpc_impl::RpcImpl`] is the thin `jsonrpsee`
//! adapter, and [`startup::serve`] binds the two together on a socket.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod rpc;
pub mod rpc_impl;
pub mod startup;

pub use coordinator::ServerCoordinator;
pub use rpc::{HandoffRpcClient, HandoffRpcServer};
pub use rpc_impl::RpcImpl;
pub use startup::{build_coordinator, serve};
