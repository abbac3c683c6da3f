//! Server startup: wires storage, queue and broadcaster together and binds
//! the `jsonrpsee` server.

use std::net::SocketAddr;
use std::sync::Arc;

use handoff_broadcast::EventBroadcaster;
use handoff_config::ServerConfig;
use handoff_core::BridgeError;
use handoff_queue::RequestQueue;
use handoff_storage::{EventStore, KvStore, MemoryKvStore, SessionRegistry, SurrealKvStore};
use jsonrpsee::server::{Server, ServerHandle};
use tracing::info;

use crate::coordinator::ServerCoordinator;
use crate::rpc::HandoffRpcServer;
use crate::rpc_impl::RpcImpl;

/// Build the storage/queue/broadcast stack described by `config`, without
/// binding a network listener. Used directly by the in-process test harness,
/// which talks to the coordinator without going over a socket at all.
///
/// # Errors
///
/// Returns an error if `config.storage_path` is set but the embedded store
/// fails to open.
pub fn build_coordinator(config: &ServerConfig) -> Result<Arc<ServerCoordinator>, BridgeError> {
    let kv: Arc<dyn KvStore> = match &config.storage_path {
        Some(path) => Arc::new(SurrealKvStore::open(path)?),
        None => Arc::new(MemoryKvStore::new()),
    };
    let store = Arc::new(EventStore::new(kv));
    let registry = Arc::new(SessionRegistry::new(Arc::clone(&store)));
    let queue = Arc::new(RequestQueue::new());
    let broadcaster = Arc::new(EventBroadcaster::with_buffer_size(
        Arc::clone(&store),
        config.subscribe_buffer_size,
    ));
    Ok(Arc::new(ServerCoordinator::new(
        registry,
        store,
        queue,
        broadcaster,
    )))
}

/// Bind `config.bind_address` and start serving the RPC surface. Returns the
/// handle (used to stop the server) and the address actually bound, which
/// may differ from `config.bind_address` when the configured port is `0`.
///
/// # Errors
///
/// Returns an error if the configured address cannot be bound.
pub async fn serve(
    config: &ServerConfig,
) -> Result<(ServerHandle, SocketAddr, Arc<ServerCoordinator>), BridgeError> {
    let coordinator = build_coordinator(config)?;

    let server = Server::builder()
        .build(&config.bind_address)
        .await
        .map_err(|e| BridgeError::internal(format!("failed to bind {}: {e}", config.bind_address)))?;
    let addr = server
        .local_addr()
        .map_err(|e| BridgeError::internal(format!("failed to read bound address: {e}")))?;

    let rpc_impl = RpcImpl::new(Arc::clone(&coordinator));
    let handle = server.start(rpc_impl.into_rpc());
    info!(%addr, "handoff server listening");

    Ok((handle, addr, coordinator))
}
