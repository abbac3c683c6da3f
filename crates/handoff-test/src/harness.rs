//! In-process server + client harness: binds the real RPC server to an
//! ephemeral port and hands back a connected client, so dependent crates'
//! tests can exercise the actual wire protocol without a separate
//! integration-test setup.

use std::net::SocketAddr;
use std::sync::Arc;

use handoff_config::ServerConfig;
use handoff_server::ServerCoordinator;
use jsonrpsee::server::ServerHandle;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};

/// A running server bound to `127.0.0.1:0`, plus a client already connected
/// to it. The server is stopped when the harness is dropped.
pub struct Harness {
    pub addr: SocketAddr,
    pub coordinator: Arc<ServerCoordinator>,
    pub client: WsClient,
    handle: ServerHandle,
}

impl Harness {
    /// Start a fresh in-memory server and connect a client to it.
    ///
    /// # Panics
    ///
    /// Panics if the server fails to bind or the client fails to connect.
    /// Both indicate a broken test environment, not a test failure worth
    /// distinguishing from the assertions that follow.
    pub async fn start() -> Self {
        let config = ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        };
        let (handle, addr, coordinator) = handoff_server::serve(&config)
            .await
            .expect("failed to start in-process handoff server");
        let client = WsClientBuilder::default()
            .build(format!("ws://{addr}"))
            .await
            .expect("failed to connect in-process handoff client");

        Self {
            addr,
            coordinator,
            client,
            handle,
        }
    }

    /// URL a second client (e.g. one exercising reconnection) can dial.
    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.handle.stop().ok();
    }
}
