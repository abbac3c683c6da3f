//! Background task that maintains the connection to the Server Coordinator.
//!
//! Connects, attaches to (creating, if none was configured) a session,
//! subscribes to its event stream, and resolves the rendezvous table as
//! response events arrive. Reconnects with full jitter backoff on
//! disconnect; gives up and moves the attachment state to `Terminal` once
//! the reconnect policy is exhausted, failing every outstanding intercept.

use std::sync::Arc;

use futures::StreamExt;
use handoff_config::PluginConfig;
use handoff_core::{BridgeError, PayloadKind, SessionEvent, SessionId};
use handoff_rendezvous::RendezvousTable;
use handoff_server::HandoffRpcClient;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use tokio::sync::{oneshot, watch, RwLock};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::state::AttachmentState;

/// The currently live client, published here by the driver task as soon as
/// a connection attaches so [`crate::coordinator::PluginCoordinator::intercept`]
/// can issue `submitRequest` calls directly, without routing through this
/// task.
pub(crate) type SharedClient = Arc<RwLock<Option<Arc<WsClient>>>>;

pub(crate) async fn run(
    config: PluginConfig,
    session: Arc<RwLock<Option<SessionId>>>,
    client_slot: SharedClient,
    rendezvous: Arc<RendezvousTable>,
    state_tx: watch::Sender<AttachmentState>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut backoff = Backoff::new(&config.reconnect);
    let mut last_sequence: Option<u64> = None;
    let mut first_attempt = true;

    loop {
        let _ = state_tx.send(if first_attempt {
            AttachmentState::Attaching
        } else {
            AttachmentState::Reattaching
        });
        first_attempt = false;

        let outcome = tokio::select! {
            outcome = connect_and_stream(
                &config,
                &session,
                &client_slot,
                &rendezvous,
                &state_tx,
                &mut last_sequence,
                &mut backoff,
            ) => outcome,
            _ = &mut shutdown => {
                debug!("plugin coordinator shutting down");
                *client_slot.write().await = None;
                return;
            }
        };
        *client_slot.write().await = None;

        match outcome {
            Ok(()) => debug!("connection closed cleanly"),
            Err(ref err) => warn!(%err, "connection to server lost"),
        }

        match backoff.next_delay() {
            Some(delay) => {
                tokio::select! {
                    () = sleep(delay) => {}
                    _ = &mut shutdown => return,
                }
            }
            None => {
                warn!("reconnect policy exhausted, giving up permanently");
                let _ = state_tx.send(AttachmentState::Terminal);
                rendezvous.fail_all(BridgeError::ConnectionLost);
                return;
            }
        }
    }
}

/// One connection attempt: connect, attach to a session, subscribe, and
/// drain the event stream until it ends or errors.
async fn connect_and_stream(
    config: &PluginConfig,
    session: &Arc<RwLock<Option<SessionId>>>,
    client_slot: &SharedClient,
    rendezvous: &Arc<RendezvousTable>,
    state_tx: &watch::Sender<AttachmentState>,
    last_sequence: &mut Option<u64>,
    backoff: &mut Backoff,
) -> Result<(), BridgeError> {
    let url = format!("ws://{}", config.server_address);
    let client = WsClientBuilder::default()
        .build(&url)
        .await
        .map_err(|e| BridgeError::internal(format!("failed to connect to {url}: {e}")))?;
    let client = Arc::new(client);

    let session_id = match *session.read().await {
        Some(id) => id,
        None => {
            let created = client
                .create_session(None)
                .await
                .map_err(|e| BridgeError::internal(e.to_string()))?;
            *session.write().await = Some(created.id);
            created.id
        }
    };

    let mut subscription = client
        .subscribe(
            session_id,
            *last_sequence,
            Some(config.subscribe_buffer_size),
        )
        .await
        .map_err(|e| BridgeError::internal(e.to_string()))?;

    *client_slot.write().await = Some(Arc::clone(&client));
    let _ = state_tx.send(AttachmentState::Attached);
    backoff.reset();
    info!(%session_id, "attached to server");

    while let Some(next) = subscription.next().await {
        let event: SessionEvent = next.map_err(|e| BridgeError::internal(e.to_string()))?;
        *last_sequence = Some(event.sequence);
        if event.payload_kind == PayloadKind::Response {
            rendezvous.resolve(event.turn_id, event.payload);
        }
    }

    Ok(())
}
