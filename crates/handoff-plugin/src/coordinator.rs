//! Plugin coordinator: the host-framework-facing half of the bridge.
//!
//! Owns the attachment lifecycle and the rendezvous table; a background
//! task ([`crate::driver`]) keeps the connection to the Server Coordinator
//! alive across drops. [`PluginCoordinator::intercept`] is the only entry
//! point a framework integration calls.

use std::sync::Arc;

use handoff_config::PluginConfig;
use handoff_core::{BridgeError, BridgeResult, SessionId, TurnId};
use handoff_rendezvous::RendezvousTable;
use handoff_server::HandoffRpcClient;
use tokio::sync::{oneshot, watch, RwLock};
use tracing::instrument;
use uuid::Uuid;

use crate::driver::{self, SharedClient};
use crate::hook::{FrameworkCall, InterceptOutcome};
use crate::state::AttachmentState;

/// Coordinates interception for one plugin attachment.
///
/// [`PluginCoordinator::spawn`] starts a background task immediately; this
/// handle holds only the state both that task and [`Self::intercept`]
/// callers need to touch.
pub struct PluginCoordinator {
    config: PluginConfig,
    rendezvous: Arc<RendezvousTable>,
    session: Arc<RwLock<Option<SessionId>>>,
    client: SharedClient,
    state_rx: watch::Receiver<AttachmentState>,
    shutdown: Option<oneshot::Sender<()>>,
    runtime: tokio::runtime::Handle,
}

impl PluginCoordinator {
    /// Build a coordinator and start its background connection task. The
    /// task begins attaching immediately; use [`Self::wait_until_attached`]
    /// to suspend until the first attach completes.
    #[must_use]
    pub fn spawn(config: PluginConfig) -> Self {
        let rendezvous = Arc::new(RendezvousTable::new());
        let session = Arc::new(RwLock::new(
            config
                .session_id
                .as_deref()
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(SessionId::from_uuid),
        ));
        let client: SharedClient = Arc::new(RwLock::new(None));
        let (state_tx, state_rx) = watch::channel(AttachmentState::Detached);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(driver::run(
            config.clone(),
            Arc::clone(&session),
            Arc::clone(&client),
            Arc::clone(&rendezvous),
            state_tx,
            shutdown_rx,
        ));

        Self {
            config,
            rendezvous,
            session,
            client,
            state_rx,
            shutdown: Some(shutdown_tx),
            runtime: tokio::runtime::Handle::current(),
        }
    }

    /// Current attachment state.
    #[must_use]
    pub fn state(&self) -> AttachmentState {
        *self.state_rx.borrow()
    }

    /// Session this coordinator is attached to, once the first attach
    /// completes. Populated either from `PluginConfig::session_id` or,
    /// absent that, minted by the first successful connection.
    pub async fn session_id(&self) -> Option<SessionId> {
        *self.session.read().await
    }

    /// Suspend until the connection reaches `Attached`. Returns
    /// immediately, successfully, if already attached; fails immediately,
    /// without waiting, if the connection has already reached `Terminal`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionLost` once the reconnect policy has been
    /// exhausted.
    pub async fn wait_until_attached(&mut self) -> BridgeResult<()> {
        loop {
            let state = *self.state_rx.borrow();
            if state.is_attached() {
                return Ok(());
            }
            if state.is_terminal() {
                return Err(BridgeError::ConnectionLost);
            }
            if self.state_rx.changed().await.is_err() {
                return Err(BridgeError::ConnectionLost);
            }
        }
    }

    /// Offer `call` to the bridge.
    ///
    /// Returns `PassThrough` immediately, without any network interaction,
    /// if the plugin configuration excludes `call.agent_name()`. Otherwise
    /// suspends until a response arrives, `cancelled` resolves first, or
    /// the connection is permanently lost.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionLost` once the reconnect policy is exhausted, and
    /// `Cancelled` if `cancelled` resolves before a response arrives.
    #[instrument(skip(self, call, cancelled))]
    pub async fn intercept<C, F>(
        &mut self,
        call: &C,
        cancelled: F,
    ) -> BridgeResult<InterceptOutcome<C::Response>>
    where
        C: FrameworkCall,
        F: std::future::Future<Output = ()> + Send,
    {
        if !self.config.intercepts(call.agent_name()) {
            return Ok(InterceptOutcome::PassThrough);
        }

        self.wait_until_attached().await?;
        let session_id = self
            .session
            .read()
            .await
            .ok_or_else(|| BridgeError::internal("attached with no session on record"))?;
        let client = self
            .client
            .read()
            .await
            .clone()
            .ok_or(BridgeError::ConnectionLost)?;

        let turn_id = TurnId::new();
        let waiter = self.rendezvous.register(turn_id)?;
        let agent_name = call.agent_name().to_string();
        let payload = call.to_payload();

        if let Err(err) = client
            .submit_request(session_id, turn_id, agent_name, payload)
            .await
        {
            self.rendezvous.unregister(turn_id);
            return Err(BridgeError::internal(err.to_string()));
        }

        tokio::select! {
            result = waiter.wait() => {
                result.and_then(C::from_payload).map(InterceptOutcome::Intercepted)
            }
            () = cancelled => {
                self.rendezvous.unregister(turn_id);
                Err(BridgeError::Cancelled)
            }
        }
    }

    /// Synchronous bridge for hook points that call in from outside any
    /// async context, mirroring the host's sync-facade-over-async-store
    /// pattern. Blocks the calling OS thread until a response arrives or the
    /// connection is permanently lost; there is no cancellation path for a
    /// synchronous caller, so this suspends indefinitely if neither happens.
    ///
    /// # Errors
    ///
    /// Same as [`Self::intercept`].
    ///
    /// # Panics
    ///
    /// Panics if called from within an async task driven by the same
    /// single-threaded runtime that owns this coordinator; use a
    /// multi-threaded runtime, as the rest of this crate assumes.
    pub fn intercept_blocking<C: FrameworkCall>(
        &mut self,
        call: &C,
    ) -> BridgeResult<InterceptOutcome<C::Response>> {
        let handle = self.runtime.clone();
        tokio::task::block_in_place(|| handle.block_on(self.intercept(call, std::future::pending())))
    }
}

impl Drop for PluginCoordinator {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
