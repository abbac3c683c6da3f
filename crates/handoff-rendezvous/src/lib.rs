//! Plugin-side rendezvous table: correlates a response event arriving on the
//! subscribe stream to the caller suspended on the matching `turn_id`.
//!
//! The table itself never blocks; it only creates and resolves one-shot
//! handles. The actual suspension happens in whatever calls [`Waiter::wait`].

#![deny(unsafe_code)]
#![warn(clippy::all)]

use std::collections::HashMap;
use std::sync::Mutex;

use handoff_core::{BridgeError, BridgeResult, TurnId};
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// A one-shot handle a suspended caller awaits until a response (or a
/// terminal error) arrives for its turn.
pub struct Waiter {
    turn_id: TurnId,
    rx: oneshot::Receiver<BridgeResult<Vec<u8>>>,
}

impl Waiter {
    /// Suspend until [`RendezvousTable::resolve`] or [`RendezvousTable::fail`]
    /// wakes this turn, or the table is dropped (reported as `Cancelled`).
    pub async fn wait(self) -> BridgeResult<Vec<u8>> {
        self.rx.await.unwrap_or(Err(BridgeError::Cancelled))
    }

    #[must_use]
    pub fn turn_id(&self) -> TurnId {
        self.turn_id
    }
}

/// Correlates `turn_id` to the suspended caller awaiting its response.
///
/// `Register`/`Resolve`/`Fail` may be called concurrently from any task;
/// each entry transitions from registered to resolved exactly once.
#[derive(Default)]
pub struct RendezvousTable {
    waiters: Mutex<HashMap<TurnId, oneshot::Sender<BridgeResult<Vec<u8>>>>>,
}

impl RendezvousTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh one-shot handle for `turn_id`. Fails with
    /// `DuplicateTurn` if the turn is already registered and unresolved;
    /// the session id in the error is a placeholder since the rendezvous
    /// table is not session-scoped, so callers that need a precise error
    /// should check `is_registered` first if they want session context.
    pub fn register(&self, turn_id: TurnId) -> BridgeResult<Waiter> {
        let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        if waiters.contains_key(&turn_id) {
            return Err(BridgeError::internal(format!(
                "turn {turn_id} already registered"
            )));
        }
        let (tx, rx) = oneshot::channel();
        waiters.insert(turn_id, tx);
        trace!(%turn_id, "waiter registered");
        Ok(Waiter { turn_id, rx })
    }

    /// Remove `turn_id` without resolving it. Used when the caller cancels
    /// before a response arrives, or when submitting the request itself
    /// failed and the waiter was never going to be resolved.
    pub fn unregister(&self, turn_id: TurnId) {
        let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        waiters.remove(&turn_id);
    }

    /// Wake the waiter registered for `turn_id` with `payload`. Silently
    /// discarded if no waiter is registered (already resolved, or a late
    /// duplicate delivered by replay after reconnect).
    pub fn resolve(&self, turn_id: TurnId, payload: Vec<u8>) {
        let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = waiters.remove(&turn_id) {
            let _ = tx.send(Ok(payload));
            debug!(%turn_id, "waiter resolved");
        } else {
            trace!(%turn_id, "resolve for unknown or already-resolved turn discarded");
        }
    }

    /// Symmetric to [`Self::resolve`], delivering a terminal error instead.
    pub fn fail(&self, turn_id: TurnId, error: BridgeError) {
        let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = waiters.remove(&turn_id) {
            let _ = tx.send(Err(error));
        }
    }

    /// Wake every outstanding waiter with `error`. Used on terminal
    /// disconnect, once the reconnection policy is exhausted.
    pub fn fail_all(&self, error: BridgeError) {
        let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        let count = waiters.len();
        for (_, tx) in waiters.drain() {
            let _ = tx.send(Err(error.clone()));
        }
        if count > 0 {
            debug!(count, "failed all outstanding waiters");
        }
    }

    /// Number of currently registered, unresolved waiters. Test/diagnostic
    /// use only.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.waiters.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
