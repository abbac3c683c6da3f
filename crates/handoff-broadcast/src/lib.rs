//! Per-session fan-out to many live subscribers, with historical replay on
//! attach and a live handoff once replay catches up.
//!
//! Reified as a component rather than ad hoc callbacks: each session gets a
//! bounded `tokio::sync::broadcast` channel. Subscribing to that channel
//! *before* taking the replay high-water mark is what keeps the handoff
//! gap-free — anything appended in between is delivered twice (once by
//! replay, once live) and [`Subscription::recv`] drops the live duplicate.

#![deny(unsafe_code)]
#![warn(clippy::all)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use handoff_core::{BridgeError, BridgeResult, SessionEvent, SessionId};
use handoff_storage::EventStore;
use tokio::sync::{broadcast, RwLock};
use tracing::{trace, warn};

const DEFAULT_BUFFER_SIZE: usize = 256;

pub struct EventBroadcaster {
    store: Arc<EventStore>,
    channels: RwLock<HashMap<SessionId, broadcast::Sender<SessionEvent>>>,
    buffer_size: usize,
}

impl EventBroadcaster {
    #[must_use]
    pub fn new(store: Arc<EventStore>) -> Self {
        Self::with_buffer_size(store, DEFAULT_BUFFER_SIZE)
    }

    #[must_use]
    pub fn with_buffer_size(store: Arc<EventStore>, buffer_size: usize) -> Self {
        Self {
            store,
            channels: RwLock::new(HashMap::new()),
            buffer_size,
        }
    }

    async fn channel(&self, session_id: SessionId) -> broadcast::Sender<SessionEvent> {
        self.channel_with_capacity(session_id, self.buffer_size)
            .await
    }

    /// Like [`Self::channel`], but creates the session's channel with
    /// `capacity` if this is the first subscriber to reach it.
    ///
    /// A `tokio::sync::broadcast` channel's capacity is fixed at creation
    /// and shared by every receiver cloned from its sender, so `capacity`
    /// only takes effect for the subscriber that causes the channel to be
    /// created; later subscribers to the same session share whatever
    /// capacity is already in place, whatever `capacity` they request.
    async fn channel_with_capacity(
        &self,
        session_id: SessionId,
        capacity: usize,
    ) -> broadcast::Sender<SessionEvent> {
        if let Some(sender) = self.channels.read().await.get(&session_id) {
            return sender.clone();
        }
        let mut channels = self.channels.write().await;
        channels
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(capacity.max(1)).0)
            .clone()
    }

    /// Invoked by the server coordinator immediately after `AppendEvent`
    /// succeeds. A session with no live subscribers simply drops the event;
    /// it is still durable in the event store for future replay.
    pub async fn notify(&self, session_id: SessionId, event: SessionEvent) {
        let sender = self.channel(session_id).await;
        let receivers = sender.send(event).map_or(0, |_| sender.receiver_count());
        trace!(session_id = %session_id, receivers, "event broadcast");
    }

    /// Attach a new subscriber. If `resume_from_sequence` is `None`, replay
    /// starts at sequence 1; otherwise at `resume_from_sequence + 1`.
    /// `buffer_size`, if given, requests the capacity for this session's
    /// channel (see [`Self::channel_with_capacity`] for when that request
    /// can and cannot be honored); `None` falls back to this broadcaster's
    /// own default.
    pub async fn subscribe(
        &self,
        session_id: SessionId,
        resume_from_sequence: Option<u64>,
        buffer_size: Option<usize>,
    ) -> BridgeResult<Subscription> {
        let sender = self
            .channel_with_capacity(session_id, buffer_size.unwrap_or(self.buffer_size))
            .await;
        // Subscribe before snapshotting the high-water mark: anything
        // appended in the gap is then covered by replay and simply
        // deduplicated out of the live stream.
        let live = sender.subscribe();
        let high_water = self.store.current_sequence(session_id).await?;
        let after = resume_from_sequence.unwrap_or(0);

        let replay = self
            .store
            .read_events_since(session_id, after)
            .await?
            .into_iter()
            .filter(|e| e.sequence <= high_water)
            .collect::<VecDeque<_>>();

        Ok(Subscription {
            session_id,
            replay,
            high_water,
            live,
        })
    }
}

/// A live, cancellable handle on a session's event stream.
///
/// Dropping it releases the underlying broadcast receiver; there is no
/// explicit `cancel` call because the stream-forwarding task that owns a
/// `Subscription` simply stops polling it.
pub struct Subscription {
    session_id: SessionId,
    replay: VecDeque<SessionEvent>,
    high_water: u64,
    live: broadcast::Receiver<SessionEvent>,
}

impl Subscription {
    /// Returns the next event in strict sequence order, `Ok(None)` when the
    /// session's channel is closed, or `Err(SubscriberTooSlow)` if this
    /// subscriber fell behind far enough to overflow the bounded buffer —
    /// whether that happened during replay or during live delivery.
    pub async fn recv(&mut self) -> BridgeResult<Option<SessionEvent>> {
        if let Some(event) = self.replay.pop_front() {
            return Ok(Some(event));
        }
        loop {
            match self.live.recv().await {
                Ok(event) => {
                    if event.sequence <= self.high_water {
                        // Already delivered during replay.
                        continue;
                    }
                    return Ok(Some(event));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        session_id = %self.session_id,
                        skipped,
                        "subscriber overflowed its buffer"
                    );
                    return Err(BridgeError::SubscriberTooSlow {
                        session_id: self.session_id,
                    });
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }
}
