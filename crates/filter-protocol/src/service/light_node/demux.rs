//! # Push-Receive Demultiplexer
//!
//! Routes pushed messages to every local subscription handle whose filter
//! matches. Each handle owns a bounded ring buffer: when a consumer falls
//! behind, the oldest envelopes are dropped and the inbound push path never
//! waits on a consumer.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{Envelope, PeerId, TimeSource};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::ContentFilter;
use crate::ports::{BoxedStream, StreamHandler};
use crate::wire::{read_frame, MessagePush};

/// Public description of a live subscription handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionDetails {
    pub id: Uuid,
    pub peer: PeerId,
    pub filter: ContentFilter,
}

/// Registry-side state of one handle. Holds the only sender; removing the
/// entry closes the handle's output.
struct HandleEntry {
    peer: PeerId,
    filter: Arc<RwLock<ContentFilter>>,
    sender: broadcast::Sender<Envelope>,
}

/// Unregisters a handle from its map once the handle (or the stream made
/// from it) is gone.
struct HandleGuard {
    id: Uuid,
    map: Weak<SubscriptionMap>,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        if let Some(map) = self.map.upgrade() {
            map.handles.write().remove(&self.id);
        }
    }
}

/// A local subscription: receives every pushed message matching its filter.
///
/// Dropping the handle removes it from the light node's subscription list
/// but does not unsubscribe from the full node; an unused subscription
/// there runs out through the full node's idle expiry.
pub struct SubscriptionHandle {
    id: Uuid,
    peer: PeerId,
    filter: Arc<RwLock<ContentFilter>>,
    receiver: broadcast::Receiver<Envelope>,
    guard: HandleGuard,
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("filter", &*self.filter.read())
            .finish_non_exhaustive()
    }
}

impl SubscriptionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Full node serving this subscription.
    pub fn peer(&self) -> PeerId {
        self.peer
    }

    /// Current filter (narrows after partial unsubscribes).
    pub fn filter(&self) -> ContentFilter {
        self.filter.read().clone()
    }

    /// Next envelope, or `None` once the subscription is closed and drained.
    ///
    /// Envelopes lost to overflow are skipped and logged.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(subscription = %self.id, dropped = count, "Subscription lagged, oldest envelopes dropped");
                }
            }
        }
    }

    /// Next buffered envelope without waiting.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(subscription = %self.id, dropped = count, "Subscription lagged, oldest envelopes dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Convert into a [`Stream`] of envelopes.
    pub fn into_stream(self) -> impl Stream<Item = Envelope> + Send + Unpin {
        let id = self.id;
        let guard = self.guard;
        BroadcastStream::new(self.receiver).filter_map(move |item| {
            let _registered = &guard;
            match item {
                Ok(envelope) => Some(envelope),
                Err(BroadcastStreamRecvError::Lagged(count)) => {
                    warn!(subscription = %id, dropped = count, "Subscription lagged, oldest envelopes dropped");
                    None
                }
            }
        })
    }
}

/// All live handles of a light node.
pub struct SubscriptionMap {
    buffer_size: usize,
    handles: RwLock<HashMap<Uuid, HandleEntry>>,
}

impl SubscriptionMap {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handle for `filter` served by `peer`.
    pub fn insert(self: &Arc<Self>, peer: PeerId, filter: ContentFilter) -> SubscriptionHandle {
        let mut handles = self.handles.write();
        self.attach(&mut handles, peer, filter)
    }

    /// Register a handle only if `open()` holds. `open` is evaluated under
    /// the map's write lock, so a concurrent [`clear`](Self::clear) either
    /// runs first and the insert is refused, or runs after and closes the
    /// new handle.
    pub fn insert_while(
        self: &Arc<Self>,
        peer: PeerId,
        filter: ContentFilter,
        open: impl FnOnce() -> bool,
    ) -> Option<SubscriptionHandle> {
        let mut handles = self.handles.write();
        open().then(|| self.attach(&mut handles, peer, filter))
    }

    fn attach(
        self: &Arc<Self>,
        handles: &mut HashMap<Uuid, HandleEntry>,
        peer: PeerId,
        filter: ContentFilter,
    ) -> SubscriptionHandle {
        let (sender, receiver) = broadcast::channel(self.buffer_size);
        let id = Uuid::new_v4();
        let filter = Arc::new(RwLock::new(filter));

        handles.insert(
            id,
            HandleEntry {
                peer,
                filter: Arc::clone(&filter),
                sender,
            },
        );

        SubscriptionHandle {
            id,
            peer,
            filter,
            receiver,
            guard: HandleGuard {
                id,
                map: Arc::downgrade(self),
            },
        }
    }

    /// Remove `filter`'s content topics from the handles served by `peer`.
    /// Handles left with no content topics are closed. Returns the number
    /// of handles closed.
    pub fn remove_filter(&self, peer: PeerId, filter: &ContentFilter) -> usize {
        let mut handles = self.handles.write();
        let emptied: Vec<Uuid> = handles
            .iter()
            .filter(|(_, entry)| entry.peer == peer)
            .filter_map(|(id, entry)| {
                let mut current = entry.filter.write();
                current.remove(filter);
                current.is_empty().then_some(*id)
            })
            .collect();

        for id in &emptied {
            handles.remove(id);
        }
        emptied.len()
    }

    /// Close every handle served by `peer`.
    pub fn remove_peer(&self, peer: PeerId) -> usize {
        let mut handles = self.handles.write();
        let before = handles.len();
        handles.retain(|_, entry| entry.peer != peer);
        before - handles.len()
    }

    /// Close every handle.
    pub fn clear(&self) {
        self.handles.write().clear();
    }

    /// Peers holding at least one local handle.
    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.handles.read().values().map(|e| e.peer).collect();
        peers.sort();
        peers.dedup();
        peers
    }

    /// Peers whose handles overlap `filter`.
    pub fn peers_for(&self, filter: &ContentFilter) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self
            .handles
            .read()
            .values()
            .filter(|e| e.filter.read().overlaps(filter))
            .map(|e| e.peer)
            .collect();
        peers.sort();
        peers.dedup();
        peers
    }

    /// Current filters of the handles served by `peer`, without duplicates.
    pub fn filters_for(&self, peer: PeerId) -> Vec<ContentFilter> {
        let mut filters: Vec<ContentFilter> = Vec::new();
        for entry in self.handles.read().values().filter(|e| e.peer == peer) {
            let filter = entry.filter.read().clone();
            if !filters.contains(&filter) {
                filters.push(filter);
            }
        }
        filters
    }

    pub fn has_peer(&self, peer: PeerId) -> bool {
        self.handles.read().values().any(|e| e.peer == peer)
    }

    pub fn details(&self) -> Vec<SubscriptionDetails> {
        self.handles
            .read()
            .iter()
            .map(|(id, entry)| SubscriptionDetails {
                id: *id,
                peer: entry.peer,
                filter: entry.filter.read().clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }

    /// Deliver a push from `from` to every matching handle.
    ///
    /// Pushes with an empty pubsub topic, or from a peer this node holds no
    /// subscription with, are dropped. Otherwise matching is on the filter
    /// alone: a handle served by another full node receives the push too.
    /// A light node holding the same filter at two full nodes therefore sees
    /// each message once per serving peer on every such handle; consumers
    /// that need one copy dedup on [`Envelope::hash`]. Returns the number of
    /// handles that received an envelope.
    pub fn dispatch(&self, from: PeerId, push: MessagePush, received_at: i64) -> usize {
        if push.pubsub_topic.is_empty() {
            warn!(peer = %from, "Dropping push with empty pubsub topic");
            return 0;
        }

        let handles = self.handles.read();
        if !handles.values().any(|e| e.peer == from) {
            warn!(peer = %from, "Dropping push from peer with no subscription");
            return 0;
        }

        let envelope = Envelope::new(push.message, received_at, push.pubsub_topic);
        let mut delivered = 0;
        for (id, entry) in handles.iter() {
            let matches = entry.filter.read().matches(
                envelope.pubsub_topic(),
                envelope.message().content_topic(),
            );
            if matches && entry.sender.send(envelope.clone()).is_ok() {
                delivered += 1;
            } else if matches {
                debug!(subscription = %id, "Handle dropped, envelope discarded");
            }
        }
        delivered
    }
}

/// Light-node handler for [`ProtocolId::FilterPush`](crate::wire::ProtocolId::FilterPush).
pub struct PushReceiver {
    subscriptions: Arc<SubscriptionMap>,
    time: Arc<dyn TimeSource>,
    max_frame_size: usize,
    read_timeout: std::time::Duration,
}

impl PushReceiver {
    pub fn new(
        subscriptions: Arc<SubscriptionMap>,
        time: Arc<dyn TimeSource>,
        max_frame_size: usize,
        read_timeout: std::time::Duration,
    ) -> Self {
        Self {
            subscriptions,
            time,
            max_frame_size,
            read_timeout,
        }
    }
}

#[async_trait]
impl StreamHandler for PushReceiver {
    async fn handle_stream(&self, remote: PeerId, mut stream: BoxedStream) {
        let push = match timeout(
            self.read_timeout,
            read_frame::<_, MessagePush>(&mut stream, self.max_frame_size),
        )
        .await
        {
            Ok(Ok(push)) => push,
            Ok(Err(e)) => {
                warn!(peer = %remote, error = %e, "Failed to read push");
                return;
            }
            Err(_) => {
                warn!(peer = %remote, "Push read timed out");
                return;
            }
        };

        let topic = push.pubsub_topic.clone();
        let delivered = self
            .subscriptions
            .dispatch(remote, push, self.time.now_nanos());
        debug!(peer = %remote, topic = %topic, delivered, "Push received");
    }
}
