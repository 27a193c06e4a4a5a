//! # Filter Light Node
//!
//! Subscription client for the filter-subscribe protocol. Local handles are
//! registered only after the full node answers 200, so a failed or
//! cancelled call leaves local state untouched.

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use shared_types::{PeerId, SystemTimeSource, TimeSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::demux::{PushReceiver, SubscriptionDetails, SubscriptionHandle, SubscriptionMap};
use crate::config::LightNodeConfig;
use crate::domain::{ContentFilter, FilterError};
use crate::ports::Transport;
use crate::wire::{
    read_frame, write_frame, FilterSubscribeRequest, FilterSubscribeResponse, ProtocolId,
};

/// Per-call options for subscribe and unsubscribe.
#[derive(Clone, Debug, Default)]
pub struct SubscribeOptions {
    /// Full node to use; a configured service peer is picked when unset.
    pub peer: Option<PeerId>,
    /// Request id; a UUID v4 is generated when unset.
    pub request_id: Option<String>,
}

impl SubscribeOptions {
    pub fn with_peer(peer: PeerId) -> Self {
        Self {
            peer: Some(peer),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Light-node side of the filter protocol.
pub struct FilterLightNode<T: Transport + 'static> {
    config: LightNodeConfig,
    transport: Arc<T>,
    subscriptions: Arc<SubscriptionMap>,
    service_peers: RwLock<Vec<PeerId>>,
    time: Arc<dyn TimeSource>,
    shutdown: watch::Sender<bool>,
    running: AtomicBool,
}

impl<T: Transport + 'static> FilterLightNode<T> {
    pub fn new(config: LightNodeConfig, transport: Arc<T>) -> Self {
        Self::with_time_source(config, transport, Arc::new(SystemTimeSource::new()))
    }

    /// Create a node stamping envelopes with `time`.
    pub fn with_time_source(
        config: LightNodeConfig,
        transport: Arc<T>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            subscriptions: Arc::new(SubscriptionMap::new(config.subscription_buffer_size)),
            service_peers: RwLock::new(config.service_peers.clone()),
            config,
            transport,
            time,
            shutdown,
            running: AtomicBool::new(false),
        }
    }

    /// Start accepting pushes.
    pub fn start(&self) -> Result<(), FilterError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(FilterError::AlreadyStarted);
        }
        self.shutdown.send_replace(false);

        let receiver = PushReceiver::new(
            Arc::clone(&self.subscriptions),
            Arc::clone(&self.time),
            self.config.max_frame_size,
            self.config.push_read_timeout(),
        );
        self.transport
            .set_handler(ProtocolId::FilterPush, Arc::new(receiver));

        info!(peer = %self.transport.local_peer_id(), "Filter light node started");
        Ok(())
    }

    /// Stop: abort in-flight requests with [`FilterError::Cancelled`], stop
    /// accepting pushes and close every subscription handle.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.send_replace(true);
        self.transport.remove_handler(ProtocolId::FilterPush);
        self.subscriptions.clear();
        info!("Filter light node stopped");
    }

    /// Add a full node to pick from when a call names no peer.
    pub fn add_service_peer(&self, peer: PeerId) {
        let mut peers = self.service_peers.write();
        if !peers.contains(&peer) {
            peers.push(peer);
        }
    }

    /// Subscribe to `filter` on a full node.
    pub async fn subscribe(
        &self,
        filter: ContentFilter,
        options: SubscribeOptions,
    ) -> Result<SubscriptionHandle, FilterError> {
        self.validate(&filter)?;
        let peer = self.select_peer(options.peer)?;
        let request_id = options.request_id.unwrap_or_else(new_request_id);

        self.request(peer, FilterSubscribeRequest::subscribe(request_id, &filter))
            .await?;

        // A stop() that raced the response wins.
        let handle = self
            .subscriptions
            .insert_while(peer, filter, || self.running.load(Ordering::SeqCst))
            .ok_or(FilterError::Cancelled)?;
        debug!(peer = %peer, subscription = %handle.id(), "Subscribed");
        Ok(handle)
    }

    /// Unsubscribe `filter`. Without a peer in `options`, every peer whose
    /// local handles overlap the filter is asked.
    ///
    /// On success the filter's content topics are removed from the local
    /// handles of that peer; handles left empty are closed.
    pub async fn unsubscribe(
        &self,
        filter: ContentFilter,
        options: SubscribeOptions,
    ) -> Result<(), FilterError> {
        self.validate(&filter)?;
        let peers = match options.peer {
            Some(peer) => vec![peer],
            None => self.subscriptions.peers_for(&filter),
        };
        if peers.is_empty() {
            return Err(FilterError::NoSuitablePeer);
        }

        let mut first_error = None;
        for peer in peers {
            let request_id = options.request_id.clone().unwrap_or_else(new_request_id);
            match self
                .request(peer, FilterSubscribeRequest::unsubscribe(request_id, &filter))
                .await
            {
                Ok(()) => {
                    let closed = self.subscriptions.remove_filter(peer, &filter);
                    debug!(peer = %peer, closed, "Unsubscribed");
                }
                Err(e) => {
                    warn!(peer = %peer, error = %e, "Unsubscribe failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Drop every subscription on `peer`, or on every peer with local
    /// handles when `peer` is `None`.
    pub async fn unsubscribe_all(&self, peer: Option<PeerId>) -> Result<(), FilterError> {
        let peers = match peer {
            Some(peer) => vec![peer],
            None => self.subscriptions.peers(),
        };

        let mut first_error = None;
        for peer in peers {
            match self
                .request(peer, FilterSubscribeRequest::unsubscribe_all(new_request_id()))
                .await
            {
                Ok(()) => {
                    self.subscriptions.remove_peer(peer);
                }
                Err(e) => {
                    warn!(peer = %peer, error = %e, "Unsubscribe-all failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Check that `peer` still holds a subscription for us.
    ///
    /// A 404 surfaces as [`FilterError::Status`] with `is_not_found()`.
    pub async fn ping(&self, peer: PeerId) -> Result<(), FilterError> {
        self.request(peer, FilterSubscribeRequest::ping(new_request_id()))
            .await
    }

    /// Ping every peer serving a local handle once.
    ///
    /// A peer answering 404 no longer holds our subscriptions. The filters
    /// of its handles are subscribed again; if that is refused the peer's
    /// handles are closed so consumers see the end of the subscription.
    pub async fn keepalive(&self) {
        for peer in self.subscriptions.peers() {
            match self.ping(peer).await {
                Ok(()) => debug!(peer = %peer, "Keepalive ping ok"),
                Err(e) if e.is_not_found() => {
                    info!(peer = %peer, "Subscription lost on service peer, resubscribing");
                    self.resubscribe(peer).await;
                }
                Err(FilterError::Cancelled) => return,
                Err(e) => warn!(peer = %peer, error = %e, "Keepalive ping failed"),
            }
        }
    }

    /// Run [`keepalive`](Self::keepalive) every `keepalive_interval` until
    /// the node stops. Returns at once when keepalives are disabled.
    pub async fn run_keepalive(&self) {
        let Some(period) = self.config.keepalive_interval() else {
            return;
        };
        let mut shutdown = self.shutdown.subscribe();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.keepalive().await,
                _ = async { shutdown.wait_for(|stopped| *stopped).await.map(|_| ()) } => break,
            }
        }
        debug!("Keepalive loop stopped");
    }

    async fn resubscribe(&self, peer: PeerId) {
        for filter in self.subscriptions.filters_for(peer) {
            let request = FilterSubscribeRequest::subscribe(new_request_id(), &filter);
            if let Err(e) = self.request(peer, request).await {
                let closed = self.subscriptions.remove_peer(peer);
                warn!(peer = %peer, error = %e, closed, "Resubscribe failed, handles closed");
                return;
            }
        }
        debug!(peer = %peer, "Resubscribed");
    }

    /// Live subscription handles.
    pub fn subscriptions(&self) -> Vec<SubscriptionDetails> {
        self.subscriptions.details()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn validate(&self, filter: &ContentFilter) -> Result<(), FilterError> {
        if filter.pubsub_topic().is_empty() {
            return Err(FilterError::InvalidFilter("pubsub topic is required".into()));
        }
        if filter.is_empty() {
            return Err(FilterError::InvalidFilter(
                "at least one content topic is required".into(),
            ));
        }
        if filter.len() > self.config.max_content_topics_per_request {
            return Err(FilterError::InvalidFilter(format!(
                "exceeds maximum content topics: {}",
                self.config.max_content_topics_per_request
            )));
        }
        Ok(())
    }

    fn select_peer(&self, requested: Option<PeerId>) -> Result<PeerId, FilterError> {
        if let Some(peer) = requested {
            return Ok(peer);
        }
        self.service_peers
            .read()
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or(FilterError::NoSuitablePeer)
    }

    /// One deadline-bounded, cancellable request/response exchange.
    async fn request(
        &self,
        peer: PeerId,
        request: FilterSubscribeRequest,
    ) -> Result<(), FilterError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(FilterError::Cancelled);
        }
        let mut shutdown = self.shutdown.subscribe();

        let exchange = async {
            let mut stream = self
                .transport
                .open_stream(peer, ProtocolId::FilterSubscribe)
                .await?;
            write_frame(&mut stream, &request).await?;
            let response: FilterSubscribeResponse =
                read_frame(&mut stream, self.config.max_frame_size).await?;
            Ok::<_, FilterError>(response)
        };

        let response = tokio::select! {
            result = timeout(self.config.request_timeout(), exchange) => {
                result.map_err(|_| FilterError::Timeout)??
            }
            _ = async { shutdown.wait_for(|stopped| *stopped).await.map(|_| ()) } => return Err(FilterError::Cancelled),
        };

        // Frames the server could not decode are answered without an id.
        let anonymous_error = response.request_id.is_empty() && !response.is_ok();
        if response.request_id != request.request_id && !anonymous_error {
            return Err(FilterError::RequestIdMismatch {
                expected: request.request_id,
                actual: response.request_id,
            });
        }
        if !response.is_ok() {
            return Err(FilterError::Status {
                code: response.status_code,
                description: response.description(),
            });
        }
        Ok(())
    }
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}
