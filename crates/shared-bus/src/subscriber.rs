//! # Bus Subscriber
//!
//! The receiving side of the broadcaster.

use crate::topics::TopicFilter;
use shared_types::Envelope;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::{debug, warn};

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The broadcaster was dropped.
    #[error("Broadcaster closed")]
    Closed,
}

/// A registration on the broadcaster.
///
/// When dropped, the registration is cleaned up.
pub struct Subscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<Envelope>,

    /// Topics this subscription accepts.
    filter: TopicFilter,

    /// Reference to registration tracking (for cleanup).
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Key of this registration in the tracking map.
    topic_key: String,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<Envelope>,
        filter: TopicFilter,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
        topic_key: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            subscriptions,
            topic_key,
        }
    }

    /// Receive the next envelope on a registered topic.
    ///
    /// # Returns
    ///
    /// - `Some(envelope)` - The next matching envelope
    /// - `None` - The broadcaster was dropped
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            let envelope = match self.receiver.recv().await {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(lagged = count, topics = %self.topic_key, "Bus subscriber lagged, oldest messages dropped");
                    continue;
                }
            };

            if self.filter.matches(&envelope) {
                return Some(envelope);
            }
        }
    }

    /// Try to receive the next envelope without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(envelope))` - A matching envelope was queued
    /// - `Ok(None)` - Nothing queued
    /// - `Err(SubscriptionError::Closed)` - The broadcaster was dropped
    pub fn try_recv(&mut self) -> Result<Option<Envelope>, SubscriptionError> {
        loop {
            let envelope = match self.receiver.try_recv() {
                Ok(e) => e,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&envelope) {
                return Ok(Some(envelope));
            }
        }
    }

    /// Get the topic filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }

    /// Convert into a [`Stream`] of matching envelopes.
    #[must_use]
    pub fn into_stream(self) -> MessageStream {
        MessageStream::new(self)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        if let Some(count) = subs.get_mut(&self.topic_key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                subs.remove(&self.topic_key);
            }
        }
        debug!(topics = %self.topic_key, "Bus subscription dropped");
    }
}

/// A [`Stream`] over a bus subscription.
pub struct MessageStream {
    inner: BroadcastStream<Envelope>,
    filter: TopicFilter,
    // Held for registration cleanup on drop.
    _registration: RegistrationGuard,
}

struct RegistrationGuard {
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    topic_key: String,
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        if let Ok(mut subs) = self.subscriptions.write() {
            if let Some(count) = subs.get_mut(&self.topic_key) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    subs.remove(&self.topic_key);
                }
            }
        }
    }
}

impl MessageStream {
    fn new(subscription: Subscription) -> Self {
        // Move the registration into a guard; the subscription's own Drop
        // must not decrement a second time.
        let guard = RegistrationGuard {
            subscriptions: Arc::clone(&subscription.subscriptions),
            topic_key: subscription.topic_key.clone(),
        };
        let receiver = subscription.receiver.resubscribe();
        let filter = subscription.filter.clone();
        if let Ok(mut subs) = subscription.subscriptions.write() {
            *subs.entry(subscription.topic_key.clone()).or_insert(0) += 1;
        }
        drop(subscription);

        Self {
            inner: BroadcastStream::new(receiver),
            filter,
            _registration: guard,
        }
    }

    /// Get the topic filter for this stream.
    #[must_use]
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }
}

impl Stream for MessageStream {
    type Item = Envelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(envelope))) => {
                    if self.filter.matches(&envelope) {
                        return Poll::Ready(Some(envelope));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    warn!(lagged = count, "Bus stream lagged, oldest messages dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
