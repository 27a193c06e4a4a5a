//! Broadcast source backed by a [`shared_bus`] subscription.

use async_trait::async_trait;
use shared_bus::Subscription;
use shared_types::Envelope;

use crate::ports::BroadcastSource;

#[async_trait]
impl BroadcastSource for Subscription {
    async fn next_message(&mut self) -> Option<Envelope> {
        self.recv().await
    }
}
