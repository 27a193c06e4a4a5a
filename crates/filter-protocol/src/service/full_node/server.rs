//! # Subscribe/Ping Server
//!
//! Serves the filter-subscribe protocol: one request and one response per
//! stream, applied to the [`SubscriberRegistry`].

use async_trait::async_trait;
use shared_types::PeerId;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::FullNodeConfig;
use crate::domain::{check_request_id, filter_from_request, SubscriberRegistry};
use crate::ports::{BoxedStream, StreamHandler};
use crate::wire::{
    read_frame, write_frame, CodecError, FilterSubscribeRequest, FilterSubscribeResponse,
    FilterSubscribeType, StatusCode,
};

/// Full-node handler for [`ProtocolId::FilterSubscribe`](crate::wire::ProtocolId::FilterSubscribe).
pub struct FilterSubscribeServer {
    config: FullNodeConfig,
    registry: Arc<SubscriberRegistry>,
}

impl FilterSubscribeServer {
    pub fn new(config: FullNodeConfig, registry: Arc<SubscriberRegistry>) -> Self {
        Self { config, registry }
    }

    /// Apply one request from `peer` to the registry.
    pub fn handle_request(
        &self,
        peer: PeerId,
        request: &FilterSubscribeRequest,
    ) -> FilterSubscribeResponse {
        if let Err(invalid) = check_request_id(request) {
            return FilterSubscribeResponse::error("", invalid.status_code(), invalid.description());
        }
        let id = request.request_id.as_str();

        match request.filter_subscribe_type {
            FilterSubscribeType::SubscriberPing => {
                if self.registry.touch(peer) {
                    FilterSubscribeResponse::ok(id)
                } else {
                    FilterSubscribeResponse::error(
                        id,
                        StatusCode::NotFound,
                        StatusCode::NotFound.reason(),
                    )
                }
            }
            FilterSubscribeType::Subscribe => {
                let filter = match filter_from_request(
                    request,
                    self.config.max_content_topics_per_request,
                ) {
                    Ok(filter) => filter,
                    Err(invalid) => {
                        return FilterSubscribeResponse::error(
                            id,
                            invalid.status_code(),
                            invalid.description(),
                        )
                    }
                };
                match self.registry.add_filter(peer, &filter) {
                    Ok(()) => FilterSubscribeResponse::ok(id),
                    Err(e) => FilterSubscribeResponse::error(id, e.status_code(), e.to_string()),
                }
            }
            FilterSubscribeType::Unsubscribe => {
                match filter_from_request(request, self.config.max_content_topics_per_request) {
                    Ok(filter) => {
                        self.registry.remove_filter(peer, &filter);
                        FilterSubscribeResponse::ok(id)
                    }
                    Err(invalid) => FilterSubscribeResponse::error(
                        id,
                        invalid.status_code(),
                        invalid.description(),
                    ),
                }
            }
            FilterSubscribeType::UnsubscribeAll => {
                self.registry.remove_all(peer);
                FilterSubscribeResponse::ok(id)
            }
        }
    }

    async fn respond(&self, peer: PeerId, stream: &mut BoxedStream) -> Result<(), CodecError> {
        let read = timeout(
            self.config.request_read_timeout(),
            read_frame::<_, FilterSubscribeRequest>(stream, self.config.max_frame_size),
        )
        .await;

        let response = match read {
            Err(_) => {
                debug!(peer = %peer, "Subscribe request read timed out");
                return Ok(());
            }
            Ok(Err(CodecError::Io(e))) => return Err(CodecError::Io(e)),
            Ok(Err(e)) => {
                warn!(peer = %peer, error = %e, "Malformed subscribe request");
                FilterSubscribeResponse::error("", StatusCode::BadRequest, e.to_string())
            }
            Ok(Ok(request)) => {
                debug!(
                    peer = %peer,
                    request_id = %request.request_id,
                    kind = ?request.filter_subscribe_type,
                    "Subscribe request received"
                );
                self.handle_request(peer, &request)
            }
        };

        write_frame(stream, &response).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

#[async_trait]
impl StreamHandler for FilterSubscribeServer {
    async fn handle_stream(&self, remote: PeerId, mut stream: BoxedStream) {
        if let Err(e) = self.respond(remote, &mut stream).await {
            debug!(peer = %remote, error = %e, "Subscribe stream error");
        }
    }
}
