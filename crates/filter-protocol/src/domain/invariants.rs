//! Request validation for the subscribe server.

use super::ContentFilter;
use crate::wire::{FilterSubscribeRequest, StatusCode};

/// Why a subscribe-protocol request was rejected.
#[derive(Debug, PartialEq, Eq)]
pub enum InvalidRequest {
    EmptyRequestId,
    MissingPubsubTopic,
    NoContentTopics,
    TooManyContentTopics { max: usize },
}

impl InvalidRequest {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BadRequest
    }

    pub fn description(&self) -> String {
        match self {
            Self::EmptyRequestId => "empty request id".to_string(),
            Self::MissingPubsubTopic => "pubsub topic is required".to_string(),
            Self::NoContentTopics => "at least one content topic is required".to_string(),
            Self::TooManyContentTopics { max } => {
                format!("exceeds maximum content topics: {max}")
            }
        }
    }
}

/// Every request must carry a request id.
pub fn check_request_id(request: &FilterSubscribeRequest) -> Result<(), InvalidRequest> {
    if request.request_id.is_empty() {
        return Err(InvalidRequest::EmptyRequestId);
    }
    Ok(())
}

/// SUBSCRIBE and UNSUBSCRIBE need a pubsub topic and 1..=max content topics.
pub fn filter_from_request(
    request: &FilterSubscribeRequest,
    max_content_topics: usize,
) -> Result<ContentFilter, InvalidRequest> {
    let topic = match request.pubsub_topic.as_deref() {
        Some(topic) if !topic.is_empty() => topic,
        _ => return Err(InvalidRequest::MissingPubsubTopic),
    };

    if request.content_topics.is_empty() {
        return Err(InvalidRequest::NoContentTopics);
    }

    let filter = ContentFilter::new(topic, request.content_topics.iter().cloned());
    if filter.is_empty() {
        return Err(InvalidRequest::NoContentTopics);
    }
    if filter.len() > max_content_topics {
        return Err(InvalidRequest::TooManyContentTopics {
            max: max_content_topics,
        });
    }
    Ok(filter)
}
