//! Filter protocol messages.

use serde::{Deserialize, Serialize};
use shared_types::{ContentTopic, Message, PubsubTopic};
use std::fmt;

use crate::domain::ContentFilter;

/// Request kinds on the subscribe protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterSubscribeType {
    SubscriberPing,
    Subscribe,
    Unsubscribe,
    UnsubscribeAll,
}

/// A light node's request to a full node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSubscribeRequest {
    pub request_id: String,
    pub filter_subscribe_type: FilterSubscribeType,
    pub pubsub_topic: Option<PubsubTopic>,
    pub content_topics: Vec<ContentTopic>,
}

impl FilterSubscribeRequest {
    pub fn subscribe(request_id: impl Into<String>, filter: &ContentFilter) -> Self {
        Self::with_filter(request_id, FilterSubscribeType::Subscribe, filter)
    }

    pub fn unsubscribe(request_id: impl Into<String>, filter: &ContentFilter) -> Self {
        Self::with_filter(request_id, FilterSubscribeType::Unsubscribe, filter)
    }

    pub fn unsubscribe_all(request_id: impl Into<String>) -> Self {
        Self::bare(request_id, FilterSubscribeType::UnsubscribeAll)
    }

    pub fn ping(request_id: impl Into<String>) -> Self {
        Self::bare(request_id, FilterSubscribeType::SubscriberPing)
    }

    fn with_filter(
        request_id: impl Into<String>,
        kind: FilterSubscribeType,
        filter: &ContentFilter,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            filter_subscribe_type: kind,
            pubsub_topic: Some(filter.pubsub_topic().to_string()),
            content_topics: filter.content_topics_vec(),
        }
    }

    fn bare(request_id: impl Into<String>, kind: FilterSubscribeType) -> Self {
        Self {
            request_id: request_id.into(),
            filter_subscribe_type: kind,
            pubsub_topic: None,
            content_topics: Vec::new(),
        }
    }
}

/// Status codes carried in [`FilterSubscribeResponse::status_code`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    BadRequest,
    NotFound,
    InternalError,
    ServiceUnavailable,
}

impl StatusCode {
    pub const fn as_u32(&self) -> u32 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::InternalError => 500,
            Self::ServiceUnavailable => 503,
        }
    }

    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            200 => Some(Self::Ok),
            400 => Some(Self::BadRequest),
            404 => Some(Self::NotFound),
            500 => Some(Self::InternalError),
            503 => Some(Self::ServiceUnavailable),
            _ => None,
        }
    }

    /// Default human-readable description.
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "bad request",
            Self::NotFound => "peer has no subscriptions",
            Self::InternalError => "internal server error",
            Self::ServiceUnavailable => "service unavailable",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u32(), self.reason())
    }
}

/// A full node's answer to a [`FilterSubscribeRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSubscribeResponse {
    pub request_id: String,
    pub status_code: u32,
    pub status_desc: Option<String>,
}

impl FilterSubscribeResponse {
    pub fn ok(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            status_code: StatusCode::Ok.as_u32(),
            status_desc: None,
        }
    }

    pub fn error(
        request_id: impl Into<String>,
        status: StatusCode,
        description: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            status_code: status.as_u32(),
            status_desc: Some(description.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == StatusCode::Ok.as_u32()
    }

    /// The description sent, or the default reason for the code.
    pub fn description(&self) -> String {
        match (&self.status_desc, StatusCode::from_u32(self.status_code)) {
            (Some(desc), _) => desc.clone(),
            (None, Some(status)) => status.reason().to_string(),
            (None, None) => String::new(),
        }
    }
}

/// A relayed message pushed to a subscribed light node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePush {
    pub pubsub_topic: PubsubTopic,
    pub message: Message,
}

impl MessagePush {
    pub fn new(pubsub_topic: impl Into<PubsubTopic>, message: Message) -> Self {
        Self {
            pubsub_topic: pubsub_topic.into(),
            message,
        }
    }
}
