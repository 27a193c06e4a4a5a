//! # Light Node
//!
//! [`FilterLightNode`] issues subscribe/unsubscribe/ping requests;
//! [`PushReceiver`] feeds inbound pushes to [`SubscriptionHandle`]s.

pub mod client;
pub mod demux;

pub use client::{FilterLightNode, SubscribeOptions};
pub use demux::{PushReceiver, SubscriptionDetails, SubscriptionHandle, SubscriptionMap};
