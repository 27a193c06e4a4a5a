//! # Wire Format
//!
//! Sub-protocol identifiers, the messages exchanged on them and the
//! length-prefixed frame codec.
//!
//! | Protocol | Direction | Frames |
//! |----------|-----------|--------|
//! | [`ProtocolId::FilterSubscribe`] | light → full | one [`FilterSubscribeRequest`], one [`FilterSubscribeResponse`] |
//! | [`ProtocolId::FilterPush`] | full → light | one [`MessagePush`] |

pub mod codec;
pub mod messages;
pub mod protocol;

pub use codec::{read_frame, write_frame, CodecError, DEFAULT_MAX_FRAME_SIZE};
pub use messages::{
    FilterSubscribeRequest, FilterSubscribeResponse, FilterSubscribeType, MessagePush, StatusCode,
};
pub use protocol::ProtocolId;
