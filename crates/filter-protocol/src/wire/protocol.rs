//! Sub-protocol identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Filter sub-protocols a stream can be opened for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolId {
    /// Subscribe / unsubscribe / ping requests, served by full nodes.
    FilterSubscribe,
    /// One-way message pushes, served by light nodes.
    FilterPush,
}

impl ProtocolId {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FilterSubscribe => "/vac/waku/filter-subscribe/2.0.0-beta1",
            Self::FilterPush => "/vac/waku/filter-push/2.0.0-beta1",
        }
    }

    /// Look up a protocol by its identifier string.
    pub fn from_id(id: &str) -> Option<Self> {
        [Self::FilterSubscribe, Self::FilterPush]
            .into_iter()
            .find(|p| p.as_str() == id)
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_strings() {
        assert_eq!(
            ProtocolId::FilterSubscribe.to_string(),
            "/vac/waku/filter-subscribe/2.0.0-beta1"
        );
        assert_eq!(
            ProtocolId::from_id("/vac/waku/filter-push/2.0.0-beta1"),
            Some(ProtocolId::FilterPush)
        );
        assert_eq!(ProtocolId::from_id("/vac/waku/filter/2.0.0-beta1"), None);
    }
}
