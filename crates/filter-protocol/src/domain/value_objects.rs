//! Value objects for subscriber health and dispatch statistics.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Result of recording a delivery failure against a peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The peer holds no subscription.
    UnknownPeer,
    /// Failure counted; the peer is not (newly) failing.
    Recorded {
        /// Failures since the last success
        consecutive_failures: u32,
    },
    /// The failure threshold was reached on this failure.
    MarkedFailing,
    /// The peer kept failing past the eviction window and was removed.
    Evicted,
}

/// Delivery health of a subscribed peer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeerHealth {
    /// Failures since the last successful push.
    pub consecutive_failures: u32,
    /// Set once `consecutive_failures` reaches the threshold.
    pub failing: bool,
    /// When the current run of failures started.
    pub first_failure_at: Option<Instant>,
}

impl PeerHealth {
    /// Record a failed push at `now`.
    ///
    /// Returns [`FailureOutcome::Evicted`] when the peer was already failing
    /// and `eviction_window` has passed since its first failure; the caller
    /// performs the removal.
    pub fn record_failure(
        &mut self,
        now: Instant,
        threshold: u32,
        eviction_window: Duration,
    ) -> FailureOutcome {
        if self.failing {
            if let Some(first) = self.first_failure_at {
                if now.saturating_duration_since(first) >= eviction_window {
                    return FailureOutcome::Evicted;
                }
            }
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.first_failure_at.get_or_insert(now);

        if !self.failing && self.consecutive_failures >= threshold.max(1) {
            self.failing = true;
            return FailureOutcome::MarkedFailing;
        }

        FailureOutcome::Recorded {
            consecutive_failures: self.consecutive_failures,
        }
    }

    /// Record a successful push: the peer is healthy again.
    pub fn record_success(&mut self) {
        *self = Self::default();
    }

    /// How long the peer has been failing, if it is.
    pub fn failing_for(&self, now: Instant) -> Option<Duration> {
        if !self.failing {
            return None;
        }
        self.first_failure_at
            .map(|first| now.saturating_duration_since(first))
    }
}

/// Snapshot of push dispatcher counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Messages taken from the broadcast source.
    pub messages_consumed: u64,
    /// Push deliveries started.
    pub pushes_attempted: u64,
    /// Push deliveries completed.
    pub pushes_succeeded: u64,
    /// Push deliveries that failed or timed out.
    pub pushes_failed: u64,
    /// Peers removed for sustained failure or idleness.
    pub peers_evicted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(5);

    #[test]
    fn test_first_failure_marks_failing_with_default_threshold() {
        let mut health = PeerHealth::default();
        let now = Instant::now();
        assert_eq!(
            health.record_failure(now, 1, WINDOW),
            FailureOutcome::MarkedFailing
        );
        assert!(health.failing);
        assert_eq!(health.first_failure_at, Some(now));
    }

    #[test]
    fn test_threshold_counts_consecutive_failures() {
        let mut health = PeerHealth::default();
        let now = Instant::now();
        assert_eq!(
            health.record_failure(now, 3, WINDOW),
            FailureOutcome::Recorded {
                consecutive_failures: 1
            }
        );
        assert_eq!(
            health.record_failure(now, 3, WINDOW),
            FailureOutcome::Recorded {
                consecutive_failures: 2
            }
        );
        assert_eq!(
            health.record_failure(now, 3, WINDOW),
            FailureOutcome::MarkedFailing
        );
    }

    #[test]
    fn test_failure_within_window_does_not_evict() {
        let mut health = PeerHealth::default();
        let start = Instant::now();
        health.record_failure(start, 1, WINDOW);
        let outcome = health.record_failure(start + Duration::from_secs(1), 1, WINDOW);
        assert_eq!(
            outcome,
            FailureOutcome::Recorded {
                consecutive_failures: 2
            }
        );
    }

    #[test]
    fn test_failure_after_window_evicts() {
        let mut health = PeerHealth::default();
        let start = Instant::now();
        health.record_failure(start, 1, WINDOW);
        assert_eq!(
            health.record_failure(start + WINDOW, 1, WINDOW),
            FailureOutcome::Evicted
        );
    }

    #[test]
    fn test_success_resets() {
        let mut health = PeerHealth::default();
        let now = Instant::now();
        health.record_failure(now, 1, WINDOW);
        health.record_success();
        assert_eq!(health, PeerHealth::default());
        assert!(health.failing_for(now).is_none());
    }
}
