//! # Time Source
//!
//! Driven port for wall-clock time, so receive timestamps can be pinned in
//! tests.

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time provider.
pub trait TimeSource: Send + Sync {
    /// Current time in Unix nanoseconds.
    fn now_nanos(&self) -> i64;
}

/// Production time source using the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    /// Create a new system time source.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now_nanos(&self) -> i64 {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        i64::try_from(nanos).unwrap_or(i64::MAX)
    }
}
