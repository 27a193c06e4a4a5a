//! # Content Filter Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks (registry matching, codec)
//! └── src/
//!     └── integration/  # Full node + light nodes over the in-memory network
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p filter-tests
//!
//! # By category
//! cargo test -p filter-tests integration::scenarios
//! cargo test -p filter-tests integration::fanout
//!
//! # Benchmarks
//! cargo bench -p filter-tests
//! ```

#![allow(dead_code)]

pub mod integration;
