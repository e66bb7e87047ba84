//! # pagefeed testkit
//!
//! Test utilities for pagefeed.
//!
//! This crate provides:
//! - Feed fixtures over memory and temporary log-backed stores
//! - A loopback wiring from a feed server to consumers
//! - Property-based test generators using proptest
//! - Concurrent push/allocate and producer/consumer stress harnesses
//!
//! ## Usage
//!
//! ```rust
//! use pagefeed_testkit::prelude::*;
//!
//! let feed = TestFeed::memory(2);
//! feed.publish(0..5);
//!
//! let delivered = Delivered::new();
//! let consumer = feed.consumer("reader", MemoryCursorStore::new(), &delivered);
//! consumer.run_until_caught_up().unwrap();
//! assert_eq!(delivered.values(), vec![0, 1, 2, 3, 4]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use pagefeed_consumer::{CursorStore, FileCursorStore, MemoryCursorStore};
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
