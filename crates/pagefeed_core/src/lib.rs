//! # pagefeed core
//!
//! The producer side of a paginated event feed.
//!
//! This crate provides:
//! - [`EntryStore`] and [`SequencedStore`], the storage capabilities the
//!   feed needs, with [`MemoryEntryStore`] and the durable [`LogEntryStore`]
//! - [`OrderKeyAllocator`], which gives pending entries gap-free positions
//!   under concurrent writers
//! - [`Paginator`] and [`FeedPageBuilder`], which cut the sequenced log into
//!   fixed-size pages linked by `self`, `last`, `next` and `previous`
//!
//! ## Example
//!
//! ```rust
//! use pagefeed_core::{
//!     AllocationConfig, EntryStore, FeedConfig, MemoryEntryStore, OrderKeyAllocator, Paginator,
//! };
//! use pagefeed_protocol::Entry;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryEntryStore::new());
//! store.push((0..5).map(Entry::new).collect()).unwrap();
//!
//! let allocator = OrderKeyAllocator::new(Arc::clone(&store), AllocationConfig::default());
//! allocator.assign_pending_positions().unwrap();
//!
//! let paginator = Paginator::new(store, FeedConfig::new().with_page_size(2)).unwrap();
//! let head = paginator.build_page(0).unwrap();
//! assert_eq!(head.entries.iter().map(|e| e.content).collect::<Vec<_>>(), vec![4, 3]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod allocator;
mod config;
mod error;
mod paginator;
pub mod store;

pub use allocator::{plan_round, AllocationReport, OrderKeyAllocator};
pub use config::{AllocationConfig, AllocationOrder, FeedConfig, PendingComparator};
pub use error::{CoreError, CoreResult};
pub use paginator::{last_page_index, FeedPageBuilder, Paginator};
pub use store::{
    AllocationPlan, AllocationSnapshot, EntryRange, EntryStore, LogEntryStore, MemoryEntryStore,
    PendingEntry, SequencedStore,
};
