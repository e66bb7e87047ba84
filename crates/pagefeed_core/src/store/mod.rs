//! Entry stores.
//!
//! An entry store is the durable, append-only record of the feed. It
//! exposes the three capabilities pagination needs ([`EntryStore`]) and the
//! compute-then-conditionally-apply primitive the allocator needs
//! ([`SequencedStore`]).
//!
//! | store | durability |
//! |---|---|
//! | [`MemoryEntryStore`] | none, for tests and embedding |
//! | [`LogEntryStore`] | every push and allocation round is one synced log record |

mod log;
mod memory;
mod state;

pub use log::LogEntryStore;
pub use memory::MemoryEntryStore;

use crate::error::CoreResult;
use chrono::{DateTime, Utc};
use pagefeed_protocol::{Entry, EntryId, Position};
use std::sync::Arc;

/// Entries read from a store, in ascending position order.
#[derive(Debug)]
pub struct EntryRange<T> {
    inner: std::vec::IntoIter<Entry<T>>,
}

impl<T> EntryRange<T> {
    pub(crate) fn new(entries: Vec<Entry<T>>) -> Self {
        Self {
            inner: entries.into_iter(),
        }
    }
}

impl<T> Iterator for EntryRange<T> {
    type Item = Entry<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for EntryRange<T> {}

/// The capabilities the paginator requires of a store.
pub trait EntryStore<T>: Send + Sync {
    /// Appends entries.
    ///
    /// Entries without a position wait for the next allocation round.
    /// Entries carrying a position must continue the feed exactly: the
    /// first must equal the next free position and each following one
    /// must increase by one.
    ///
    /// Returns the number of entries pushed.
    ///
    /// # Errors
    ///
    /// - [`CoreError::PositionConflict`](crate::CoreError::PositionConflict) for non-contiguous positions
    /// - [`CoreError::DuplicateEntry`](crate::CoreError::DuplicateEntry) for a reused id
    ///
    /// On error nothing from the batch is stored.
    fn push(&self, entries: Vec<Entry<T>>) -> CoreResult<usize>;

    /// Reads up to `count` sequenced entries starting at `start`.
    ///
    /// The range is shorter near the end of the feed and empty past it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_entries(&self, start: Position, count: usize) -> CoreResult<EntryRange<T>>;

    /// Number of sequenced entries. Pending entries are not counted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn total_count(&self) -> CoreResult<u64>;
}

/// A pending entry as seen by the allocator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    /// Entry id, the tie-break key.
    pub id: EntryId,
    /// Push order within the store.
    pub insertion: u64,
    /// Creation time.
    pub created: DateTime<Utc>,
}

/// What the allocator reads before computing a round.
#[derive(Debug, Clone)]
pub struct AllocationSnapshot {
    /// Store version the snapshot was taken at.
    pub version: u64,
    /// First unassigned position.
    pub next_position: Position,
    /// Every entry still lacking a position.
    pub pending: Vec<PendingEntry>,
}

/// One computed allocation round, applied only if the store is unchanged.
#[derive(Debug, Clone)]
pub struct AllocationPlan {
    /// Version of the snapshot the plan was computed from.
    pub base_version: u64,
    /// `next_position` of that snapshot.
    pub base_next: Position,
    /// Positions to assign, contiguous from `base_next`.
    pub assignments: Vec<(EntryId, Position)>,
    /// Assignment time written to each entry's `updated`.
    pub updated: DateTime<Utc>,
}

/// Store capability for transactional position assignment.
///
/// The allocator reads a snapshot, computes a plan without holding any
/// lock, then asks the store to apply it. The store rejects the plan if any
/// other round or positioned push committed in between.
pub trait SequencedStore<T>: EntryStore<T> {
    /// Reads the current version, next position and pending entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn allocation_snapshot(&self) -> CoreResult<AllocationSnapshot>;

    /// Applies a plan atomically.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AllocationConflict`](crate::CoreError::AllocationConflict)
    /// if the store moved since the snapshot. Any error leaves every entry
    /// exactly as it was.
    fn apply_allocation(&self, plan: &AllocationPlan) -> CoreResult<()>;

    /// Number of entries waiting for a position.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn pending_count(&self) -> CoreResult<usize>;
}

impl<T, S: EntryStore<T> + ?Sized> EntryStore<T> for Arc<S> {
    fn push(&self, entries: Vec<Entry<T>>) -> CoreResult<usize> {
        (**self).push(entries)
    }

    fn get_entries(&self, start: Position, count: usize) -> CoreResult<EntryRange<T>> {
        (**self).get_entries(start, count)
    }

    fn total_count(&self) -> CoreResult<u64> {
        (**self).total_count()
    }
}

impl<T, S: SequencedStore<T> + ?Sized> SequencedStore<T> for Arc<S> {
    fn allocation_snapshot(&self) -> CoreResult<AllocationSnapshot> {
        (**self).allocation_snapshot()
    }

    fn apply_allocation(&self, plan: &AllocationPlan) -> CoreResult<()> {
        (**self).apply_allocation(plan)
    }

    fn pending_count(&self) -> CoreResult<usize> {
        (**self).pending_count()
    }
}
