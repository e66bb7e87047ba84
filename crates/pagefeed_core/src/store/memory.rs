//! In-memory entry store.

use super::state::StoreState;
use super::{AllocationPlan, AllocationSnapshot, EntryRange, EntryStore, SequencedStore};
use crate::error::CoreResult;
use pagefeed_protocol::{Entry, Position};
use parking_lot::RwLock;
use tracing::debug;

/// An entry store held entirely in memory.
///
/// Nothing survives the process. Suitable for tests, benchmarks, and feeds
/// rebuilt from another source on startup.
#[derive(Debug)]
pub struct MemoryEntryStore<T> {
    state: RwLock<StoreState<T>>,
}

impl<T> MemoryEntryStore<T> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
        }
    }
}

impl<T> Default for MemoryEntryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync> EntryStore<T> for MemoryEntryStore<T> {
    fn push(&self, entries: Vec<Entry<T>>) -> CoreResult<usize> {
        let count = entries.len();
        let mut state = self.state.write();
        state.check_push(&entries)?;
        state.apply_push(entries);
        debug!(count, pending = state.pending_count(), "pushed entries");
        Ok(count)
    }

    fn get_entries(&self, start: Position, count: usize) -> CoreResult<EntryRange<T>> {
        Ok(EntryRange::new(self.state.read().range(start, count)))
    }

    fn total_count(&self) -> CoreResult<u64> {
        Ok(self.state.read().total_count())
    }
}

impl<T: Clone + Send + Sync> SequencedStore<T> for MemoryEntryStore<T> {
    fn allocation_snapshot(&self) -> CoreResult<AllocationSnapshot> {
        Ok(self.state.read().snapshot())
    }

    fn apply_allocation(&self, plan: &AllocationPlan) -> CoreResult<()> {
        let mut state = self.state.write();
        state.check_allocation(plan)?;
        state.apply_allocation(plan);
        Ok(())
    }

    fn pending_count(&self) -> CoreResult<usize> {
        Ok(self.state.read().pending_count())
    }
}
