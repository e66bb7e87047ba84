//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use pagefeed_core::{AllocationConfig, EntryStore, MemoryEntryStore, OrderKeyAllocator};
use pagefeed_protocol::Entry;
use rand::Rng;
use std::sync::Arc;

/// Generate random payload bytes of the specified size.
pub fn random_payload(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate unsequenced entries with random payloads.
pub fn pending_entries(count: usize, payload_size: usize) -> Vec<Entry<Vec<u8>>> {
    (0..count)
        .map(|_| Entry::new(random_payload(payload_size)))
        .collect()
}

/// A memory store holding `count` sequenced entries.
pub fn sequenced_store(count: usize, payload_size: usize) -> Arc<MemoryEntryStore<Vec<u8>>> {
    let store = Arc::new(MemoryEntryStore::new());
    store
        .push(pending_entries(count, payload_size))
        .expect("push into memory store");
    OrderKeyAllocator::<Vec<u8>, _>::new(Arc::clone(&store), AllocationConfig::default())
        .assign_pending_positions()
        .expect("allocate in memory store");
    store
}
