//! Stress harnesses.
//!
//! These runs verify the feed under concurrent producers, allocation rounds
//! and consumers. Events carry their producer in `version` and a per-producer
//! sequence number in `value`, so ordering can be checked afterwards.

use crate::fixtures::{Delivered, TestEvent, TestFeed};
use pagefeed_consumer::MemoryCursorStore;
use pagefeed_core::{AllocationConfig, CoreResult, EntryStore, OrderKeyAllocator, SequencedStore};
use pagefeed_protocol::{Entry, Position};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread::{self, ScopedJoinHandle};
use std::time::{Duration, Instant};

/// How long a consumer may lag before a follow run gives up.
const FOLLOW_TIMEOUT: Duration = Duration::from_secs(60);

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Entries sequenced at the end of the run.
    pub entries: u64,
    /// Allocation calls made.
    pub rounds: u64,
    /// Allocation attempts lost to concurrent rounds.
    pub conflicts: u64,
    /// Total duration.
    pub duration: Duration,
    /// Entries per second.
    pub entries_per_second: f64,
}

impl StressResult {
    /// Creates a new result.
    pub fn new(entries: u64, rounds: u64, conflicts: u64, duration: Duration) -> Self {
        let entries_per_second = if duration.as_secs_f64() > 0.0 {
            entries as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            entries,
            rounds,
            conflicts,
            duration,
            entries_per_second,
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Entries: {}", self.entries);
        println!("Allocation rounds: {}", self.rounds);
        println!("Conflicts: {}", self.conflicts);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} entries/sec", self.entries_per_second);
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Concurrent producer threads.
    pub producers: usize,
    /// Batches pushed by each producer.
    pub batches_per_producer: usize,
    /// Events per batch.
    pub batch_size: usize,
    /// Concurrent allocator threads.
    pub allocators: usize,
    /// Allocation calls per allocator thread.
    pub rounds_per_allocator: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            producers: 4,
            batches_per_producer: 50,
            batch_size: 4,
            allocators: 2,
            rounds_per_allocator: 50,
        }
    }
}

impl StressConfig {
    /// Total events the producers push.
    pub fn entries(&self) -> u64 {
        (self.producers * self.batches_per_producer * self.batch_size) as u64
    }
}

fn producer_batch(producer: usize, batch: usize, size: usize) -> Vec<Entry<TestEvent>> {
    (0..size)
        .map(|i| {
            let mut event = TestEvent::new((batch * size + i) as i64);
            event.version = Some(producer as u32);
            Entry::new(event)
        })
        .collect()
}

fn join<R>(handle: ScopedJoinHandle<'_, R>) -> R {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

/// Pushes from several threads while others run allocation rounds, then
/// sequences whatever is left.
pub fn stress_push_allocate<S>(store: &Arc<S>, config: &StressConfig) -> CoreResult<StressResult>
where
    S: SequencedStore<TestEvent>,
{
    let allocation = AllocationConfig::new().with_max_attempts(1_000);
    let start = Instant::now();

    let (mut rounds, conflicts) = thread::scope(|scope| -> CoreResult<(u64, u64)> {
        let producers: Vec<_> = (0..config.producers)
            .map(|producer| {
                let store = &**store;
                scope.spawn(move || -> CoreResult<()> {
                    for batch in 0..config.batches_per_producer {
                        store.push(producer_batch(producer, batch, config.batch_size))?;
                    }
                    Ok(())
                })
            })
            .collect();

        let allocators: Vec<_> = (0..config.allocators)
            .map(|_| {
                let allocator =
                    OrderKeyAllocator::<TestEvent, _>::new(Arc::clone(store), allocation.clone());
                scope.spawn(move || -> CoreResult<(u64, u64)> {
                    let mut conflicts = 0u64;
                    for _ in 0..config.rounds_per_allocator {
                        let report = allocator.assign_pending_positions()?;
                        conflicts += u64::from(report.attempts.saturating_sub(1));
                    }
                    Ok((config.rounds_per_allocator as u64, conflicts))
                })
            })
            .collect();

        for handle in producers {
            join(handle)?;
        }
        let mut totals = (0u64, 0u64);
        for handle in allocators {
            let (rounds, conflicts) = join(handle)?;
            totals.0 += rounds;
            totals.1 += conflicts;
        }
        Ok(totals)
    })?;

    OrderKeyAllocator::<TestEvent, _>::new(Arc::clone(store), allocation)
        .assign_pending_positions()?;
    rounds += 1;

    Ok(StressResult::new(
        store.total_count()?,
        rounds,
        conflicts,
        start.elapsed(),
    ))
}

/// Checks that a store holds positions `0..N` exactly once each and that
/// every producer's events were sequenced in the order it pushed them.
///
/// Returns the number of entries checked.
pub fn verify_total_order<S: EntryStore<TestEvent>>(store: &S) -> Result<u64, String> {
    let total = store.total_count().map_err(|e| e.to_string())?;
    let entries: Vec<_> = store
        .get_entries(Position::ZERO, total as usize)
        .map_err(|e| e.to_string())?
        .collect();
    if entries.len() as u64 != total {
        return Err(format!("read {} of {} entries", entries.len(), total));
    }

    let mut ids = HashSet::new();
    let mut last_by_producer: HashMap<Option<u32>, i64> = HashMap::new();

    for (expected, entry) in (0u64..).zip(&entries) {
        if entry.position != Some(Position(expected)) {
            return Err(format!(
                "entry {} has position {:?}, expected {}",
                entry.id, entry.position, expected
            ));
        }
        if !ids.insert(entry.id) {
            return Err(format!("entry {} appears twice", entry.id));
        }
        let event = &entry.content;
        if let Some(previous) = last_by_producer.insert(event.version, event.value) {
            if previous >= event.value {
                return Err(format!(
                    "producer {:?}: value {} sequenced after {}",
                    event.version, event.value, previous
                ));
            }
        }
    }

    Ok(total)
}

/// Runs producers that push and allocate while a consumer follows the feed,
/// and checks that the consumer saw every position once, in order.
pub fn stress_consumer_follow(
    config: &StressConfig,
    page_size: usize,
) -> Result<StressResult, String> {
    let feed = TestFeed::memory(page_size);
    let delivered = Delivered::new();
    let consumer = feed.consumer("stress", MemoryCursorStore::new(), &delivered);
    let expected = config.entries();
    let start = Instant::now();

    let rounds = thread::scope(|scope| -> Result<u64, String> {
        let running = scope.spawn(|| consumer.run());

        let producers: Vec<_> = (0..config.producers)
            .map(|producer| {
                let feed = &feed;
                scope.spawn(move || -> Result<u64, String> {
                    for batch in 0..config.batches_per_producer {
                        feed.push_entries(producer_batch(producer, batch, config.batch_size))
                            .map_err(|e| e.to_string())?;
                        feed.allocate().map_err(|e| e.to_string())?;
                    }
                    Ok(config.batches_per_producer as u64)
                })
            })
            .collect();

        let mut rounds = 0u64;
        let mut failure = None;
        for handle in producers {
            match join(handle) {
                Ok(r) => rounds += r,
                Err(e) => failure = Some(e),
            }
        }

        while failure.is_none() && (delivered.len() as u64) < expected {
            if running.is_finished() || start.elapsed() > FOLLOW_TIMEOUT {
                failure = Some(format!(
                    "consumer stopped after {} of {} entries",
                    delivered.len(),
                    expected
                ));
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }

        consumer.stop();
        if let Err(e) = join(running) {
            failure.get_or_insert(e.to_string());
        }
        failure.map_or(Ok(rounds), Err)
    })?;

    let positions = delivered.positions();
    if !positions.iter().copied().eq(0..expected) {
        return Err(format!(
            "consumer saw {} entries out of order or with gaps",
            positions.len()
        ));
    }

    Ok(StressResult::new(expected, rounds, 0, start.elapsed()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> StressConfig {
        StressConfig {
            producers: 3,
            batches_per_producer: 10,
            batch_size: 3,
            allocators: 2,
            rounds_per_allocator: 10,
        }
    }

    #[test]
    fn test_push_allocate_memory() {
        let feed = TestFeed::memory(4);
        let result = stress_push_allocate(feed.store(), &small()).unwrap();
        assert_eq!(result.entries, 90);
        assert_eq!(verify_total_order(&**feed.store()).unwrap(), 90);
    }

    #[test]
    fn test_push_allocate_log() {
        let feed = TestFeed::file(4);
        let result = stress_push_allocate(feed.store(), &small()).unwrap();
        assert_eq!(result.entries, 90);
        assert_eq!(verify_total_order(&**feed.store()).unwrap(), 90);
    }

    #[test]
    fn test_consumer_follow() {
        let result = stress_consumer_follow(&small(), 4).unwrap();
        assert_eq!(result.entries, 90);
    }

    #[test]
    fn test_verify_sequential_feed() {
        let feed = TestFeed::memory(4);
        feed.publish(0..3);
        assert_eq!(verify_total_order(&**feed.store()).unwrap(), 3);
    }
}
