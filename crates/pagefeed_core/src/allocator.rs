//! Order-key allocation.
//!
//! Positions are assigned in rounds. A round snapshots the pending entries
//! and the next free position, sorts the pending entries by the configured
//! order, and asks the store to apply the resulting plan. The store applies
//! it only if nothing else was sequenced in between; otherwise the round is
//! recomputed from a fresh snapshot.
//!
//! Concurrent rounds therefore never hand out the same position twice and
//! never leave a hole: a round either commits a contiguous block starting at
//! the snapshot's next position, or commits nothing.

use crate::config::{AllocationConfig, AllocationOrder};
use crate::error::{CoreError, CoreResult};
use crate::store::{AllocationPlan, AllocationSnapshot, SequencedStore};
use chrono::{DateTime, Utc};
use pagefeed_protocol::Position;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one successful allocation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllocationReport {
    /// Number of entries that received a position.
    pub assigned: usize,
    /// First position assigned, if any.
    pub first: Option<Position>,
    /// Last position assigned, if any.
    pub last: Option<Position>,
    /// Rounds attempted, including conflicting ones.
    pub attempts: u32,
}

/// Assigns positions to pending entries of a store.
pub struct OrderKeyAllocator<T, S> {
    store: Arc<S>,
    config: AllocationConfig,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S: SequencedStore<T>> OrderKeyAllocator<T, S> {
    /// Creates an allocator for a store.
    pub fn new(store: Arc<S>, config: AllocationConfig) -> Self {
        Self {
            store,
            config,
            _marker: PhantomData,
        }
    }

    /// Returns the allocator configuration.
    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }

    /// Assigns the next positions to every entry lacking one.
    ///
    /// Returns a report with `assigned == 0` when nothing is pending.
    ///
    /// # Errors
    ///
    /// - [`CoreError::AllocationExhausted`] if every attempt conflicted with
    ///   a concurrent round
    /// - any store error, in which case no entry changed
    pub fn assign_pending_positions(&self) -> CoreResult<AllocationReport> {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let snapshot = self.store.allocation_snapshot()?;
            if snapshot.pending.is_empty() {
                debug!(attempt, "no pending entries");
                return Ok(AllocationReport {
                    attempts: attempt,
                    ..AllocationReport::default()
                });
            }

            let plan = plan_round(snapshot, &self.config.order, Utc::now());
            match self.store.apply_allocation(&plan) {
                Ok(()) => {
                    let report = AllocationReport {
                        assigned: plan.assignments.len(),
                        first: plan.assignments.first().map(|(_, p)| *p),
                        last: plan.assignments.last().map(|(_, p)| *p),
                        attempts: attempt,
                    };
                    info!(
                        assigned = report.assigned,
                        first = ?report.first,
                        last = ?report.last,
                        attempts = attempt,
                        "allocation round committed"
                    );
                    return Ok(report);
                }
                Err(e) if e.is_conflict() => {
                    warn!(attempt, max_attempts, error = %e, "allocation round conflicted, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(CoreError::AllocationExhausted {
            attempts: max_attempts,
        })
    }
}

/// Computes the assignments of one round.
///
/// Pending entries are sorted by `order` (ties by id) and numbered from the
/// snapshot's next position.
pub fn plan_round(
    snapshot: AllocationSnapshot,
    order: &AllocationOrder,
    at: DateTime<Utc>,
) -> AllocationPlan {
    let mut pending = snapshot.pending;
    pending.sort_by(|a, b| order.compare(a, b));

    let base = snapshot.next_position.value();
    let assignments = pending
        .into_iter()
        .enumerate()
        .map(|(i, p)| (p.id, Position(base + i as u64)))
        .collect();

    AllocationPlan {
        base_version: snapshot.version,
        base_next: snapshot.next_position,
        assignments,
        updated: at,
    }
}
