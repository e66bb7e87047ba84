//! In-memory feed state shared by every store implementation.
//!
//! Each mutation is split into a `check_*` step that validates without
//! changing anything and an `apply_*` step that cannot fail. Durable stores
//! persist between the two.

use super::{AllocationPlan, AllocationSnapshot, PendingEntry};
use crate::error::{CoreError, CoreResult};
use pagefeed_protocol::{Entry, EntryId, Position};
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
struct Pending<T> {
    insertion: u64,
    entry: Entry<T>,
}

#[derive(Debug)]
pub(crate) struct StoreState<T> {
    /// Sequenced entries; the index is the position.
    sequenced: Vec<Entry<T>>,
    pending: Vec<Pending<T>>,
    ids: HashSet<EntryId>,
    next_insertion: u64,
    /// Bumped by every change to `sequenced`.
    version: u64,
}

impl<T> Default for StoreState<T> {
    fn default() -> Self {
        Self {
            sequenced: Vec::new(),
            pending: Vec::new(),
            ids: HashSet::new(),
            next_insertion: 0,
            version: 0,
        }
    }
}

impl<T> StoreState<T> {
    pub fn next_position(&self) -> Position {
        Position(self.sequenced.len() as u64)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn total_count(&self) -> u64 {
        self.sequenced.len() as u64
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn check_push(&self, entries: &[Entry<T>]) -> CoreResult<()> {
        let mut expected = self.next_position();
        let mut batch_ids = HashSet::with_capacity(entries.len());

        for entry in entries {
            if self.ids.contains(&entry.id) || !batch_ids.insert(entry.id) {
                return Err(CoreError::DuplicateEntry { id: entry.id });
            }
            if let Some(position) = entry.position {
                if position != expected {
                    return Err(CoreError::PositionConflict {
                        expected,
                        actual: position,
                    });
                }
                expected = expected.next();
            }
        }
        Ok(())
    }

    pub fn apply_push(&mut self, entries: Vec<Entry<T>>) {
        let mut sequenced_any = false;
        for entry in entries {
            self.ids.insert(entry.id);
            if entry.position.is_some() {
                self.sequenced.push(entry);
                sequenced_any = true;
            } else {
                self.pending.push(Pending {
                    insertion: self.next_insertion,
                    entry,
                });
                self.next_insertion += 1;
            }
        }
        if sequenced_any {
            self.version += 1;
        }
    }

    pub fn snapshot(&self) -> AllocationSnapshot {
        AllocationSnapshot {
            version: self.version,
            next_position: self.next_position(),
            pending: self
                .pending
                .iter()
                .map(|p| PendingEntry {
                    id: p.entry.id,
                    insertion: p.insertion,
                    created: p.entry.created,
                })
                .collect(),
        }
    }

    pub fn check_allocation(&self, plan: &AllocationPlan) -> CoreResult<()> {
        if plan.base_version != self.version || plan.base_next != self.next_position() {
            return Err(CoreError::AllocationConflict {
                expected: plan.base_version,
                actual: self.version,
            });
        }

        let pending: HashSet<EntryId> = self.pending.iter().map(|p| p.entry.id).collect();
        let mut expected = plan.base_next;
        for (id, position) in &plan.assignments {
            if *position != expected {
                return Err(CoreError::PositionConflict {
                    expected,
                    actual: *position,
                });
            }
            if !pending.contains(id) {
                return Err(CoreError::AllocationConflict {
                    expected: plan.base_version,
                    actual: self.version,
                });
            }
            expected = expected.next();
        }
        Ok(())
    }

    /// Applies a plan that passed [`check_allocation`](Self::check_allocation).
    pub fn apply_allocation(&mut self, plan: &AllocationPlan) {
        if plan.assignments.is_empty() {
            return;
        }

        let wanted: HashMap<EntryId, Position> = plan.assignments.iter().copied().collect();
        let mut taken: HashMap<EntryId, Entry<T>> = HashMap::with_capacity(wanted.len());

        let pending = std::mem::take(&mut self.pending);
        for p in pending {
            if wanted.contains_key(&p.entry.id) {
                taken.insert(p.entry.id, p.entry);
            } else {
                self.pending.push(p);
            }
        }

        for (id, position) in &plan.assignments {
            if let Some(mut entry) = taken.remove(id) {
                entry.assign(*position, plan.updated);
                self.sequenced.push(entry);
            }
        }
        self.version += 1;
    }
}

impl<T: Clone> StoreState<T> {
    pub fn range(&self, start: Position, count: usize) -> Vec<Entry<T>> {
        let len = self.sequenced.len() as u64;
        if start.value() >= len || count == 0 {
            return Vec::new();
        }
        let start = start.value() as usize;
        let end = start.saturating_add(count).min(self.sequenced.len());
        self.sequenced[start..end].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn pending_entry(id: u128) -> Entry<u32> {
        Entry::new(id as u32).with_id(EntryId::from_u128(id))
    }

    fn plan_all(state: &StoreState<u32>) -> AllocationPlan {
        let snapshot = state.snapshot();
        AllocationPlan {
            base_version: snapshot.version,
            base_next: snapshot.next_position,
            assignments: snapshot
                .pending
                .iter()
                .enumerate()
                .map(|(i, p)| (p.id, Position(snapshot.next_position.value() + i as u64)))
                .collect(),
            updated: Utc::now(),
        }
    }

    #[test]
    fn pending_entries_are_invisible_until_assigned() {
        let mut state = StoreState::default();
        let batch = vec![pending_entry(1), pending_entry(2)];
        state.check_push(&batch).unwrap();
        state.apply_push(batch);

        assert_eq!(state.total_count(), 0);
        assert_eq!(state.pending_count(), 2);
        assert!(state.range(Position(0), 10).is_empty());

        let plan = plan_all(&state);
        state.check_allocation(&plan).unwrap();
        state.apply_allocation(&plan);

        assert_eq!(state.total_count(), 2);
        assert_eq!(state.pending_count(), 0);
        let range = state.range(Position(0), 10);
        assert_eq!(range[0].position, Some(Position(0)));
        assert_eq!(range[1].id, EntryId::from_u128(2));
    }

    #[test]
    fn stale_plan_conflicts() {
        let mut state = StoreState::default();
        let batch = vec![pending_entry(1)];
        state.apply_push(batch);

        let stale = plan_all(&state);
        let fresh = plan_all(&state);
        state.check_allocation(&fresh).unwrap();
        state.apply_allocation(&fresh);

        assert!(state.check_allocation(&stale).unwrap_err().is_conflict());
    }

    #[test]
    fn positioned_push_must_be_contiguous() {
        let mut state: StoreState<u32> = StoreState::default();
        let ok = vec![pending_entry(1).with_position(Position(0))];
        state.check_push(&ok).unwrap();
        state.apply_push(ok);

        let gap = vec![pending_entry(2).with_position(Position(2))];
        assert!(matches!(
            state.check_push(&gap),
            Err(CoreError::PositionConflict {
                expected: Position(1),
                actual: Position(2)
            })
        ));
    }

    #[test]
    fn positioned_push_invalidates_open_plans() {
        let mut state = StoreState::default();
        state.apply_push(vec![pending_entry(1)]);
        let plan = plan_all(&state);

        state.apply_push(vec![pending_entry(2).with_position(Position(0))]);
        assert!(state.check_allocation(&plan).unwrap_err().is_conflict());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut state = StoreState::default();
        state.apply_push(vec![pending_entry(1)]);

        assert!(matches!(
            state.check_push(&[pending_entry(1)]),
            Err(CoreError::DuplicateEntry { .. })
        ));
        assert!(matches!(
            state.check_push(&[pending_entry(5), pending_entry(5)]),
            Err(CoreError::DuplicateEntry { .. })
        ));
    }

    #[test]
    fn range_clamps_to_the_end() {
        let mut state = StoreState::default();
        state.apply_push(vec![pending_entry(1), pending_entry(2), pending_entry(3)]);
        let plan = plan_all(&state);
        state.apply_allocation(&plan);

        assert_eq!(state.range(Position(1), 10).len(), 2);
        assert!(state.range(Position(3), 1).is_empty());
        assert!(state.range(Position(0), 0).is_empty());
    }
}
