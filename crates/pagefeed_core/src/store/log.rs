//! Entry store persisted in a record log.
//!
//! ```text
//! <feed_dir>/
//! ├─ LOCK       # Advisory lock, one writer process per feed
//! └─ feed.log   # CRC-framed records, one per push or allocation round
//! ```
//!
//! Every mutation is validated against the in-memory state, appended to the
//! log as a single record, synced, and only then applied in memory. On open
//! the log is replayed. A record torn by a crash is dropped by the record
//! log, so an allocation round is either wholly present or wholly absent.
//!
//! If the append or the sync fails, the log is cut back to its size before
//! the write and the in-memory state is left untouched. If even that cut
//! fails, the store is poisoned and rejects writes until reopened.

use super::state::StoreState;
use super::{AllocationPlan, AllocationSnapshot, EntryRange, EntryStore, SequencedStore};
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use pagefeed_codec::{from_cbor, to_cbor, Codec};
use pagefeed_protocol::{Entry, EntryId, Position};
use pagefeed_storage::{FileRecordLog, RecordLog};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use tracing::{debug, error, info, warn};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "feed.log";

/// One persisted change.
#[derive(Debug, Serialize, Deserialize)]
enum LogRecord {
    Pushed {
        entries: Vec<Entry<Vec<u8>>>,
    },
    Assigned {
        base_next: Position,
        assignments: Vec<(EntryId, Position)>,
        updated: DateTime<Utc>,
    },
}

struct Inner<T, L> {
    state: StoreState<T>,
    log: L,
    poisoned: bool,
}

impl<T, L: RecordLog> Inner<T, L> {
    /// Appends and syncs one record, taking it back out of the log on failure.
    fn write_record(&mut self, record: &[u8]) -> CoreResult<()> {
        if self.poisoned {
            return Err(CoreError::StorePoisoned);
        }

        let before = self.log.size()?;
        let written = self.log.append(record).and_then(|_| self.log.sync());
        let Err(write_err) = written else {
            return Ok(());
        };

        match self.log.truncate(before) {
            Ok(()) => {
                warn!(error = %write_err, len = before, "write failed, record log rolled back");
            }
            Err(rollback_err) => {
                self.poisoned = true;
                error!(
                    error = %write_err,
                    rollback = %rollback_err,
                    "write failed and could not be rolled back, store poisoned"
                );
            }
        }
        Err(write_err.into())
    }
}

/// A durable entry store backed by a [`RecordLog`].
///
/// Payloads are stored in the form produced by the codec `C`.
///
/// # Example
///
/// ```rust
/// use pagefeed_codec::JsonCodec;
/// use pagefeed_core::{EntryStore, LogEntryStore};
/// use pagefeed_protocol::Entry;
/// use pagefeed_storage::MemoryRecordLog;
///
/// let store = LogEntryStore::open(MemoryRecordLog::new(), JsonCodec::<String>::new()).unwrap();
/// store.push(vec![Entry::new("hello".to_string())]).unwrap();
/// ```
pub struct LogEntryStore<T, C, L = FileRecordLog> {
    inner: RwLock<Inner<T, L>>,
    codec: C,
    /// Held for exclusive access when opened from a directory.
    _lock_file: Option<File>,
}

impl<T, C, L> LogEntryStore<T, C, L>
where
    C: Codec<T>,
    L: RecordLog,
{
    /// Opens a store over an existing log, replaying its records.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or a record does not
    /// describe a valid change of the feed.
    pub fn open(log: L, codec: C) -> CoreResult<Self> {
        let state = replay(&log, &codec)?;
        info!(
            entries = state.total_count(),
            pending = state.pending_count(),
            "opened log entry store"
        );
        Ok(Self {
            inner: RwLock::new(Inner {
                state,
                log,
                poisoned: false,
            }),
            codec,
            _lock_file: None,
        })
    }

    /// Consumes the store and returns its log.
    pub fn into_log(self) -> L {
        self.inner.into_inner().log
    }

    fn encode_entry(&self, entry: &Entry<T>) -> CoreResult<Entry<Vec<u8>>> {
        Ok(Entry {
            id: entry.id,
            position: entry.position,
            created: entry.created,
            updated: entry.updated,
            content: self.codec.encode(&entry.content)?,
        })
    }
}

impl<T, C> LogEntryStore<T, C, FileRecordLog>
where
    C: Codec<T>,
{
    /// Opens or creates a feed directory.
    ///
    /// # Errors
    ///
    /// - [`CoreError::StoreLocked`] if another process has the directory open
    /// - any error from [`open`](Self::open)
    pub fn open_dir(path: &Path, codec: C) -> CoreResult<Self> {
        fs::create_dir_all(path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }

        let log = FileRecordLog::open(&path.join(LOG_FILE))?;
        let mut store = Self::open(log, codec)?;
        store._lock_file = Some(lock_file);
        Ok(store)
    }
}

fn replay<T, C: Codec<T>, L: RecordLog>(log: &L, codec: &C) -> CoreResult<StoreState<T>> {
    let mut state = StoreState::default();

    for (index, bytes) in log.records()?.into_iter().enumerate() {
        let record: LogRecord = from_cbor(&bytes)?;
        match record {
            LogRecord::Pushed { entries } => {
                let entries = entries
                    .into_iter()
                    .map(|e| e.try_map_content(|bytes| codec.decode(&bytes)))
                    .collect::<Result<Vec<_>, _>>()?;
                state
                    .check_push(&entries)
                    .map_err(|e| CoreError::invalid_format(format!("record {index}: {e}")))?;
                state.apply_push(entries);
            }
            LogRecord::Assigned {
                base_next,
                assignments,
                updated,
            } => {
                let plan = AllocationPlan {
                    base_version: state.version(),
                    base_next,
                    assignments,
                    updated,
                };
                state
                    .check_allocation(&plan)
                    .map_err(|e| CoreError::invalid_format(format!("record {index}: {e}")))?;
                state.apply_allocation(&plan);
            }
        }
    }

    debug!(records = log.size()?, "replayed record log");
    Ok(state)
}

impl<T, C, L> EntryStore<T> for LogEntryStore<T, C, L>
where
    T: Clone + Send + Sync,
    C: Codec<T>,
    L: RecordLog,
{
    fn push(&self, entries: Vec<Entry<T>>) -> CoreResult<usize> {
        let count = entries.len();
        if count == 0 {
            return Ok(0);
        }

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.state.check_push(&entries)?;

        let stored = entries
            .iter()
            .map(|e| self.encode_entry(e))
            .collect::<CoreResult<Vec<_>>>()?;
        let record = to_cbor(&LogRecord::Pushed { entries: stored })?;

        inner.write_record(&record)?;
        inner.state.apply_push(entries);

        debug!(count, pending = inner.state.pending_count(), "pushed entries");
        Ok(count)
    }

    fn get_entries(&self, start: Position, count: usize) -> CoreResult<EntryRange<T>> {
        Ok(EntryRange::new(self.inner.read().state.range(start, count)))
    }

    fn total_count(&self) -> CoreResult<u64> {
        Ok(self.inner.read().state.total_count())
    }
}

impl<T, C, L> SequencedStore<T> for LogEntryStore<T, C, L>
where
    T: Clone + Send + Sync,
    C: Codec<T>,
    L: RecordLog,
{
    fn allocation_snapshot(&self) -> CoreResult<AllocationSnapshot> {
        Ok(self.inner.read().state.snapshot())
    }

    fn apply_allocation(&self, plan: &AllocationPlan) -> CoreResult<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.state.check_allocation(plan)?;
        if plan.assignments.is_empty() {
            return Ok(());
        }

        let record = to_cbor(&LogRecord::Assigned {
            base_next: plan.base_next,
            assignments: plan.assignments.clone(),
            updated: plan.updated,
        })?;

        inner.write_record(&record)?;
        inner.state.apply_allocation(plan);
        Ok(())
    }

    fn pending_count(&self) -> CoreResult<usize> {
        Ok(self.inner.read().state.pending_count())
    }
}
