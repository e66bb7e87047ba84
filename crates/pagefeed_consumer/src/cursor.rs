//! Durable consumer cursors.
//!
//! A cursor records the last position a consumer fully processed and the
//! page it should poll next. It is saved only after entries were delivered,
//! so after a crash the consumer resumes from the last saved cursor and
//! redelivers at most the entries processed since.

use crate::error::{ConsumerError, ConsumerResult};
use pagefeed_protocol::Position;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Resume point of one consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Owning consumer.
    pub consumer_id: String,
    /// Last position delivered successfully, `None` before the first entry.
    pub last_processed: Option<Position>,
    /// Page to poll next.
    pub page_index: u64,
}

impl Cursor {
    /// Creates a cursor for a consumer that has processed nothing.
    pub fn new(consumer_id: impl Into<String>) -> Self {
        Self {
            consumer_id: consumer_id.into(),
            last_processed: None,
            page_index: 0,
        }
    }

    /// The next position this consumer expects.
    pub fn next_position(&self) -> Position {
        self.last_processed.map_or(Position::ZERO, Position::next)
    }

    /// Returns true if `position` was already processed.
    pub fn has_processed(&self, position: Position) -> bool {
        self.last_processed.is_some_and(|last| position <= last)
    }
}

/// Persistence for cursors.
///
/// `save` must be atomic: after a crash, `load` returns either the previous
/// or the new cursor, never a mix.
pub trait CursorStore: Send + Sync {
    /// Loads the cursor of a consumer, if one was saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored cursor cannot be read.
    fn load(&self, consumer_id: &str) -> ConsumerResult<Option<Cursor>>;

    /// Saves a cursor durably.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor cannot be persisted. The previously
    /// saved cursor stays in place.
    fn save(&self, cursor: &Cursor) -> ConsumerResult<()>;
}

impl<S: CursorStore + ?Sized> CursorStore for std::sync::Arc<S> {
    fn load(&self, consumer_id: &str) -> ConsumerResult<Option<Cursor>> {
        (**self).load(consumer_id)
    }

    fn save(&self, cursor: &Cursor) -> ConsumerResult<()> {
        (**self).save(cursor)
    }
}

/// Cursor store held in memory.
///
/// Saves can be made to fail to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursors: RwLock<HashMap<String, Cursor>>,
    fail_saves: AtomicBool,
}

impl MemoryCursorStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent saves fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Returns the saved cursor of a consumer.
    pub fn get(&self, consumer_id: &str) -> Option<Cursor> {
        self.cursors.read().get(consumer_id).cloned()
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self, consumer_id: &str) -> ConsumerResult<Option<Cursor>> {
        Ok(self.get(consumer_id))
    }

    fn save(&self, cursor: &Cursor) -> ConsumerResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ConsumerError::CursorStore("save rejected".into()));
        }
        self.cursors
            .write()
            .insert(cursor.consumer_id.clone(), cursor.clone());
        Ok(())
    }
}

/// Cursor store keeping one JSON file per consumer in a directory.
///
/// ```text
/// <dir>/
/// ├─ billing.cursor.json
/// └─ search-indexer.cursor.json
/// ```
///
/// Saves write a temporary file, sync it, rename it over the old file and
/// sync the directory.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    dir: PathBuf,
}

impl FileCursorStore {
    /// Opens a cursor directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> ConsumerResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Returns the cursor directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn cursor_path(&self, consumer_id: &str) -> PathBuf {
        let name: String = consumer_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.cursor.json"))
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> ConsumerResult<()> {
        File::open(&self.dir)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> ConsumerResult<()> {
        Ok(())
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self, consumer_id: &str) -> ConsumerResult<Option<Cursor>> {
        let path = self.cursor_path(consumer_id);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let cursor: Cursor = serde_json::from_slice(&data)?;
        if cursor.consumer_id != consumer_id {
            return Err(ConsumerError::CursorStore(format!(
                "{} holds the cursor of '{}'",
                path.display(),
                cursor.consumer_id
            )));
        }
        Ok(Some(cursor))
    }

    fn save(&self, cursor: &Cursor) -> ConsumerResult<()> {
        let path = self.cursor_path(&cursor.consumer_id);
        let temp_path = path.with_extension("json.tmp");

        let data = serde_json::to_vec_pretty(cursor)?;
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &path)?;
        self.sync_directory()?;

        debug!(
            consumer = %cursor.consumer_id,
            last_processed = ?cursor.last_processed,
            page_index = cursor.page_index,
            "saved cursor"
        );
        Ok(())
    }
}
