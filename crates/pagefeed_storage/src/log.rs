//! Record log trait definition.

use crate::error::StorageResult;

/// An append-only log of opaque records.
///
/// Entry stores write one record per logical change (a pushed batch, an
/// allocation round) and rebuild their state by replaying the records in
/// order. The log never interprets record contents.
///
/// # Invariants
///
/// - Records are returned by [`records`](RecordLog::records) in append order
/// - A record is either wholly present or wholly absent after a crash;
///   a torn trailing frame is discarded when the log is reopened
/// - After [`sync`](RecordLog::sync) returns, every appended record survives
///   process termination
pub trait RecordLog: Send + Sync {
    /// Appends one record and returns the byte offset of its frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is too large or an I/O error occurs.
    fn append(&mut self, record: &[u8]) -> StorageResult<u64>;

    /// Makes every appended record durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Cuts the log back to `len` bytes and makes the cut durable.
    ///
    /// Used to take back a record whose append or sync failed. `len` must be
    /// a frame boundary, normally a size returned by [`size`](RecordLog::size).
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be shortened or synced.
    fn truncate(&mut self, len: u64) -> StorageResult<()>;

    /// Reads every record in append order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupted`](crate::StorageError::Corrupted)
    /// if a frame before the tail fails validation.
    fn records(&self) -> StorageResult<Vec<Vec<u8>>>;

    /// Returns the size of the log in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;
}
