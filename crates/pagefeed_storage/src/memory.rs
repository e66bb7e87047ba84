//! In-memory record log for testing.

use crate::error::StorageResult;
use crate::frame;
use crate::log::RecordLog;
use tracing::warn;

/// A record log held in memory.
///
/// Frames are laid out exactly as on disk, so crash scenarios can be
/// reproduced by cutting the buffer with [`MemoryRecordLog::truncated`]
/// and reopening it with [`MemoryRecordLog::with_bytes`].
///
/// # Example
///
/// ```rust
/// use pagefeed_storage::{MemoryRecordLog, RecordLog};
///
/// let mut log = MemoryRecordLog::new();
/// log.append(b"pushed").unwrap();
/// assert_eq!(log.records().unwrap(), vec![b"pushed".to_vec()]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordLog {
    data: Vec<u8>,
}

impl MemoryRecordLog {
    /// Creates a new empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reopens a log from raw bytes, discarding a torn trailing frame.
    ///
    /// # Errors
    ///
    /// Returns an error if a frame before the tail is corrupted.
    pub fn with_bytes(mut data: Vec<u8>) -> StorageResult<Self> {
        let scan = frame::scan(&data)?;
        if scan.valid_len < data.len() as u64 {
            warn!(
                discarded = data.len() as u64 - scan.valid_len,
                "dropping torn tail of in-memory record log"
            );
            data.truncate(scan.valid_len as usize);
        }
        Ok(Self { data })
    }

    /// Returns a copy of the raw log bytes.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Returns the first `len` bytes of the log, as a crash would leave them.
    #[must_use]
    pub fn truncated(&self, len: usize) -> Vec<u8> {
        self.data[..len.min(self.data.len())].to_vec()
    }
}

impl RecordLog for MemoryRecordLog {
    fn append(&mut self, record: &[u8]) -> StorageResult<u64> {
        let framed = frame::encode(record)?;
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(&framed);
        Ok(offset)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> StorageResult<()> {
        self.data.truncate(len as usize);
        Ok(())
    }

    fn records(&self) -> StorageResult<Vec<Vec<u8>>> {
        Ok(frame::scan(&self.data)?.records)
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.len() as u64)
    }
}
