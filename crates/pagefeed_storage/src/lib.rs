//! # pagefeed storage
//!
//! Append-only record log used by durable entry stores.
//!
//! Records are opaque byte strings. Each one is written as a single
//! CRC-checked frame, so a record either survives a crash whole or is
//! discarded as a torn tail when the log is reopened. Entry stores rely on
//! this to make pushes and allocation rounds atomic.
//!
//! ## Available logs
//!
//! - [`MemoryRecordLog`] - For testing and crash simulation
//! - [`FileRecordLog`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use pagefeed_storage::{MemoryRecordLog, RecordLog};
//!
//! let mut log = MemoryRecordLog::new();
//! log.append(b"hello").unwrap();
//! log.append(b"world").unwrap();
//! assert_eq!(log.records().unwrap().len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod frame;
mod log;
mod memory;

pub use error::{StorageError, StorageResult};
pub use file::FileRecordLog;
pub use frame::{compute_crc32, FRAME_MAGIC, HEADER_SIZE, MAX_RECORD_SIZE, TRAILER_SIZE};
pub use log::RecordLog;
pub use memory::MemoryRecordLog;

impl<L: RecordLog + ?Sized> RecordLog for Box<L> {
    fn append(&mut self, record: &[u8]) -> StorageResult<u64> {
        (**self).append(record)
    }

    fn sync(&mut self) -> StorageResult<()> {
        (**self).sync()
    }

    fn truncate(&mut self, len: u64) -> StorageResult<()> {
        (**self).truncate(len)
    }

    fn records(&self) -> StorageResult<Vec<Vec<u8>>> {
        (**self).records()
    }

    fn size(&self) -> StorageResult<u64> {
        (**self).size()
    }
}
