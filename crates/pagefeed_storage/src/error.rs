//! Error types for record log operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while reading or writing a record log.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A complete record failed validation somewhere before the log tail.
    #[error("record log corrupted at offset {offset}: {reason}")]
    Corrupted {
        /// Offset of the offending frame.
        offset: u64,
        /// What was wrong with it.
        reason: String,
    },

    /// The record does not fit in a single frame.
    #[error("record of {len} bytes exceeds the frame limit of {max} bytes")]
    RecordTooLarge {
        /// Size of the rejected record.
        len: usize,
        /// Maximum record size.
        max: usize,
    },
}

impl StorageError {
    pub(crate) fn corrupted(offset: u64, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            reason: reason.into(),
        }
    }
}
