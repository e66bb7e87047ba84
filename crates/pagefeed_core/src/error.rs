//! Error types for pagefeed core.

use pagefeed_protocol::{EntryId, Position};
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in store, allocation and pagination operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Record log error.
    #[error("storage error: {0}")]
    Storage(#[from] pagefeed_storage::StorageError),

    /// Payload or record codec error.
    #[error("codec error: {0}")]
    Codec(#[from] pagefeed_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What is wrong.
        message: String,
    },

    /// Requested page index is beyond the oldest page.
    #[error("page {index} not found (oldest page is {last})")]
    PageNotFound {
        /// Requested index.
        index: u64,
        /// Index of the oldest existing page.
        last: u64,
    },

    /// Another allocation round committed between snapshot and apply.
    #[error("allocation conflict: expected version {expected}, store is at {actual}")]
    AllocationConflict {
        /// Version the plan was computed against.
        expected: u64,
        /// Version found at apply time.
        actual: u64,
    },

    /// Allocation kept conflicting until the attempt budget ran out.
    #[error("allocation failed after {attempts} conflicting attempts")]
    AllocationExhausted {
        /// Attempts made.
        attempts: u32,
    },

    /// A caller-assigned position is not contiguous with the feed.
    #[error("position conflict: expected {expected}, got {actual}")]
    PositionConflict {
        /// The only position that may be assigned next.
        expected: Position,
        /// The position supplied.
        actual: Position,
    },

    /// An entry with this id was already pushed.
    #[error("duplicate entry id {id}")]
    DuplicateEntry {
        /// The repeated id.
        id: EntryId,
    },

    /// Another process holds the store directory.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// A failed write could not be taken back out of the log; the store
    /// refuses further writes until it is reopened.
    #[error("store poisoned by a failed write; reopen it to recover")]
    StorePoisoned,

    /// The persisted log does not describe a valid feed.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns true if retrying the allocation round may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::AllocationConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_allocation_conflicts_are_retried() {
        assert!(CoreError::AllocationConflict {
            expected: 1,
            actual: 2
        }
        .is_conflict());
        assert!(!CoreError::AllocationExhausted { attempts: 3 }.is_conflict());
        assert!(!CoreError::PageNotFound { index: 4, last: 2 }.is_conflict());
    }

    #[test]
    fn display_mentions_positions() {
        let err = CoreError::PositionConflict {
            expected: Position(5),
            actual: Position(7),
        };
        assert_eq!(err.to_string(), "position conflict: expected 5, got 7");
    }
}
