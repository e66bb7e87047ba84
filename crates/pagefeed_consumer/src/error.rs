//! Error types for feed consumers.

use pagefeed_protocol::{PageRef, Position};
use thiserror::Error;

/// Error returned by an entry callback.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for consumer operations.
pub type ConsumerResult<T> = Result<T, ConsumerError>;

/// Errors that can occur while consuming a feed.
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the fetch can be retried.
        retryable: bool,
    },

    /// The fetch timed out.
    #[error("page fetch timed out")]
    Timeout,

    /// The source answered with an unexpected status.
    #[error("remote returned status {status}: {message}")]
    RemoteStatus {
        /// Status code.
        status: u16,
        /// Response text.
        message: String,
    },

    /// The source has no such page.
    #[error("page {0} not found")]
    NotFound(PageRef),

    /// A page expected during catch-up is missing.
    #[error("archive page {0} not found during catch-up")]
    ArchiveNotFound(PageRef),

    /// A fetched page is malformed or is not the page requested.
    #[error("invalid page: {0}")]
    InvalidPage(String),

    /// The entry callback failed.
    #[error("callback failed at position {position}: {source}")]
    Callback {
        /// Position of the failed entry.
        position: Position,
        /// The callback's error.
        #[source]
        source: CallbackError,
    },

    /// An entry payload could not be decoded.
    #[error("cannot decode entry at position {position}: {source}")]
    Codec {
        /// Position of the malformed entry.
        position: Position,
        /// The codec's error.
        #[source]
        source: pagefeed_codec::CodecError,
    },

    /// Cursor could not be loaded or saved.
    #[error("cursor store error: {0}")]
    CursorStore(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cursor (de)serialization error.
    #[error("cursor serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The consumer configuration is invalid.
    #[error("invalid consumer configuration: {0}")]
    InvalidConfig(String),

    /// The consumer was stopped.
    #[error("consumer stopped")]
    Stopped,

    /// The consumer gave up and needs a reset.
    #[error("consumer failed: {reason}")]
    ConsumerFailed {
        /// Why the consumer failed.
        reason: String,
    },

    /// The requested transition is not allowed from the current state.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl ConsumerError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if a page fetch failing with this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConsumerError::Transport { retryable, .. } => *retryable,
            ConsumerError::Timeout => true,
            ConsumerError::RemoteStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true for failures confined to one entry.
    pub fn is_entry_error(&self) -> bool {
        matches!(
            self,
            ConsumerError::Callback { .. } | ConsumerError::Codec { .. }
        )
    }

    /// Position of the entry that failed, for entry errors.
    pub fn position(&self) -> Option<Position> {
        match self {
            ConsumerError::Callback { position, .. } | ConsumerError::Codec { position, .. } => {
                Some(*position)
            }
            _ => None,
        }
    }
}
