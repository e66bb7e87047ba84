//! Error types for the feed server.

use pagefeed_core::CoreError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while serving a feed.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request names a page size other than the feed's.
    #[error("page size {requested} does not match feed page size {configured}")]
    PageSizeMismatch {
        /// Size in the request.
        requested: usize,
        /// Size the feed is paged by.
        configured: usize,
    },

    /// Store, allocation or pagination error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Entry payload could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] pagefeed_codec::CodecError),

    /// Page could not be put on the wire.
    #[error("protocol error: {0}")]
    Protocol(#[from] pagefeed_protocol::ProtocolError),
}

impl ServerError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) | ServerError::PageSizeMismatch { .. } => 400,
            ServerError::Core(CoreError::PageNotFound { .. }) => 404,
            ServerError::Core(
                CoreError::PositionConflict { .. } | CoreError::DuplicateEntry { .. },
            ) => 409,
            ServerError::Core(_) | ServerError::Codec(_) | ServerError::Protocol(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ServerError::InvalidRequest("x".into()).status_code(), 400);
        assert_eq!(
            ServerError::PageSizeMismatch {
                requested: 5,
                configured: 2
            }
            .status_code(),
            400
        );
        assert_eq!(
            ServerError::from(CoreError::PageNotFound { index: 9, last: 1 }).status_code(),
            404
        );
        assert_eq!(
            ServerError::from(CoreError::AllocationExhausted { attempts: 3 }).status_code(),
            500
        );
    }

    #[test]
    fn client_vs_server() {
        assert!(ServerError::InvalidRequest("x".into()).is_client_error());
        assert!(ServerError::from(CoreError::StoreLocked).is_server_error());
    }
}
