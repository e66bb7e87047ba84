//! Protocol error types.

use pagefeed_codec::CodecError;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while interpreting feed pages and links.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A link target does not follow the `/{pageIndex}/{pageSize}` scheme.
    #[error("invalid page reference '{href}': {reason}")]
    InvalidPageRef {
        /// The offending target.
        href: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A page could not be encoded or decoded.
    #[error("page codec error: {0}")]
    Codec(#[from] CodecError),
}

impl ProtocolError {
    pub(crate) fn invalid_page_ref(href: &str, reason: &'static str) -> Self {
        Self::InvalidPageRef {
            href: href.to_string(),
            reason,
        }
    }
}
