//! # pagefeed codec
//!
//! Converts entry payloads between their application type and the raw bytes
//! kept by entry stores and carried inside feed pages.
//!
//! The feed core never inspects payloads. Everything it needs from a payload
//! type goes through the [`Codec`] trait:
//!
//! - [`CborCodec`] - compact binary encoding for any serde type (ciborium)
//! - [`JsonCodec`] - human-readable encoding for any serde type
//! - [`BytesCodec`] - identity codec for payloads that already are bytes
//!
//! ## Usage
//!
//! ```
//! use pagefeed_codec::{Codec, CborCodec};
//!
//! let codec = CborCodec::<Vec<u32>>::new();
//! let bytes = codec.encode(&vec![1, 2, 3]).unwrap();
//! assert_eq!(codec.decode(&bytes).unwrap(), vec![1, 2, 3]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;
mod json;
mod raw;

pub use cbor::{from_cbor, to_cbor, CborCodec};
pub use error::{CodecError, CodecResult};
pub use json::JsonCodec;
pub use raw::BytesCodec;

/// Converts between a payload type `T` and its stored byte representation.
///
/// Implementations must be deterministic for a given value so that rebuilt
/// archive pages stay byte-identical.
pub trait Codec<T>: Send + Sync {
    /// Encodes a payload to bytes.
    fn encode(&self, value: &T) -> CodecResult<Vec<u8>>;

    /// Decodes a payload from bytes.
    fn decode(&self, bytes: &[u8]) -> CodecResult<T>;

    /// Media type of the encoded form.
    fn content_type(&self) -> &'static str;
}

impl<T, C: Codec<T> + ?Sized> Codec<T> for std::sync::Arc<C> {
    fn encode(&self, value: &T) -> CodecResult<Vec<u8>> {
        (**self).encode(value)
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<T> {
        (**self).decode(bytes)
    }

    fn content_type(&self) -> &'static str {
        (**self).content_type()
    }
}
