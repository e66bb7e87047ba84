//! CBOR codec backed by ciborium.

use crate::error::{CodecError, CodecResult};
use crate::Codec;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;

const FORMAT: &str = "cbor";

/// Encodes any serializable value to CBOR bytes.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(value, &mut buffer)
        .map_err(|e| CodecError::encoding_failed(FORMAT, e.to_string()))?;
    Ok(buffer)
}

/// Decodes a value from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    if bytes.is_empty() {
        return Err(CodecError::UnexpectedEof);
    }
    ciborium::from_reader(bytes).map_err(|e| match e {
        ciborium::de::Error::Io(_) => CodecError::UnexpectedEof,
        other => CodecError::decoding_failed(FORMAT, other.to_string()),
    })
}

/// Codec storing payloads as CBOR.
///
/// This is the default payload encoding for durable entry stores and the
/// page wire format.
pub struct CborCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> CborCodec<T> {
    /// Creates a new CBOR codec.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for CborCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CborCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for CborCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CborCodec")
    }
}

impl<T> Codec<T> for CborCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> CodecResult<Vec<u8>> {
        to_cbor(value)
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<T> {
        from_cbor(bytes)
    }

    fn content_type(&self) -> &'static str {
        "application/cbor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    #[test]
    fn empty_input_is_eof() {
        let result: CodecResult<u64> = from_cbor(&[]);
        assert_eq!(result, Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn truncated_input_fails() {
        let bytes = to_cbor(&"a fairly long text payload").unwrap();
        let result: CodecResult<String> = from_cbor(&bytes[..bytes.len() - 3]);
        assert!(result.is_err());
    }

    #[test]
    fn encoding_is_deterministic() {
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), 2u32);
        map.insert("a".to_string(), 1u32);

        let codec = CborCodec::<BTreeMap<String, u32>>::new();
        assert_eq!(codec.encode(&map).unwrap(), codec.encode(&map.clone()).unwrap());
    }

    proptest! {
        #[test]
        fn any_string_vector_survives(items in prop::collection::vec(".{0,16}", 0..8)) {
            let codec = CborCodec::<Vec<String>>::new();
            let bytes = codec.encode(&items).unwrap();
            prop_assert_eq!(codec.decode(&bytes).unwrap(), items);
        }
    }
}
