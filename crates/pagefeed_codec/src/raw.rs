//! Identity codec for byte payloads.

use crate::error::CodecResult;
use crate::Codec;

/// Passes byte payloads through unchanged.
///
/// Used where content is already encoded, e.g. a consumer that hands raw
/// page content straight to application code.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Codec<Vec<u8>> for BytesCodec {
    fn encode(&self, value: &Vec<u8>) -> CodecResult<Vec<u8>> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Vec<u8>> {
        Ok(bytes.to_vec())
    }

    fn content_type(&self) -> &'static str {
        "application/octet-stream"
    }
}
