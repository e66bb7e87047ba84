//! On-disk framing for log records.
//!
//! ```text
//! +-------+--------+-----------+-------+
//! | magic | length |  payload  | crc32 |
//! |  4 B  | 4 B LE | length B  | 4 B LE|
//! +-------+--------+-----------+-------+
//! ```
//!
//! The CRC covers the payload only. A frame cut short by a crash is detected
//! by its length running past the end of the log.

use crate::error::{StorageError, StorageResult};

/// Magic bytes opening every frame.
pub const FRAME_MAGIC: [u8; 4] = *b"PFRL";

/// Bytes before the payload: magic + length.
pub const HEADER_SIZE: usize = 8;

/// Bytes after the payload: crc32.
pub const TRAILER_SIZE: usize = 4;

/// Largest accepted record.
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// Wraps a record in a frame.
pub(crate) fn encode(record: &[u8]) -> StorageResult<Vec<u8>> {
    if record.len() > MAX_RECORD_SIZE {
        return Err(StorageError::RecordTooLarge {
            len: record.len(),
            max: MAX_RECORD_SIZE,
        });
    }

    let mut frame = Vec::with_capacity(HEADER_SIZE + record.len() + TRAILER_SIZE);
    frame.extend_from_slice(&FRAME_MAGIC);
    frame.extend_from_slice(&(record.len() as u32).to_le_bytes());
    frame.extend_from_slice(record);
    frame.extend_from_slice(&compute_crc32(record).to_le_bytes());
    Ok(frame)
}

/// Result of scanning a log buffer.
#[derive(Debug, Default)]
pub(crate) struct Scan {
    /// Complete, validated records in order.
    pub records: Vec<Vec<u8>>,
    /// Length of the validated prefix of the buffer.
    pub valid_len: u64,
}

/// Splits a log buffer into records.
///
/// A trailing frame that is incomplete, or complete but failing its CRC, is
/// a torn write and ends the scan. Any bad frame followed by more data is
/// corruption.
pub(crate) fn scan(bytes: &[u8]) -> StorageResult<Scan> {
    let mut scan = Scan::default();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let remaining = bytes.len() - offset;
        if remaining < HEADER_SIZE {
            break;
        }

        if bytes[offset..offset + 4] != FRAME_MAGIC {
            return Err(StorageError::corrupted(offset as u64, "bad frame magic"));
        }

        let len = read_u32(&bytes[offset + 4..offset + 8]) as usize;
        if len > MAX_RECORD_SIZE {
            return Err(StorageError::corrupted(
                offset as u64,
                format!("frame length {len} exceeds limit"),
            ));
        }

        let end = offset + HEADER_SIZE + len + TRAILER_SIZE;
        if end > bytes.len() {
            break;
        }

        let payload = &bytes[offset + HEADER_SIZE..offset + HEADER_SIZE + len];
        let stored_crc = read_u32(&bytes[end - TRAILER_SIZE..end]);
        if compute_crc32(payload) != stored_crc {
            if end == bytes.len() {
                break;
            }
            return Err(StorageError::corrupted(offset as u64, "checksum mismatch"));
        }

        scan.records.push(payload.to_vec());
        offset = end;
        scan.valid_len = offset as u64;
    }

    Ok(scan)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

/// Computes the IEEE CRC32 of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn log_of(records: &[&[u8]]) -> Vec<u8> {
        records
            .iter()
            .flat_map(|r| encode(r).unwrap())
            .collect()
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn scan_splits_frames() {
        let bytes = log_of(&[b"first", b"", b"third"]);
        let scan = scan(&bytes).unwrap();
        assert_eq!(scan.records, vec![b"first".to_vec(), vec![], b"third".to_vec()]);
        assert_eq!(scan.valid_len, bytes.len() as u64);
    }

    #[test]
    fn truncated_tail_is_dropped() {
        let bytes = log_of(&[b"kept", b"lost in the crash"]);
        let cut = bytes.len() - 5;
        let scan = scan(&bytes[..cut]).unwrap();
        assert_eq!(scan.records, vec![b"kept".to_vec()]);
        assert_eq!(scan.valid_len, (HEADER_SIZE + 4 + TRAILER_SIZE) as u64);
    }

    #[test]
    fn bad_checksum_on_tail_is_torn() {
        let mut bytes = log_of(&[b"kept", b"flipped"]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let scan = scan(&bytes).unwrap();
        assert_eq!(scan.records.len(), 1);
    }

    #[test]
    fn bad_checksum_mid_log_is_corruption() {
        let mut bytes = log_of(&[b"flipped", b"after"]);
        bytes[HEADER_SIZE] ^= 0xFF;
        assert!(matches!(
            scan(&bytes),
            Err(StorageError::Corrupted { offset: 0, .. })
        ));
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut bytes = log_of(&[b"record"]);
        bytes[0] = b'X';
        assert!(matches!(scan(&bytes), Err(StorageError::Corrupted { .. })));
    }

    proptest! {
        #[test]
        fn any_prefix_yields_a_prefix_of_records(
            records in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..8),
            cut in any::<prop::sample::Index>(),
        ) {
            let refs: Vec<&[u8]> = records.iter().map(|r| r.as_slice()).collect();
            let bytes = log_of(&refs);
            let cut = cut.index(bytes.len() + 1);

            let scan = scan(&bytes[..cut]).unwrap();
            prop_assert!(scan.records.len() <= records.len());
            prop_assert_eq!(&scan.records[..], &records[..scan.records.len()]);
        }
    }
}
