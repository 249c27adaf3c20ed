//! Block records: the fixed-size on-disk form of one protected block
//!
//! Layout (274 bytes):
//! 1. Marker (4 bytes): "QDPI"
//! 2. Header:
//!    - Version (1 byte)
//!    - Block ID (8 bytes, big-endian)
//!    - Original length (1 byte, 0..=223)
//!    - Flags (1 byte)
//! 3. Codeword (255 bytes)
//! 4. CRC32C of marker + header (4 bytes, big-endian)
//!
//! The checksum covers the header only. The codeword is protected by the
//! outer code, so a record with a damaged codeword still parses and is left
//! for the decoder to repair.

use crate::constants::{
    RecordFlags, CODEWORD_LEN, CONTAINER_VERSION, CRC32C_SIZE, DATA_LEN, RECORD_HEADER_SIZE,
    RECORD_MARKER, RECORD_SIZE,
};
use crate::error::QdpiError;
use crate::types::Block;
use bytes::{BufMut, Bytes, BytesMut};

/// A parsed block record
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRecord {
    /// Block identifier
    pub block_id: u64,

    /// Length of the data carried in the codeword
    pub original_len: usize,

    /// Record flags
    pub flags: RecordFlags,

    /// Received codeword, possibly damaged
    pub codeword: Bytes,
}

impl BlockRecord {
    /// Record for a freshly encoded block
    pub fn from_block(block: &Block, flags: RecordFlags) -> Self {
        Self {
            block_id: block.block_id,
            original_len: block.original_len(),
            flags,
            codeword: block.codeword.clone(),
        }
    }

    fn validate(&self) -> Result<(), QdpiError> {
        if self.codeword.len() != CODEWORD_LEN {
            return Err(QdpiError::InvalidCodewordLength {
                expected: CODEWORD_LEN,
                actual: self.codeword.len(),
            });
        }
        if self.original_len > DATA_LEN {
            return Err(QdpiError::InvalidOriginalLength(self.original_len));
        }
        Ok(())
    }
}

/// Encode a record into its 274-byte form
pub fn encode_record(record: &BlockRecord) -> Result<Bytes, QdpiError> {
    record.validate()?;

    let mut buf = BytesMut::with_capacity(RECORD_SIZE);
    buf.put_slice(RECORD_MARKER);
    buf.put_u8(CONTAINER_VERSION);
    buf.put_u64(record.block_id);
    buf.put_u8(record.original_len as u8);
    buf.put_u8(record.flags.as_u8());

    let checksum = crc32c::crc32c(&buf[..RECORD_HEADER_SIZE]);
    buf.put_slice(&record.codeword);
    buf.put_u32(checksum);

    Ok(buf.freeze())
}

/// Decode one record from the start of `data`
///
/// Validates marker, version, header checksum and the original length.
pub fn decode_record(data: &[u8]) -> Result<BlockRecord, QdpiError> {
    decode_record_zero_copy(Bytes::copy_from_slice(data.get(..RECORD_SIZE).unwrap_or(data)))
}

/// Decode one record without copying the codeword out of `buf`
pub fn decode_record_zero_copy(buf: Bytes) -> Result<BlockRecord, QdpiError> {
    if buf.len() < RECORD_SIZE {
        return Err(QdpiError::IncompleteRecord {
            expected: RECORD_SIZE,
            actual: buf.len(),
        });
    }

    if &buf[0..4] != RECORD_MARKER {
        let mut bad = [0u8; 4];
        bad.copy_from_slice(&buf[0..4]);
        return Err(QdpiError::BadMarker(bad));
    }

    let version = buf[4];
    if version != CONTAINER_VERSION {
        return Err(QdpiError::UnsupportedVersion(version));
    }

    let crc_at = RECORD_HEADER_SIZE + CODEWORD_LEN;
    let mut stored = [0u8; CRC32C_SIZE];
    stored.copy_from_slice(&buf[crc_at..crc_at + CRC32C_SIZE]);
    let expected = u32::from_be_bytes(stored);
    let actual = crc32c::crc32c(&buf[..RECORD_HEADER_SIZE]);
    if expected != actual {
        return Err(QdpiError::ChecksumMismatch { expected, actual });
    }

    let mut id = [0u8; 8];
    id.copy_from_slice(&buf[5..13]);
    let original_len = buf[13] as usize;
    if original_len > DATA_LEN {
        return Err(QdpiError::InvalidOriginalLength(original_len));
    }

    Ok(BlockRecord {
        block_id: u64::from_be_bytes(id),
        original_len,
        flags: RecordFlags::new(buf[14]),
        codeword: buf.slice(RECORD_HEADER_SIZE..crc_at),
    })
}

/// Builder for block records
pub struct RecordBuilder {
    record: BlockRecord,
}

impl RecordBuilder {
    /// Start from an encoded block
    pub fn new(block: &Block) -> Self {
        Self {
            record: BlockRecord::from_block(block, RecordFlags::default()),
        }
    }

    fn set(mut self, flag: u8) -> Self {
        self.record.flags = RecordFlags::new(self.record.flags.as_u8() | flag);
        self
    }

    /// Mark as first block of a stream
    pub fn mark_first(self) -> Self {
        self.set(RecordFlags::IS_FIRST)
    }

    /// Mark as last block of a stream
    pub fn mark_last(self) -> Self {
        self.set(RecordFlags::IS_LAST)
    }

    /// Mark the data as canonical JSON
    pub fn json(self) -> Self {
        self.set(RecordFlags::IS_JSON)
    }

    /// Build the record struct without encoding
    pub fn build_record(self) -> BlockRecord {
        self.record
    }

    /// Build and encode the record
    pub fn build(self) -> Result<Bytes, QdpiError> {
        encode_record(&self.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outer::OuterCode;

    fn block(data: &[u8], id: u64) -> Block {
        OuterCode::new().encode(data, id).unwrap()
    }

    #[test]
    fn record_layout() {
        let encoded = RecordBuilder::new(&block(b"hello", 42))
            .mark_first()
            .build()
            .unwrap();

        assert_eq!(encoded.len(), RECORD_SIZE);
        assert_eq!(&encoded[0..4], b"QDPI");
        assert_eq!(encoded[4], CONTAINER_VERSION);
        assert_eq!(&encoded[5..13], &42u64.to_be_bytes());
        assert_eq!(encoded[13], 5);
        assert_eq!(encoded[14], RecordFlags::IS_FIRST);
        assert_eq!(&encoded[15..20], b"hello");
    }

    #[test]
    fn decode_round_trip() {
        let b = block(b"payload", 9);
        let encoded = RecordBuilder::new(&b).mark_last().json().build().unwrap();
        let record = decode_record(&encoded).unwrap();
        assert_eq!(record.block_id, 9);
        assert_eq!(record.original_len, 7);
        assert!(record.flags.is_last());
        assert!(record.flags.is_json());
        assert!(!record.flags.is_first());
        assert_eq!(record.codeword, b.codeword);
    }

    #[test]
    fn damaged_codeword_still_parses() {
        let mut encoded = RecordBuilder::new(&block(b"abc", 1)).build().unwrap().to_vec();
        encoded[RECORD_HEADER_SIZE + 1] ^= 0xFF;
        let record = decode_record(&encoded).unwrap();
        assert_eq!(record.codeword[1], b'b' ^ 0xFF);
    }

    #[test]
    fn damaged_header_is_rejected() {
        let mut encoded = RecordBuilder::new(&block(b"abc", 1)).build().unwrap().to_vec();
        encoded[7] ^= 0x01;
        assert!(matches!(
            decode_record(&encoded),
            Err(QdpiError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn marker_version_and_length_errors() {
        let encoded = RecordBuilder::new(&block(b"abc", 1)).build().unwrap().to_vec();

        let mut bad_marker = encoded.clone();
        bad_marker[0] = b'X';
        assert_eq!(
            decode_record(&bad_marker),
            Err(QdpiError::BadMarker(*b"XDPI"))
        );

        let mut bad_version = encoded.clone();
        bad_version[4] = 9;
        assert_eq!(
            decode_record(&bad_version),
            Err(QdpiError::UnsupportedVersion(9))
        );

        assert_eq!(
            decode_record(&encoded[..100]),
            Err(QdpiError::IncompleteRecord {
                expected: RECORD_SIZE,
                actual: 100
            })
        );
    }

    #[test]
    fn encode_rejects_bad_codeword_length() {
        let record = BlockRecord {
            block_id: 0,
            original_len: 0,
            flags: RecordFlags::default(),
            codeword: Bytes::from_static(b"short"),
        };
        assert_eq!(
            encode_record(&record),
            Err(QdpiError::InvalidCodewordLength {
                expected: CODEWORD_LEN,
                actual: 5
            })
        );
    }
}
