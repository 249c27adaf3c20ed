//! Error types for QDPI operations

/// Errors that can occur while encoding, protecting or decoding QDPI data
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum QdpiError {
    /// Base symbol id outside 1..=64
    #[error("Invalid base symbol id: {0} (expected 1..=64)")]
    InvalidBaseSymbol(u8),

    /// Rotation that is not one of 0/90/180/270 degrees (or index 0..=3)
    #[error("Invalid rotation: {0}")]
    InvalidRotation(u16),

    /// Glyph id outside the 256-entry table
    #[error("Glyph id {0} out of range (table size 256)")]
    GlyphOutOfRange(usize),

    /// Symbol fields disagree with each other
    #[error("Inconsistent symbol: {0}")]
    InconsistentSymbol(String),

    /// Data does not fit into a single block
    #[error("Data length {len} exceeds block capacity {max}")]
    DataTooLong {
        /// Supplied length.
        len: usize,
        /// Block capacity.
        max: usize,
    },

    /// Codeword is not exactly 255 bytes
    #[error("Invalid codeword length: expected {expected} bytes, got {actual}")]
    InvalidCodewordLength {
        /// Required codeword length.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// Requested original length larger than a block holds
    #[error("Invalid original length {0} (maximum 223)")]
    InvalidOriginalLength(usize),

    /// Two sequences that must be compared position by position differ in length
    #[error("Length mismatch: {left} vs {right}")]
    LengthMismatch {
        /// Length of the first sequence.
        left: usize,
        /// Length of the second sequence.
        right: usize,
    },

    /// Outer code could not correct the block; returned bytes must not be trusted
    #[error("Block {block_id:?} uncorrectable: {errors_detected} errors detected, bound is {bound}")]
    UncorrectableBlock {
        /// Block identifier, when known.
        block_id: Option<u64>,
        /// Errors the decoder located before giving up.
        errors_detected: usize,
        /// Guaranteed correction bound.
        bound: usize,
    },

    /// Consecutive block ids would run past `u64::MAX`
    #[error("Block ids starting at {start_id} cannot number {blocks} blocks")]
    BlockIdOverflow {
        /// First block id requested.
        start_id: u64,
        /// Number of blocks to number.
        blocks: usize,
    },

    /// A block stream is missing blocks inside it or at either end
    #[error("Incomplete stream: {missing_blocks} blocks missing inside, head missing: {missing_head}, tail missing: {missing_tail}")]
    IncompleteStream {
        /// Blocks absent between the lowest and highest id seen.
        missing_blocks: u64,
        /// The lowest id seen is not flagged as the first block.
        missing_head: bool,
        /// The highest id seen is not flagged as the last block.
        missing_tail: bool,
    },

    /// Glyph manifest failed validation
    #[error("Manifest invalid: missing ids {missing:?}, duplicate ids {duplicates:?}, {} other problems", .problems.len())]
    Manifest {
        /// Ids (0..=255) with no entry.
        missing: Vec<u8>,
        /// Ids appearing more than once.
        duplicates: Vec<u8>,
        /// Other per-entry problems.
        problems: Vec<String>,
    },

    /// Invalid block record marker
    #[error("Invalid record marker: expected QDPI, got {0:?}")]
    BadMarker([u8; 4]),

    /// Unsupported container version
    #[error("Unsupported container version: {0}")]
    UnsupportedVersion(u8),

    /// Incomplete record - not enough data
    #[error("Incomplete record: expected {expected} bytes, got {actual}")]
    IncompleteRecord {
        /// The number of bytes expected.
        expected: usize,
        /// The number of bytes actually found.
        actual: usize,
    },

    /// Record header checksum mismatch
    #[error("Checksum mismatch: expected {expected:x}, got {actual:x}")]
    ChecksumMismatch {
        /// The expected checksum.
        expected: u32,
        /// The actual checksum calculated.
        actual: u32,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error during read/write
    #[error("IO error: {0}")]
    Io(String),
}

impl QdpiError {
    /// Whether this error describes a malformed symbol, glyph or block shape.
    ///
    /// Structural errors are fatal to the single unit being processed only.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            QdpiError::InvalidBaseSymbol(_)
                | QdpiError::InvalidRotation(_)
                | QdpiError::GlyphOutOfRange(_)
                | QdpiError::InconsistentSymbol(_)
                | QdpiError::DataTooLong { .. }
                | QdpiError::InvalidCodewordLength { .. }
                | QdpiError::InvalidOriginalLength(_)
                | QdpiError::LengthMismatch { .. }
        )
    }
}

impl From<std::io::Error> for QdpiError {
    fn from(err: std::io::Error) -> Self {
        QdpiError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for QdpiError {
    fn from(err: serde_json::Error) -> Self {
        QdpiError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_classification() {
        assert!(QdpiError::InvalidRotation(45).is_structural());
        assert!(QdpiError::GlyphOutOfRange(300).is_structural());
        assert!(!QdpiError::UncorrectableBlock {
            block_id: Some(1),
            errors_detected: 17,
            bound: 16
        }
        .is_structural());
        assert!(!QdpiError::Io("x".into()).is_structural());
    }

    #[test]
    fn manifest_error_names_missing_ids() {
        let err = QdpiError::Manifest {
            missing: vec![7, 200],
            duplicates: vec![],
            problems: vec![],
        };
        let msg = err.to_string();
        assert!(msg.contains("[7, 200]"));
    }
}
