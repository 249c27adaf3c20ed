//! Constants and limits for the QDPI-256 block format

/// Number of glyphs in the codex
pub const GLYPH_COUNT: usize = 256;

/// Number of base shapes (each appears in four rotations)
pub const BASE_SYMBOL_COUNT: u8 = 64;

/// Number of rotations per base shape
pub const ROTATION_COUNT: u8 = 4;

/// Number of parity marks a glyph can carry
pub const PARITY_MARK_COUNT: u8 = 4;

/// Size of the extended glyph id space (glyph id with parity mark folded in)
pub const EXTENDED_GLYPH_COUNT: usize = GLYPH_COUNT * PARITY_MARK_COUNT as usize;

/// Reed-Solomon codeword length (n)
pub const CODEWORD_LEN: usize = 255;

/// Reed-Solomon data length (k)
pub const DATA_LEN: usize = 223;

/// Parity bytes appended to each block (n - k)
pub const PARITY_LEN: usize = CODEWORD_LEN - DATA_LEN;

/// Maximum number of byte errors the outer code corrects per block
pub const MAX_CORRECTABLE: usize = PARITY_LEN / 2;

/// Primitive polynomial for GF(256): x^8 + x^4 + x^3 + x^2 + 1
pub const PRIMITIVE_POLY: u16 = 0x11D;

/// Exponent of the first consecutive root of the generator polynomial
pub const FIRST_CONSECUTIVE_ROOT: usize = 0;

/// Combined outer + inner decode latency target per block, in milliseconds
pub const LATENCY_TARGET_MS: f64 = 4.0;

/// Default number of timing samples retained by the performance accumulator
pub const DEFAULT_HISTORY_LEN: usize = 1000;

/// Block record marker - 4 bytes for synchronization
pub const RECORD_MARKER: &[u8; 4] = b"QDPI";

/// Current container version
pub const CONTAINER_VERSION: u8 = 1;

/// Size of CRC32C checksum in bytes
pub const CRC32C_SIZE: usize = 4;

/// Record header size:
/// 4 (marker) + 1 (version) + 8 (block_id) + 1 (original_len) + 1 (flags) = 15 bytes
pub const RECORD_HEADER_SIZE: usize = 15;

/// Total size of one persisted block record
pub const RECORD_SIZE: usize = RECORD_HEADER_SIZE + CODEWORD_LEN + CRC32C_SIZE;

/// Flags stored in each block record (single byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordFlags(u8);

impl RecordFlags {
    /// No flags set
    pub const NONE: u8 = 0b0000_0000;

    /// First block of a stream
    pub const IS_FIRST: u8 = 0b0000_0001;

    /// Last block of a stream
    pub const IS_LAST: u8 = 0b0000_0010;

    /// Original data is canonical JSON rather than raw bytes
    pub const IS_JSON: u8 = 0b0000_0100;

    /// Create new flags from raw byte
    pub const fn new(flags: u8) -> Self {
        Self(flags)
    }

    /// Get raw flags byte
    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    /// Check if this is the first block
    pub const fn is_first(&self) -> bool {
        (self.0 & Self::IS_FIRST) != 0
    }

    /// Check if this is the last block
    pub const fn is_last(&self) -> bool {
        (self.0 & Self::IS_LAST) != 0
    }

    /// Check if the payload is canonical JSON
    pub const fn is_json(&self) -> bool {
        (self.0 & Self::IS_JSON) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_geometry() {
        assert_eq!(PARITY_LEN, 32);
        assert_eq!(MAX_CORRECTABLE, 16);
        assert_eq!(RECORD_SIZE, 274);
        assert_eq!(EXTENDED_GLYPH_COUNT, 1024);
    }

    #[test]
    fn record_flags() {
        let flags = RecordFlags::new(RecordFlags::IS_FIRST | RecordFlags::IS_JSON);
        assert!(flags.is_first());
        assert!(!flags.is_last());
        assert!(flags.is_json());
        assert_eq!(RecordFlags::default().as_u8(), RecordFlags::NONE);
    }
}
