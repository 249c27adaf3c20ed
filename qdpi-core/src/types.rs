//! Core data model: rotations, symbols, blocks and protection results

use crate::constants::{BASE_SYMBOL_COUNT, PARITY_MARK_COUNT};
use crate::error::QdpiError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Rotation of a glyph, stored in the low two bits of its id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rotation {
    /// 0 degrees (syndrome 00)
    R0,
    /// 90 degrees (syndrome 01)
    R90,
    /// 180 degrees (syndrome 10)
    R180,
    /// 270 degrees (syndrome 11)
    R270,
}

impl Rotation {
    /// All rotations in index order
    pub const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270];

    /// Rotation index 0..=3
    pub const fn index(self) -> u8 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 1,
            Rotation::R180 => 2,
            Rotation::R270 => 3,
        }
    }

    /// Rotation in degrees
    pub const fn degrees(self) -> u16 {
        self.index() as u16 * 90
    }

    /// Parse a rotation index
    pub fn from_index(index: u8) -> Result<Self, QdpiError> {
        Rotation::ALL
            .get(index as usize)
            .copied()
            .ok_or(QdpiError::InvalidRotation(index as u16))
    }

    /// Parse a rotation given in degrees
    pub fn from_degrees(degrees: u16) -> Result<Self, QdpiError> {
        match degrees {
            0 => Ok(Rotation::R0),
            90 => Ok(Rotation::R90),
            180 => Ok(Rotation::R180),
            270 => Ok(Rotation::R270),
            other => Err(QdpiError::InvalidRotation(other)),
        }
    }

    /// The 2-bit orientation syndrome as `(bit1, bit0)`
    pub const fn syndrome(self) -> (u8, u8) {
        let i = self.index();
        ((i >> 1) & 1, i & 1)
    }

    /// Rotation reached by flipping one syndrome bit (0 = low bit, 1 = high bit)
    pub const fn flip_bit(self, bit: u8) -> Rotation {
        Rotation::ALL[((self.index() ^ (1 << (bit & 1))) & 0b11) as usize]
    }

    /// Number of syndrome bits that differ between two rotations
    pub const fn distance(self, other: Rotation) -> u32 {
        (self.index() ^ other.index()).count_ones()
    }

    /// Orientation class of this rotation
    pub const fn orientation(self) -> Orientation {
        match self {
            Rotation::R0 | Rotation::R90 => Orientation::Normal,
            Rotation::R180 | Rotation::R270 => Orientation::Inverted,
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Whether a glyph is drawn upright or upside down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    /// 0° and 90°
    Normal,
    /// 180° and 270°
    Inverted,
}

/// Cells of the 4x4 grid driven by the six bits of a base shape index.
/// Cell (0, 0) is always lit and marks the glyph's "top-left" for rotation.
const SHAPE_CELLS: [(usize, usize); 6] = [(0, 1), (0, 2), (1, 1), (1, 2), (2, 0), (2, 3)];

/// 4x4 bitmap describing how a glyph is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlyphPattern([[bool; 4]; 4]);

impl GlyphPattern {
    /// Build the pattern for a base shape (1..=64) in a rotation
    pub fn new(base_id: u8, rotation: Rotation) -> Self {
        let bits = base_id.wrapping_sub(1);
        let mut grid = [[false; 4]; 4];
        grid[0][0] = true;
        for (bit, &(r, c)) in SHAPE_CELLS.iter().enumerate() {
            grid[r][c] = (bits >> bit) & 1 == 1;
        }
        for _ in 0..rotation.index() {
            let mut turned = [[false; 4]; 4];
            for (r, row) in turned.iter_mut().enumerate() {
                for (c, cell) in row.iter_mut().enumerate() {
                    *cell = grid[3 - c][r];
                }
            }
            grid = turned;
        }
        Self(grid)
    }

    /// Whether a cell is lit
    pub fn cell(&self, row: usize, col: usize) -> bool {
        self.0[row][col]
    }

    /// The four row strings (`#` lit, `.` dark)
    pub fn rows(&self) -> [String; 4] {
        let render = |row: &[bool; 4]| -> String {
            row.iter().map(|&on| if on { '#' } else { '.' }).collect()
        };
        [
            render(&self.0[0]),
            render(&self.0[1]),
            render(&self.0[2]),
            render(&self.0[3]),
        ]
    }
}

impl fmt::Display for GlyphPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            writeln!(f, "{}", row)?;
        }
        Ok(())
    }
}

/// One glyph of the QDPI-256 alphabet
///
/// Fields are public so symbols can be built from external sources; use
/// [`Symbol::validate`] (or the codex) before trusting one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    /// Base shape id, 1..=64
    pub base_id: u8,

    /// Rotation of the base shape
    pub rotation: Rotation,

    /// Upright or inverted, derived from the rotation
    pub orientation: Orientation,

    /// Parity mark 0..=3
    pub parity_mark: u8,
}

impl Symbol {
    /// Create a well-formed symbol
    pub fn new(base_id: u8, rotation: Rotation) -> Result<Self, QdpiError> {
        if base_id == 0 || base_id > BASE_SYMBOL_COUNT {
            return Err(QdpiError::InvalidBaseSymbol(base_id));
        }
        let glyph_id = (base_id - 1) * 4 + rotation.index();
        Ok(Self {
            base_id,
            rotation,
            orientation: rotation.orientation(),
            parity_mark: parity_mark_for(glyph_id),
        })
    }

    /// Check that all fields are in range and agree with each other
    pub fn validate(&self) -> Result<(), QdpiError> {
        if self.base_id == 0 || self.base_id > BASE_SYMBOL_COUNT {
            return Err(QdpiError::InvalidBaseSymbol(self.base_id));
        }
        if self.parity_mark >= PARITY_MARK_COUNT {
            return Err(QdpiError::InconsistentSymbol(format!(
                "parity mark {} out of range",
                self.parity_mark
            )));
        }
        if self.orientation != self.rotation.orientation() {
            return Err(QdpiError::InconsistentSymbol(format!(
                "orientation {:?} does not match rotation {}",
                self.orientation, self.rotation
            )));
        }
        let expected = parity_mark_for(compose(self.base_id, self.rotation));
        if self.parity_mark != expected {
            return Err(QdpiError::InconsistentSymbol(format!(
                "parity mark {} does not match glyph {} (expected {})",
                self.parity_mark,
                self.name(),
                expected
            )));
        }
        Ok(())
    }

    /// Glyph id 0..=255: `(base_id - 1) * 4 + rotation_index`
    pub fn glyph_id(&self) -> Result<u8, QdpiError> {
        self.validate()?;
        Ok((self.base_id - 1) * 4 + self.rotation.index())
    }

    /// Extended glyph id 0..=1023 with the parity mark in the high bits
    pub fn extended_id(&self) -> Result<u16, QdpiError> {
        let id = self.glyph_id()?;
        Ok(((self.parity_mark as u16) << 8) | id as u16)
    }

    /// Canonical name, e.g. `q01.r090`
    pub fn name(&self) -> String {
        format!("q{:02}.r{:03}", self.base_id, self.rotation.degrees())
    }

    /// Visual pattern of this glyph
    pub fn pattern(&self) -> GlyphPattern {
        GlyphPattern::new(self.base_id, self.rotation)
    }
}

/// Parity mark carried by a glyph id
pub(crate) const fn parity_mark_for(glyph_id: u8) -> u8 {
    (glyph_id.count_ones() % PARITY_MARK_COUNT as u32) as u8
}

/// Base symbol id (1..=64) of a glyph id
pub const fn base_of(glyph_id: u8) -> u8 {
    glyph_id / 4 + 1
}

/// Rotation of a glyph id
pub const fn rotation_of(glyph_id: u8) -> Rotation {
    Rotation::ALL[(glyph_id & 0b11) as usize]
}

/// Compose a glyph id from a base symbol id and a rotation
pub const fn compose(base_id: u8, rotation: Rotation) -> u8 {
    (base_id.wrapping_sub(1) & 0x3F) * 4 + rotation.index()
}

/// One Outer-Code block
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Block identifier supplied by the caller
    pub block_id: u64,

    /// Original data (at most 223 bytes)
    pub data: Bytes,

    /// Systematic codeword, always 255 bytes
    pub codeword: Bytes,

    /// Encode time in milliseconds since the Unix epoch
    pub encoded_at_ms: u64,
}

impl Block {
    /// Length of the original data
    pub fn original_len(&self) -> usize {
        self.data.len()
    }
}

/// A rotation the inner code flagged, with its proposed correction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientationError {
    /// Position in the glyph sequence
    pub position: usize,

    /// Base symbol id of the glyph (1..=64)
    pub base_symbol: u8,

    /// Rotation found in the sequence
    pub detected: Rotation,

    /// Rotation after correction (equal to `detected` when left alone)
    pub corrected: Rotation,

    /// Confidence in `corrected`, in [0, 1]
    pub confidence: f64,

    /// No candidate reached the acceptance threshold
    pub ambiguous: bool,
}

impl OrientationError {
    /// Whether the glyph was changed
    pub fn is_correction(&self) -> bool {
        self.detected != self.corrected
    }
}

/// Result of protecting one byte sequence
#[derive(Debug, Clone)]
pub struct ProtectedSequence {
    /// Original data
    pub original: Bytes,

    /// The Outer-Code block
    pub block: Block,

    /// Orientation errors found during the last decode attempt
    pub orientation_errors: Vec<OrientationError>,

    /// Protected size minus original size
    pub overhead_bytes: usize,

    /// Time spent encoding
    pub encode_duration: Duration,

    /// Human-readable description of the protection applied
    pub protection_level: String,

    /// BLAKE3 fingerprint of the original data
    pub fingerprint: [u8; 32],
}

impl ProtectedSequence {
    /// Check decoded bytes against the fingerprint taken at encode time
    pub fn verify(&self, decoded: &[u8]) -> bool {
        blake3::hash(decoded).as_bytes() == &self.fingerprint
    }
}

/// Trait for application values that travel through the codec as bytes
pub trait QdpiSerializable {
    /// Serialize deterministically into bytes
    fn to_payload(&self) -> Result<Bytes, QdpiError>;

    /// Rebuild the value from bytes
    fn from_payload(bytes: &[u8]) -> Result<Self, QdpiError>
    where
        Self: Sized;
}

impl QdpiSerializable for Vec<u8> {
    fn to_payload(&self) -> Result<Bytes, QdpiError> {
        Ok(Bytes::copy_from_slice(self))
    }

    fn from_payload(bytes: &[u8]) -> Result<Self, QdpiError> {
        Ok(bytes.to_vec())
    }
}

impl QdpiSerializable for Bytes {
    fn to_payload(&self) -> Result<Bytes, QdpiError> {
        Ok(self.clone())
    }

    fn from_payload(bytes: &[u8]) -> Result<Self, QdpiError> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}

impl QdpiSerializable for String {
    fn to_payload(&self) -> Result<Bytes, QdpiError> {
        Ok(Bytes::copy_from_slice(self.as_bytes()))
    }

    fn from_payload(bytes: &[u8]) -> Result<Self, QdpiError> {
        String::from_utf8(bytes.to_vec()).map_err(|e| QdpiError::Serialization(e.to_string()))
    }
}

impl QdpiSerializable for Value {
    fn to_payload(&self) -> Result<Bytes, QdpiError> {
        Ok(Bytes::from(serde_json::to_vec(&canonical_json(self))?))
    }

    fn from_payload(bytes: &[u8]) -> Result<Self, QdpiError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Rebuild a JSON value with every object's keys in sorted order
pub fn canonical_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for key in keys {
                out.insert(key.clone(), canonical_json(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_json).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rotation_syndromes() {
        assert_eq!(Rotation::R0.syndrome(), (0, 0));
        assert_eq!(Rotation::R90.syndrome(), (0, 1));
        assert_eq!(Rotation::R180.syndrome(), (1, 0));
        assert_eq!(Rotation::R270.syndrome(), (1, 1));
    }

    #[test]
    fn rotation_parsing() {
        assert_eq!(Rotation::from_degrees(270).unwrap(), Rotation::R270);
        assert_eq!(Rotation::from_degrees(45), Err(QdpiError::InvalidRotation(45)));
        assert!(Rotation::from_index(4).is_err());
    }

    #[test]
    fn flip_bit_reaches_neighbours() {
        assert_eq!(Rotation::R90.flip_bit(0), Rotation::R0);
        assert_eq!(Rotation::R90.flip_bit(1), Rotation::R270);
        assert_eq!(Rotation::R270.distance(Rotation::R0), 2);
    }

    #[test]
    fn symbol_ids() {
        let s = Symbol::new(64, Rotation::R270).unwrap();
        assert_eq!(s.glyph_id().unwrap(), 255);
        assert_eq!(s.orientation, Orientation::Inverted);
        assert_eq!(s.name(), "q64.r270");
        assert_eq!(s.extended_id().unwrap(), ((8 % 4) << 8) | 255);
        assert!(Symbol::new(0, Rotation::R0).is_err());
        assert!(Symbol::new(65, Rotation::R0).is_err());
    }

    #[test]
    fn malformed_symbol_rejected() {
        let mut s = Symbol::new(3, Rotation::R0).unwrap();
        s.orientation = Orientation::Inverted;
        assert!(matches!(s.glyph_id(), Err(QdpiError::InconsistentSymbol(_))));

        let mut s = Symbol::new(3, Rotation::R0).unwrap();
        s.base_id = 99;
        assert_eq!(s.glyph_id(), Err(QdpiError::InvalidBaseSymbol(99)));
    }

    #[test]
    fn wrong_parity_mark_rejected() {
        let mut s = Symbol::new(4, Rotation::R90).unwrap();
        s.parity_mark = (s.parity_mark + 1) % 4;
        assert!(matches!(s.validate(), Err(QdpiError::InconsistentSymbol(_))));
        assert!(s.extended_id().is_err());

        let codex = crate::codex::Codex::new();
        assert!(codex.decode(&[s]).is_err());
    }

    #[test]
    fn glyph_id_helpers() {
        assert_eq!(base_of(0), 1);
        assert_eq!(base_of(255), 64);
        assert_eq!(rotation_of(6), Rotation::R180);
        assert_eq!(compose(2, Rotation::R180), 6);
    }

    #[test]
    fn pattern_rotates_anchor() {
        let upright = GlyphPattern::new(1, Rotation::R0);
        assert!(upright.cell(0, 0));
        let quarter = GlyphPattern::new(1, Rotation::R90);
        assert!(quarter.cell(0, 3));
        assert!(!quarter.cell(0, 0));
        let half = GlyphPattern::new(1, Rotation::R180);
        assert!(half.cell(3, 3));
        assert_eq!(upright.rows()[0], "#...");
    }

    #[test]
    fn canonical_json_sorts_keys() {
        let v = json!({"b": 1, "a": {"d": 2, "c": 3}});
        let bytes = v.to_payload().unwrap();
        assert_eq!(&bytes[..], br#"{"a":{"c":3,"d":2},"b":1}"#);
        assert_eq!(Value::from_payload(&bytes).unwrap(), v);
    }

    #[test]
    fn string_payload_rejects_bad_utf8() {
        assert!(String::from_payload(&[0xFF, 0xFE]).is_err());
    }
}
