//! Symbol codex: the 256-glyph catalog and byte <-> glyph conversion
//!
//! The table is built once per [`Codex`] and is read-only afterwards, so one
//! codex can be shared across worker threads. Glyph id `i` is the symbol with
//! base shape `i / 4 + 1` in rotation `i % 4`, which makes byte -> glyph an
//! identity mapping.

use crate::constants::GLYPH_COUNT;
use crate::error::QdpiError;
use crate::types::{base_of, rotation_of, QdpiSerializable, Symbol};
use hashbrown::HashMap;

#[cfg(feature = "logging")]
use tracing::trace;

/// Catalog of all 256 glyphs
#[derive(Debug, Clone)]
pub struct Codex {
    symbols: Vec<Symbol>,
    by_name: HashMap<String, u8>,
}

impl Default for Codex {
    fn default() -> Self {
        Self::new()
    }
}

impl Codex {
    /// Build the canonical table
    pub fn new() -> Self {
        let mut symbols = Vec::with_capacity(GLYPH_COUNT);
        let mut by_name = HashMap::with_capacity(GLYPH_COUNT);
        for id in 0..GLYPH_COUNT {
            let id = id as u8;
            let symbol = Symbol {
                base_id: base_of(id),
                rotation: rotation_of(id),
                orientation: rotation_of(id).orientation(),
                parity_mark: crate::types::parity_mark_for(id),
            };
            by_name.insert(symbol.name(), id);
            symbols.push(symbol);
        }
        Self { symbols, by_name }
    }

    /// Number of glyphs in the table
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the table is empty (never true for a built codex)
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// All symbols in glyph-id order
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Look up a glyph by id
    pub fn lookup_by_id(&self, id: usize) -> Result<&Symbol, QdpiError> {
        self.symbols.get(id).ok_or(QdpiError::GlyphOutOfRange(id))
    }

    /// Look up a glyph by its canonical name (e.g. `q12.r180`)
    pub fn lookup_by_name(&self, name: &str) -> Option<&Symbol> {
        self.by_name.get(name).map(|&id| &self.symbols[id as usize])
    }

    /// Map one byte to its glyph
    pub fn symbol_for_byte(&self, byte: u8) -> Symbol {
        match self.symbols.get(byte as usize) {
            Some(symbol) => *symbol,
            None => self.symbols[byte as usize % self.symbols.len()],
        }
    }

    /// Map raw bytes to glyphs, one per byte, order preserving
    pub fn encode_bytes(&self, bytes: &[u8]) -> Vec<Symbol> {
        bytes.iter().map(|&b| self.symbol_for_byte(b)).collect()
    }

    /// Serialize a value deterministically and map it to glyphs
    pub fn encode<P: QdpiSerializable + ?Sized>(&self, data: &P) -> Result<Vec<Symbol>, QdpiError> {
        let payload = data.to_payload()?;
        #[cfg(feature = "logging")]
        trace!("codex encode: {} bytes", payload.len());
        Ok(self.encode_bytes(&payload))
    }

    /// Turn glyphs back into bytes
    ///
    /// Fails on the first malformed symbol.
    pub fn decode(&self, symbols: &[Symbol]) -> Result<Vec<u8>, QdpiError> {
        symbols.iter().map(|s| s.glyph_id()).collect()
    }

    /// Turn glyphs back into an application value
    pub fn decode_value<P: QdpiSerializable>(&self, symbols: &[Symbol]) -> Result<P, QdpiError> {
        let bytes = self.decode(symbols)?;
        P::from_payload(&bytes)
    }

    /// Verify that the table is a bijection onto 0..=255
    pub fn check_bijection(&self) -> Result<(), QdpiError> {
        if self.symbols.len() != GLYPH_COUNT {
            return Err(QdpiError::InconsistentSymbol(format!(
                "table has {} entries, expected {}",
                self.symbols.len(),
                GLYPH_COUNT
            )));
        }
        let mut seen = [false; GLYPH_COUNT];
        for (index, symbol) in self.symbols.iter().enumerate() {
            let id = symbol.glyph_id()? as usize;
            if id != index || seen[id] {
                return Err(QdpiError::InconsistentSymbol(format!(
                    "entry {} maps to glyph id {}",
                    index, id
                )));
            }
            seen[id] = true;
        }
        Ok(())
    }
}
