//! # QDPI Core
//!
//! QDPI-256 symbolic codec: 256 rotatable glyphs carrying one byte each,
//! protected by two error-correction tiers.
//!
//! ## Modules
//!
//! - `constants`: Block geometry, field parameters and record layout
//! - `types`: Core types (Symbol, Rotation, Block, ProtectedSequence)
//! - `gf256`: GF(2^8) arithmetic
//! - `codex`: The 256-glyph catalog and byte <-> glyph conversion
//! - `outer`: Reed-Solomon RS(255, 223) outer code
//! - `inner`: Orientation-syndrome inner code
//! - `orchestrator`: Combined encode/decode with lifecycle and statistics
//! - `stats`: Performance accumulator
//! - `manifest`: Glyph manifest validation
//! - `container`: Fixed-size block records
//! - `scanner`: Record recovery from damaged streams
//! - `interleave`: Depth-D codeword interleaving against bursts
//! - `batch`: Multi-block encode/decode pipeline
//! - `simulate`: Transmission error simulator (feature `simulator`)

#![warn(missing_docs)]

pub mod batch;
pub mod codex;
pub mod constants;
pub mod container;
pub mod error;
pub mod gf256;
pub mod inner;
pub mod interleave;
pub mod manifest;
pub mod orchestrator;
pub mod outer;
pub mod scanner;
#[cfg(feature = "simulator")]
pub mod simulate;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use codex::Codex;
pub use error::QdpiError;
pub use inner::{InnerCode, InnerConfig};
pub use manifest::GlyphManifest;
pub use orchestrator::{BlockState, CombinedStats, EccCodec, EccConfig, InnerMode};
pub use outer::{OuterCode, OuterStats};
pub use types::{
    Block, Orientation, OrientationError, ProtectedSequence, QdpiSerializable, Rotation, Symbol,
};

/// Result type alias for QDPI operations
pub type Result<T> = core::result::Result<T, QdpiError>;
