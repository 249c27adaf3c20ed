//! ECC orchestrator: one encode/decode entry point over codex, outer and inner code
//!
//! Each block moves through a small lifecycle:
//!
//! ```text
//! Unprotected -> OuterEncoded -> [transport] -> OuterDecodeAttempted
//!     -> OuterFailed -> Unrecoverable
//!     -> OuterRecovered -> InnerCorrectionAttempted -> FullyRecovered | PartiallyRecovered
//! ```
//!
//! The codec is an ordinary value. Build one with [`EccCodec::new`] and pass
//! it to whoever needs it; it holds read-only tables plus a lock-guarded
//! statistics accumulator and can be shared across threads.

use crate::codex::Codex;
use crate::constants::{CODEWORD_LEN, DATA_LEN, DEFAULT_HISTORY_LEN, MAX_CORRECTABLE};
use crate::error::QdpiError;
use crate::inner::{InnerCode, InnerConfig};
use crate::outer::{OuterCode, OuterStats};
use crate::stats::{PerfStats, PerfSummary, SharedPerfStats};
use crate::types::{OrientationError, ProtectedSequence, QdpiSerializable, Symbol};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[cfg(feature = "logging")]
use tracing::{debug, trace, warn};

/// What the decoder does with the inner code's heuristic proposals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InnerMode {
    /// Report flagged rotations; keep the bytes the outer code verified
    #[default]
    ReportOnly,
    /// Write accepted heuristic corrections into the output
    Apply,
}

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EccConfig {
    /// Handling of heuristic orientation corrections
    pub inner_mode: InnerMode,

    /// Combined decode latency target per block
    pub latency_target: Duration,

    /// Timing samples kept by the statistics accumulator
    pub history_len: usize,

    /// Inner-code tuning
    pub inner: InnerConfig,
}

impl Default for EccConfig {
    fn default() -> Self {
        Self {
            inner_mode: InnerMode::default(),
            latency_target: Duration::from_millis(4),
            history_len: DEFAULT_HISTORY_LEN,
            inner: InnerConfig::default(),
        }
    }
}

impl EccConfig {
    /// Set the inner-code mode
    pub fn inner_mode(mut self, mode: InnerMode) -> Self {
        self.inner_mode = mode;
        self
    }

    /// Set the latency target
    pub fn latency_target(mut self, target: Duration) -> Self {
        self.latency_target = target;
        self
    }

    /// Set the statistics history length
    pub fn history_len(mut self, len: usize) -> Self {
        self.history_len = len;
        self
    }

    /// Set the inner-code acceptance threshold
    pub fn acceptance_threshold(mut self, threshold: f64) -> Self {
        self.inner.acceptance_threshold = threshold;
        self
    }
}

/// Lifecycle state of one processed block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockState {
    /// Raw data, not yet encoded
    Unprotected,
    /// Codeword produced
    OuterEncoded,
    /// Outer decode running
    OuterDecodeAttempted,
    /// Outer code reached a valid codeword
    OuterRecovered,
    /// Outer code gave up
    OuterFailed,
    /// Inner code running over the recovered glyphs
    InnerCorrectionAttempted,
    /// Byte-exact recovery
    FullyRecovered,
    /// Best-effort recovery with unresolved orientation errors
    PartiallyRecovered,
    /// Block lost
    Unrecoverable,
}

impl BlockState {
    /// Whether `next` may follow this state
    pub fn can_transition_to(self, next: BlockState) -> bool {
        use BlockState::*;
        matches!(
            (self, next),
            (Unprotected, OuterEncoded)
                | (OuterEncoded, OuterDecodeAttempted)
                | (OuterDecodeAttempted, OuterRecovered)
                | (OuterDecodeAttempted, OuterFailed)
                | (OuterFailed, Unrecoverable)
                | (OuterRecovered, InnerCorrectionAttempted)
                | (InnerCorrectionAttempted, FullyRecovered)
                | (InnerCorrectionAttempted, PartiallyRecovered)
        )
    }

    /// Whether the lifecycle ends here
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BlockState::FullyRecovered | BlockState::PartiallyRecovered | BlockState::Unrecoverable
        )
    }
}

/// Path a block took through the lifecycle
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Lifecycle {
    states: Vec<BlockState>,
}

impl Lifecycle {
    fn starting_at(state: BlockState) -> Self {
        Self {
            states: vec![state],
        }
    }

    fn advance(&mut self, next: BlockState) {
        debug_assert!(
            self.current().map_or(true, |s| s.can_transition_to(next)),
            "illegal block transition {:?} -> {:?}",
            self.current(),
            next
        );
        #[cfg(feature = "logging")]
        trace!("block state {:?} -> {:?}", self.current(), next);
        self.states.push(next);
    }

    /// Latest state
    pub fn current(&self) -> Option<BlockState> {
        self.states.last().copied()
    }

    /// All states visited, in order
    pub fn states(&self) -> &[BlockState] {
        &self.states
    }
}

/// Combined outer + inner statistics for one decode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedStats {
    /// Outer-code record
    pub outer: OuterStats,

    /// Orientation errors reported by the inner code
    pub orientation_errors: Vec<OrientationError>,

    /// Rotations actually changed in the output
    pub orientation_applied: usize,

    /// Flagged rotations with no acceptable correction
    pub orientation_ambiguous: usize,

    /// Total decode time
    pub total_time_ms: f64,

    /// Whether `total_time_ms` stayed under the latency target
    pub meets_latency_target: bool,

    /// Terminal state reached
    pub state: BlockState,

    /// States visited
    pub lifecycle: Lifecycle,
}

/// Outcome of [`EccCodec::test_complete_protection`]
#[derive(Debug, Clone)]
pub struct ProtectionTest {
    /// Decoded bytes equal the original sequence
    pub recovered: bool,

    /// Codeword bytes changed by the corruption function
    pub bytes_corrupted: usize,

    /// Decoded bytes, when the outer code succeeded
    pub decoded: Option<Vec<u8>>,

    /// Statistics, when the outer code succeeded
    pub stats: Option<CombinedStats>,

    /// Error reported when the block could not be recovered
    pub failure: Option<QdpiError>,
}

/// QDPI-256 error-correction codec
#[derive(Debug)]
pub struct EccCodec {
    config: EccConfig,
    codex: Codex,
    outer: OuterCode,
    inner: InnerCode,
    stats: SharedPerfStats,
}

impl Default for EccCodec {
    fn default() -> Self {
        Self::new(EccConfig::default())
    }
}

impl EccCodec {
    /// Build a codec from a configuration
    pub fn new(config: EccConfig) -> Self {
        Self {
            codex: Codex::new(),
            outer: OuterCode::new(),
            inner: InnerCode::new(config.inner.clone()),
            stats: SharedPerfStats::new(config.history_len),
            config,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &EccConfig {
        &self.config
    }

    /// The glyph catalog
    pub fn codex(&self) -> &Codex {
        &self.codex
    }

    /// The outer code
    pub fn outer(&self) -> &OuterCode {
        &self.outer
    }

    /// The inner code
    pub fn inner(&self) -> &InnerCode {
        &self.inner
    }

    /// The statistics accumulator
    pub fn perf(&self) -> &SharedPerfStats {
        &self.stats
    }

    /// Snapshot of the statistics accumulator
    pub fn performance(&self) -> PerfSummary {
        self.stats.summary()
    }

    /// Human-readable description of the protection applied to each block
    pub fn protection_level(&self) -> String {
        let mode = match self.config.inner_mode {
            InnerMode::ReportOnly => "report-only",
            InnerMode::Apply => "applied",
        };
        format!(
            "RS({},{}) outer code correcting up to {} byte errors per block; orientation inner code ({})",
            CODEWORD_LEN, DATA_LEN, MAX_CORRECTABLE, mode
        )
    }

    /// Protect a byte sequence of at most 223 bytes
    pub fn encode_with_protection(
        &self,
        data: &[u8],
        block_id: u64,
    ) -> Result<ProtectedSequence, QdpiError> {
        let started = Instant::now();
        let mut lifecycle = Lifecycle::starting_at(BlockState::Unprotected);
        let block = self.outer.encode(data, block_id)?;
        lifecycle.advance(BlockState::OuterEncoded);
        let encode_duration = started.elapsed();
        self.stats
            .record_encode(encode_duration.as_secs_f64() * 1000.0);

        #[cfg(feature = "logging")]
        debug!(
            "block {} encoded: {} data bytes -> {} byte codeword",
            block_id,
            data.len(),
            block.codeword.len()
        );

        Ok(ProtectedSequence {
            original: Bytes::copy_from_slice(data),
            overhead_bytes: block.codeword.len() - data.len(),
            block,
            orientation_errors: Vec::new(),
            encode_duration,
            protection_level: self.protection_level(),
            fingerprint: *blake3::hash(data).as_bytes(),
        })
    }

    /// Serialize an application value through the codex and protect it
    pub fn encode_value<P: QdpiSerializable + ?Sized>(
        &self,
        value: &P,
        block_id: u64,
    ) -> Result<ProtectedSequence, QdpiError> {
        let symbols = self.codex.encode(value)?;
        let bytes = self.codex.decode(&symbols)?;
        self.encode_with_protection(&bytes, block_id)
    }

    /// Decode a received codeword: outer correction, then the inner code
    ///
    /// Returns [`QdpiError::UncorrectableBlock`] when the outer code gives up;
    /// the block must then be treated as lost.
    pub fn decode_with_correction(
        &self,
        codeword: &[u8],
        original_length: usize,
    ) -> Result<(Vec<u8>, CombinedStats), QdpiError> {
        self.decode_inner(None, codeword, original_length, None, |ms, outer, applied, met| {
            self.stats.record_decode(ms, outer, applied, met)
        })
    }

    /// Decode a received codeword for a known block id
    pub fn decode_block(
        &self,
        block_id: u64,
        codeword: &[u8],
        original_length: usize,
    ) -> Result<(Vec<u8>, CombinedStats), QdpiError> {
        self.decode_inner(Some(block_id), codeword, original_length, None, |ms, outer, applied, met| {
            self.stats.record_decode(ms, outer, applied, met)
        })
    }

    /// Decode a block, recording timing into a worker's shard instead of the
    /// shared accumulator
    pub fn decode_block_into(
        &self,
        shard: &mut PerfStats,
        block_id: u64,
        codeword: &[u8],
        original_length: usize,
    ) -> Result<(Vec<u8>, CombinedStats), QdpiError> {
        self.decode_inner(Some(block_id), codeword, original_length, None, |ms, outer, applied, met| {
            shard.record_decode(ms, outer, applied, met)
        })
    }

    /// Decode using known-good data for exact orientation correction
    pub fn decode_with_reference(
        &self,
        codeword: &[u8],
        reference: &[u8],
    ) -> Result<(Vec<u8>, CombinedStats), QdpiError> {
        self.decode_inner(None, codeword, reference.len(), Some(reference), |ms, outer, applied, met| {
            self.stats.record_decode(ms, outer, applied, met)
        })
    }

    /// Decode the received form of a protected sequence and record the
    /// orientation errors found on it
    pub fn decode_protected(
        &self,
        protected: &mut ProtectedSequence,
        received: &[u8],
    ) -> Result<(Vec<u8>, CombinedStats), QdpiError> {
        let (bytes, stats) = self.decode_block(
            protected.block.block_id,
            received,
            protected.original.len(),
        )?;
        protected.orientation_errors = stats.orientation_errors.clone();
        Ok((bytes, stats))
    }

    /// Decode straight to glyphs
    pub fn decode_symbols(
        &self,
        codeword: &[u8],
        original_length: usize,
    ) -> Result<(Vec<Symbol>, CombinedStats), QdpiError> {
        let (bytes, stats) = self.decode_with_correction(codeword, original_length)?;
        Ok((self.codex.encode_bytes(&bytes), stats))
    }

    /// Encode, corrupt with `error_fn`, decode, and compare with the input
    pub fn test_complete_protection<F>(
        &self,
        sequence: &[u8],
        error_fn: F,
    ) -> Result<ProtectionTest, QdpiError>
    where
        F: FnOnce(&mut [u8]),
    {
        let protected = self.encode_with_protection(sequence, 0)?;
        let mut received = protected.block.codeword.to_vec();
        error_fn(&mut received);
        let bytes_corrupted = received
            .iter()
            .zip(protected.block.codeword.iter())
            .filter(|(a, b)| a != b)
            .count();

        match self.decode_with_correction(&received, sequence.len()) {
            Ok((decoded, stats)) => Ok(ProtectionTest {
                recovered: decoded == sequence,
                bytes_corrupted,
                decoded: Some(decoded),
                stats: Some(stats),
                failure: None,
            }),
            Err(err @ QdpiError::UncorrectableBlock { .. }) => Ok(ProtectionTest {
                recovered: false,
                bytes_corrupted,
                decoded: None,
                stats: None,
                failure: Some(err),
            }),
            Err(err) => Err(err),
        }
    }

    fn decode_inner<R>(
        &self,
        block_id: Option<u64>,
        codeword: &[u8],
        original_length: usize,
        reference: Option<&[u8]>,
        record: R,
    ) -> Result<(Vec<u8>, CombinedStats), QdpiError>
    where
        R: FnOnce(f64, &OuterStats, usize, bool),
    {
        let started = Instant::now();
        let mut lifecycle = Lifecycle::starting_at(BlockState::OuterEncoded);
        lifecycle.advance(BlockState::OuterDecodeAttempted);

        let (recovered, outer) = self.outer.decode(codeword, original_length)?;

        if !outer.success {
            lifecycle.advance(BlockState::OuterFailed);
            lifecycle.advance(BlockState::Unrecoverable);
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            record(elapsed_ms, &outer, 0, elapsed_ms < self.latency_target_ms());
            #[cfg(feature = "logging")]
            warn!(
                "block {:?} unrecoverable: {} errors located, bound {}",
                block_id, outer.errors_detected, MAX_CORRECTABLE
            );
            return Err(QdpiError::UncorrectableBlock {
                block_id,
                errors_detected: outer.errors_detected,
                bound: MAX_CORRECTABLE,
            });
        }

        lifecycle.advance(BlockState::OuterRecovered);
        lifecycle.advance(BlockState::InnerCorrectionAttempted);

        let (bytes, orientation_errors, applied) = match reference {
            Some(reference) => {
                let (bytes, errors) = self.inner.correct_with_reference(&recovered, reference)?;
                let applied = errors.len();
                (bytes, errors, applied)
            }
            None => match self.config.inner_mode {
                InnerMode::Apply => {
                    let (bytes, errors) = self.inner.correct(&recovered);
                    let applied = errors.iter().filter(|e| e.is_correction()).count();
                    (bytes, errors, applied)
                }
                InnerMode::ReportOnly => {
                    let errors = self.inner.detect(&recovered);
                    (recovered, errors, 0)
                }
            },
        };

        let ambiguous = orientation_errors.iter().filter(|e| e.ambiguous).count();
        // Flags left in the output: all of them in report-only mode, the
        // ambiguous ones when corrections are applied
        let unresolved = match (reference, self.config.inner_mode) {
            (Some(_), _) => 0,
            (None, InnerMode::ReportOnly) => orientation_errors.len(),
            (None, InnerMode::Apply) => ambiguous,
        };
        let state = if unresolved > 0 {
            BlockState::PartiallyRecovered
        } else {
            BlockState::FullyRecovered
        };
        lifecycle.advance(state);

        let total_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        let meets_latency_target = total_time_ms < self.latency_target_ms();
        record(total_time_ms, &outer, applied, meets_latency_target);

        #[cfg(feature = "logging")]
        debug!(
            "block {:?} decoded: {} byte errors corrected, {} rotations flagged, {} applied, {:.3} ms, {:?}",
            block_id,
            outer.errors_corrected,
            orientation_errors.len(),
            applied,
            total_time_ms,
            state
        );

        Ok((
            bytes,
            CombinedStats {
                outer,
                orientation_errors,
                orientation_applied: applied,
                orientation_ambiguous: ambiguous,
                total_time_ms,
                meets_latency_target,
                state,
                lifecycle,
            },
        ))
    }

    fn latency_target_ms(&self) -> f64 {
        self.config.latency_target.as_secs_f64() * 1000.0
    }
}
