//! Inner code: orientation (rotation field) error detection and correction
//!
//! Every glyph id carries its rotation in the low two bits, the orientation
//! syndrome. The inner code targets the narrow error class "base symbol intact,
//! one syndrome bit flipped" and runs after the outer code, on data that is
//! assumed to be mostly clean.
//!
//! Two paths are offered:
//!
//! - A heuristic path ([`InnerCode::detect`], [`InnerCode::correct`]) that
//!   flags positions by three structural checks and proposes a single-bit
//!   correction scored against the neighbouring rotations. It is best-effort
//!   and may both miss errors and flag clean glyphs.
//! - A reference path ([`InnerCode::correct_with_reference`]) that restores
//!   rotations from known-good data with full confidence.
//!
//! A position that none of the three checks flags is never corrected.

use crate::error::QdpiError;
use crate::types::{base_of, compose, parity_mark_for, rotation_of, OrientationError, Rotation};
use serde::{Deserialize, Serialize};

#[cfg(feature = "logging")]
use tracing::debug;

/// Rotation transitions that are considered compatible, indexed `[from][to]`.
///
/// A transition is compatible when the syndromes differ in at most one bit;
/// jumps that flip both bits (0°<->270°, 90°<->180°) are not.
pub const COMPATIBLE_TRANSITIONS: [[bool; 4]; 4] = [
    // to:  0°    90°   180°   270°
    [true, true, true, false],  // from 0°
    [true, true, false, true],  // from 90°
    [true, false, true, true],  // from 180°
    [false, true, true, true],  // from 270°
];

/// Whether `to` may follow `from`
pub const fn is_compatible(from: Rotation, to: Rotation) -> bool {
    COMPATIBLE_TRANSITIONS[from.index() as usize][to.index() as usize]
}

/// Orientation syndrome `(bit1, bit0)` of a glyph id
pub const fn syndrome(glyph_id: u8) -> (u8, u8) {
    rotation_of(glyph_id).syndrome()
}

/// Tuning for the heuristic path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InnerConfig {
    /// Window length for the uniform-run check
    pub window: usize,

    /// Identical rotations within the window that count as a suspicious run
    pub run_limit: usize,

    /// Minimum score a candidate needs to be accepted
    pub acceptance_threshold: f64,

    /// Amount by which a candidate must beat the rotation already present
    pub min_margin: f64,

    /// Weight of neighbour compatibility in the score
    pub compatibility_weight: f64,

    /// Weight of the rotation prior in the score
    pub prior_weight: f64,

    /// Prior probability of each rotation (0°, 90°, 180°, 270°)
    pub priors: [f64; 4],
}

impl Default for InnerConfig {
    fn default() -> Self {
        Self {
            window: 8,
            run_limit: 6,
            acceptance_threshold: 0.5,
            min_margin: 0.05,
            compatibility_weight: 0.8,
            prior_weight: 0.2,
            priors: [0.4, 0.25, 0.2, 0.15],
        }
    }
}

/// Why a position was flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Suspicion {
    /// Rotation disagrees with the glyph's parity mark
    ImpossibleRotation,
    /// Transition from the previous rotation is not in the compatibility table
    IncompatibleTransition,
    /// Too many identical rotations in a short window
    UniformRun,
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    base: u8,
    rotation: Rotation,
    parity: Option<u8>,
}

impl Cell {
    fn from_glyph(id: u8) -> Self {
        Self {
            base: base_of(id),
            rotation: rotation_of(id),
            parity: None,
        }
    }

    fn from_extended(id: u16) -> Result<Self, QdpiError> {
        if id >= 1024 {
            return Err(QdpiError::GlyphOutOfRange(id as usize));
        }
        let glyph = (id & 0xFF) as u8;
        Ok(Self {
            parity: Some((id >> 8) as u8),
            ..Self::from_glyph(glyph)
        })
    }

    fn glyph(&self) -> u8 {
        compose(self.base, self.rotation)
    }

    fn extended(&self) -> u16 {
        ((self.parity.unwrap_or(0) as u16) << 8) | self.glyph() as u16
    }
}

/// Orientation error detector/corrector
#[derive(Debug, Clone, Default)]
pub struct InnerCode {
    config: InnerConfig,
}

impl InnerCode {
    /// Create an inner code with the given tuning
    pub fn new(config: InnerConfig) -> Self {
        Self { config }
    }

    /// Current tuning
    pub fn config(&self) -> &InnerConfig {
        &self.config
    }

    /// Flag suspicious positions and propose corrections without applying them
    pub fn detect(&self, glyphs: &[u8]) -> Vec<OrientationError> {
        let mut cells: Vec<Cell> = glyphs.iter().map(|&g| Cell::from_glyph(g)).collect();
        self.scan(&mut cells, false)
    }

    /// Apply the heuristic corrections that reach the acceptance threshold
    ///
    /// Never fails: ambiguous positions are left as they are and reported
    /// with `ambiguous = true`.
    pub fn correct(&self, glyphs: &[u8]) -> (Vec<u8>, Vec<OrientationError>) {
        let mut cells: Vec<Cell> = glyphs.iter().map(|&g| Cell::from_glyph(g)).collect();
        let errors = self.scan(&mut cells, true);
        (cells.iter().map(Cell::glyph).collect(), errors)
    }

    /// Heuristic detection over extended ids (parity mark in bits 8..10)
    ///
    /// The parity mark makes a rotation structurally impossible when it no
    /// longer matches the glyph id.
    pub fn detect_extended(&self, ids: &[u16]) -> Result<Vec<OrientationError>, QdpiError> {
        let mut cells = ids
            .iter()
            .map(|&id| Cell::from_extended(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.scan(&mut cells, false))
    }

    /// Heuristic correction over extended ids
    pub fn correct_extended(
        &self,
        ids: &[u16],
    ) -> Result<(Vec<u16>, Vec<OrientationError>), QdpiError> {
        let mut cells = ids
            .iter()
            .map(|&id| Cell::from_extended(id))
            .collect::<Result<Vec<_>, _>>()?;
        let errors = self.scan(&mut cells, true);
        Ok((cells.iter().map(Cell::extended).collect(), errors))
    }

    /// Restore rotations from a known-good reference
    ///
    /// Wherever the base symbols agree but the rotations differ, the
    /// reference rotation is taken with confidence 1.0. Positions whose base
    /// symbols differ are outside the orientation error class and are left
    /// untouched.
    pub fn correct_with_reference(
        &self,
        corrupted: &[u8],
        reference: &[u8],
    ) -> Result<(Vec<u8>, Vec<OrientationError>), QdpiError> {
        if corrupted.len() != reference.len() {
            return Err(QdpiError::LengthMismatch {
                left: corrupted.len(),
                right: reference.len(),
            });
        }

        let mut corrected = corrupted.to_vec();
        let mut errors = Vec::new();
        for (position, (&got, &want)) in corrupted.iter().zip(reference).enumerate() {
            if base_of(got) == base_of(want) && got != want {
                corrected[position] = want;
                errors.push(OrientationError {
                    position,
                    base_symbol: base_of(got),
                    detected: rotation_of(got),
                    corrected: rotation_of(want),
                    confidence: 1.0,
                    ambiguous: false,
                });
            }
        }

        #[cfg(feature = "logging")]
        debug!("reference correction fixed {} rotations", errors.len());

        Ok((corrected, errors))
    }

    fn scan(&self, cells: &mut [Cell], apply: bool) -> Vec<OrientationError> {
        let cfg = &self.config;
        let mut errors = Vec::new();

        for i in 0..cells.len() {
            let Some(reason) = self.suspicion(cells, i) else {
                continue;
            };

            let current = cells[i].rotation;
            let current_score = match reason {
                Suspicion::ImpossibleRotation => 0.0,
                _ => self.score(cells, i, current),
            };

            let first = (current.flip_bit(0), self.score(cells, i, current.flip_bit(0)));
            let second = (current.flip_bit(1), self.score(cells, i, current.flip_bit(1)));
            let ((best, best_score), runner_up) = if second.1 > first.1 {
                (second, first.1)
            } else {
                (first, second.1)
            };

            let accepted = best_score > cfg.acceptance_threshold
                && best_score >= current_score + cfg.min_margin
                && best_score - runner_up > f64::EPSILON;

            if accepted {
                if apply {
                    cells[i].rotation = best;
                }
                errors.push(OrientationError {
                    position: i,
                    base_symbol: cells[i].base,
                    detected: current,
                    corrected: best,
                    confidence: best_score,
                    ambiguous: false,
                });
            } else if reason == Suspicion::ImpossibleRotation
                || current_score <= cfg.acceptance_threshold
                || current_score < best_score
            {
                errors.push(OrientationError {
                    position: i,
                    base_symbol: cells[i].base,
                    detected: current,
                    corrected: current,
                    confidence: best_score.max(current_score),
                    ambiguous: true,
                });
            }
            // Otherwise the present rotation is the best explanation: a false alarm
        }

        #[cfg(feature = "logging")]
        debug!(
            "inner scan over {} glyphs: {} flagged, {} ambiguous",
            cells.len(),
            errors.len(),
            errors.iter().filter(|e| e.ambiguous).count()
        );

        errors
    }

    fn suspicion(&self, cells: &[Cell], i: usize) -> Option<Suspicion> {
        let cell = cells[i];

        if let Some(parity) = cell.parity {
            if parity != parity_mark_for(cell.glyph()) {
                return Some(Suspicion::ImpossibleRotation);
            }
        }

        if i > 0 && !is_compatible(cells[i - 1].rotation, cell.rotation) {
            return Some(Suspicion::IncompatibleTransition);
        }

        let start = (i + 1).saturating_sub(self.config.window);
        let same = cells[start..=i]
            .iter()
            .filter(|c| c.rotation == cell.rotation)
            .count();
        if same >= self.config.run_limit {
            return Some(Suspicion::UniformRun);
        }

        None
    }

    fn score(&self, cells: &[Cell], i: usize, candidate: Rotation) -> f64 {
        let cfg = &self.config;
        let cell = cells[i];

        if let Some(parity) = cell.parity {
            if parity != parity_mark_for(compose(cell.base, candidate)) {
                return 0.0;
            }
        }

        let mut checks = 0u32;
        let mut compatible = 0u32;
        if i > 0 {
            checks += 1;
            compatible += is_compatible(cells[i - 1].rotation, candidate) as u32;
        }
        if i + 1 < cells.len() {
            checks += 1;
            compatible += is_compatible(candidate, cells[i + 1].rotation) as u32;
        }
        let fraction = if checks == 0 {
            0.5
        } else {
            compatible as f64 / checks as f64
        };

        let score = cfg.compatibility_weight * fraction
            + cfg.prior_weight * cfg.priors[candidate.index() as usize];
        score.clamp(0.0, 1.0)
    }
}
