//! Glyph manifest: the declarative catalog the glyph-id space must match 1:1
//!
//! Each entry names one glyph id by its 16 × 16 factorization:
//! `id = base_index * 16 + behavior`, where
//! `behavior = provenance * 4 + rotation index`. Rendering assets are
//! referenced by path only.

use crate::constants::GLYPH_COUNT;
use crate::error::QdpiError;
use crate::types::rotation_of;
use serde::{Deserialize, Serialize};

/// Number of base indices (and of behavior codes) in the manifest
pub const MANIFEST_AXIS: u8 = 16;

/// One manifest row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Glyph id 0..=255
    pub id: u16,

    /// Two-digit lowercase hex form of the id
    pub hex: String,

    /// Base-symbol index 0..=15
    pub base_index: u8,

    /// Behavior code 0..=15 (provenance * 4 + rotation index)
    pub behavior: u8,

    /// Rotation in degrees
    pub rotation_deg: u16,

    /// Rendering asset reference
    pub asset: String,
}

impl ManifestEntry {
    /// Canonical entry for a glyph id
    pub fn for_glyph(id: u8) -> Self {
        let rotation = rotation_of(id);
        Self {
            id: id as u16,
            hex: format!("{:02x}", id),
            base_index: id / MANIFEST_AXIS,
            behavior: id % MANIFEST_AXIS,
            rotation_deg: rotation.degrees(),
            asset: format!("glyphs/{:02x}.svg", id),
        }
    }

    /// Provenance class 0..=3 encoded in the behavior
    pub fn provenance(&self) -> u8 {
        self.behavior / 4
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.id as usize >= GLYPH_COUNT {
            problems.push(format!("id {} out of range", self.id));
            return problems;
        }
        if self.base_index >= MANIFEST_AXIS || self.behavior >= MANIFEST_AXIS {
            problems.push(format!(
                "id {}: base_index {} / behavior {} out of range",
                self.id, self.base_index, self.behavior
            ));
        } else if self.base_index as u16 * MANIFEST_AXIS as u16 + self.behavior as u16 != self.id {
            problems.push(format!(
                "id {}: base_index {} and behavior {} encode id {}",
                self.id,
                self.base_index,
                self.behavior,
                self.base_index as u16 * MANIFEST_AXIS as u16 + self.behavior as u16
            ));
        }
        match u8::from_str_radix(&self.hex, 16) {
            Ok(v) if v as u16 == self.id && self.hex.len() == 2 => {}
            _ => problems.push(format!("id {}: bad hex form {:?}", self.id, self.hex)),
        }
        let expected = rotation_of(self.id as u8).degrees();
        if self.rotation_deg != expected {
            problems.push(format!(
                "id {}: rotation {}° disagrees with glyph rotation {}°",
                self.id, self.rotation_deg, expected
            ));
        }
        if self.asset.is_empty() {
            problems.push(format!("id {}: empty asset reference", self.id));
        }
        problems
    }
}

/// Catalog of all 256 glyphs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlyphManifest {
    /// Manifest rows
    pub entries: Vec<ManifestEntry>,
}

impl GlyphManifest {
    /// Manifest matching the built-in codex
    pub fn canonical() -> Self {
        Self {
            entries: (0..GLYPH_COUNT)
                .map(|id| ManifestEntry::for_glyph(id as u8))
                .collect(),
        }
    }

    /// Parse a manifest from JSON
    pub fn from_json(json: &str) -> Result<Self, QdpiError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> Result<String, QdpiError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the manifest covers ids 0..=255 exactly once and every entry is
    /// consistent with its glyph
    pub fn validate(&self) -> Result<(), QdpiError> {
        let mut counts = [0usize; GLYPH_COUNT];
        let mut problems = Vec::new();

        for entry in &self.entries {
            problems.extend(entry.problems());
            if let Some(slot) = counts.get_mut(entry.id as usize) {
                *slot += 1;
            }
        }

        let missing: Vec<u8> = (0..GLYPH_COUNT)
            .filter(|&id| counts[id] == 0)
            .map(|id| id as u8)
            .collect();
        let duplicates: Vec<u8> = (0..GLYPH_COUNT)
            .filter(|&id| counts[id] > 1)
            .map(|id| id as u8)
            .collect();

        if missing.is_empty() && duplicates.is_empty() && problems.is_empty() {
            Ok(())
        } else {
            Err(QdpiError::Manifest {
                missing,
                duplicates,
                problems,
            })
        }
    }

    /// Entry for a glyph id
    pub fn entry(&self, id: u8) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.id == id as u16)
    }
}
