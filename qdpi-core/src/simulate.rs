//! Transmission simulator: controlled corruption of codewords and glyph streams
//!
//! Used by tests, benchmarks and the `qdpi simulate` command. All functions
//! take the RNG explicitly so runs are reproducible from a seed.

use rand::seq::index::sample;
use rand::Rng;

/// Flip each bit independently with probability `ber`; returns bits flipped
pub fn flip_bits<R: Rng + ?Sized>(data: &mut [u8], ber: f64, rng: &mut R) -> usize {
    let ber = ber.clamp(0.0, 1.0);
    let mut flipped = 0;
    for byte in data.iter_mut() {
        for bit in 0..8 {
            if rng.gen_bool(ber) {
                *byte ^= 1 << bit;
                flipped += 1;
            }
        }
    }
    flipped
}

/// Corrupt exactly `count` distinct byte positions; returns them sorted
///
/// Each chosen byte is XORed with a non-zero value so it always changes.
pub fn corrupt_bytes<R: Rng + ?Sized>(data: &mut [u8], count: usize, rng: &mut R) -> Vec<usize> {
    let count = count.min(data.len());
    let mut positions = sample(rng, data.len(), count).into_vec();
    positions.sort_unstable();
    for &p in &positions {
        data[p] ^= rng.gen_range(1..=255u8);
    }
    positions
}

/// Corrupt a contiguous run of `len` bytes starting at `start`
///
/// The run is clipped to the buffer. Returns the number of bytes changed.
pub fn corrupt_burst<R: Rng + ?Sized>(
    data: &mut [u8],
    start: usize,
    len: usize,
    rng: &mut R,
) -> usize {
    let start = start.min(data.len());
    let end = start.saturating_add(len).min(data.len());
    for byte in &mut data[start..end] {
        *byte ^= rng.gen_range(1..=255u8);
    }
    end - start
}

/// Flip one orientation syndrome bit in `count` distinct glyphs
///
/// Base symbols are left intact. Returns the positions touched, sorted.
pub fn flip_rotation_bits<R: Rng + ?Sized>(
    glyphs: &mut [u8],
    count: usize,
    rng: &mut R,
) -> Vec<usize> {
    let count = count.min(glyphs.len());
    let mut positions = sample(rng, glyphs.len(), count).into_vec();
    positions.sort_unstable();
    for &p in &positions {
        glyphs[p] ^= 1 << rng.gen_range(0..2u8);
    }
    positions
}
