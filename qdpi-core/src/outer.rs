//! Outer code: systematic Reed-Solomon RS(255, 223) over GF(256)
//!
//! A block carries up to 223 data bytes, zero-padded to 223, followed by 32
//! parity bytes. Decoding corrects up to 16 byte errors anywhere in the
//! 255-byte codeword using Berlekamp-Massey, a Chien search and Forney's
//! algorithm.
//!
//! Past 16 errors an RS decoder can land on a different valid codeword. This
//! decoder re-checks the syndromes after every correction and reports
//! `success = false` whenever the locator is inconsistent, but a `success`
//! is only a guarantee while the corruption stays within the bound.

use crate::constants::{
    CODEWORD_LEN, DATA_LEN, FIRST_CONSECUTIVE_ROOT, MAX_CORRECTABLE, PARITY_LEN,
};
use crate::error::QdpiError;
use crate::gf256;
use crate::types::Block;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// Statistics record emitted by every outer-code decode
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OuterStats {
    /// Byte errors the decoder located
    pub errors_detected: usize,

    /// Byte errors actually corrected
    pub errors_corrected: usize,

    /// Whether the codeword was brought back to a valid state
    pub success: bool,

    /// Wall-clock decode time
    pub decode_time_ms: f64,
}

/// Outcome of correcting one codeword in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Correction {
    Clean,
    Corrected(usize),
    Failed { located: usize },
}

/// Reed-Solomon RS(255, 223) encoder/decoder
#[derive(Debug, Clone)]
pub struct OuterCode {
    /// Generator polynomial, lowest degree first, monic of degree 32
    generator: [u8; PARITY_LEN + 1],
}

impl Default for OuterCode {
    fn default() -> Self {
        Self::new()
    }
}

impl OuterCode {
    /// Build the code and its generator polynomial
    pub fn new() -> Self {
        let mut g = vec![1u8];
        for i in 0..PARITY_LEN {
            g = gf256::poly_mul(&g, &[gf256::alpha_pow(i + FIRST_CONSECUTIVE_ROOT), 1]);
        }
        let mut generator = [0u8; PARITY_LEN + 1];
        generator.copy_from_slice(&g);
        Self { generator }
    }

    /// Encode up to 223 bytes into a block with a 255-byte codeword
    pub fn encode(&self, data: &[u8], block_id: u64) -> Result<Block, QdpiError> {
        let codeword = self.encode_codeword(data)?;
        let encoded_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Ok(Block {
            block_id,
            data: Bytes::copy_from_slice(data),
            codeword: Bytes::copy_from_slice(&codeword),
            encoded_at_ms,
        })
    }

    /// Compute the systematic codeword for `data`
    ///
    /// The data is right-padded with zeros to 223 bytes. Work done depends
    /// only on the block geometry.
    pub fn encode_codeword(&self, data: &[u8]) -> Result<[u8; CODEWORD_LEN], QdpiError> {
        if data.len() > DATA_LEN {
            return Err(QdpiError::DataTooLong {
                len: data.len(),
                max: DATA_LEN,
            });
        }

        let mut codeword = [0u8; CODEWORD_LEN];
        codeword[..data.len()].copy_from_slice(data);

        // LFSR division of data(x) * x^32 by g(x); register is highest degree first
        let mut parity = [0u8; PARITY_LEN];
        for &byte in &codeword[..DATA_LEN] {
            let feedback = byte ^ parity[0];
            parity.copy_within(1.., 0);
            parity[PARITY_LEN - 1] = 0;
            for (j, p) in parity.iter_mut().enumerate() {
                *p ^= gf256::mul(self.generator[PARITY_LEN - 1 - j], feedback);
            }
        }
        codeword[DATA_LEN..].copy_from_slice(&parity);
        Ok(codeword)
    }

    /// Decode a 255-byte codeword and return its first `original_length` bytes
    ///
    /// When `stats.success` is false the returned bytes are the uncorrected
    /// data region and must not be trusted.
    pub fn decode(
        &self,
        codeword: &[u8],
        original_length: usize,
    ) -> Result<(Vec<u8>, OuterStats), QdpiError> {
        if codeword.len() != CODEWORD_LEN {
            return Err(QdpiError::InvalidCodewordLength {
                expected: CODEWORD_LEN,
                actual: codeword.len(),
            });
        }
        if original_length > DATA_LEN {
            return Err(QdpiError::InvalidOriginalLength(original_length));
        }

        let started = Instant::now();
        let mut work = [0u8; CODEWORD_LEN];
        work.copy_from_slice(codeword);

        let correction = correct_in_place(&mut work);
        let (errors_detected, errors_corrected, success) = match correction {
            Correction::Clean => (0, 0, true),
            Correction::Corrected(n) => (n, n, true),
            Correction::Failed { located } => {
                // Hand back the received data untouched
                work.copy_from_slice(codeword);
                (located, 0, false)
            }
        };

        let stats = OuterStats {
            errors_detected,
            errors_corrected,
            success,
            decode_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        };

        #[cfg(feature = "logging")]
        {
            if stats.success {
                debug!(
                    errors_detected = stats.errors_detected,
                    errors_corrected = stats.errors_corrected,
                    decode_time_ms = stats.decode_time_ms,
                    success = stats.success,
                    "outer decode"
                );
            } else {
                warn!(
                    errors_detected = stats.errors_detected,
                    decode_time_ms = stats.decode_time_ms,
                    success = stats.success,
                    "outer decode failed: corruption beyond {} byte bound",
                    MAX_CORRECTABLE
                );
            }
        }

        Ok((work[..original_length].to_vec(), stats))
    }

    /// Whether a codeword has all-zero syndromes
    pub fn is_valid_codeword(&self, codeword: &[u8]) -> bool {
        codeword.len() == CODEWORD_LEN && syndromes(codeword).iter().all(|&s| s == 0)
    }
}

/// Syndromes S_k = c(α^(k + fcr)), k = 0..32
fn syndromes(codeword: &[u8]) -> [u8; PARITY_LEN] {
    let mut synd = [0u8; PARITY_LEN];
    for (k, s) in synd.iter_mut().enumerate() {
        let x = gf256::alpha_pow(k + FIRST_CONSECUTIVE_ROOT);
        *s = codeword.iter().fold(0u8, |acc, &c| gf256::mul(acc, x) ^ c);
    }
    synd
}

/// Berlekamp-Massey: error locator Λ(x), lowest degree first, and its degree
fn berlekamp_massey(synd: &[u8; PARITY_LEN]) -> (Vec<u8>, usize) {
    let mut lambda = vec![0u8; PARITY_LEN + 1];
    let mut prev = vec![0u8; PARITY_LEN + 1];
    lambda[0] = 1;
    prev[0] = 1;
    let mut len = 0usize;
    let mut shift = 1usize;
    let mut prev_disc = 1u8;

    for n in 0..PARITY_LEN {
        let mut disc = synd[n];
        for i in 1..=len {
            disc ^= gf256::mul(lambda[i], synd[n - i]);
        }

        if disc == 0 {
            shift += 1;
            continue;
        }

        let coef = gf256::div(disc, prev_disc);
        let snapshot = (2 * len <= n).then(|| lambda.clone());
        for i in 0..(PARITY_LEN + 1).saturating_sub(shift) {
            lambda[i + shift] ^= gf256::mul(coef, prev[i]);
        }

        match snapshot {
            Some(old) => {
                len = n + 1 - len;
                prev = old;
                prev_disc = disc;
                shift = 1;
            }
            None => shift += 1,
        }
    }

    (lambda, len)
}

fn correct_in_place(codeword: &mut [u8; CODEWORD_LEN]) -> Correction {
    let synd = syndromes(codeword);
    if synd.iter().all(|&s| s == 0) {
        return Correction::Clean;
    }

    let (lambda, len) = berlekamp_massey(&synd);
    if len > MAX_CORRECTABLE || lambda[len + 1..].iter().any(|&c| c != 0) {
        return Correction::Failed { located: len };
    }
    let lambda = &lambda[..=len];

    // Chien search: index j holds x^(254 - j), so its locator root is α^(j + 1)
    let positions: Vec<usize> = (0..CODEWORD_LEN)
        .filter(|&j| gf256::poly_eval(lambda, gf256::alpha_pow(j + 1)) == 0)
        .collect();
    if positions.len() != len {
        return Correction::Failed { located: len };
    }

    // Ω(x) = S(x) Λ(x) mod x^32
    let mut omega = gf256::poly_mul(&synd, lambda);
    omega.truncate(PARITY_LEN);
    let lambda_prime = gf256::poly_derivative(lambda);

    for &j in &positions {
        let x = gf256::alpha_pow(CODEWORD_LEN - 1 - j);
        let x_inv = gf256::alpha_pow(j + 1);
        let denom = gf256::poly_eval(&lambda_prime, x_inv);
        if denom == 0 {
            return Correction::Failed { located: len };
        }
        // Forney: e = X^(1 - fcr) Ω(X^-1) / Λ'(X^-1)
        let mut magnitude = gf256::div(gf256::poly_eval(&omega, x_inv), denom);
        magnitude = gf256::mul(
            magnitude,
            gf256::pow(x, (256 - FIRST_CONSECUTIVE_ROOT) % 255),
        );
        if magnitude == 0 {
            return Correction::Failed { located: len };
        }
        codeword[j] ^= magnitude;
    }

    if syndromes(codeword).iter().any(|&s| s != 0) {
        return Correction::Failed { located: len };
    }

    Correction::Corrected(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> Vec<u8> {
        (0..DATA_LEN).map(|i| (i * 37 + 11) as u8).collect()
    }

    #[test]
    fn generator_is_monic_degree_32() {
        let code = OuterCode::new();
        assert_eq!(code.generator[PARITY_LEN], 1);
        // α^0 .. α^31 are roots
        for i in 0..PARITY_LEN {
            assert_eq!(gf256::poly_eval(&code.generator, gf256::alpha_pow(i)), 0);
        }
    }

    #[test]
    fn encode_is_systematic_and_valid() {
        let code = OuterCode::new();
        let data = sample_data();
        let cw = code.encode_codeword(&data).unwrap();
        assert_eq!(&cw[..DATA_LEN], &data[..]);
        assert!(code.is_valid_codeword(&cw));
    }

    #[test]
    fn zero_block_has_zero_parity() {
        let code = OuterCode::new();
        let cw = code.encode_codeword(&[0u8; DATA_LEN]).unwrap();
        assert!(cw.iter().all(|&b| b == 0));
    }

    #[test]
    fn short_data_is_zero_padded() {
        let code = OuterCode::new();
        let block = code.encode(&[1, 2, 3], 9).unwrap();
        assert_eq!(block.codeword.len(), CODEWORD_LEN);
        assert!(block.codeword[3..DATA_LEN].iter().all(|&b| b == 0));
        assert_eq!(block.block_id, 9);
        assert_eq!(block.original_len(), 3);
    }

    #[test]
    fn rejects_oversized_data() {
        let code = OuterCode::new();
        let err = code.encode(&[0u8; DATA_LEN + 1], 1).unwrap_err();
        assert_eq!(
            err,
            QdpiError::DataTooLong {
                len: DATA_LEN + 1,
                max: DATA_LEN
            }
        );
    }

    #[test]
    fn rejects_bad_lengths_on_decode() {
        let code = OuterCode::new();
        assert!(matches!(
            code.decode(&[0u8; 10], 4),
            Err(QdpiError::InvalidCodewordLength { .. })
        ));
        assert!(matches!(
            code.decode(&[0u8; CODEWORD_LEN], DATA_LEN + 1),
            Err(QdpiError::InvalidOriginalLength(_))
        ));
    }

    #[test]
    fn clean_decode_reports_no_errors() {
        let code = OuterCode::new();
        let data = sample_data();
        let cw = code.encode_codeword(&data).unwrap();
        let (out, stats) = code.decode(&cw, DATA_LEN).unwrap();
        assert_eq!(out, data);
        assert!(stats.success);
        assert_eq!(stats.errors_detected, 0);
    }

    #[test]
    fn corrects_single_error_everywhere() {
        let code = OuterCode::new();
        let data = sample_data();
        let cw = code.encode_codeword(&data).unwrap();
        for pos in 0..CODEWORD_LEN {
            let mut bad = cw;
            bad[pos] ^= 0x5A;
            let (out, stats) = code.decode(&bad, DATA_LEN).unwrap();
            assert!(stats.success, "position {}", pos);
            assert_eq!(stats.errors_corrected, 1);
            assert_eq!(out, data);
        }
    }

    #[test]
    fn corrects_sixteen_errors() {
        let code = OuterCode::new();
        let data = sample_data();
        let cw = code.encode_codeword(&data).unwrap();
        let mut bad = cw;
        for k in 0..MAX_CORRECTABLE {
            bad[k * 15 + 3] ^= (k as u8).wrapping_mul(29) | 1;
        }
        let (out, stats) = code.decode(&bad, DATA_LEN).unwrap();
        assert!(stats.success);
        assert_eq!(stats.errors_corrected, MAX_CORRECTABLE);
        assert_eq!(out, data);
    }

    #[test]
    fn corrects_burst_in_parity_region() {
        let code = OuterCode::new();
        let data = sample_data();
        let cw = code.encode_codeword(&data).unwrap();
        let mut bad = cw;
        for b in bad[DATA_LEN..DATA_LEN + 16].iter_mut() {
            *b = !*b;
        }
        let (out, stats) = code.decode(&bad, DATA_LEN).unwrap();
        assert!(stats.success);
        assert_eq!(out, data);
    }

    #[test]
    fn heavy_burst_is_reported_not_masked() {
        let code = OuterCode::new();
        let data = sample_data();
        let cw = code.encode_codeword(&data).unwrap();
        let mut bad = cw;
        for b in bad[40..80].iter_mut() {
            *b ^= 0xFF;
        }
        let (out, stats) = code.decode(&bad, DATA_LEN).unwrap();
        assert!(!stats.success);
        assert_eq!(stats.errors_corrected, 0);
        // Failed decodes hand back the received bytes
        assert_eq!(&out[..], &bad[..DATA_LEN]);
    }
}
