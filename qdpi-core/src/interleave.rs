//! Burst-error mitigation: depth-D interleaving of codewords.
//!
//! Writers send byte `i` of every codeword in a group before byte `i + 1` of
//! any of them. A contiguous burst of `L` bytes in the transmitted stream then
//! lands on at most `ceil(L / D)` bytes of each codeword, which keeps bursts
//! of up to `16 * D` bytes inside the outer code's correction bound.
//!
//! The record format is unchanged; the depth is the caller's metadata.

use crate::constants::{CODEWORD_LEN, MAX_CORRECTABLE};
use crate::error::QdpiError;
use bytes::{BufMut, Bytes, BytesMut};

/// Interleave a group of full-length codewords into one stream
pub fn interleave_codewords<C: AsRef<[u8]>>(codewords: &[C]) -> Result<Bytes, QdpiError> {
    for cw in codewords {
        let len = cw.as_ref().len();
        if len != CODEWORD_LEN {
            return Err(QdpiError::InvalidCodewordLength {
                expected: CODEWORD_LEN,
                actual: len,
            });
        }
    }

    let mut out = BytesMut::with_capacity(codewords.len() * CODEWORD_LEN);
    for i in 0..CODEWORD_LEN {
        for cw in codewords {
            out.put_u8(cw.as_ref()[i]);
        }
    }
    Ok(out.freeze())
}

/// Restore `depth` codewords from an interleaved stream
pub fn deinterleave_codewords(stream: &[u8], depth: usize) -> Result<Vec<Vec<u8>>, QdpiError> {
    if depth == 0 || stream.len() != depth * CODEWORD_LEN {
        return Err(QdpiError::LengthMismatch {
            left: stream.len(),
            right: depth * CODEWORD_LEN,
        });
    }

    let mut codewords = vec![Vec::with_capacity(CODEWORD_LEN); depth];
    for (i, &byte) in stream.iter().enumerate() {
        codewords[i % depth].push(byte);
    }
    Ok(codewords)
}

/// Worst-case bytes one codeword loses to a burst of `burst_len`
pub const fn burst_share(burst_len: usize, depth: usize) -> usize {
    if depth == 0 {
        burst_len
    } else {
        burst_len.div_ceil(depth)
    }
}

/// Longest burst a depth-`depth` group always survives
pub const fn max_correctable_burst(depth: usize) -> usize {
    MAX_CORRECTABLE * depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outer::OuterCode;
    use rand::{RngCore, SeedableRng};

    fn codewords(depth: usize) -> Vec<[u8; CODEWORD_LEN]> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(123);
        let outer = OuterCode::new();
        (0..depth)
            .map(|_| {
                let mut data = [0u8; 200];
                rng.fill_bytes(&mut data);
                outer.encode_codeword(&data).unwrap()
            })
            .collect()
    }

    #[test]
    fn round_trip_interleave_deinterleave() {
        let group = codewords(5);
        let stream = interleave_codewords(&group).unwrap();
        assert_eq!(stream.len(), 5 * CODEWORD_LEN);
        assert_eq!(stream[1], group[1][0]);

        let restored = deinterleave_codewords(&stream, 5).unwrap();
        for (a, b) in restored.iter().zip(&group) {
            assert_eq!(&a[..], &b[..]);
        }
    }

    #[test]
    fn long_burst_becomes_correctable() {
        let depth = 4;
        let group = codewords(depth);
        let mut stream = interleave_codewords(&group).unwrap().to_vec();
        let burst = max_correctable_burst(depth);
        for b in stream[300..300 + burst].iter_mut() {
            *b ^= 0xFF;
        }

        let outer = OuterCode::new();
        for (cw, original) in deinterleave_codewords(&stream, depth)
            .unwrap()
            .iter()
            .zip(&group)
        {
            let (data, stats) = outer.decode(cw, 200).unwrap();
            assert!(stats.success);
            assert!(stats.errors_corrected <= burst_share(burst, depth));
            assert_eq!(&data[..], &original[..200]);
        }
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(interleave_codewords(&[vec![0u8; 10]]).is_err());
        assert!(deinterleave_codewords(&[0u8; 255], 2).is_err());
        assert!(deinterleave_codewords(&[], 0).is_err());
    }
}
