//! Fuzz entry points for qdpi-core
//!
//! Each function takes arbitrary bytes and must never panic. They are plain
//! functions so any fuzz driver (cargo-fuzz, AFL, a proptest harness) can call
//! them.

use qdpi_core::{
    constants::{CODEWORD_LEN, DATA_LEN},
    container::decode_record,
    inner::InnerCode,
    scanner::scan_records,
    EccCodec, OuterCode,
};

/// Outer decode of an arbitrary codeword; the first byte picks the length
pub fn fuzz_outer_decode(data: &[u8]) {
    let Some((&len, rest)) = data.split_first() else {
        return;
    };
    let mut codeword = [0u8; CODEWORD_LEN];
    let n = rest.len().min(CODEWORD_LEN);
    codeword[..n].copy_from_slice(&rest[..n]);

    let (decoded, stats) = match OuterCode::new().decode(&codeword, len as usize % (DATA_LEN + 1)) {
        Ok(r) => r,
        Err(_) => return,
    };
    assert!(stats.errors_corrected <= 16);
    assert_eq!(decoded.len(), len as usize % (DATA_LEN + 1));
}

/// Full orchestrator decode with unchecked lengths
pub fn fuzz_codec_decode(data: &[u8]) {
    let len = data.first().copied().unwrap_or(0) as usize;
    let _ = EccCodec::default().decode_with_correction(data, len);
}

/// Record parsing
pub fn fuzz_record(data: &[u8]) {
    let _ = decode_record(data);
}

/// Inner-code heuristics over arbitrary glyphs
pub fn fuzz_inner(data: &[u8]) {
    let inner = InnerCode::default();
    let (fixed, _) = inner.correct(data);
    assert_eq!(fixed.len(), data.len());
    let ids: Vec<u16> = data
        .chunks(2)
        .map(|c| u16::from_le_bytes([c[0], *c.get(1).unwrap_or(&0)]) % 1024)
        .collect();
    let _ = inner.correct_extended(&ids);
}

/// Stream scanning
pub fn fuzz_scan(data: &[u8]) {
    let _ = scan_records(data);
}
