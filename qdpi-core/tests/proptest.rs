//! Property-based tests using proptest

use qdpi_core::{
    container::decode_record,
    inner::InnerCode,
    scanner::scan_records,
    types::{base_of, compose, rotation_of},
    Codex, EccCodec, OuterCode, Rotation,
};
use proptest::prelude::*;

fn rotation() -> impl Strategy<Value = Rotation> {
    (0u8..4).prop_map(|i| Rotation::ALL[i as usize])
}

proptest! {
    #[test]
    fn prop_round_trip_encode_decode(
        data in prop::collection::vec(any::<u8>(), 0..=223)
    ) {
        let codec = EccCodec::default();
        let protected = codec.encode_with_protection(&data, 1).unwrap();
        let (decoded, stats) = codec
            .decode_with_correction(&protected.block.codeword, data.len())
            .unwrap();
        prop_assert_eq!(&decoded, &data);
        prop_assert_eq!(stats.outer.errors_detected, 0);
        prop_assert!(protected.verify(&decoded));
    }

    #[test]
    fn prop_up_to_sixteen_errors_recovered(
        data in prop::collection::vec(any::<u8>(), 0..=223),
        positions in prop::sample::subsequence((0..255usize).collect::<Vec<_>>(), 0..=16),
        mask in 1u8..=255,
    ) {
        let outer = OuterCode::new();
        let mut codeword = outer.encode_codeword(&data).unwrap();
        for &p in &positions {
            codeword[p] ^= mask;
        }
        let (decoded, stats) = outer.decode(&codeword, data.len()).unwrap();
        prop_assert!(stats.success);
        prop_assert_eq!(stats.errors_corrected, positions.len());
        prop_assert_eq!(decoded, data);
    }

    #[test]
    fn prop_codex_round_trip(data in prop::collection::vec(any::<u8>(), 0..1024)) {
        let codex = Codex::new();
        let symbols = codex.encode_bytes(&data);
        prop_assert_eq!(codex.decode(&symbols).unwrap(), data);
    }

    #[test]
    fn prop_reference_correction_is_exact(
        cells in prop::collection::vec((1u8..=64, rotation(), rotation()), 0..223)
    ) {
        let reference: Vec<u8> = cells.iter().map(|&(b, r, _)| compose(b, r)).collect();
        let corrupted: Vec<u8> = cells.iter().map(|&(b, _, r)| compose(b, r)).collect();

        let (fixed, errors) = InnerCode::default()
            .correct_with_reference(&corrupted, &reference)
            .unwrap();
        prop_assert_eq!(&fixed, &reference);
        let differing = corrupted.iter().zip(&reference).filter(|(a, b)| a != b).count();
        prop_assert_eq!(errors.len(), differing);
    }

    #[test]
    fn prop_inner_correction_keeps_base_symbols(
        glyphs in prop::collection::vec(any::<u8>(), 0..300)
    ) {
        let (fixed, errors) = InnerCode::default().correct(&glyphs);
        prop_assert_eq!(fixed.len(), glyphs.len());
        for (a, b) in fixed.iter().zip(&glyphs) {
            prop_assert_eq!(base_of(*a), base_of(*b));
        }
        for e in errors {
            prop_assert!(e.confidence >= 0.0 && e.confidence <= 1.0);
            prop_assert_eq!(rotation_of(glyphs[e.position]), e.detected);
        }
    }

    #[test]
    fn prop_decode_never_panics(
        codeword in prop::collection::vec(any::<u8>(), 0..300),
        len in 0usize..300,
    ) {
        let codec = EccCodec::default();
        let _ = codec.decode_with_correction(&codeword, len);
    }

    #[test]
    fn prop_record_decode_never_panics(
        data in prop::collection::vec(any::<u8>(), 0..600)
    ) {
        let _ = decode_record(&data);
    }

    #[test]
    fn prop_scan_never_panics(
        data in prop::collection::vec(any::<u8>(), 0..8192)
    ) {
        let _ = scan_records(&data);
    }
}
