//! Example demonstrating recovery from random and burst damage

use qdpi_core::{
    interleave::{deinterleave_codewords, interleave_codewords},
    simulate::{corrupt_burst, corrupt_bytes},
    EccCodec, OuterCode,
};
use rand::{rngs::StdRng, SeedableRng};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("QDPI Burst Recovery Example\n");
    let mut rng = StdRng::seed_from_u64(2024);
    let codec = EccCodec::default();

    // Step 1: random byte errors inside the correction bound
    println!("Step 1: random byte errors");
    let data: Vec<u8> = (0..223).map(|i| (i * 3) as u8).collect();
    for count in [4usize, 16, 17, 32] {
        let result = codec.test_complete_protection(&data, |cw| {
            corrupt_bytes(cw, count, &mut rng);
        })?;
        println!(
            "  {:>2} corrupted bytes -> {}",
            result.bytes_corrupted,
            if result.recovered { "recovered" } else { "lost" }
        );
    }

    // Step 2: one long burst, without and with interleaving
    println!("\nStep 2: 100-byte burst");
    let outer = OuterCode::new();
    let depth = 8;
    let blocks: Vec<Vec<u8>> = (0..depth).map(|i| vec![i as u8; 223]).collect();
    let codewords = blocks
        .iter()
        .map(|b| outer.encode_codeword(b))
        .collect::<Result<Vec<_>, _>>()?;

    let mut plain: Vec<u8> = codewords.iter().flatten().copied().collect();
    corrupt_burst(&mut plain, 300, 100, &mut rng);
    let plain_ok = plain
        .chunks(255)
        .filter(|cw| outer.decode(cw, 223).map(|(_, s)| s.success).unwrap_or(false))
        .count();
    println!("  sequential:  {}/{} codewords recovered", plain_ok, depth);

    let mut interleaved = interleave_codewords(&codewords)?.to_vec();
    corrupt_burst(&mut interleaved, 300, 100, &mut rng);
    let mut interleaved_ok = 0;
    for cw in deinterleave_codewords(&interleaved, depth)? {
        if outer.decode(&cw, 223)?.1.success {
            interleaved_ok += 1;
        }
    }
    println!("  interleaved: {}/{} codewords recovered", interleaved_ok, depth);

    println!("\n{:#?}", codec.performance());
    Ok(())
}
