use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use qdpi_core::{
    constants::DATA_LEN,
    simulate::{corrupt_bytes, flip_bits},
    EccCodec,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

/// How each trial damages its codeword
#[derive(Debug, Clone, Copy)]
pub enum Channel {
    /// Exactly this many byte errors
    ByteErrors(usize),
    /// Independent bit flips at this bit-error rate
    BitErrorRate(f64),
}

/// Aggregate result of a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub trials: usize,
    pub recovered: usize,
    pub lost: usize,
    pub avg_bytes_corrupted: f64,
    pub avg_decode_ms: f64,
    pub latency_misses: u64,
}

pub fn execute(channel: Channel, trials: usize, seed: u64) -> Result<SimulationSummary> {
    if trials == 0 {
        bail!("At least one trial is required");
    }
    if let Channel::BitErrorRate(ber) = channel {
        if !(0.0..=1.0).contains(&ber) {
            bail!("Bit-error rate must be within 0..=1, got {}", ber);
        }
    }

    info!("Simulating {} trials over {:?} (seed {})", trials, channel, seed);

    let codec = EccCodec::default();
    let mut rng = StdRng::seed_from_u64(seed);
    let progress = ProgressBar::new(trials as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} trials")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut recovered = 0;
    let mut corrupted_total = 0;
    for _ in 0..trials {
        let data: Vec<u8> = (0..DATA_LEN).map(|_| rng.gen()).collect();
        let result = codec.test_complete_protection(&data, |cw| match channel {
            Channel::ByteErrors(n) => {
                corrupt_bytes(cw, n, &mut rng);
            }
            Channel::BitErrorRate(ber) => {
                flip_bits(cw, ber, &mut rng);
            }
        })?;
        corrupted_total += result.bytes_corrupted;
        if result.recovered {
            recovered += 1;
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    let perf = codec.performance();
    let summary = SimulationSummary {
        trials,
        recovered,
        lost: trials - recovered,
        avg_bytes_corrupted: corrupted_total as f64 / trials as f64,
        avg_decode_ms: perf.avg_decode_ms,
        latency_misses: perf.latency_misses,
    };

    println!("\n=== Simulation Results ===");
    println!("Trials:            {}", summary.trials);
    println!("Recovered:         {}", summary.recovered);
    println!("Lost:              {}", summary.lost);
    println!(
        "Recovery rate:     {:.2}%",
        summary.recovered as f64 / trials as f64 * 100.0
    );
    println!("Avg corrupted:     {:.2} bytes", summary.avg_bytes_corrupted);
    println!("Avg decode time:   {:.3} ms", summary.avg_decode_ms);
    println!("Latency misses:    {}", summary.latency_misses);

    Ok(summary)
}
