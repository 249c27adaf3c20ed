use anyhow::{bail, Context, Result};
use colored::*;
use qdpi_core::{
    batch::decode_stream,
    scanner::scan_records_with_stats,
    stats::PerfSummary,
    EccCodec, EccConfig, InnerMode,
};
use serde::Serialize;
use std::fs;
use std::ops::RangeInclusive;
use tracing::{info, warn};

/// Machine-readable decode report
#[derive(Debug, Serialize)]
pub struct DecodeReport {
    pub bytes_scanned: usize,
    pub markers_found: usize,
    pub bad_records: usize,
    pub blocks: usize,
    pub duplicates: usize,
    pub lost_blocks: Vec<u64>,
    pub missing_ranges: Vec<RangeInclusive<u64>>,
    pub missing_blocks: u64,
    pub missing_head: bool,
    pub missing_tail: bool,
    pub bytes_corrected: usize,
    pub orientation_flags: usize,
    pub output_bytes: usize,
    pub performance: PerfSummary,
}

pub fn execute(
    input: &str,
    output: &str,
    stats: Option<&str>,
    apply_orientation: bool,
    partial: bool,
) -> Result<DecodeReport> {
    info!("Decoding file: {}", input);

    let data =
        fs::read(input).with_context(|| format!("Failed to read input file: {}", input))?;

    let (located, scan) = scan_records_with_stats(&data);
    info!(
        "Found {} records ({} bad markers)",
        located.len(),
        scan.decode_failures
    );
    if located.is_empty() {
        bail!("No QDPI records found in {}", input);
    }

    let mode = if apply_orientation {
        InnerMode::Apply
    } else {
        InnerMode::ReportOnly
    };
    let codec = EccCodec::new(EccConfig::default().inner_mode(mode));

    let json = located.iter().any(|l| l.record.flags.is_json());
    let records: Vec<_> = located.into_iter().map(|l| l.record).collect();
    let batch = decode_stream(&codec, &records);

    let lost_blocks = batch.lost_blocks();
    let missing_ranges = batch.missing_ranges();
    let missing_blocks = batch.missing_count();
    let missing_head = batch.missing_head();
    let missing_tail = batch.missing_tail();
    let recovered = if batch.is_complete() {
        batch.data()?
    } else if partial {
        warn!(
            "Writing partial output: lost {:?}, missing {:?}, head missing: {}, tail missing: {}",
            lost_blocks, missing_ranges, missing_head, missing_tail
        );
        batch.data_lossy()
    } else {
        println!(
            "{} {} lost, {} missing",
            "✗".red(),
            lost_blocks.len(),
            missing_blocks
        );
        bail!(
            "Stream not fully recoverable: lost blocks {:?}, missing blocks {:?}, head missing: {}, tail missing: {}",
            lost_blocks,
            missing_ranges,
            missing_head,
            missing_tail
        );
    };

    if json && batch.is_complete() {
        serde_json::from_slice::<serde_json::Value>(&recovered)
            .with_context(|| "Recovered data is not valid JSON")?;
    }

    fs::write(output, &recovered)
        .with_context(|| format!("Failed to write output file: {}", output))?;

    let report = DecodeReport {
        bytes_scanned: scan.bytes_scanned,
        markers_found: scan.markers_found,
        bad_records: scan.decode_failures,
        blocks: batch.blocks.len(),
        duplicates: batch.duplicates,
        lost_blocks,
        missing_ranges,
        missing_blocks,
        missing_head,
        missing_tail,
        bytes_corrected: batch.bytes_corrected(),
        orientation_flags: batch.orientation_flags(),
        output_bytes: recovered.len(),
        performance: codec.performance(),
    };

    println!("\n=== Decode Results ===");
    println!("Bytes scanned:     {} bytes", report.bytes_scanned);
    println!("Blocks decoded:    {}", report.blocks);
    println!("Bytes corrected:   {}", report.bytes_corrected);
    println!("Rotations flagged: {}", report.orientation_flags);
    println!("Avg decode time:   {:.3} ms", report.performance.avg_decode_ms);
    if batch.is_complete() {
        println!("{} All blocks recovered", "✓".green());
    } else {
        println!("{} Partial recovery", "✗".yellow());
    }

    if let Some(stats_path) = stats {
        let json = serde_json::to_string_pretty(&report)
            .with_context(|| "Failed to serialize decode report")?;
        fs::write(stats_path, json)
            .with_context(|| format!("Failed to write stats file: {}", stats_path))?;
        info!("Decode report written to: {}", stats_path);
    }

    Ok(report)
}
