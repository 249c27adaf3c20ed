use anyhow::{Context, Result};
use qdpi_core::{batch::encode_records, EccCodec, QdpiSerializable};
use serde_json::Value;
use std::fs;
use tracing::info;

pub fn execute(input: &str, output: &str, json: bool, start_id: u64) -> Result<()> {
    info!("Encoding {} to {}", input, output);

    let raw = fs::read(input).with_context(|| format!("Failed to read input file: {}", input))?;

    let data = if json {
        let value: Value =
            serde_json::from_slice(&raw).with_context(|| "Failed to parse JSON input")?;
        // Canonical form: sorted keys, compact
        value
            .to_payload()
            .with_context(|| "Failed to serialize JSON input")?
            .to_vec()
    } else {
        raw
    };

    let codec = EccCodec::default();
    let records = encode_records(&codec, &data, start_id, json)
        .with_context(|| format!("Failed to encode {}", input))?;

    let mut output_data = Vec::with_capacity(records.iter().map(|r| r.len()).sum());
    for record in &records {
        output_data.extend_from_slice(record);
    }

    fs::write(output, &output_data)
        .with_context(|| format!("Failed to write output file: {}", output))?;

    info!(
        "Encoded {} bytes into {} blocks ({} bytes total)",
        data.len(),
        records.len(),
        output_data.len()
    );

    println!("\n=== Encode Results ===");
    println!("Input bytes:       {}", data.len());
    println!("Blocks:            {}", records.len());
    println!("Output bytes:      {}", output_data.len());
    println!("Protection:        {}", codec.protection_level());

    Ok(())
}
