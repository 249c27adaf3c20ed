//! Basic encoding example

use qdpi_core::{batch::encode_records, EccCodec};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("QDPI Basic Encoding Example\n");

    let codec = EccCodec::default();
    println!("Protection: {}\n", codec.protection_level());

    // One short block, shown glyph by glyph
    let protected = codec.encode_with_protection(b"QDPI", 1)?;
    for symbol in codec.codex().encode_bytes(&protected.original) {
        println!("{} ->\n{}", symbol.name(), symbol.pattern());
    }
    println!(
        "Block {}: {} data bytes, {} bytes of overhead\n",
        protected.block.block_id,
        protected.original.len(),
        protected.overhead_bytes
    );

    // A longer message as a record stream
    let message: String = (1..=20)
        .map(|i| format!("Telemetry sample {} from the north array. ", i))
        .collect();
    let records = encode_records(&codec, message.as_bytes(), 0, false)?;

    let mut output = Vec::new();
    for record in &records {
        output.extend_from_slice(record);
    }
    std::fs::write("example_output.qdpi", &output)?;

    println!(
        "Wrote {} records ({} bytes) to example_output.qdpi",
        records.len(),
        output.len()
    );
    println!("Use 'qdpi decode --input example_output.qdpi --output message.txt' to read it back");

    Ok(())
}
