use anyhow::{Context, Result};
use colored::*;
use qdpi_core::{GlyphManifest, QdpiError};
use std::fs;
use tracing::info;

pub fn generate(output: &str) -> Result<()> {
    let manifest = GlyphManifest::canonical();
    let json = manifest
        .to_json()
        .with_context(|| "Failed to serialize manifest")?;
    fs::write(output, json).with_context(|| format!("Failed to write manifest: {}", output))?;
    info!("Wrote {} manifest entries to {}", manifest.entries.len(), output);
    Ok(())
}

pub fn validate(input: &str) -> Result<()> {
    info!("Validating manifest: {}", input);

    let content = fs::read_to_string(input)
        .with_context(|| format!("Failed to read manifest: {}", input))?;
    let manifest = GlyphManifest::from_json(&content)
        .with_context(|| format!("Failed to parse manifest: {}", input))?;

    println!("\n=== Manifest Validation ===");
    println!("Entries:           {}", manifest.entries.len());

    match manifest.validate() {
        Ok(()) => {
            println!("{} All 256 glyph ids present exactly once", "✓".green());
            Ok(())
        }
        Err(QdpiError::Manifest {
            missing,
            duplicates,
            problems,
        }) => {
            if !missing.is_empty() {
                println!("{} Missing ids: {:?}", "✗".red(), missing);
            }
            if !duplicates.is_empty() {
                println!("{} Duplicate ids: {:?}", "✗".red(), duplicates);
            }
            for problem in &problems {
                println!("{} {}", "✗".red(), problem);
            }
            Err(QdpiError::Manifest {
                missing,
                duplicates,
                problems,
            })
            .with_context(|| format!("Manifest {} is invalid", input))
        }
        Err(e) => Err(e).with_context(|| format!("Manifest {} is invalid", input)),
    }
}
