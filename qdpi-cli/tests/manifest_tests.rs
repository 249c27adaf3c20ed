use std::fs;
use tempfile::tempdir;

use qdpi_cli::commands::manifest;
use qdpi_core::GlyphManifest;

#[test]
fn test_generate_then_validate() {
    let td = tempdir().unwrap();
    let path = td.path().join("manifest.json");
    let path = path.to_str().unwrap();

    manifest::generate(path).unwrap();
    let parsed = GlyphManifest::from_json(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(parsed.entries.len(), 256);

    manifest::validate(path).unwrap();
}

#[test]
fn test_validate_names_missing_ids() {
    let td = tempdir().unwrap();
    let path = td.path().join("manifest.json");

    let mut m = GlyphManifest::canonical();
    m.entries.retain(|e| e.id != 42);
    fs::write(&path, m.to_json().unwrap()).unwrap();

    let err = manifest::validate(path.to_str().unwrap()).unwrap_err();
    let chain = format!("{:#}", err);
    assert!(chain.contains("missing ids [42]"), "{}", chain);
}

#[test]
fn test_validate_rejects_malformed_file() {
    let td = tempdir().unwrap();
    let path = td.path().join("manifest.json");
    fs::write(&path, "[1, 2, 3]").unwrap();
    assert!(manifest::validate(path.to_str().unwrap()).is_err());
}
