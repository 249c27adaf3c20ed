//! Stream scanner for damaged or noisy record streams

use crate::constants::{RECORD_MARKER, RECORD_SIZE};
use crate::container::{decode_record, decode_record_zero_copy, BlockRecord};
use crate::error::QdpiError;
use bytes::Bytes;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// A record found at a specific offset in the stream
#[derive(Debug, Clone)]
pub struct LocatedBlock {
    /// Byte offset where the record marker was found
    pub offset: usize,

    /// The parsed record
    pub record: BlockRecord,
}

/// Scan a byte stream for block records, even if the stream is damaged
///
/// Searches for the record marker, tries to parse a record at each hit and
/// continues after it (or after the marker on failure). Records survive a
/// corrupted stream start, garbage between records and missing records.
pub fn scan_records(data: &[u8]) -> Vec<LocatedBlock> {
    scan_records_with_stats(data).0
}

/// Find the next occurrence of the record marker
fn find_marker(data: &[u8]) -> Option<usize> {
    if data.len() < RECORD_MARKER.len() {
        return None;
    }
    memchr::memmem::find(data, RECORD_MARKER)
}

fn try_decode_at_offset(data: &[u8], offset: usize) -> Result<LocatedBlock, QdpiError> {
    if offset + RECORD_SIZE > data.len() {
        return Err(QdpiError::IncompleteRecord {
            expected: RECORD_SIZE,
            actual: data.len() - offset,
        });
    }
    let record = decode_record(&data[offset..offset + RECORD_SIZE])?;
    Ok(LocatedBlock { offset, record })
}

/// Scan statistics
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    /// Total bytes scanned
    pub bytes_scanned: usize,

    /// Number of valid records found
    pub records_found: usize,

    /// Number of potential markers found
    pub markers_found: usize,

    /// Number of markers that did not start a valid record
    pub decode_failures: usize,

    /// Total bytes recovered (sum of all valid record sizes)
    pub bytes_recovered: usize,
}

impl ScanStats {
    /// Calculate recovery rate as a percentage
    pub fn recovery_rate(&self) -> f64 {
        if self.bytes_scanned == 0 {
            0.0
        } else {
            (self.bytes_recovered as f64 / self.bytes_scanned as f64) * 100.0
        }
    }
}

/// Scan stream with statistics
pub fn scan_records_with_stats(data: &[u8]) -> (Vec<LocatedBlock>, ScanStats) {
    let mut stats = ScanStats {
        bytes_scanned: data.len(),
        ..Default::default()
    };

    #[cfg(feature = "logging")]
    debug!("Starting record scan of {} bytes", data.len());

    let mut results = Vec::new();
    let mut pos = 0;

    while let Some(rel) = find_marker(&data[pos..]) {
        let at = pos + rel;
        stats.markers_found += 1;

        match try_decode_at_offset(data, at) {
            Ok(located) => {
                #[cfg(feature = "logging")]
                debug!("Found block {} at offset {}", located.record.block_id, at);
                stats.bytes_recovered += RECORD_SIZE;
                pos = at + RECORD_SIZE;
                results.push(located);
            }
            Err(_e) => {
                #[cfg(feature = "logging")]
                warn!("No valid record at offset {}: {}", at, _e);
                stats.decode_failures += 1;
                pos = at + RECORD_MARKER.len();
            }
        }
    }

    stats.records_found = results.len();

    #[cfg(feature = "logging")]
    debug!(
        "Scan complete: {} records, {} bad markers",
        stats.records_found, stats.decode_failures
    );

    (results, stats)
}

/// Scan a byte buffer and return records whose codewords slice into `buf`
pub fn scan_records_zero_copy(buf: Bytes) -> Vec<LocatedBlock> {
    let mut results = Vec::new();
    let mut pos = 0;
    while let Some(rel) = find_marker(&buf[pos..]) {
        let at = pos + rel;
        if at + RECORD_SIZE <= buf.len() {
            if let Ok(record) = decode_record_zero_copy(buf.slice(at..at + RECORD_SIZE)) {
                results.push(LocatedBlock { offset: at, record });
                pos = at + RECORD_SIZE;
                continue;
            }
        }
        pos = at + RECORD_MARKER.len();
    }
    results
}
