//! Rolling performance statistics for encode/decode calls
//!
//! Observability only: nothing here influences correction. Workers can keep
//! their own [`PerfStats`] shard and [`merge`](PerfStats::merge) it into a
//! [`SharedPerfStats`] when done, or record straight into the shared
//! accumulator behind its lock.

use crate::constants::DEFAULT_HISTORY_LEN;
use crate::outer::OuterStats;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One accumulator shard
#[derive(Debug, Clone, PartialEq)]
pub struct PerfStats {
    history_len: usize,
    encode_ms: VecDeque<f64>,
    decode_ms: VecDeque<f64>,
    blocks_encoded: u64,
    blocks_decoded: u64,
    decode_failures: u64,
    bytes_corrected: u64,
    orientation_corrections: u64,
    latency_misses: u64,
}

impl Default for PerfStats {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl PerfStats {
    /// Create a shard that keeps at most `history_len` timing samples per kind
    pub fn new(history_len: usize) -> Self {
        Self {
            history_len: history_len.max(1),
            encode_ms: VecDeque::new(),
            decode_ms: VecDeque::new(),
            blocks_encoded: 0,
            blocks_decoded: 0,
            decode_failures: 0,
            bytes_corrected: 0,
            orientation_corrections: 0,
            latency_misses: 0,
        }
    }

    /// Record one encode call
    pub fn record_encode(&mut self, elapsed_ms: f64) {
        self.blocks_encoded += 1;
        push_bounded(&mut self.encode_ms, elapsed_ms, self.history_len);
    }

    /// Record one decode call
    pub fn record_decode(
        &mut self,
        elapsed_ms: f64,
        outer: &OuterStats,
        orientation_corrections: usize,
        met_latency_target: bool,
    ) {
        self.blocks_decoded += 1;
        if !outer.success {
            self.decode_failures += 1;
        }
        self.bytes_corrected += outer.errors_corrected as u64;
        self.orientation_corrections += orientation_corrections as u64;
        if !met_latency_target {
            self.latency_misses += 1;
        }
        push_bounded(&mut self.decode_ms, elapsed_ms, self.history_len);
    }

    /// Fold another shard into this one
    pub fn merge(&mut self, other: &PerfStats) {
        self.blocks_encoded += other.blocks_encoded;
        self.blocks_decoded += other.blocks_decoded;
        self.decode_failures += other.decode_failures;
        self.bytes_corrected += other.bytes_corrected;
        self.orientation_corrections += other.orientation_corrections;
        self.latency_misses += other.latency_misses;
        for &ms in &other.encode_ms {
            push_bounded(&mut self.encode_ms, ms, self.history_len);
        }
        for &ms in &other.decode_ms {
            push_bounded(&mut self.decode_ms, ms, self.history_len);
        }
    }

    /// Snapshot of the counters and timing history
    pub fn summary(&self) -> PerfSummary {
        PerfSummary {
            blocks_encoded: self.blocks_encoded,
            blocks_decoded: self.blocks_decoded,
            decode_failures: self.decode_failures,
            bytes_corrected: self.bytes_corrected,
            orientation_corrections: self.orientation_corrections,
            latency_misses: self.latency_misses,
            avg_encode_ms: mean(&self.encode_ms),
            avg_decode_ms: mean(&self.decode_ms),
            max_decode_ms: self.decode_ms.iter().copied().fold(0.0, f64::max),
            samples: self.decode_ms.len(),
        }
    }
}

fn push_bounded(history: &mut VecDeque<f64>, value: f64, cap: usize) {
    if history.len() == cap {
        history.pop_front();
    }
    history.push_back(value);
}

fn mean(values: &VecDeque<f64>) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Serializable snapshot of an accumulator
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerfSummary {
    /// Blocks encoded
    pub blocks_encoded: u64,
    /// Blocks decoded (successfully or not)
    pub blocks_decoded: u64,
    /// Decodes where the outer code gave up
    pub decode_failures: u64,
    /// Byte errors fixed by the outer code
    pub bytes_corrected: u64,
    /// Rotations changed by the inner code
    pub orientation_corrections: u64,
    /// Decodes slower than the latency target
    pub latency_misses: u64,
    /// Mean encode time over the retained history
    pub avg_encode_ms: f64,
    /// Mean decode time over the retained history
    pub avg_decode_ms: f64,
    /// Slowest decode in the retained history
    pub max_decode_ms: f64,
    /// Decode samples retained
    pub samples: usize,
}

/// Accumulator shared between callers behind a lightweight lock
#[derive(Debug, Default)]
pub struct SharedPerfStats {
    inner: Mutex<PerfStats>,
}

impl SharedPerfStats {
    /// Create an empty shared accumulator
    pub fn new(history_len: usize) -> Self {
        Self {
            inner: Mutex::new(PerfStats::new(history_len)),
        }
    }

    /// Record one encode call
    pub fn record_encode(&self, elapsed_ms: f64) {
        self.inner.lock().record_encode(elapsed_ms);
    }

    /// Record one decode call
    pub fn record_decode(
        &self,
        elapsed_ms: f64,
        outer: &OuterStats,
        orientation_corrections: usize,
        met_latency_target: bool,
    ) {
        self.inner
            .lock()
            .record_decode(elapsed_ms, outer, orientation_corrections, met_latency_target);
    }

    /// Merge a worker's shard
    pub fn merge(&self, shard: &PerfStats) {
        self.inner.lock().merge(shard);
    }

    /// Current snapshot
    pub fn summary(&self) -> PerfSummary {
        self.inner.lock().summary()
    }

    /// Drop all samples and counters
    pub fn reset(&self) {
        let mut guard = self.inner.lock();
        let history_len = guard.history_len;
        *guard = PerfStats::new(history_len);
    }

    /// Fresh shard with the same history length, for a worker to fill
    pub fn shard(&self) -> PerfStats {
        PerfStats::new(self.inner.lock().history_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_stats(corrected: usize) -> OuterStats {
        OuterStats {
            errors_detected: corrected,
            errors_corrected: corrected,
            success: true,
            decode_time_ms: 0.1,
        }
    }

    #[test]
    fn history_is_bounded() {
        let mut stats = PerfStats::new(3);
        for ms in [1.0, 2.0, 3.0, 4.0] {
            stats.record_encode(ms);
        }
        let summary = stats.summary();
        assert_eq!(summary.blocks_encoded, 4);
        assert!((summary.avg_encode_ms - 3.0).abs() < 1e-9);
    }

    #[test]
    fn decode_counters() {
        let mut stats = PerfStats::default();
        stats.record_decode(0.5, &ok_stats(3), 1, true);
        let failed = OuterStats {
            success: false,
            ..ok_stats(0)
        };
        stats.record_decode(5.0, &failed, 0, false);
        let s = stats.summary();
        assert_eq!(s.blocks_decoded, 2);
        assert_eq!(s.decode_failures, 1);
        assert_eq!(s.bytes_corrected, 3);
        assert_eq!(s.orientation_corrections, 1);
        assert_eq!(s.latency_misses, 1);
        assert_eq!(s.max_decode_ms, 5.0);
    }

    #[test]
    fn shards_merge() {
        let shared = SharedPerfStats::new(10);
        let mut a = shared.shard();
        let mut b = shared.shard();
        a.record_encode(1.0);
        b.record_encode(3.0);
        b.record_decode(2.0, &ok_stats(1), 0, true);
        shared.merge(&a);
        shared.merge(&b);
        let s = shared.summary();
        assert_eq!(s.blocks_encoded, 2);
        assert_eq!(s.blocks_decoded, 1);
        assert!((s.avg_encode_ms - 2.0).abs() < 1e-9);

        shared.reset();
        assert_eq!(shared.summary(), PerfSummary::default());
    }
}
