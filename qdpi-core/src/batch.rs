//! Batch pipeline: arbitrary-length data <-> sequences of protected blocks
//!
//! Data is cut into 223-byte blocks with consecutive ids. With the
//! `parallel` feature blocks are processed on the rayon pool; each worker
//! fills its own [`PerfStats`] shard and the shards are merged into the
//! codec's accumulator once the batch is done. Results are always returned
//! in block order.

use crate::constants::{RecordFlags, DATA_LEN};
use crate::container::{BlockRecord, RecordBuilder};
use crate::error::QdpiError;
use crate::orchestrator::{CombinedStats, EccCodec};
use crate::stats::PerfStats;
use crate::types::Block;
use bytes::Bytes;
use std::ops::RangeInclusive;
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// Run `task` for indices `0..count`, sharding statistics per worker
fn run_sharded<T, F>(codec: &EccCodec, count: usize, task: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize, &mut PerfStats) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    let shards: Vec<(Vec<(usize, T)>, PerfStats)> = (0..count)
        .into_par_iter()
        .fold(
            || (Vec::new(), codec.perf().shard()),
            |(mut out, mut shard), i| {
                out.push((i, task(i, &mut shard)));
                (out, shard)
            },
        )
        .collect();

    #[cfg(not(feature = "parallel"))]
    let shards: Vec<(Vec<(usize, T)>, PerfStats)> = {
        let mut shard = codec.perf().shard();
        let out = (0..count).map(|i| (i, task(i, &mut shard))).collect();
        vec![(out, shard)]
    };

    let mut results = Vec::with_capacity(count);
    for (out, shard) in shards {
        codec.perf().merge(&shard);
        results.extend(out);
    }
    results.sort_unstable_by_key(|(i, _)| *i);
    results.into_iter().map(|(_, t)| t).collect()
}

/// Encode `data` into consecutive blocks starting at `start_id`
///
/// Empty input yields a single empty block so the stream still has a first
/// and last record. Fails with [`QdpiError::BlockIdOverflow`] when the ids
/// would run past `u64::MAX`.
pub fn encode_stream(codec: &EccCodec, data: &[u8], start_id: u64) -> Result<Vec<Block>, QdpiError> {
    let chunks: Vec<&[u8]> = if data.is_empty() {
        vec![data]
    } else {
        data.chunks(DATA_LEN).collect()
    };
    if start_id.checked_add(chunks.len() as u64 - 1).is_none() {
        return Err(QdpiError::BlockIdOverflow {
            start_id,
            blocks: chunks.len(),
        });
    }

    let blocks = run_sharded(codec, chunks.len(), |i, shard| {
        let started = Instant::now();
        let block = codec.outer().encode(chunks[i], start_id + i as u64);
        shard.record_encode(started.elapsed().as_secs_f64() * 1000.0);
        block
    })
    .into_iter()
    .collect::<Result<Vec<_>, _>>()?;

    #[cfg(feature = "logging")]
    debug!(
        "encoded {} bytes into {} blocks (ids {}..={})",
        data.len(),
        blocks.len(),
        start_id,
        start_id + (blocks.len() as u64 - 1)
    );

    Ok(blocks)
}

/// Encode `data` straight into a record stream
pub fn encode_records(
    codec: &EccCodec,
    data: &[u8],
    start_id: u64,
    json: bool,
) -> Result<Vec<Bytes>, QdpiError> {
    let blocks = encode_stream(codec, data, start_id)?;
    let last = blocks.len().saturating_sub(1);
    blocks
        .iter()
        .enumerate()
        .map(|(i, block)| {
            let mut builder = RecordBuilder::new(block);
            if i == 0 {
                builder = builder.mark_first();
            }
            if i == last {
                builder = builder.mark_last();
            }
            if json {
                builder = builder.json();
            }
            builder.build()
        })
        .collect()
}

/// Per-block decode outcome
#[derive(Debug, Clone)]
pub struct BlockOutcome {
    /// Block identifier
    pub block_id: u64,

    /// Flags carried by the block's record
    pub flags: RecordFlags,

    /// Recovered bytes (empty when the block was lost)
    pub data: Vec<u8>,

    /// Decode statistics, or why the block was lost
    pub result: Result<CombinedStats, QdpiError>,
}

/// Result of decoding a batch of records
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Outcomes in block-id order, one per distinct id
    pub blocks: Vec<BlockOutcome>,

    /// Records dropped because their id was already seen
    pub duplicates: usize,
}

impl BatchReport {
    /// Whether every block was recovered, the ids are contiguous and the
    /// stream's first and last blocks are both present
    pub fn is_complete(&self) -> bool {
        self.lost_blocks().is_empty()
            && self.missing_ranges().is_empty()
            && !self.missing_head()
            && !self.missing_tail()
    }

    /// Ids of blocks the outer code could not recover
    pub fn lost_blocks(&self) -> Vec<u64> {
        self.blocks
            .iter()
            .filter(|b| b.result.is_err())
            .map(|b| b.block_id)
            .collect()
    }

    /// Id ranges absent between the lowest and highest block seen
    pub fn missing_ranges(&self) -> Vec<RangeInclusive<u64>> {
        self.blocks
            .windows(2)
            .filter(|pair| pair[1].block_id - pair[0].block_id > 1)
            .map(|pair| pair[0].block_id + 1..=pair[1].block_id - 1)
            .collect()
    }

    /// Number of ids covered by [`missing_ranges`](Self::missing_ranges)
    pub fn missing_count(&self) -> u64 {
        self.missing_ranges()
            .iter()
            .map(|r| r.end() - r.start() + 1)
            .fold(0u64, u64::saturating_add)
    }

    /// Whether the lowest block seen is not the stream's first block
    pub fn missing_head(&self) -> bool {
        self.blocks.first().map_or(true, |b| !b.flags.is_first())
    }

    /// Whether the highest block seen is not the stream's last block
    pub fn missing_tail(&self) -> bool {
        self.blocks.last().map_or(true, |b| !b.flags.is_last())
    }

    /// Total byte errors corrected by the outer code
    pub fn bytes_corrected(&self) -> usize {
        self.blocks
            .iter()
            .filter_map(|b| b.result.as_ref().ok())
            .map(|s| s.outer.errors_corrected)
            .sum()
    }

    /// Rotations flagged by the inner code across all blocks
    pub fn orientation_flags(&self) -> usize {
        self.blocks
            .iter()
            .filter_map(|b| b.result.as_ref().ok())
            .map(|s| s.orientation_errors.len())
            .sum()
    }

    /// Reassembled data
    ///
    /// Fails with the first lost block's error, or with
    /// [`QdpiError::IncompleteStream`] when blocks are missing inside the
    /// stream or at either end.
    pub fn data(&self) -> Result<Vec<u8>, QdpiError> {
        let mut out = Vec::with_capacity(self.blocks.len() * DATA_LEN);
        for block in &self.blocks {
            if let Err(e) = &block.result {
                return Err(e.clone());
            }
            out.extend_from_slice(&block.data);
        }
        let missing_blocks = self.missing_count();
        let missing_head = self.missing_head();
        let missing_tail = self.missing_tail();
        if missing_blocks > 0 || missing_head || missing_tail {
            return Err(QdpiError::IncompleteStream {
                missing_blocks,
                missing_head,
                missing_tail,
            });
        }
        Ok(out)
    }

    /// Reassembled data with lost blocks left out
    pub fn data_lossy(&self) -> Vec<u8> {
        self.blocks
            .iter()
            .filter(|b| b.result.is_ok())
            .flat_map(|b| b.data.iter().copied())
            .collect()
    }
}

/// Decode a set of records, in parallel when available
///
/// Records may arrive in any order; duplicates of an id already seen are
/// dropped.
pub fn decode_stream(codec: &EccCodec, records: &[BlockRecord]) -> BatchReport {
    let mut ordered: Vec<&BlockRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.block_id);
    let before = ordered.len();
    ordered.dedup_by_key(|r| r.block_id);
    let duplicates = before - ordered.len();

    let blocks = run_sharded(codec, ordered.len(), |i, shard| {
        let record = ordered[i];
        match codec.decode_block_into(shard, record.block_id, &record.codeword, record.original_len) {
            Ok((data, stats)) => BlockOutcome {
                block_id: record.block_id,
                flags: record.flags,
                data,
                result: Ok(stats),
            },
            Err(e) => BlockOutcome {
                block_id: record.block_id,
                flags: record.flags,
                data: Vec::new(),
                result: Err(e),
            },
        }
    });

    let report = BatchReport { blocks, duplicates };

    #[cfg(feature = "logging")]
    {
        let lost = report.lost_blocks();
        if lost.is_empty() {
            debug!(
                "decoded {} blocks, {} byte errors corrected",
                report.blocks.len(),
                report.bytes_corrected()
            );
        } else {
            warn!("{} of {} blocks lost: {:?}", lost.len(), report.blocks.len(), lost);
        }
        if report.missing_head() || report.missing_tail() || report.missing_count() > 0 {
            warn!(
                "stream incomplete: missing {:?}, head missing: {}, tail missing: {}",
                report.missing_ranges(),
                report.missing_head(),
                report.missing_tail()
            );
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::decode_record;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    fn records_of(blocks: &[Block]) -> Vec<BlockRecord> {
        let last = blocks.len() - 1;
        blocks
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let mut flags = RecordFlags::NONE;
                if i == 0 {
                    flags |= RecordFlags::IS_FIRST;
                }
                if i == last {
                    flags |= RecordFlags::IS_LAST;
                }
                BlockRecord::from_block(b, RecordFlags::new(flags))
            })
            .collect()
    }

    #[test]
    fn splits_into_223_byte_blocks() {
        let codec = EccCodec::default();
        let blocks = encode_stream(&codec, &sample(500), 10).unwrap();
        let lens: Vec<usize> = blocks.iter().map(|b| b.original_len()).collect();
        assert_eq!(lens, vec![223, 223, 54]);
        let ids: Vec<u64> = blocks.iter().map(|b| b.block_id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
        assert_eq!(codec.performance().blocks_encoded, 3);
    }

    #[test]
    fn empty_input_is_one_block() {
        let codec = EccCodec::default();
        let blocks = encode_stream(&codec, &[], 0).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].original_len(), 0);
    }

    #[test]
    fn round_trip_out_of_order_with_duplicates() {
        let codec = EccCodec::default();
        let data = sample(1000);
        let blocks = encode_stream(&codec, &data, 0).unwrap();
        let mut records = records_of(&blocks);
        records.reverse();
        records.push(records[0].clone());

        let report = decode_stream(&codec, &records);
        assert_eq!(report.duplicates, 1);
        assert!(report.is_complete());
        assert_eq!(report.data().unwrap(), data);
        assert_eq!(codec.performance().blocks_decoded, blocks.len() as u64);
    }

    #[test]
    fn lost_and_missing_blocks_are_reported() {
        let codec = EccCodec::default();
        let data = sample(223 * 4);
        let blocks = encode_stream(&codec, &data, 0).unwrap();
        let mut records = records_of(&blocks);
        records.remove(2);
        let mut bad = records[1].codeword.to_vec();
        for b in bad[..40].iter_mut() {
            *b ^= 0x5A;
        }
        records[1].codeword = Bytes::from(bad);

        let report = decode_stream(&codec, &records);
        assert!(!report.is_complete());
        assert_eq!(report.lost_blocks(), vec![1]);
        assert_eq!(report.missing_ranges(), vec![2..=2]);
        assert_eq!(report.missing_count(), 1);
        assert!(!report.missing_head() && !report.missing_tail());
        assert!(matches!(
            report.data(),
            Err(QdpiError::UncorrectableBlock {
                block_id: Some(1),
                ..
            })
        ));
        assert_eq!(report.data_lossy().len(), 223 * 2);
    }

    #[test]
    fn lost_head_and_tail_are_not_complete() {
        let codec = EccCodec::default();
        let data = sample(700);
        let blocks = encode_stream(&codec, &data, 0).unwrap();
        assert_eq!(blocks.len(), 4);
        let records = records_of(&blocks);

        let middle = decode_stream(&codec, &records[1..3]);
        assert!(middle.missing_head() && middle.missing_tail());
        assert!(middle.missing_ranges().is_empty());
        assert!(!middle.is_complete());
        assert_eq!(
            middle.data(),
            Err(QdpiError::IncompleteStream {
                missing_blocks: 0,
                missing_head: true,
                missing_tail: true,
            })
        );
        assert_eq!(middle.data_lossy(), data[223..669].to_vec());

        let no_tail = decode_stream(&codec, &records[..3]);
        assert!(!no_tail.missing_head());
        assert!(no_tail.missing_tail());
        assert!(no_tail.data().is_err());
    }

    #[test]
    fn distant_ids_report_one_range() {
        let codec = EccCodec::default();
        let mut records = records_of(&encode_stream(&codec, &sample(10), 0).unwrap());
        let far = encode_stream(&codec, &sample(10), 5_000_000).unwrap();
        records.extend(records_of(&far));

        let report = decode_stream(&codec, &records);
        assert_eq!(report.missing_ranges(), vec![1..=4_999_999]);
        assert_eq!(report.missing_count(), 4_999_999);
        assert!(!report.is_complete());
    }

    #[test]
    fn block_id_overflow_is_an_error() {
        let codec = EccCodec::default();
        assert_eq!(
            encode_stream(&codec, &[7; 300], u64::MAX),
            Err(QdpiError::BlockIdOverflow {
                start_id: u64::MAX,
                blocks: 2,
            })
        );
        let last = encode_stream(&codec, &[7; 100], u64::MAX).unwrap();
        assert_eq!(last[0].block_id, u64::MAX);
        assert!(encode_records(&codec, &[7; 300], u64::MAX - 1, false).is_ok());
    }

    #[test]
    fn record_stream_flags() {
        let codec = EccCodec::default();
        let records = encode_records(&codec, &sample(300), 5, true).unwrap();
        assert_eq!(records.len(), 2);
        let first = decode_record(&records[0]).unwrap();
        let last = decode_record(&records[1]).unwrap();
        assert!(first.flags.is_first() && !first.flags.is_last());
        assert!(last.flags.is_last() && last.flags.is_json());
        assert_eq!(last.block_id, 6);
    }
}
