//! Workload implementations.
//!
//! Every workload drives the engine through the `Db` trait object and reports
//! progress through the [`Recorder`]; engine errors are returned with context
//! and end the run.

use crate::bench::{KEY_SIZE, Recorder};
use crate::generator::RandomGenerator;
use anyhow::{Context, Result};
use dbbench_engine::{Db, Env, NUM_FILES_AT_LEVEL_PREFIX, NUM_LEVELS, WriteBatch, WriteOptions};
use rand::Rng;
use std::fmt::Write as _;
use std::path::Path;

/// Key range used by the compaction workload.
const COMPACT_RANGE: (&[u8], &[u8]) = (b"", b"~");

/// How write workloads pick keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrder {
    Sequential,
    Random,
}

/// Parameters of a fill workload.
#[derive(Debug, Clone, Copy)]
pub struct WriteParams {
    pub order: KeyOrder,
    /// Entries to write.
    pub entries: u64,
    /// The current entry count; a different `entries` is noted in the report.
    pub num: u64,
    /// Random keys are drawn from `[0, key_space)`.
    pub key_space: u64,
    pub value_size: usize,
    pub options: WriteOptions,
}

/// Format `k` as a 16-digit zero-padded key into `buf`.
pub fn format_key(buf: &mut String, k: u64) {
    buf.clear();
    let _ = write!(buf, "{k:016}");
}

fn pick_key(order: KeyOrder, i: u64, key_space: u64, rng: &mut impl Rng) -> u64 {
    match order {
        KeyOrder::Sequential => i,
        KeyOrder::Random => rng.random_range(0..key_space.max(1)),
    }
}

/// Write `params.entries` single-entry batches.
pub fn write(
    db: &mut dyn Db,
    generator: &mut RandomGenerator,
    rng: &mut impl Rng,
    recorder: &mut Recorder,
    params: &WriteParams,
) -> Result<()> {
    if params.entries != params.num {
        recorder.set_message(format!("({} ops)", params.entries));
    }

    let mut batch = WriteBatch::new();
    let mut key = String::with_capacity(KEY_SIZE);
    for i in 0..params.entries {
        let k = pick_key(params.order, i, params.key_space, rng);
        format_key(&mut key, k);

        batch.clear();
        batch.put(&key, generator.generate(params.value_size));
        db.write(&params.options, &batch)
            .with_context(|| format!("put error for key {key}"))?;

        recorder.add_bytes((params.value_size + key.len()) as u64);
        recorder.finished_single_op();
    }
    Ok(())
}

/// Walk up to `num` entries forward from the first key.
pub fn read_sequential(db: &dyn Db, recorder: &mut Recorder, num: u64) {
    let mut iter = db.new_iterator();
    iter.seek_to_first();
    let mut i = 0;
    while i < num && iter.valid() {
        recorder.add_bytes((iter.key().len() + iter.value().len()) as u64);
        recorder.finished_single_op();
        i += 1;
        iter.next();
    }
}

/// Walk up to `num` entries backward from the last key.
pub fn read_reverse(db: &dyn Db, recorder: &mut Recorder, num: u64) {
    let mut iter = db.new_iterator();
    iter.seek_to_last();
    let mut i = 0;
    while i < num && iter.valid() {
        recorder.add_bytes((iter.key().len() + iter.value().len()) as u64);
        recorder.finished_single_op();
        i += 1;
        iter.prev();
    }
}

/// `num` point lookups of random keys in `[0, key_space)`; misses are fine.
pub fn read_random(
    db: &dyn Db,
    rng: &mut impl Rng,
    recorder: &mut Recorder,
    num: u64,
    key_space: u64,
) -> Result<()> {
    let mut key = String::with_capacity(KEY_SIZE);
    for _ in 0..num {
        format_key(&mut key, rng.random_range(0..key_space.max(1)));
        db.get(key.as_bytes())
            .with_context(|| format!("get error for key {key}"))?;
        recorder.finished_single_op();
    }
    Ok(())
}

/// File count reported for `level`, or 0 when the property is unavailable.
pub fn files_at_level(db: &dyn Db, level: usize) -> usize {
    db.property(&format!("{NUM_FILES_AT_LEVEL_PREFIX}{level}"))
        .and_then(|count| count.trim().parse().ok())
        .unwrap_or(0)
}

/// Flush the write buffer, then compact every level up to and including the
/// deepest populated one. Returns that level, if any.
pub fn compact(db: &mut dyn Db) -> Result<Option<usize>> {
    db.force_flush().context("compaction error: flush")?;

    let highest = (0..NUM_LEVELS)
        .rev()
        .find(|&level| files_at_level(db, level) > 0);
    if let Some(highest) = highest {
        let (low, high) = COMPACT_RANGE;
        for level in 0..=highest {
            db.force_compact_range(level, low, high)
                .with_context(|| format!("compaction error: level {level}"))?;
        }
    }
    Ok(highest)
}

/// Dump a heap profile into `dir/heap-NNNN`.
///
/// Failure to create the file, or an environment without heap profiling,
/// only sets the status message.
pub fn heap_profile(env: &dyn Env, dir: &Path, sequence: u32, recorder: &mut Recorder) {
    let path = dir.join(format!("heap-{sequence:04}"));
    let mut file = match env.new_writable_file(&path) {
        Ok(file) => file,
        Err(e) => {
            recorder.set_message(e.to_string());
            return;
        }
    };

    let dumped = match env.heap_profile(file.as_mut()) {
        Ok(dumped) => dumped,
        Err(e) => {
            tracing::warn!("Heap profile failed: {}", e);
            false
        }
    };
    let closed = file.sync();
    drop(file);

    if !dumped {
        recorder.set_message("not supported");
        if let Err(e) = env.delete_file(&path) {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
        }
    } else if let Err(e) = closed {
        recorder.set_message(e.to_string());
    }
}
