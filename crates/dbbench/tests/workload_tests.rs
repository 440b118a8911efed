//! End-to-end workload tests against the reference engine.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p dbbench --test workload_tests
//! ```

use dbbench::bench::BenchmarkRunner;
use dbbench::bench::workloads::files_at_level;
use dbbench::config::{BenchmarkConfig, parse_benchmark_list};
use dbbench::generator::RandomGenerator;
use dbbench::results::WorkloadReport;
use dbbench_engine::{
    CompactionControl, Db, DbIterator, Env, LsmDb, LsmEngine, Options, PosixEnv,
    Result as EngineResult, StorageEngine, WritableFile, WriteBatch, WriteOptions,
};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

fn config(dir: &Path, benchmarks: &str, num: u64) -> BenchmarkConfig {
    BenchmarkConfig {
        benchmarks: parse_benchmark_list(benchmarks),
        num,
        value_size: 100,
        compression_ratio: 0.5,
        histogram: false,
        write_buffer_size: 4096,
        db: dir.join("db"),
    }
}

fn env() -> Arc<dyn Env> {
    Arc::new(PosixEnv::new())
}

fn names(reports: &[WorkloadReport]) -> Vec<&str> {
    reports.iter().map(|r| r.name.as_str()).collect()
}

fn forward(db: &LsmDb) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut out = Vec::new();
    let mut it = db.new_iterator();
    it.seek_to_first();
    while it.valid() {
        out.push((it.key().to_vec(), it.value().to_vec()));
        it.next();
    }
    out
}

fn backward(db: &LsmDb) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut it = db.new_iterator();
    it.seek_to_last();
    while it.valid() {
        out.push(it.key().to_vec());
        it.prev();
    }
    out
}

fn key(i: u64) -> Vec<u8> {
    format!("{i:016}").into_bytes()
}

// ============================================================================
// Fill and read workloads
// ============================================================================

#[test]
fn test_fillseq_then_sequential_reads() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), "fillseq,readseq,readreverse", 100);
    let mut runner = BenchmarkRunner::new(&config, LsmEngine, env()).unwrap();

    let reports = runner.run().unwrap();
    assert_eq!(names(&reports), vec!["fillseq", "readseq", "readreverse"]);
    for report in &reports {
        assert_eq!(report.ops, 100);
        assert_eq!(report.bytes, 100 * (16 + 100));
        assert!(report.mb_per_sec.is_some());
        assert!(report.message.ends_with("MB/s"), "{}", report.message);
    }

    let db = runner.db().unwrap();
    let rows = forward(db);
    let mut generator = RandomGenerator::new(0.5);
    assert_eq!(rows.len(), 100);
    for (i, (k, v)) in rows.iter().enumerate() {
        assert_eq!(k, &key(i as u64));
        assert_eq!(v.as_slice(), generator.generate(100));
    }

    let mut expected: Vec<Vec<u8>> = (0..100).map(key).collect();
    expected.reverse();
    assert_eq!(backward(db), expected);
}

#[test]
fn test_overwrite_replaces_keys() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), "fillseq,overwrite", 50);
    let mut runner = BenchmarkRunner::new(&config, LsmEngine, env()).unwrap();

    let reports = runner.run().unwrap();
    assert_eq!(reports[1].ops, 50);
    assert_eq!(forward(runner.db().unwrap()).len(), 50);
}

#[test]
fn test_readrandom_counts_no_bytes() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), "fillrandom,readrandom", 200);
    let mut runner = BenchmarkRunner::new(&config, LsmEngine, env()).unwrap();

    let reports = runner.run().unwrap();
    let read = &reports[1];
    assert_eq!(read.ops, 200);
    assert_eq!(read.bytes, 0);
    assert_eq!(read.mb_per_sec, None);
    assert_eq!(read.message, "");
}

#[test]
fn test_reduced_entry_workloads_note_op_count() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), "fillsync,fill100K", 2000);
    let mut runner = BenchmarkRunner::new(&config, LsmEngine, env()).unwrap();

    let reports = runner.run().unwrap();
    assert_eq!(reports[0].ops, 20);
    assert!(reports[0].message.ends_with("(20 ops)"), "{}", reports[0].message);
    assert_eq!(reports[1].ops, 2);
    assert_eq!(reports[1].bytes, 2 * (100_000 + 16));
    assert!(reports[1].message.ends_with("(2 ops)"), "{}", reports[1].message);
}

// ============================================================================
// Orchestration
// ============================================================================

#[test]
fn test_unknown_names_are_skipped() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), "fillseq,bogus,,readseq", 30);
    let mut runner = BenchmarkRunner::new(&config, LsmEngine, env()).unwrap();

    let reports = runner.run().unwrap();
    assert_eq!(names(&reports), vec!["fillseq", "readseq"]);
    assert_eq!(reports[1].ops, 30);
}

#[test]
fn test_tenth_and_normal_rescale_entries() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), "tenth,fillseq,readseq,normal,fillseq", 100);
    let mut runner = BenchmarkRunner::new(&config, LsmEngine, env()).unwrap();

    let reports = runner.run().unwrap();
    assert_eq!(names(&reports), vec!["fillseq", "readseq", "fillseq"]);
    assert_eq!(reports[0].ops, 10);
    assert!(!reports[0].message.contains("ops)"));
    assert_eq!(reports[1].ops, 10);
    assert_eq!(reports[2].ops, 100);
}

#[test]
fn test_fresh_directive_empties_database() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), "fillseq,fresh,readseq,readseq", 40);
    let mut runner = BenchmarkRunner::new(&config, LsmEngine, env()).unwrap();

    let reports = runner.run().unwrap();
    // done = 0 is reported as a single op with no bytes.
    assert_eq!(reports[1].ops, 1);
    assert_eq!(reports[1].bytes, 0);
    assert_eq!(reports[2].ops, 1);
    assert!(forward(runner.db().unwrap()).is_empty());
}

#[test]
fn test_sync_directive_keeps_data() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), "sync,fillrandom,nosync,overwrite,readseq", 20);
    let mut runner = BenchmarkRunner::new(&config, LsmEngine, env()).unwrap();

    let reports = runner.run().unwrap();
    assert_eq!(names(&reports), vec!["fillrandom", "overwrite", "readseq"]);
    assert!(reports[2].ops <= 20);
}

#[test]
fn test_compact_leaves_level0_empty() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), "fillrandom,compact,readseq", 1000);
    let mut runner = BenchmarkRunner::new(&config, LsmEngine, env()).unwrap();

    let reports = runner.run().unwrap();
    let db = runner.db().unwrap();
    assert_eq!(files_at_level(db, 0), 0);
    assert_eq!(reports[2].ops as usize, forward(db).len());
}

#[test]
fn test_heapprofile_unsupported() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), "heapprofile,heapprofile", 10);
    let mut runner = BenchmarkRunner::new(&config, LsmEngine, env()).unwrap();

    let reports = runner.run().unwrap();
    assert!(reports.iter().all(|r| r.message == "not supported"));
    assert!(!config.db.join("heap-0001").exists());
    assert!(!config.db.join("heap-0002").exists());
}

#[test]
fn test_startup_removes_heap_profiles_and_database() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), "readseq", 10);

    {
        let options = Options {
            create_if_missing: true,
            ..Options::default()
        };
        let mut db = LsmEngine.open(&config.db, &options).unwrap();
        db.put(&WriteOptions::SYNC, b"stale", b"value").unwrap();
    }
    std::fs::write(config.db.join("heap-0003"), b"old profile").unwrap();

    let mut runner = BenchmarkRunner::new(&config, LsmEngine, env()).unwrap();
    assert!(!config.db.exists());

    let reports = runner.run().unwrap();
    assert_eq!(reports[0].ops, 1);
    assert_eq!(reports[0].bytes, 0);
}

#[test]
fn test_histogram_attached_when_enabled() {
    let dir = TempDir::new().unwrap();
    let mut config = config(dir.path(), "fillseq,readrandom", 50);
    config.histogram = true;
    let mut runner = BenchmarkRunner::new(&config, LsmEngine, env()).unwrap();

    let reports = runner.run().unwrap();
    for report in &reports {
        let histogram = report.histogram.as_ref().unwrap();
        assert_eq!(histogram.count(), 50);
    }
}

// ============================================================================
// Engine interaction
// ============================================================================

/// Posix environment whose clock only moves when told to.
#[derive(Default)]
struct ManualClockEnv {
    now: AtomicU64,
    posix: PosixEnv,
}

impl ManualClockEnv {
    fn advance(&self, micros: u64) {
        self.now.fetch_add(micros, Ordering::SeqCst);
    }
}

impl Env for ManualClockEnv {
    fn now_micros(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn get_children(&self, dir: &Path) -> EngineResult<Vec<String>> {
        self.posix.get_children(dir)
    }

    fn delete_file(&self, path: &Path) -> EngineResult<()> {
        self.posix.delete_file(path)
    }

    fn new_writable_file(&self, path: &Path) -> EngineResult<Box<dyn WritableFile>> {
        self.posix.new_writable_file(path)
    }
}

/// Cost charged to the clock by each open and destroy.
const REOPEN_MICROS: u64 = 1_000_000;

/// Wraps [`LsmEngine`], logging the durability of every write and charging
/// opens, destroys and writes to a manual clock.
struct RecordingEngine {
    env: Arc<ManualClockEnv>,
    syncs: Arc<Mutex<Vec<bool>>>,
}

struct RecordingDb {
    inner: LsmDb,
    env: Arc<ManualClockEnv>,
    syncs: Arc<Mutex<Vec<bool>>>,
}

impl StorageEngine for RecordingEngine {
    type Handle = RecordingDb;

    fn open(&self, path: &Path, options: &Options) -> EngineResult<RecordingDb> {
        self.env.advance(REOPEN_MICROS);
        Ok(RecordingDb {
            inner: LsmEngine.open(path, options)?,
            env: Arc::clone(&self.env),
            syncs: Arc::clone(&self.syncs),
        })
    }

    fn destroy(&self, path: &Path) -> EngineResult<()> {
        self.env.advance(REOPEN_MICROS);
        LsmEngine.destroy(path)
    }
}

impl CompactionControl for RecordingDb {
    fn force_flush(&mut self) -> EngineResult<()> {
        self.inner.force_flush()
    }

    fn force_compact_range(&mut self, level: usize, low: &[u8], high: &[u8]) -> EngineResult<()> {
        self.inner.force_compact_range(level, low, high)
    }
}

impl Db for RecordingDb {
    fn write(&mut self, options: &WriteOptions, batch: &WriteBatch) -> EngineResult<()> {
        self.syncs.lock().unwrap().push(options.sync);
        self.env.advance(1);
        self.inner.write(options, batch)
    }

    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn new_iterator(&self) -> Box<dyn DbIterator + '_> {
        self.inner.new_iterator()
    }

    fn property(&self, name: &str) -> Option<String> {
        self.inner.property(name)
    }
}

fn recording_engine() -> (RecordingEngine, Arc<ManualClockEnv>, Arc<Mutex<Vec<bool>>>) {
    let env = Arc::new(ManualClockEnv::default());
    let syncs = Arc::new(Mutex::new(Vec::new()));
    let engine = RecordingEngine {
        env: Arc::clone(&env),
        syncs: Arc::clone(&syncs),
    };
    (engine, env, syncs)
}

#[test]
fn test_fillsync_writes_synchronously() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), "fillsync,fillseq", 500);
    let (engine, env, syncs) = recording_engine();
    let mut runner = BenchmarkRunner::new(&config, engine, env).unwrap();

    runner.run().unwrap();
    let syncs = syncs.lock().unwrap();
    assert_eq!(syncs.len(), 5 + 500);
    assert!(syncs[..5].iter().all(|&sync| sync));
    assert!(syncs[5..].iter().all(|&sync| !sync));
}

#[test]
fn test_sync_directive_switches_durability() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), "sync,fillrandom,nosync,overwrite", 20);
    let (engine, env, syncs) = recording_engine();
    let mut runner = BenchmarkRunner::new(&config, engine, env).unwrap();

    runner.run().unwrap();
    let syncs = syncs.lock().unwrap();
    assert_eq!(syncs.len(), 40);
    assert!(syncs[..20].iter().all(|&sync| sync));
    assert!(syncs[20..].iter().all(|&sync| !sync));
}

#[test]
fn test_fresh_reopen_is_not_timed() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path(), "fillseq,fresh,fillrandom", 10);
    let (engine, env, _syncs) = recording_engine();
    let runner_env: Arc<dyn Env> = Arc::clone(&env) as Arc<dyn Env>;
    let mut runner = BenchmarkRunner::new(&config, engine, runner_env).unwrap();

    let reports = runner.run().unwrap();
    // Only the ten writes advance the clock inside the timed window.
    for report in &reports {
        assert_eq!(report.elapsed_micros, 10, "{}", report.name);
    }
    assert!(env.now_micros() > 2 * REOPEN_MICROS);
}
