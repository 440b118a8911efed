//! Storage engine and environment interfaces consumed by the `dbbench` harness.
//!
//! The harness only talks to the traits defined here:
//!
//! - [`StorageEngine`] opens and destroys databases on disk.
//! - [`Db`] is an open handle: batched writes, point lookups, ordered
//!   iteration and property introspection.
//! - [`CompactionControl`] exposes the flush/compaction triggers that
//!   benchmarks use to force a fully compacted state.
//! - [`Env`] abstracts the clock and the handful of file operations the
//!   harness needs (heap profile dumps, cleanup of stale files).
//!
//! [`LsmEngine`] / [`LsmDb`] is a small single-threaded leveled store that
//! implements all of the above so the harness runs end to end, and
//! [`PosixEnv`] is the default environment.

pub mod batch;
pub mod env;
pub mod error;
mod filename;
mod format;
mod iterator;
mod log;
mod lsm;
mod manifest;
mod memtable;
mod table;

pub use batch::{BatchOp, WriteBatch};
pub use env::{Env, PosixEnv, PosixWritableFile, WritableFile};
pub use error::{EngineError, Result};
pub use lsm::{LsmDb, LsmEngine};

use std::path::Path;

/// Engine version reported in benchmark headers.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of levels in the leveled layout.
pub const NUM_LEVELS: usize = 7;

/// Property prefix for per-level file counts, e.g. `leveldb.num-files-at-level2`.
pub const NUM_FILES_AT_LEVEL_PREFIX: &str = "leveldb.num-files-at-level";

/// Property name for the per-level summary table.
pub const STATS_PROPERTY: &str = "leveldb.stats";

/// Block compression applied to table files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Store table bodies verbatim.
    None,
    /// zlib-compress table bodies.
    #[default]
    Zlib,
}

/// Options controlling how a database is opened.
#[derive(Debug, Clone)]
pub struct Options {
    /// Create the database directory if it does not exist.
    pub create_if_missing: bool,
    /// Bytes buffered in memory before the write buffer is flushed to a table.
    pub write_buffer_size: usize,
    /// Upper bound on the size of a single compaction output file.
    pub max_file_size: usize,
    /// Compression applied to table files.
    pub compression: Compression,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: false,
            write_buffer_size: 4 << 20,
            max_file_size: 2 << 20,
            compression: Compression::Zlib,
        }
    }
}

/// Durability mode for a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// Block until the write-ahead log has been persisted to stable storage.
    pub sync: bool,
}

impl WriteOptions {
    /// Asynchronous (in-memory commit) writes.
    pub const ASYNC: Self = Self { sync: false };
    /// Synchronous (persisted) writes.
    pub const SYNC: Self = Self { sync: true };
}

/// Opens and destroys databases.
pub trait StorageEngine {
    /// The handle type returned by [`StorageEngine::open`].
    type Handle: Db;

    /// Open (or create, per `options`) the database at `path`.
    fn open(&self, path: &Path, options: &Options) -> Result<Self::Handle>;

    /// Remove all on-disk state the engine owns under `path`.
    ///
    /// Files the engine does not recognize are left in place. A missing
    /// directory is not an error.
    fn destroy(&self, path: &Path) -> Result<()>;
}

/// Test-oriented compaction triggers exposed directly on the handle.
pub trait CompactionControl {
    /// Flush the in-memory write buffer to a level-0 table, if it holds data.
    fn force_flush(&mut self) -> Result<()>;

    /// Compact every file at `level` overlapping `[low, high]` into the next level.
    fn force_compact_range(&mut self, level: usize, low: &[u8], high: &[u8]) -> Result<()>;
}

/// An open database handle.
pub trait Db: CompactionControl {
    /// Apply every operation in `batch` atomically with respect to this handle.
    fn write(&mut self, options: &WriteOptions, batch: &WriteBatch) -> Result<()>;

    /// Look up `key`. Absence is `Ok(None)`, not an error.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Create an iterator over a consistent snapshot of the key space.
    ///
    /// The iterator starts unpositioned; call one of the seek methods first.
    fn new_iterator(&self) -> Box<dyn DbIterator + '_>;

    /// Engine-internal metric, or `None` for an unknown property.
    fn property(&self, name: &str) -> Option<String>;

    /// Convenience wrapper writing a single key/value pair.
    fn put(&mut self, options: &WriteOptions, key: &[u8], value: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(options, &batch)
    }

    /// Convenience wrapper deleting a single key.
    fn delete(&mut self, options: &WriteOptions, key: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(options, &batch)
    }
}

/// Bidirectional cursor over the sorted key space of a [`Db`].
///
/// `key` and `value` may only be called while [`DbIterator::valid`] is true;
/// an invalid iterator yields empty slices.
pub trait DbIterator {
    fn valid(&self) -> bool;
    fn seek_to_first(&mut self);
    fn seek_to_last(&mut self);
    /// Position at the first key at or after `target`.
    fn seek(&mut self, target: &[u8]);
    fn next(&mut self);
    fn prev(&mut self);
    fn key(&self) -> &[u8];
    fn value(&self) -> &[u8];
}
