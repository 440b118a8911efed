//! Reference leveled store.
//!
//! Single-threaded: flushes and compactions run inline on the writing call.
//! Level 0 holds flushed write buffers (possibly overlapping, ordered oldest
//! to newest); deeper levels hold disjoint tables sorted by smallest key.

#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use crate::error::{EngineError, Result};
use crate::filename::{self, FileType};
use crate::format::Entry;
use crate::iterator::SnapshotIter;
use crate::log::{self, LogWriter};
use crate::manifest::Manifest;
use crate::memtable::MemTable;
use crate::table::Table;
use crate::{
    CompactionControl, Db, DbIterator, NUM_FILES_AT_LEVEL_PREFIX, NUM_LEVELS, Options,
    STATS_PROPERTY, StorageEngine, WriteBatch, WriteOptions,
};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Level-0 file count that triggers an automatic level-0 compaction.
const L0_COMPACTION_TRIGGER: usize = 4;

/// Size budget for level `level >= 1`: 10 MiB, 100 MiB, ...
fn max_bytes_for_level(level: usize) -> u64 {
    10u64.pow(level as u32) * (1 << 20)
}

/// Opener for [`LsmDb`] handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct LsmEngine;

impl StorageEngine for LsmEngine {
    type Handle = LsmDb;

    fn open(&self, path: &Path, options: &Options) -> Result<LsmDb> {
        LsmDb::open(path, options.clone())
    }

    fn destroy(&self, path: &Path) -> Result<()> {
        destroy(path)
    }
}

/// An open reference-store database.
pub struct LsmDb {
    dir: PathBuf,
    options: Options,
    mem: MemTable,
    levels: Vec<Vec<Arc<Table>>>,
    log: LogWriter,
    log_number: u64,
    next_file_number: u64,
}

impl LsmDb {
    /// Open the database in `dir`, recovering tables and the write-ahead log.
    pub fn open(dir: &Path, options: Options) -> Result<Self> {
        if !dir.exists() {
            if !options.create_if_missing {
                return Err(EngineError::NotFound(dir.to_path_buf()));
            }
            fs::create_dir_all(dir).map_err(EngineError::io(dir))?;
        }

        let manifest = Manifest::load(dir)?.unwrap_or_default();
        let mut levels: Vec<Vec<Arc<Table>>> = vec![Vec::new(); NUM_LEVELS];
        for &(level, number) in &manifest.tables {
            let table = Table::open(&filename::table_file(dir, number), number)?;
            levels[level].push(Arc::new(table));
        }
        levels[0].sort_by_key(|t| t.number());
        for files in levels.iter_mut().skip(1) {
            files.sort_by(|a, b| a.smallest().cmp(b.smallest()));
        }

        let mut mem = MemTable::new();
        let replayed = if manifest.log_number > 0 {
            log::replay(&filename::log_file(dir, manifest.log_number), &mut mem)?
        } else {
            0
        };

        let mut next_file_number = manifest.next_file_number.max(1);
        let log_number = next_file_number;
        next_file_number += 1;
        let log = LogWriter::create(filename::log_file(dir, log_number))?;

        let mut db = Self {
            dir: dir.to_path_buf(),
            options,
            mem,
            levels,
            log,
            log_number,
            next_file_number,
        };

        if db.mem.is_empty() {
            db.write_manifest()?;
            db.remove_obsolete_files()?;
        } else {
            db.flush_memtable()?;
        }

        tracing::debug!(
            "Opened {} ({} tables, {} log records replayed)",
            db.dir.display(),
            db.levels.iter().map(Vec::len).sum::<usize>(),
            replayed
        );
        Ok(db)
    }

    fn new_file_number(&mut self) -> u64 {
        let number = self.next_file_number;
        self.next_file_number += 1;
        number
    }

    fn level_bytes(&self, level: usize) -> u64 {
        self.levels[level].iter().map(|t| t.file_size()).sum()
    }

    fn write_table(&mut self, entries: Vec<Entry>) -> Result<Arc<Table>> {
        let number = self.new_file_number();
        let path = filename::table_file(&self.dir, number);
        Table::write(&path, number, entries, self.options.compression).map(Arc::new)
    }

    /// Write `entries` as one or more tables of at most `max_file_size` bytes each.
    fn write_tables(&mut self, entries: Vec<Entry>) -> Result<Vec<Arc<Table>>> {
        let mut outputs = Vec::new();
        let mut chunk = Vec::new();
        let mut chunk_bytes = 0;

        for entry in entries {
            chunk_bytes += entry.encoded_len();
            chunk.push(entry);
            if chunk_bytes >= self.options.max_file_size {
                outputs.push(self.write_table(std::mem::take(&mut chunk))?);
                chunk_bytes = 0;
            }
        }
        if !chunk.is_empty() {
            outputs.push(self.write_table(chunk)?);
        }
        Ok(outputs)
    }

    /// Move the write buffer into a new level-0 table and start a fresh log.
    fn flush_memtable(&mut self) -> Result<()> {
        if self.mem.is_empty() {
            return Ok(());
        }

        let entries = self.mem.take();
        let table = self.write_table(entries)?;
        tracing::debug!(
            "Flushed write buffer to table #{} ({} bytes)",
            table.number(),
            table.file_size()
        );
        self.levels[0].push(table);

        let log_number = self.new_file_number();
        let new_log = LogWriter::create(filename::log_file(&self.dir, log_number))?;
        std::mem::replace(&mut self.log, new_log).close()?;
        self.log_number = log_number;

        self.write_manifest()?;
        self.remove_obsolete_files()
    }

    fn maybe_compact(&mut self) -> Result<()> {
        loop {
            if self.levels[0].len() >= L0_COMPACTION_TRIGGER {
                self.compact_level(0, None)?;
                continue;
            }
            let oversized =
                (1..NUM_LEVELS - 1).find(|&level| self.level_bytes(level) > max_bytes_for_level(level));
            match oversized {
                Some(level) => self.compact_level(level, None)?,
                None => return Ok(()),
            }
        }
    }

    /// Merge the files of `level` (those overlapping `range`, or all of them)
    /// with the overlapping files of the next level.
    fn compact_level(&mut self, level: usize, range: Option<(&[u8], &[u8])>) -> Result<()> {
        let selected = |t: &Arc<Table>| range.is_none_or(|(low, high)| t.overlaps(low, high));

        // Level-0 files may overlap each other, so either all of them move or none.
        let inputs: Vec<Arc<Table>> = if level == 0 {
            if self.levels[0].iter().any(|t| selected(t)) {
                self.levels[0].iter().rev().cloned().collect()
            } else {
                Vec::new()
            }
        } else {
            self.levels[level].iter().filter(|t| selected(t)).cloned().collect()
        };
        if inputs.is_empty() {
            return Ok(());
        }

        let output_level = (level + 1).min(NUM_LEVELS - 1);
        let smallest = inputs.iter().map(|t| t.smallest()).min().unwrap_or_default().to_vec();
        let largest = inputs.iter().map(|t| t.largest()).max().unwrap_or_default().to_vec();
        let next_inputs: Vec<Arc<Table>> = if output_level == level {
            Vec::new()
        } else {
            self.levels[output_level]
                .iter()
                .filter(|t| t.overlaps(&smallest, &largest))
                .cloned()
                .collect()
        };

        let drop_deletions = self.levels[output_level + 1..].iter().all(Vec::is_empty);
        let sources: Vec<&[Entry]> = inputs
            .iter()
            .chain(&next_inputs)
            .map(|t| &t.entries()[..])
            .collect();
        let merged = merge_newest_wins(&sources, drop_deletions);
        let merged_len = merged.len();
        let outputs = self.write_tables(merged)?;

        let consumed: HashSet<u64> = inputs.iter().chain(&next_inputs).map(|t| t.number()).collect();
        for files in &mut self.levels {
            files.retain(|t| !consumed.contains(&t.number()));
        }
        let output_count = outputs.len();
        self.levels[output_level].extend(outputs);
        self.levels[output_level].sort_by(|a, b| a.smallest().cmp(b.smallest()));

        tracing::debug!(
            "Compacted {} files at level {} + {} files at level {} into {} files ({} entries)",
            inputs.len(),
            level,
            next_inputs.len(),
            output_level,
            output_count,
            merged_len
        );

        self.write_manifest()?;
        self.remove_obsolete_files()
    }

    fn write_manifest(&self) -> Result<()> {
        let tables = self
            .levels
            .iter()
            .enumerate()
            .flat_map(|(level, files)| files.iter().map(move |t| (level, t.number())))
            .collect();
        Manifest {
            next_file_number: self.next_file_number,
            log_number: self.log_number,
            tables,
        }
        .store(&self.dir)
    }

    /// Delete logs other than the current one and tables no longer referenced.
    fn remove_obsolete_files(&self) -> Result<()> {
        let live: HashSet<u64> = self.levels.iter().flatten().map(|t| t.number()).collect();
        let entries = fs::read_dir(&self.dir).map_err(EngineError::io(&self.dir))?;

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let obsolete = match filename::parse(name) {
                Some(FileType::Log(number)) => number != self.log_number,
                Some(FileType::Table(number)) => !live.contains(&number),
                _ => false,
            };
            if obsolete {
                tracing::trace!("Removing obsolete file {name}");
                if let Err(e) = fs::remove_file(entry.path()) {
                    tracing::warn!("Failed to remove obsolete file {}: {}", name, e);
                }
            }
        }
        Ok(())
    }

    fn stats(&self) -> String {
        let mut out = String::from("Level  Files Size(MB)\n--------------------\n");
        for (level, files) in self.levels.iter().enumerate() {
            if files.is_empty() {
                continue;
            }
            let _ = writeln!(
                out,
                "{:>5} {:>6} {:>8.1}",
                level,
                files.len(),
                self.level_bytes(level) as f64 / 1_048_576.0
            );
        }
        out
    }
}

impl Db for LsmDb {
    fn write(&mut self, options: &WriteOptions, batch: &WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        self.log.add_batch(batch, options.sync)?;
        for op in batch.iter() {
            self.mem.insert(op.key(), op.value());
        }

        if self.mem.approximate_bytes() >= self.options.write_buffer_size {
            self.flush_memtable()?;
            self.maybe_compact()?;
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.mem.get(key) {
            return Ok(value.map(<[u8]>::to_vec));
        }
        for table in self.levels[0].iter().rev() {
            if let Some(entry) = table.get(key) {
                return Ok(entry.value.clone());
            }
        }
        for files in &self.levels[1..] {
            let idx = files.partition_point(|t| t.largest() < key);
            if let Some(table) = files.get(idx)
                && table.smallest() <= key
                && let Some(entry) = table.get(key)
            {
                return Ok(entry.value.clone());
            }
        }
        Ok(None)
    }

    fn new_iterator(&self) -> Box<dyn DbIterator + '_> {
        let mut children: Vec<Arc<[Entry]>> = vec![self.mem.snapshot().into()];
        children.extend(self.levels[0].iter().rev().map(|t| Arc::clone(t.entries())));
        for files in &self.levels[1..] {
            children.extend(files.iter().map(|t| Arc::clone(t.entries())));
        }
        Box::new(SnapshotIter::new(children))
    }

    fn property(&self, name: &str) -> Option<String> {
        if let Some(level) = name.strip_prefix(NUM_FILES_AT_LEVEL_PREFIX) {
            let level: usize = level.parse().ok()?;
            return self.levels.get(level).map(|files| files.len().to_string());
        }
        (name == STATS_PROPERTY).then(|| self.stats())
    }
}

impl CompactionControl for LsmDb {
    fn force_flush(&mut self) -> Result<()> {
        self.flush_memtable()
    }

    fn force_compact_range(&mut self, level: usize, low: &[u8], high: &[u8]) -> Result<()> {
        if level >= NUM_LEVELS {
            return Err(EngineError::InvalidArgument(format!(
                "compaction level {level} out of range (0..{NUM_LEVELS})"
            )));
        }
        self.compact_level(level, Some((low, high)))
    }
}

/// K-way merge of sorted sources ordered newest first; the newest version of
/// each key survives. Deletion markers are dropped when `drop_deletions` is set.
fn merge_newest_wins(sources: &[&[Entry]], drop_deletions: bool) -> Vec<Entry> {
    let mut pos = vec![0usize; sources.len()];
    let mut out = Vec::with_capacity(sources.iter().map(|s| s.len()).sum());

    loop {
        let mut best: Option<usize> = None;
        for (i, source) in sources.iter().enumerate() {
            let Some(entry) = source.get(pos[i]) else {
                continue;
            };
            match best {
                Some(b) if sources[b][pos[b]].key <= entry.key => {}
                _ => best = Some(i),
            }
        }
        let Some(b) = best else {
            break;
        };

        let entry = sources[b][pos[b]].clone();
        for (i, source) in sources.iter().enumerate() {
            if source.get(pos[i]).is_some_and(|e| e.key == entry.key) {
                pos[i] += 1;
            }
        }
        if !(drop_deletions && entry.value.is_none()) {
            out.push(entry);
        }
    }
    out
}

/// Remove every engine-owned file under `dir`, then `dir` itself if empty.
pub(crate) fn destroy(dir: &Path) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(EngineError::io(dir)(e)),
    };

    for entry in entries {
        let entry = entry.map_err(EngineError::io(dir))?;
        let owned = entry
            .file_name()
            .to_str()
            .is_some_and(|name| filename::parse(name).is_some());
        if owned {
            let path = entry.path();
            fs::remove_file(&path).map_err(EngineError::io(&path))?;
        }
    }

    if let Err(e) = fs::remove_dir(dir) {
        tracing::debug!("Keeping {} after destroy: {}", dir.display(), e);
    }
    Ok(())
}
