//! Process environment: clock, directory listing and file creation.

use crate::error::{EngineError, Result};
use quanta::{Clock, Instant};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// An append-only output file.
pub trait WritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    /// Flush and persist to stable storage.
    fn sync(&mut self) -> Result<()>;
}

/// Operating-system services used by the benchmark harness.
pub trait Env: Send + Sync {
    /// Monotonic clock in microseconds since an arbitrary, fixed origin.
    fn now_micros(&self) -> u64;

    /// Names (not paths) of the entries in `dir`.
    fn get_children(&self, dir: &Path) -> Result<Vec<String>>;

    fn delete_file(&self, path: &Path) -> Result<()>;

    /// Create (or truncate) `path` for writing.
    fn new_writable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>>;

    /// Dump a heap profile of the current process into `sink`.
    ///
    /// Returns `Ok(false)` when the environment cannot produce heap profiles.
    fn heap_profile(&self, _sink: &mut dyn WritableFile) -> Result<bool> {
        Ok(false)
    }
}

/// Buffered local file.
pub struct PosixWritableFile {
    path: PathBuf,
    file: BufWriter<File>,
}

impl PosixWritableFile {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(EngineError::io(path))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: BufWriter::new(file),
        })
    }
}

impl WritableFile for PosixWritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data).map_err(EngineError::io(&self.path))
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush().map_err(EngineError::io(&self.path))
    }

    fn sync(&mut self) -> Result<()> {
        self.flush()?;
        self.file
            .get_ref()
            .sync_all()
            .map_err(EngineError::io(&self.path))
    }
}

/// Default environment backed by the local filesystem and a TSC-calibrated clock.
pub struct PosixEnv {
    clock: Clock,
    origin: Instant,
}

impl PosixEnv {
    pub fn new() -> Self {
        let clock = Clock::new();
        let origin = clock.now();
        Self { clock, origin }
    }
}

impl Default for PosixEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Env for PosixEnv {
    #[allow(clippy::cast_possible_truncation)]
    fn now_micros(&self) -> u64 {
        self.clock.now().duration_since(self.origin).as_micros() as u64
    }

    fn get_children(&self, dir: &Path) -> Result<Vec<String>> {
        let entries = fs::read_dir(dir).map_err(EngineError::io(dir))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(EngineError::io(dir))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_owned());
            }
        }
        Ok(names)
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(EngineError::io(path))
    }

    fn new_writable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        Ok(Box::new(PosixWritableFile::create(path)?))
    }
}
