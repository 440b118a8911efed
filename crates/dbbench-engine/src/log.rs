//! Write-ahead log.

use crate::batch::WriteBatch;
use crate::error::{EngineError, Result};
use crate::format::decode_records;
use crate::memtable::MemTable;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub(crate) struct LogWriter {
    path: PathBuf,
    file: BufWriter<File>,
    scratch: Vec<u8>,
}

impl LogWriter {
    pub(crate) fn create(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(EngineError::io(&path))?;
        Ok(Self {
            path,
            file: BufWriter::with_capacity(64 * 1024, file),
            scratch: Vec::new(),
        })
    }

    /// Append every operation of `batch`; with `sync`, persist before returning.
    pub(crate) fn add_batch(&mut self, batch: &WriteBatch, sync: bool) -> Result<()> {
        self.scratch.clear();
        for op in batch.iter() {
            crate::format::encode_record(&mut self.scratch, op.key(), op.value());
        }
        self.file
            .write_all(&self.scratch)
            .map_err(EngineError::io(&self.path))?;

        if sync {
            self.file.flush().map_err(EngineError::io(&self.path))?;
            self.file
                .get_ref()
                .sync_data()
                .map_err(EngineError::io(&self.path))?;
        }
        Ok(())
    }

    pub(crate) fn close(mut self) -> Result<()> {
        self.file.flush().map_err(EngineError::io(&self.path))
    }
}

/// Re-apply the records of the log at `path` to `mem`.
///
/// A torn final record (crash mid-append) is ignored. Returns the number of
/// records applied.
pub(crate) fn replay(path: &Path, mem: &mut MemTable) -> Result<usize> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(EngineError::io(path)(e)),
    };

    let (entries, consumed) =
        decode_records(&data).map_err(|reason| EngineError::corruption(path, reason))?;
    if consumed != data.len() {
        tracing::warn!(
            "Ignoring {} trailing bytes in {}",
            data.len() - consumed,
            path.display()
        );
    }

    for entry in &entries {
        mem.insert(&entry.key, entry.value.as_deref());
    }
    Ok(entries.len())
}
