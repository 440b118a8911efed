//! Immutable sorted table files.
//!
//! A table is `magic | flags:u8 | body`, where the body is a sequence of
//! records (see `format`) in strictly ascending key order, optionally
//! zlib-compressed. Tables are loaded fully into memory and shared through
//! `Arc`, so iterators keep reading a table after it has been compacted away.

use crate::error::{EngineError, Result};
use crate::format::{decode_records, encode_record, Entry};
use crate::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

const TABLE_MAGIC: &[u8; 4] = b"DBBT";
const FLAG_ZLIB: u8 = 1;
const HEADER_LEN: usize = TABLE_MAGIC.len() + 1;

#[derive(Debug)]
pub(crate) struct Table {
    number: u64,
    entries: Arc<[Entry]>,
    file_size: u64,
}

impl Table {
    /// Write `entries` (sorted, non-empty) to `path` and return the loaded table.
    pub(crate) fn write(
        path: &Path,
        number: u64,
        entries: Vec<Entry>,
        compression: Compression,
    ) -> Result<Self> {
        if entries.is_empty() {
            return Err(EngineError::InvalidArgument(format!(
                "refusing to write empty table {}",
                path.display()
            )));
        }

        let mut body = Vec::with_capacity(entries.iter().map(Entry::encoded_len).sum());
        for entry in &entries {
            encode_record(&mut body, &entry.key, entry.value.as_deref());
        }

        let (flags, body) = match compression {
            Compression::None => (0, body),
            Compression::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
                encoder.write_all(&body).map_err(EngineError::io(path))?;
                (FLAG_ZLIB, encoder.finish().map_err(EngineError::io(path))?)
            }
        };

        let mut file = File::create(path).map_err(EngineError::io(path))?;
        file.write_all(TABLE_MAGIC).map_err(EngineError::io(path))?;
        file.write_all(&[flags]).map_err(EngineError::io(path))?;
        file.write_all(&body).map_err(EngineError::io(path))?;
        file.sync_all().map_err(EngineError::io(path))?;

        Ok(Self {
            number,
            entries: entries.into(),
            file_size: (HEADER_LEN + body.len()) as u64,
        })
    }

    /// Load a table previously produced by [`Table::write`].
    pub(crate) fn open(path: &Path, number: u64) -> Result<Self> {
        let data = std::fs::read(path).map_err(EngineError::io(path))?;
        if data.len() < HEADER_LEN || &data[..TABLE_MAGIC.len()] != TABLE_MAGIC {
            return Err(EngineError::corruption(path, "not a table file"));
        }

        let flags = data[TABLE_MAGIC.len()];
        let body = match flags {
            0 => data[HEADER_LEN..].to_vec(),
            FLAG_ZLIB => {
                let mut decoded = Vec::new();
                ZlibDecoder::new(&data[HEADER_LEN..])
                    .read_to_end(&mut decoded)
                    .map_err(EngineError::io(path))?;
                decoded
            }
            other => {
                return Err(EngineError::corruption(
                    path,
                    format!("unknown table flags {other:#x}"),
                ));
            }
        };

        let (entries, consumed) =
            decode_records(&body).map_err(|reason| EngineError::corruption(path, reason))?;
        if consumed != body.len() {
            return Err(EngineError::corruption(path, "truncated record"));
        }
        if entries.is_empty() {
            return Err(EngineError::corruption(path, "empty table"));
        }
        if entries.windows(2).any(|w| w[0].key >= w[1].key) {
            return Err(EngineError::corruption(path, "keys out of order"));
        }

        Ok(Self {
            number,
            entries: entries.into(),
            file_size: data.len() as u64,
        })
    }

    pub(crate) fn number(&self) -> u64 {
        self.number
    }

    pub(crate) fn entries(&self) -> &Arc<[Entry]> {
        &self.entries
    }

    pub(crate) fn file_size(&self) -> u64 {
        self.file_size
    }

    pub(crate) fn smallest(&self) -> &[u8] {
        &self.entries[0].key
    }

    pub(crate) fn largest(&self) -> &[u8] {
        &self.entries[self.entries.len() - 1].key
    }

    /// Whether this table's key range intersects `[low, high]`.
    pub(crate) fn overlaps(&self, low: &[u8], high: &[u8]) -> bool {
        self.smallest() <= high && self.largest() >= low
    }

    /// The entry stored for `key`, including deletion markers.
    pub(crate) fn get(&self, key: &[u8]) -> Option<&Entry> {
        self.entries
            .binary_search_by(|e| e.key.as_slice().cmp(key))
            .ok()
            .map(|idx| &self.entries[idx])
    }
}
