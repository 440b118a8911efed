//! Names of the files the engine owns inside a database directory.

use std::path::{Path, PathBuf};

pub(crate) const MANIFEST: &str = "MANIFEST";
pub(crate) const MANIFEST_TMP: &str = "MANIFEST.tmp";
pub(crate) const LOCK: &str = "LOCK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileType {
    Log(u64),
    Table(u64),
    Manifest,
    ManifestTmp,
    Lock,
}

pub(crate) fn log_file(dir: &Path, number: u64) -> PathBuf {
    dir.join(format!("{number:06}.log"))
}

pub(crate) fn table_file(dir: &Path, number: u64) -> PathBuf {
    dir.join(format!("{number:06}.sst"))
}

/// Classify a directory entry; `None` for files the engine does not own.
pub(crate) fn parse(name: &str) -> Option<FileType> {
    match name {
        MANIFEST => return Some(FileType::Manifest),
        MANIFEST_TMP => return Some(FileType::ManifestTmp),
        LOCK => return Some(FileType::Lock),
        _ => {}
    }

    let (stem, ext) = name.split_once('.')?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number = stem.parse().ok()?;
    match ext {
        "log" => Some(FileType::Log(number)),
        "sst" => Some(FileType::Table(number)),
        _ => None,
    }
}
