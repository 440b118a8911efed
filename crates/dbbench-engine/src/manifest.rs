//! The `MANIFEST` file: which tables are live, at which level, plus file numbering.
//!
//! Plain text, one directive per line:
//!
//! ```text
//! next_file 42
//! log 41
//! table 0 39
//! table 1 17
//! ```

use crate::error::{EngineError, Result};
use crate::filename::{MANIFEST, MANIFEST_TMP};
use crate::NUM_LEVELS;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Manifest {
    pub next_file_number: u64,
    pub log_number: u64,
    /// `(level, table number)` for every live table.
    pub tables: Vec<(usize, u64)>,
}

impl Manifest {
    /// Read the manifest in `dir`, or `None` if the directory has none.
    pub(crate) fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(MANIFEST);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(EngineError::io(&path)(e)),
        };

        let mut manifest = Self::default();
        for (lineno, line) in text.lines().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let bad = || EngineError::corruption(&path, format!("bad line {}: {line:?}", lineno + 1));
            let number = |s: &str| s.parse::<u64>().map_err(|_| bad());

            match fields.as_slice() {
                [] => {}
                ["next_file", n] => manifest.next_file_number = number(*n)?,
                ["log", n] => manifest.log_number = number(*n)?,
                ["table", level, n] => {
                    let level: usize = level.parse().map_err(|_| bad())?;
                    if level >= NUM_LEVELS {
                        return Err(bad());
                    }
                    manifest.tables.push((level, number(*n)?));
                }
                _ => return Err(bad()),
            }
        }
        Ok(Some(manifest))
    }

    /// Atomically replace the manifest in `dir`.
    pub(crate) fn store(&self, dir: &Path) -> Result<()> {
        let mut text = String::new();
        let _ = writeln!(text, "next_file {}", self.next_file_number);
        let _ = writeln!(text, "log {}", self.log_number);
        for (level, number) in &self.tables {
            let _ = writeln!(text, "table {level} {number}");
        }

        let tmp = dir.join(MANIFEST_TMP);
        let path = dir.join(MANIFEST);
        std::fs::write(&tmp, text).map_err(EngineError::io(&tmp))?;
        std::fs::rename(&tmp, &path).map_err(EngineError::io(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_then_load() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest {
            next_file_number: 12,
            log_number: 11,
            tables: vec![(0, 9), (0, 10), (2, 4)],
        };
        manifest.store(dir.path()).unwrap();

        assert_eq!(Manifest::load(dir.path()).unwrap(), Some(manifest));
        assert!(!dir.path().join(MANIFEST_TMP).exists());
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Manifest::load(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_load_rejects_bad_level() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MANIFEST), "next_file 3\ntable 9 1\n").unwrap();
        assert!(matches!(
            Manifest::load(dir.path()),
            Err(EngineError::Corruption { .. })
        ));
    }
}
