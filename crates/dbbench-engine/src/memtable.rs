//! In-memory sorted write buffer.

use crate::format::Entry;
use std::collections::BTreeMap;

/// Per-entry bookkeeping overhead counted towards the flush threshold.
const ENTRY_OVERHEAD: usize = 16;

#[derive(Debug, Default)]
pub(crate) struct MemTable {
    map: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    approximate_bytes: usize,
}

impl MemTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record `value` (or a deletion when `None`) for `key`.
    pub(crate) fn insert(&mut self, key: &[u8], value: Option<&[u8]>) {
        self.approximate_bytes += key.len() + value.map_or(0, <[u8]>::len) + ENTRY_OVERHEAD;
        self.map.insert(key.to_vec(), value.map(<[u8]>::to_vec));
    }

    /// `Some(None)` means the key was deleted; `None` means the buffer knows nothing about it.
    pub(crate) fn get(&self, key: &[u8]) -> Option<Option<&[u8]>> {
        self.map.get(key).map(Option::as_deref)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Bytes written since the last flush, including overwritten entries.
    pub(crate) fn approximate_bytes(&self) -> usize {
        self.approximate_bytes
    }

    /// Sorted copy of the current contents.
    pub(crate) fn snapshot(&self) -> Vec<Entry> {
        self.map
            .iter()
            .map(|(key, value)| Entry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }

    /// Drain the buffer into sorted entries, leaving it empty.
    pub(crate) fn take(&mut self) -> Vec<Entry> {
        self.approximate_bytes = 0;
        std::mem::take(&mut self.map)
            .into_iter()
            .map(|(key, value)| Entry { key, value })
            .collect()
    }
}
