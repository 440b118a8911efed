//! Snapshot iterator merging the write buffer and every table, newest first.
//!
//! Children are ordered newest to oldest; when several children hold the
//! same key the lowest-index child wins. Deletion markers hide the key.
//!
//! Position invariants per direction:
//! - forward: `pos[i]` is the index of the first entry in child `i` whose key
//!   is `>=` the current key;
//! - reverse: `pos[i]` is the number of entries in child `i` whose key is
//!   `<=` the current key (so the candidate is `pos[i] - 1`).

use crate::format::Entry;
use crate::DbIterator;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverse,
}

pub(crate) struct SnapshotIter {
    children: Vec<Arc<[Entry]>>,
    pos: Vec<usize>,
    direction: Direction,
    /// `(child, index)` of the visible entry the iterator is positioned on.
    current: Option<(usize, usize)>,
}

impl SnapshotIter {
    pub(crate) fn new(children: Vec<Arc<[Entry]>>) -> Self {
        let pos = vec![0; children.len()];
        Self {
            children,
            pos,
            direction: Direction::Forward,
            current: None,
        }
    }

    fn current_entry(&self) -> Option<&Entry> {
        self.current.map(|(c, i)| &self.children[c][i])
    }

    /// Child holding the smallest key at or after each forward position.
    fn smallest_child(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, child) in self.children.iter().enumerate() {
            let Some(entry) = child.get(self.pos[i]) else {
                continue;
            };
            match best {
                Some(b) if self.children[b][self.pos[b]].key <= entry.key => {}
                _ => best = Some(i),
            }
        }
        best
    }

    /// Child holding the largest key at or before each reverse position.
    fn largest_child(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, child) in self.children.iter().enumerate() {
            if self.pos[i] == 0 {
                continue;
            }
            let entry = &child[self.pos[i] - 1];
            match best {
                Some(b) if self.children[b][self.pos[b] - 1].key >= entry.key => {}
                _ => best = Some(i),
            }
        }
        best
    }

    /// Move every forward position sitting on `key` past it.
    fn skip_forward(&mut self, key: &[u8]) {
        for (i, child) in self.children.iter().enumerate() {
            if child.get(self.pos[i]).is_some_and(|e| e.key == key) {
                self.pos[i] += 1;
            }
        }
    }

    /// Move every reverse position sitting on `key` before it.
    fn skip_reverse(&mut self, key: &[u8]) {
        for (i, child) in self.children.iter().enumerate() {
            if self.pos[i] > 0 && child[self.pos[i] - 1].key == key {
                self.pos[i] -= 1;
            }
        }
    }

    fn find_visible_forward(&mut self) {
        self.direction = Direction::Forward;
        loop {
            let Some(c) = self.smallest_child() else {
                self.current = None;
                return;
            };
            let child = Arc::clone(&self.children[c]);
            let entry = &child[self.pos[c]];
            if entry.value.is_some() {
                self.current = Some((c, self.pos[c]));
                return;
            }
            self.skip_forward(&entry.key);
        }
    }

    fn find_visible_reverse(&mut self) {
        self.direction = Direction::Reverse;
        loop {
            let Some(c) = self.largest_child() else {
                self.current = None;
                return;
            };
            let child = Arc::clone(&self.children[c]);
            let entry = &child[self.pos[c] - 1];
            if entry.value.is_some() {
                self.current = Some((c, self.pos[c] - 1));
                return;
            }
            self.skip_reverse(&entry.key);
        }
    }
}

impl DbIterator for SnapshotIter {
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn seek_to_first(&mut self) {
        self.pos.fill(0);
        self.find_visible_forward();
    }

    fn seek_to_last(&mut self) {
        for (pos, child) in self.pos.iter_mut().zip(&self.children) {
            *pos = child.len();
        }
        self.find_visible_reverse();
    }

    fn seek(&mut self, target: &[u8]) {
        for (pos, child) in self.pos.iter_mut().zip(&self.children) {
            *pos = child.partition_point(|e| e.key.as_slice() < target);
        }
        self.find_visible_forward();
    }

    fn next(&mut self) {
        let Some((c, i)) = self.current else {
            return;
        };
        let child = Arc::clone(&self.children[c]);
        let key = child[i].key.as_slice();

        if self.direction == Direction::Reverse {
            for (pos, other) in self.pos.iter_mut().zip(&self.children) {
                *pos = other.partition_point(|e| e.key.as_slice() <= key);
            }
        } else {
            self.skip_forward(key);
        }
        self.find_visible_forward();
    }

    fn prev(&mut self) {
        let Some((c, i)) = self.current else {
            return;
        };
        let child = Arc::clone(&self.children[c]);
        let key = child[i].key.as_slice();

        if self.direction == Direction::Forward {
            for (pos, other) in self.pos.iter_mut().zip(&self.children) {
                *pos = other.partition_point(|e| e.key.as_slice() < key);
            }
        } else {
            self.skip_reverse(key);
        }
        self.find_visible_reverse();
    }

    fn key(&self) -> &[u8] {
        self.current_entry()
            .map(|e| e.key.as_slice())
            .unwrap_or_default()
    }

    fn value(&self) -> &[u8] {
        self.current_entry()
            .and_then(|e| e.value.as_deref())
            .unwrap_or_default()
    }
}
