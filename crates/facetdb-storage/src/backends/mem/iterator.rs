//! Snapshot iterator over one column family.
//!
//! The iterator materializes a decoded snapshot of the column family's
//! committed rows at creation time; it never observes later commits.

use crate::engine::{RawIterator, StorageError};
use crate::wide::WideColumns;

/// An iterator over a snapshot of one column family, in key order.
pub struct MemIterator {
    entries: Vec<(Vec<u8>, WideColumns)>,
    pos: Option<usize>,
}

impl MemIterator {
    pub(super) fn new(entries: Vec<(Vec<u8>, WideColumns)>) -> Self {
        Self { entries, pos: None }
    }

    /// The number of entries in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RawIterator for MemIterator {
    fn seek(&mut self, target: &[u8]) {
        let pos = self.entries.partition_point(|(k, _)| k.as_slice() < target);
        self.pos = (pos < self.entries.len()).then_some(pos);
    }

    fn seek_to_first(&mut self) {
        self.pos = (!self.entries.is_empty()).then_some(0);
    }

    fn seek_to_last(&mut self) {
        self.pos = self.entries.len().checked_sub(1);
    }

    fn next(&mut self) {
        self.pos = match self.pos {
            Some(pos) if pos + 1 < self.entries.len() => Some(pos + 1),
            _ => None,
        };
    }

    fn prev(&mut self) {
        self.pos = self.pos.and_then(|pos| pos.checked_sub(1));
    }

    fn valid(&self) -> bool {
        self.pos.is_some()
    }

    fn status(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn prepare_value(&mut self) -> bool {
        true
    }

    fn current(&self) -> Option<(&[u8], &WideColumns)> {
        self.pos.and_then(|pos| self.entries.get(pos)).map(|(k, c)| (k.as_slice(), c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iter_over(keys: &[&[u8]]) -> MemIterator {
        MemIterator::new(
            keys.iter().map(|k| (k.to_vec(), WideColumns::from_plain(*k))).collect(),
        )
    }

    #[test]
    fn seek_positions_at_first_key_at_or_after_target() {
        let mut it = iter_over(&[b"a".as_slice(), b"c".as_slice(), b"e".as_slice()]);

        it.seek(b"b");
        assert!(it.valid());
        assert_eq!(it.key(), Some(b"c".as_slice()));

        it.seek(b"c");
        assert_eq!(it.key(), Some(b"c".as_slice()));

        it.seek(b"f");
        assert!(!it.valid());
        assert_eq!(it.key(), None);
    }

    #[test]
    fn forward_and_backward_iteration() {
        let mut it = iter_over(&[b"a".as_slice(), b"b".as_slice(), b"c".as_slice()]);

        it.seek_to_first();
        assert_eq!(it.key(), Some(b"a".as_slice()));
        it.next();
        assert_eq!(it.key(), Some(b"b".as_slice()));
        it.prev();
        assert_eq!(it.key(), Some(b"a".as_slice()));
        it.prev();
        assert!(!it.valid());

        it.seek_to_last();
        assert_eq!(it.key(), Some(b"c".as_slice()));
        it.next();
        assert!(!it.valid());
    }

    #[test]
    fn value_returns_default_column() {
        let mut it = iter_over(&[b"k".as_slice()]);
        it.seek_to_first();
        assert!(it.prepare_value());
        assert_eq!(it.value(), Some(b"k".as_slice()));
        assert!(it.status().is_ok());
    }

    #[test]
    fn empty_snapshot_is_never_valid() {
        let mut it = iter_over(&[]);
        it.seek_to_first();
        assert!(!it.valid());
        it.seek(b"anything");
        assert!(!it.valid());
    }
}
