//! Prefix-bounded cursor over a secondary column family.
//!
//! A [`SecondaryIndexIterator`] finds the primary keys matching a search
//! target. [`seek`](SecondaryIndexIterator::seek) derives the target's
//! secondary key prefix through the index's hooks and positions the
//! underlying iterator there; the cursor then stays valid exactly while the
//! underlying key carries that prefix, and exposes primary keys by
//! stripping it.
//!
//! Seek-to-first/last and seek-for-prev have no meaning for a target-driven
//! lookup and are intentionally absent.

use facetdb_storage::{RawIterator, WideColumns};

use crate::error::Result;
use crate::index::SecondaryIndex;

/// A cursor over one secondary index, yielding primary keys.
///
/// Owns the underlying iterator (created over the index's secondary column
/// family) and borrows the index for prefix derivation.
pub struct SecondaryIndexIterator<'a, I: RawIterator> {
    index: &'a dyn SecondaryIndex,
    inner: I,
    prefix: Vec<u8>,
}

impl<'a, I: RawIterator> SecondaryIndexIterator<'a, I> {
    /// Create a cursor from an index and an iterator over the index's
    /// secondary column family.
    pub fn new(index: &'a dyn SecondaryIndex, inner: I) -> Self {
        Self { index, inner, prefix: Vec::new() }
    }

    /// Query the index with the given search target.
    ///
    /// The target is handed to the index's prefix hooks with an empty
    /// primary key; the derived prefix bounds all subsequent iteration.
    ///
    /// # Errors
    ///
    /// Propagates prefix-derivation failures from the index.
    pub fn seek(&mut self, target: &[u8]) -> Result<()> {
        let prefix = self.index.secondary_key_prefix(b"", target)?;
        let prefix = self.index.finalize_secondary_key_prefix(prefix)?;
        self.inner.seek(&prefix);
        self.prefix = prefix;
        Ok(())
    }

    /// Whether the cursor is positioned on an entry matching the search
    /// target.
    #[must_use]
    pub fn valid(&self) -> bool {
        match self.inner.key() {
            Some(key) => key.starts_with(&self.prefix),
            None => false,
        }
    }

    /// Advance to the next entry; validity is re-checked against the
    /// prefix.
    pub fn next(&mut self) {
        self.inner.next();
    }

    /// Move back to the previous entry; validity is re-checked against the
    /// prefix.
    pub fn prev(&mut self) {
        self.inner.prev();
    }

    /// The primary key of the current entry (the underlying key with the
    /// prefix stripped), or `None` if the cursor is not valid.
    #[must_use]
    pub fn primary_key(&self) -> Option<&[u8]> {
        if !self.valid() {
            return None;
        }
        self.inner.key().map(|key| &key[self.prefix.len()..])
    }

    /// The current entry's value, or `None` if the cursor is not valid.
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        if !self.valid() {
            return None;
        }
        self.inner.value()
    }

    /// The current entry's wide-column record, or `None` if the cursor is
    /// not valid.
    #[must_use]
    pub fn columns(&self) -> Option<&WideColumns> {
        if !self.valid() {
            return None;
        }
        self.inner.columns()
    }

    /// Materialize the current entry's value if the underlying iterator
    /// defers value loading. Returns `false` if the cursor is not valid or
    /// preparation fails.
    pub fn prepare_value(&mut self) -> bool {
        if !self.valid() {
            return false;
        }
        self.inner.prepare_value()
    }

    /// The status of the underlying iterator, guaranteed `Ok` while the
    /// cursor is valid.
    ///
    /// # Errors
    ///
    /// Propagates the underlying iterator's failure.
    pub fn status(&self) -> Result<()> {
        self.inner.status()?;
        Ok(())
    }
}
