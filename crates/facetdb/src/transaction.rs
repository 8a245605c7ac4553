//! The index-maintaining transaction wrapper.
//!
//! [`IndexedTransaction`] composes over any storage transaction and keeps
//! primary records and secondary-index entries consistent: every mutating
//! call runs a savepoint-bracketed protocol that locks the primary key,
//! removes the entries derived from the old record, applies column
//! rewrites, writes the primary record, and inserts fresh entries. Any
//! failure rolls back to the savepoint, releasing the locks taken within
//! it, and leaves the enclosing transaction usable.
//!
//! Tracked and untracked variants collapse into a `validate` flag on each
//! mutating call: `validate = false` skips the read validation of the
//! lock-and-read step but takes the same lock path, so the maintenance
//! protocol and its invariants are unchanged.

use std::sync::Arc;

use facetdb_storage::{ColumnFamilyId, Transaction, WideColumns};

use crate::error::{Error, Result};
use crate::index::SecondaryIndex;

/// Per-write bookkeeping for one applicable index: the indexed column's
/// value before this index's rewrite, and the rewrite result if any.
struct IndexData<'i> {
    index: &'i dyn SecondaryIndex,
    previous_column_value: Vec<u8>,
    updated_column_value: Option<Vec<u8>>,
}

impl IndexData<'_> {
    /// The value this index's secondary entry derives from: the rewritten
    /// value if the index rewrote, the previous value otherwise.
    fn primary_column_value(&self) -> &[u8] {
        self.updated_column_value.as_deref().unwrap_or(&self.previous_column_value)
    }
}

/// A transaction that transparently maintains the declared secondary
/// indices on every mutating call.
///
/// Obtained from [`TransactionDb::begin_transaction`](crate::TransactionDb::begin_transaction).
/// Holds a non-owning view of the database's index list; the indices are
/// consulted in declaration order, so when several rewriting indices target
/// the same column their rewrites compose left to right.
pub struct IndexedTransaction<'i, T: Transaction> {
    inner: T,
    indices: &'i [Arc<dyn SecondaryIndex>],
}

impl<'i, T: Transaction> IndexedTransaction<'i, T> {
    /// Wrap a storage transaction with index maintenance.
    pub fn new(inner: T, indices: &'i [Arc<dyn SecondaryIndex>]) -> Self {
        Self { inner, indices }
    }

    /// The default column family of the underlying transaction.
    #[must_use]
    pub fn default_column_family(&self) -> ColumnFamilyId {
        self.inner.default_column_family()
    }

    /// Read a record, observing this transaction's own uncommitted writes.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn get_entity(
        &self,
        cf: Option<ColumnFamilyId>,
        key: &[u8],
    ) -> Result<Option<WideColumns>> {
        let cf = self.resolve_cf(cf);
        Ok(self.inner.get_entity(cf, key)?)
    }

    /// Write a plain key-value record, maintaining all applicable indices.
    ///
    /// Plain records are indexed by indices declared on the default column
    /// name. `validate = false` is the untracked variant.
    ///
    /// # Errors
    ///
    /// Engine failures and index-hook failures roll the transaction back to
    /// the savepoint taken at the start of this call and are returned
    /// unchanged.
    pub fn put(
        &mut self,
        cf: Option<ColumnFamilyId>,
        key: &[u8],
        value: &[u8],
        validate: bool,
    ) -> Result<()> {
        let columns = WideColumns::from_plain(value);
        self.with_savepoint(|txn| txn.put_entity_with_indices(cf, key, columns, validate))
    }

    /// Write a wide-column record, maintaining all applicable indices.
    ///
    /// The columns are sorted by name before any index hook runs.
    /// `validate = false` is the untracked variant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for duplicate column names;
    /// engine and index-hook failures roll back to the savepoint and are
    /// returned unchanged.
    pub fn put_entity(
        &mut self,
        cf: Option<ColumnFamilyId>,
        key: &[u8],
        columns: WideColumns,
        validate: bool,
    ) -> Result<()> {
        self.with_savepoint(|txn| txn.put_entity_with_indices(cf, key, columns, validate))
    }

    /// Delete a record and every secondary entry derived from it. Deleting
    /// a missing key is a no-op.
    ///
    /// # Errors
    ///
    /// Engine failures roll back to the savepoint and are returned
    /// unchanged.
    pub fn delete(
        &mut self,
        cf: Option<ColumnFamilyId>,
        key: &[u8],
        validate: bool,
    ) -> Result<()> {
        self.with_savepoint(|txn| txn.delete_with_indices(cf, key, validate, false))
    }

    /// [`delete`](Self::delete) for records written at most once since the
    /// last deletion.
    ///
    /// # Errors
    ///
    /// Engine failures roll back to the savepoint and are returned
    /// unchanged.
    pub fn single_delete(
        &mut self,
        cf: Option<ColumnFamilyId>,
        key: &[u8],
        validate: bool,
    ) -> Result<()> {
        self.with_savepoint(|txn| txn.delete_with_indices(cf, key, validate, true))
    }

    /// Merge is not supported with secondary indices.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::NotSupported`]; the transaction state is
    /// untouched.
    pub fn merge(
        &mut self,
        _cf: Option<ColumnFamilyId>,
        _key: &[u8],
        _value: &[u8],
    ) -> Result<()> {
        Err(Error::NotSupported("merge with secondary indices"))
    }

    /// Commit the transaction.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn commit(self) -> Result<()> {
        self.inner.commit()?;
        Ok(())
    }

    /// Roll back the transaction.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn rollback(self) -> Result<()> {
        self.inner.rollback()?;
        Ok(())
    }

    fn resolve_cf(&self, cf: Option<ColumnFamilyId>) -> ColumnFamilyId {
        cf.unwrap_or_else(|| self.inner.default_column_family())
    }

    /// Run `op` bracketed by a savepoint: popped on success, rolled back to
    /// on failure. The rollback releases locks taken inside the bracket.
    fn with_savepoint(&mut self, op: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        self.inner.set_savepoint();
        match op(self) {
            Ok(()) => {
                self.inner.pop_savepoint()?;
                Ok(())
            }
            Err(e) => {
                self.inner.rollback_to_savepoint()?;
                Err(e)
            }
        }
    }

    fn put_entity_with_indices(
        &mut self,
        cf: Option<ColumnFamilyId>,
        key: &[u8],
        mut columns: WideColumns,
        validate: bool,
    ) -> Result<()> {
        let cf = self.resolve_cf(cf);

        if let Some(existing) = self.inner.get_entity_for_update(cf, key, true, validate)? {
            self.remove_secondary_entries(cf, key, &existing)?;
        }

        columns.sort();
        if !columns.is_sorted_unique() {
            return Err(Error::InvalidArgument("duplicate column names".to_string()));
        }

        let applicable = self.update_primary_column_values(cf, key, &mut columns)?;

        self.inner.put_entity(cf, key, columns, true)?;

        for data in &applicable {
            self.add_secondary_entry(
                data.index,
                key,
                data.primary_column_value(),
                &data.previous_column_value,
            )?;
        }

        Ok(())
    }

    fn delete_with_indices(
        &mut self,
        cf: Option<ColumnFamilyId>,
        key: &[u8],
        validate: bool,
        single: bool,
    ) -> Result<()> {
        let cf = self.resolve_cf(cf);

        match self.inner.get_entity_for_update(cf, key, true, validate)? {
            Some(existing) => self.remove_secondary_entries(cf, key, &existing)?,
            None => return Ok(()),
        }

        if single {
            self.inner.single_delete(cf, key, true)?;
        } else {
            self.inner.delete(cf, key, true)?;
        }

        Ok(())
    }

    /// Run the rewrite hook of every applicable index, substituting column
    /// values in place and collecting the per-index before/after values for
    /// the insert step.
    fn update_primary_column_values(
        &self,
        cf: ColumnFamilyId,
        key: &[u8],
        columns: &mut WideColumns,
    ) -> Result<Vec<IndexData<'i>>> {
        let indices = self.indices;
        let mut applicable = Vec::with_capacity(indices.len());

        for index in indices {
            if index.primary_column_family() != Some(cf) {
                continue;
            }
            let name = index.primary_column_name().to_vec();
            let Some(previous) = columns.get(&name).map(<[u8]>::to_vec) else {
                continue;
            };

            let updated = index.update_primary_column_value(key, &previous)?;
            if let Some(new_value) = &updated {
                columns.set_value(&name, new_value.clone());
            }

            applicable.push(IndexData {
                index: index.as_ref(),
                previous_column_value: previous,
                updated_column_value: updated,
            });
        }

        Ok(applicable)
    }

    /// Remove the secondary entries derived from an existing primary
    /// record, across every applicable index.
    fn remove_secondary_entries(
        &mut self,
        cf: ColumnFamilyId,
        key: &[u8],
        existing: &WideColumns,
    ) -> Result<()> {
        let indices = self.indices;
        for index in indices {
            if index.primary_column_family() != Some(cf) {
                continue;
            }
            let Some(value) = existing.get(index.primary_column_name()) else {
                continue;
            };
            self.remove_secondary_entry(index.as_ref(), key, value)?;
        }
        Ok(())
    }

    fn remove_secondary_entry(
        &mut self,
        index: &dyn SecondaryIndex,
        key: &[u8],
        existing_value: &[u8],
    ) -> Result<()> {
        let prefix = index.secondary_key_prefix(key, existing_value)?;
        let prefix = index.finalize_secondary_key_prefix(prefix)?;
        let secondary_cf = secondary_cf_of(index)?;

        let mut secondary_key = prefix;
        secondary_key.extend_from_slice(key);
        self.inner.single_delete(secondary_cf, &secondary_key, false)?;
        Ok(())
    }

    fn add_secondary_entry(
        &mut self,
        index: &dyn SecondaryIndex,
        key: &[u8],
        column_value: &[u8],
        previous_value: &[u8],
    ) -> Result<()> {
        let prefix = index.secondary_key_prefix(key, column_value)?;
        let prefix = index.finalize_secondary_key_prefix(prefix)?;
        let value = index.secondary_value(key, column_value, previous_value)?;
        let secondary_cf = secondary_cf_of(index)?;

        let mut secondary_key = prefix;
        secondary_key.extend_from_slice(key);
        self.inner.put(secondary_cf, &secondary_key, value.as_deref().unwrap_or_default(), false)?;
        Ok(())
    }
}

fn secondary_cf_of(index: &dyn SecondaryIndex) -> Result<ColumnFamilyId> {
    index
        .secondary_column_family()
        .ok_or_else(|| Error::InvalidArgument("secondary index is not bound".to_string()))
}
