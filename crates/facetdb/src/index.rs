//! The secondary-index contract.
//!
//! A secondary index maintains a mapping from a function of a primary
//! column's value to the primary keys carrying that value, stored as
//! `prefix ∥ primary_key → payload` entries in the index's secondary column
//! family. Indices never touch the store themselves; the transaction
//! wrapper calls the hooks below and issues all reads and writes.
//!
//! Index objects are constructed before the database opens, bound to their
//! column families exactly once after the families exist, and then shared
//! immutably across concurrent transactions. All hooks must be
//! deterministic: the wrapper re-derives an entry's key from the current
//! primary record when removing it.

use std::sync::OnceLock;

use facetdb_storage::ColumnFamilyId;

use crate::error::{Error, Result};

/// One-shot binding of an index to its primary and secondary column
/// families.
///
/// Embed this in index implementations and delegate the trait's binding
/// accessors to it.
#[derive(Debug, Default)]
pub struct ColumnFamilyBinding {
    primary: OnceLock<ColumnFamilyId>,
    secondary: OnceLock<ColumnFamilyId>,
}

impl ColumnFamilyBinding {
    /// Create an unbound binding.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the column families. Fails if called more than once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] on a second bind.
    pub fn bind(&self, primary: ColumnFamilyId, secondary: ColumnFamilyId) -> Result<()> {
        self.primary
            .set(primary)
            .and_then(|()| self.secondary.set(secondary))
            .map_err(|_| Error::InvalidArgument("index is already bound".to_string()))
    }

    /// The bound primary column family, if any.
    #[must_use]
    pub fn primary(&self) -> Option<ColumnFamilyId> {
        self.primary.get().copied()
    }

    /// The bound secondary column family, if any.
    #[must_use]
    pub fn secondary(&self) -> Option<ColumnFamilyId> {
        self.secondary.get().copied()
    }
}

/// The contract every secondary index implements.
///
/// An index applies to a write when the write's column family equals the
/// index's primary column family and the written record contains the
/// indexed column. For every applicable write the transaction wrapper:
///
/// 1. removes the entry derived from the old record (if one exists),
/// 2. lets the index rewrite the stored column value via
///    [`update_primary_column_value`](SecondaryIndex::update_primary_column_value),
/// 3. writes the primary record,
/// 4. inserts the entry `finalize(prefix) ∥ primary_key →`
///    [`secondary_value`](SecondaryIndex::secondary_value).
///
/// A hook returning an error aborts the operation; the wrapper rolls the
/// transaction back to its savepoint.
pub trait SecondaryIndex: Send + Sync {
    /// Bind the index to its column families. Called exactly once, after
    /// the families are created and before the first write.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] on a second bind.
    fn bind_column_families(
        &self,
        primary: ColumnFamilyId,
        secondary: ColumnFamilyId,
    ) -> Result<()>;

    /// The column family holding the indexed primary records.
    fn primary_column_family(&self) -> Option<ColumnFamilyId>;

    /// The column family holding this index's entries.
    fn secondary_column_family(&self) -> Option<ColumnFamilyId>;

    /// The name of the indexed primary column. Plain key-value records are
    /// indexed under [`DEFAULT_COLUMN_NAME`](facetdb_storage::DEFAULT_COLUMN_NAME).
    fn primary_column_name(&self) -> &[u8];

    /// Optionally substitute the column value that will be persisted in the
    /// primary record. Returning `None` keeps the caller's value.
    ///
    /// # Errors
    ///
    /// An error aborts the write and rolls back to the savepoint.
    fn update_primary_column_value(
        &self,
        primary_key: &[u8],
        primary_column_value: &[u8],
    ) -> Result<Option<Vec<u8>>>;

    /// Derive the secondary key prefix for a record. Must be a pure
    /// function of its inputs; called both when maintaining entries and,
    /// with an empty primary key, when a cursor seeks to a search target.
    ///
    /// # Errors
    ///
    /// An error aborts the current operation.
    fn secondary_key_prefix(
        &self,
        primary_key: &[u8],
        primary_column_value: &[u8],
    ) -> Result<Vec<u8>>;

    /// Finalize the prefix, for instance by appending disambiguating
    /// metadata such as an index id or length indicator. The default is the
    /// identity.
    ///
    /// # Errors
    ///
    /// An error aborts the current operation.
    fn finalize_secondary_key_prefix(&self, prefix: Vec<u8>) -> Result<Vec<u8>> {
        Ok(prefix)
    }

    /// The payload stored at the secondary entry. `primary_column_value` is
    /// the value after [`update_primary_column_value`](Self::update_primary_column_value);
    /// `previous_column_value` is the value before it. Returning `None`
    /// stores an empty payload.
    ///
    /// # Errors
    ///
    /// An error aborts the write and rolls back to the savepoint.
    fn secondary_value(
        &self,
        primary_key: &[u8],
        primary_column_value: &[u8],
        previous_column_value: &[u8],
    ) -> Result<Option<Vec<u8>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    use facetdb_storage::{MemEngine, TransactionEngine};

    #[test]
    fn binding_is_one_shot() {
        let binding = ColumnFamilyBinding::new();
        assert_eq!(binding.primary(), None);
        assert_eq!(binding.secondary(), None);

        let engine = MemEngine::new();
        let primary = engine.create_column_family("primary").expect("cf");
        let secondary = engine.create_column_family("secondary").expect("cf");

        binding.bind(primary, secondary).expect("first bind");
        assert_eq!(binding.primary(), Some(primary));
        assert_eq!(binding.secondary(), Some(secondary));

        assert!(binding.bind(primary, secondary).is_err());
    }
}
