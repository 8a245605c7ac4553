//! Database wiring for secondary indices.
//!
//! [`TransactionDb`] owns a storage engine and the list of declared
//! secondary indices. Every transaction it hands out is an
//! [`IndexedTransaction`] carrying a non-owning view of that list, so all
//! writes through the database maintain the indices automatically.

use std::sync::Arc;

use facetdb_storage::{ColumnFamilyId, TransactionEngine};

use crate::error::Result;
use crate::index::SecondaryIndex;
use crate::transaction::IndexedTransaction;

/// A transactional database with declared secondary indices.
///
/// Indices are supplied at open time, before their column families exist;
/// create the families afterwards and bind each index exactly once via
/// [`SecondaryIndex::bind_column_families`] before the first write.
pub struct TransactionDb<E: TransactionEngine> {
    engine: E,
    indices: Vec<Arc<dyn SecondaryIndex>>,
}

impl<E: TransactionEngine> TransactionDb<E> {
    /// Open a database over the given engine with the declared index list.
    #[must_use]
    pub fn open(engine: E, indices: Vec<Arc<dyn SecondaryIndex>>) -> Self {
        Self { engine, indices }
    }

    /// The underlying storage engine.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The declared secondary indices, in declaration order.
    #[must_use]
    pub fn secondary_indices(&self) -> &[Arc<dyn SecondaryIndex>] {
        &self.indices
    }

    /// Create a new column family.
    ///
    /// # Errors
    ///
    /// Propagates engine failures (duplicate name).
    pub fn create_column_family(&self, name: &str) -> Result<ColumnFamilyId> {
        Ok(self.engine.create_column_family(name)?)
    }

    /// The engine's default column family.
    #[must_use]
    pub fn default_column_family(&self) -> ColumnFamilyId {
        self.engine.default_column_family()
    }

    /// Begin a transaction that maintains the declared indices on every
    /// mutating call.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn begin_transaction(&self) -> Result<IndexedTransaction<'_, E::Transaction<'_>>> {
        let inner = self.engine.begin_transaction()?;
        Ok(IndexedTransaction::new(inner, &self.indices))
    }

    /// Create a raw iterator over the committed state of a column family,
    /// e.g. to build a
    /// [`SecondaryIndexIterator`](crate::SecondaryIndexIterator) over an
    /// index's secondary column family.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn new_iterator(&self, cf: ColumnFamilyId) -> Result<E::Iterator> {
        Ok(self.engine.iterator(cf)?)
    }
}
