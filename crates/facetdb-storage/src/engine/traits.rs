//! Core storage engine traits.
//!
//! This module defines the fundamental traits for storage backends:
//!
//! - [`TransactionEngine`] - The main entry point for storage operations
//! - [`Transaction`] - Pessimistic transaction support with locking reads,
//!   savepoints, and single-key writes
//! - [`RawIterator`] - Ordered iteration over a column family
//!
//! The operation set is the capability contract consumed by the
//! secondary-index layer: every mutating write goes through a transaction,
//! reads-for-update take exclusive row locks, and savepoints bracket
//! multi-key maintenance sequences.

use super::StorageError;
use crate::wide::WideColumns;

/// Handle identifying a column family within one engine instance.
///
/// Handles are cheap to copy and remain valid for the lifetime of the
/// engine that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnFamilyId(pub(crate) u32);

impl ColumnFamilyId {
    /// The raw numeric id of this column family.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// A storage engine that provides pessimistic transactional operations over
/// a set of column families.
///
/// Implementations must be thread-safe (`Send + Sync`); transactions from
/// multiple threads may run in parallel and are isolated through exclusive
/// row locks.
pub trait TransactionEngine: Send + Sync {
    /// The transaction type for this engine.
    type Transaction<'a>: Transaction
    where
        Self: 'a;

    /// The iterator type for this engine.
    type Iterator: RawIterator;

    /// Create a new column family with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ColumnFamilyExists`] if a column family with
    /// this name already exists.
    fn create_column_family(&self, name: &str) -> Result<ColumnFamilyId, StorageError>;

    /// Look up a column family by name.
    fn column_family(&self, name: &str) -> Option<ColumnFamilyId>;

    /// The default column family, which always exists.
    fn default_column_family(&self) -> ColumnFamilyId;

    /// Begin a read-write transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started.
    fn begin_transaction(&self) -> Result<Self::Transaction<'_>, StorageError>;

    /// Create an iterator over the committed state of a column family.
    ///
    /// The iterator observes a snapshot taken at creation time; writes from
    /// uncommitted transactions are not visible.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ColumnFamilyNotFound`] if the column family
    /// does not exist.
    fn iterator(&self, cf: ColumnFamilyId) -> Result<Self::Iterator, StorageError>;
}

/// A pessimistic read-write transaction.
///
/// Writes are buffered in the transaction's write set and become visible to
/// other transactions only on commit. Every write and every
/// [`get_entity_for_update`](Transaction::get_entity_for_update) acquires an
/// exclusive row lock held until the transaction commits or rolls back.
/// Dropping a transaction without committing rolls it back.
pub trait Transaction {
    /// The default column family of the underlying engine.
    fn default_column_family(&self) -> ColumnFamilyId;

    /// Read a record, observing this transaction's own uncommitted writes.
    ///
    /// Does not acquire a lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the column family does not exist or the record
    /// cannot be decoded.
    fn get_entity(
        &self,
        cf: ColumnFamilyId,
        key: &[u8],
    ) -> Result<Option<WideColumns>, StorageError>;

    /// Read a record under an exclusive row lock.
    ///
    /// The read observes this transaction's own uncommitted writes layered
    /// over the committed state. The lock is held until commit, rollback, or
    /// a rollback to a savepoint set before the lock was taken.
    ///
    /// `do_validate` requests conflict validation of the read against the
    /// transaction's snapshot; backends without snapshot validation accept
    /// and ignore it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockTimeout`] if the lock cannot be acquired
    /// within the engine's timeout. A missing key is `Ok(None)`, not an
    /// error.
    fn get_entity_for_update(
        &mut self,
        cf: ColumnFamilyId,
        key: &[u8],
        exclusive: bool,
        do_validate: bool,
    ) -> Result<Option<WideColumns>, StorageError>;

    /// Write a plain key-value record (the single default column).
    ///
    /// `assume_tracked` asserts that this transaction already holds the row
    /// lock (taken by a prior
    /// [`get_entity_for_update`](Transaction::get_entity_for_update));
    /// otherwise the lock is acquired here.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockTimeout`] if the row lock cannot be
    /// acquired.
    fn put(
        &mut self,
        cf: ColumnFamilyId,
        key: &[u8],
        value: &[u8],
        assume_tracked: bool,
    ) -> Result<(), StorageError>;

    /// Write a wide-column record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidArgument`] if the columns are not
    /// sorted by unique name, or [`StorageError::LockTimeout`] if the row
    /// lock cannot be acquired.
    fn put_entity(
        &mut self,
        cf: ColumnFamilyId,
        key: &[u8],
        columns: WideColumns,
        assume_tracked: bool,
    ) -> Result<(), StorageError>;

    /// Delete a record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockTimeout`] if the row lock cannot be
    /// acquired.
    fn delete(
        &mut self,
        cf: ColumnFamilyId,
        key: &[u8],
        assume_tracked: bool,
    ) -> Result<(), StorageError>;

    /// Delete a record that has been written at most once since the last
    /// deletion.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockTimeout`] if the row lock cannot be
    /// acquired.
    fn single_delete(
        &mut self,
        cf: ColumnFamilyId,
        key: &[u8],
        assume_tracked: bool,
    ) -> Result<(), StorageError>;

    /// Mark a rollback point in the transaction's write set.
    fn set_savepoint(&mut self);

    /// Undo all writes since the most recent savepoint, release locks taken
    /// after it, and remove the savepoint.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoActiveSavepoint`] if no savepoint is set.
    fn rollback_to_savepoint(&mut self) -> Result<(), StorageError>;

    /// Remove the most recent savepoint without undoing anything.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoActiveSavepoint`] if no savepoint is set.
    fn pop_savepoint(&mut self) -> Result<(), StorageError>;

    /// Commit the transaction, atomically applying its write set and
    /// releasing all row locks.
    ///
    /// # Errors
    ///
    /// Returns an error if the write set cannot be applied.
    fn commit(self) -> Result<(), StorageError>;

    /// Roll back the transaction, discarding its write set and releasing all
    /// row locks.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    fn rollback(self) -> Result<(), StorageError>;
}

/// An iterator over the records of one column family, in key order.
///
/// Mirrors the positioned-iterator contract of the engine: the iterator is
/// positioned on an entry or invalid, and accessors return `None` when it is
/// not positioned on a valid entry.
pub trait RawIterator {
    /// Position the iterator at the first key `>= target`.
    fn seek(&mut self, target: &[u8]);

    /// Position the iterator at the first key.
    fn seek_to_first(&mut self);

    /// Position the iterator at the last key.
    fn seek_to_last(&mut self);

    /// Advance to the next entry.
    fn next(&mut self);

    /// Move back to the previous entry.
    fn prev(&mut self);

    /// Whether the iterator is positioned on an entry.
    fn valid(&self) -> bool;

    /// The status of the iterator, guaranteed `Ok` while the iterator is
    /// valid.
    fn status(&self) -> Result<(), StorageError>;

    /// Materialize the current entry's value if the backend defers value
    /// loading. Returns `true` on success.
    fn prepare_value(&mut self) -> bool;

    /// The current entry, or `None` if the iterator is not valid.
    fn current(&self) -> Option<(&[u8], &WideColumns)>;

    /// The current entry's key.
    fn key(&self) -> Option<&[u8]> {
        self.current().map(|(k, _)| k)
    }

    /// The current entry's default column value (empty if the record has no
    /// default column).
    fn value(&self) -> Option<&[u8]> {
        self.current().map(|(_, c)| c.default_value())
    }

    /// The current entry's full wide-column record.
    fn columns(&self) -> Option<&WideColumns> {
        self.current().map(|(_, c)| c)
    }
}
