//! In-memory transaction implementation.
//!
//! A transaction buffers its writes in an ordered op log and acquires an
//! exclusive row lock for every key it touches. Reads layer the op log over
//! the committed state so a transaction observes its own writes. Savepoints
//! record op-log and lock-list positions; rolling back truncates both.

use std::mem;

use crate::engine::{ColumnFamilyId, StorageError, Transaction};
use crate::wide::WideColumns;

use super::engine::MemEngine;

/// A single buffered write.
enum WriteOp {
    Put { cf: ColumnFamilyId, key: Vec<u8>, columns: WideColumns },
    Delete { cf: ColumnFamilyId, key: Vec<u8> },
    SingleDelete { cf: ColumnFamilyId, key: Vec<u8> },
}

impl WriteOp {
    fn target(&self) -> (ColumnFamilyId, &[u8]) {
        match self {
            Self::Put { cf, key, .. }
            | Self::Delete { cf, key }
            | Self::SingleDelete { cf, key } => (*cf, key.as_slice()),
        }
    }

    fn into_effect(self) -> (ColumnFamilyId, Vec<u8>, Option<WideColumns>) {
        match self {
            Self::Put { cf, key, columns } => (cf, key, Some(columns)),
            Self::Delete { cf, key } | Self::SingleDelete { cf, key } => (cf, key, None),
        }
    }
}

/// Savepoint mark: positions in the op log and the held-lock list.
struct SavepointMark {
    ops: usize,
    locks: usize,
}

/// A pessimistic read-write transaction over a [`MemEngine`].
pub struct MemTransaction<'db> {
    engine: &'db MemEngine,
    txn_id: u64,
    ops: Vec<WriteOp>,
    held_locks: Vec<(u32, Vec<u8>)>,
    savepoints: Vec<SavepointMark>,
    finished: bool,
}

impl<'db> MemTransaction<'db> {
    pub(super) fn new(engine: &'db MemEngine, txn_id: u64) -> Self {
        Self {
            engine,
            txn_id,
            ops: Vec::new(),
            held_locks: Vec::new(),
            savepoints: Vec::new(),
            finished: false,
        }
    }

    /// The id assigned to this transaction by its engine.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.txn_id
    }

    /// Acquire the row lock on `(cf, key)`, recording it if newly taken.
    fn lock_key(&mut self, cf: ColumnFamilyId, key: &[u8]) -> Result<(), StorageError> {
        let newly = self.engine.lock_table().acquire(
            self.txn_id,
            cf,
            key,
            self.engine.lock_timeout(),
        )?;
        if newly {
            self.held_locks.push((cf.as_u32(), key.to_vec()));
        }
        Ok(())
    }

    /// Ensure the row lock is held before a write. `assume_tracked` asserts
    /// that a prior locking read already took it.
    fn track_key(
        &mut self,
        cf: ColumnFamilyId,
        key: &[u8],
        assume_tracked: bool,
    ) -> Result<(), StorageError> {
        if assume_tracked {
            debug_assert!(self.engine.lock_table().holds(self.txn_id, cf, key));
        }
        self.lock_key(cf, key)
    }

    fn check_column_family(&self, cf: ColumnFamilyId) -> Result<(), StorageError> {
        if self.engine.family_exists(cf) {
            Ok(())
        } else {
            Err(StorageError::ColumnFamilyNotFound(format!("id {}", cf.as_u32())))
        }
    }

    /// The most recent buffered effect for `(cf, key)`, if any.
    fn overlay(&self, cf: ColumnFamilyId, key: &[u8]) -> Option<Option<WideColumns>> {
        for op in self.ops.iter().rev() {
            if op.target() == (cf, key) {
                return Some(match op {
                    WriteOp::Put { columns, .. } => Some(columns.clone()),
                    WriteOp::Delete { .. } | WriteOp::SingleDelete { .. } => None,
                });
            }
        }
        None
    }

    fn release_all(&mut self) {
        self.engine.lock_table().release(self.held_locks.iter());
        self.held_locks.clear();
    }
}

impl Transaction for MemTransaction<'_> {
    fn default_column_family(&self) -> ColumnFamilyId {
        use crate::engine::TransactionEngine;
        self.engine.default_column_family()
    }

    fn get_entity(
        &self,
        cf: ColumnFamilyId,
        key: &[u8],
    ) -> Result<Option<WideColumns>, StorageError> {
        self.check_column_family(cf)?;
        match self.overlay(cf, key) {
            Some(record) => Ok(record),
            None => self.engine.read_row(cf, key),
        }
    }

    fn get_entity_for_update(
        &mut self,
        cf: ColumnFamilyId,
        key: &[u8],
        _exclusive: bool,
        _do_validate: bool,
    ) -> Result<Option<WideColumns>, StorageError> {
        self.check_column_family(cf)?;
        self.lock_key(cf, key)?;
        self.get_entity(cf, key)
    }

    fn put(
        &mut self,
        cf: ColumnFamilyId,
        key: &[u8],
        value: &[u8],
        assume_tracked: bool,
    ) -> Result<(), StorageError> {
        self.put_entity(cf, key, WideColumns::from_plain(value), assume_tracked)
    }

    fn put_entity(
        &mut self,
        cf: ColumnFamilyId,
        key: &[u8],
        columns: WideColumns,
        assume_tracked: bool,
    ) -> Result<(), StorageError> {
        if !columns.is_sorted_unique() {
            return Err(StorageError::InvalidArgument(
                "columns must be sorted by unique name".to_string(),
            ));
        }
        self.check_column_family(cf)?;
        self.track_key(cf, key, assume_tracked)?;
        self.ops.push(WriteOp::Put { cf, key: key.to_vec(), columns });
        Ok(())
    }

    fn delete(
        &mut self,
        cf: ColumnFamilyId,
        key: &[u8],
        assume_tracked: bool,
    ) -> Result<(), StorageError> {
        self.check_column_family(cf)?;
        self.track_key(cf, key, assume_tracked)?;
        self.ops.push(WriteOp::Delete { cf, key: key.to_vec() });
        Ok(())
    }

    fn single_delete(
        &mut self,
        cf: ColumnFamilyId,
        key: &[u8],
        assume_tracked: bool,
    ) -> Result<(), StorageError> {
        self.check_column_family(cf)?;
        self.track_key(cf, key, assume_tracked)?;
        self.ops.push(WriteOp::SingleDelete { cf, key: key.to_vec() });
        Ok(())
    }

    fn set_savepoint(&mut self) {
        self.savepoints.push(SavepointMark { ops: self.ops.len(), locks: self.held_locks.len() });
    }

    fn rollback_to_savepoint(&mut self) -> Result<(), StorageError> {
        let mark = self.savepoints.pop().ok_or(StorageError::NoActiveSavepoint)?;
        self.ops.truncate(mark.ops);
        self.engine.lock_table().release(self.held_locks[mark.locks..].iter());
        self.held_locks.truncate(mark.locks);
        Ok(())
    }

    fn pop_savepoint(&mut self) -> Result<(), StorageError> {
        self.savepoints.pop().map(|_| ()).ok_or(StorageError::NoActiveSavepoint)
    }

    fn commit(mut self) -> Result<(), StorageError> {
        let ops = mem::take(&mut self.ops);
        self.engine.apply(ops.into_iter().map(WriteOp::into_effect))?;
        self.release_all();
        self.finished = true;
        Ok(())
    }

    fn rollback(mut self) -> Result<(), StorageError> {
        self.ops.clear();
        self.release_all();
        self.finished = true;
        Ok(())
    }
}

impl Drop for MemTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.release_all();
        }
    }
}
