//! In-memory engine implementation.
//!
//! This module provides the [`MemEngine`] type which implements the
//! [`TransactionEngine`] trait, together with its configuration and the
//! shared lock table used by transactions.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::engine::{ColumnFamilyId, StorageError, TransactionEngine};
use crate::wide::WideColumns;

use super::iterator::MemIterator;
use super::transaction::MemTransaction;

/// Name of the column family that always exists.
const DEFAULT_CF_NAME: &str = "default";

/// Configuration options for the in-memory engine.
#[derive(Debug, Clone, Copy)]
pub struct MemEngineOptions {
    /// How long a transaction waits for a contended row lock before the
    /// operation fails.
    pub lock_timeout: Duration,
}

impl Default for MemEngineOptions {
    fn default() -> Self {
        Self { lock_timeout: Duration::from_secs(1) }
    }
}

impl MemEngineOptions {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the row lock acquisition timeout.
    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}

/// One column family's committed rows, keyed by record key, holding encoded
/// wide-column records.
struct Family {
    name: String,
    rows: BTreeMap<Vec<u8>, Vec<u8>>,
}

/// Exclusive row lock table shared by all transactions of one engine.
pub(super) struct LockTable {
    owners: Mutex<HashMap<(u32, Vec<u8>), u64>>,
    released: Condvar,
}

impl LockTable {
    fn new() -> Self {
        Self { owners: Mutex::new(HashMap::new()), released: Condvar::new() }
    }

    /// Acquire the lock on `(cf, key)` for `txn_id`, waiting up to `timeout`.
    ///
    /// Returns `true` if the lock was newly acquired, `false` if this
    /// transaction already held it.
    pub(super) fn acquire(
        &self,
        txn_id: u64,
        cf: ColumnFamilyId,
        key: &[u8],
        timeout: Duration,
    ) -> Result<bool, StorageError> {
        let deadline = Instant::now() + timeout;
        let mut owners = self.owners.lock();

        loop {
            match owners.get(&(cf.0, key.to_vec())) {
                None => {
                    owners.insert((cf.0, key.to_vec()), txn_id);
                    return Ok(true);
                }
                Some(&owner) if owner == txn_id => return Ok(false),
                Some(_) => {
                    if self.released.wait_until(&mut owners, deadline).timed_out() {
                        return Err(StorageError::LockTimeout(format!(
                            "cf {} key {:02x?}",
                            cf.0, key
                        )));
                    }
                }
            }
        }
    }

    /// Release the given locks and wake any waiters.
    pub(super) fn release<'a>(&self, keys: impl Iterator<Item = &'a (u32, Vec<u8>)>) {
        let mut owners = self.owners.lock();
        for (cf, key) in keys {
            owners.remove(&(*cf, key.clone()));
        }
        drop(owners);
        self.released.notify_all();
    }

    /// Whether `txn_id` currently owns the lock on `(cf, key)`.
    pub(super) fn holds(&self, txn_id: u64, cf: ColumnFamilyId, key: &[u8]) -> bool {
        self.owners.lock().get(&(cf.0, key.to_vec())) == Some(&txn_id)
    }
}

/// An in-memory storage engine with pessimistic transactions.
///
/// All committed state lives in per-column-family ordered maps. The engine
/// is `Send + Sync`; transactions from different threads serialize on
/// exclusive row locks and on a short-lived state lock at commit.
pub struct MemEngine {
    families: RwLock<Vec<Family>>,
    locks: LockTable,
    options: MemEngineOptions,
    next_txn_id: AtomicU64,
}

impl MemEngine {
    /// Create an engine with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(MemEngineOptions::default())
    }

    /// Create an engine with the given options.
    #[must_use]
    pub fn with_options(options: MemEngineOptions) -> Self {
        Self {
            families: RwLock::new(vec![Family {
                name: DEFAULT_CF_NAME.to_string(),
                rows: BTreeMap::new(),
            }]),
            locks: LockTable::new(),
            options,
            next_txn_id: AtomicU64::new(1),
        }
    }

    pub(super) fn lock_table(&self) -> &LockTable {
        &self.locks
    }

    pub(super) fn lock_timeout(&self) -> Duration {
        self.options.lock_timeout
    }

    /// Whether the given column family exists in this engine.
    pub(super) fn family_exists(&self, cf: ColumnFamilyId) -> bool {
        (cf.0 as usize) < self.families.read().len()
    }

    /// Read and decode a committed row.
    pub(super) fn read_row(
        &self,
        cf: ColumnFamilyId,
        key: &[u8],
    ) -> Result<Option<WideColumns>, StorageError> {
        let families = self.families.read();
        let family = families
            .get(cf.0 as usize)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(format!("id {}", cf.0)))?;
        family.rows.get(key).map(|bytes| WideColumns::decode(bytes)).transpose()
    }

    /// Atomically apply a transaction's write set to the committed state.
    pub(super) fn apply(
        &self,
        ops: impl Iterator<Item = (ColumnFamilyId, Vec<u8>, Option<WideColumns>)>,
    ) -> Result<(), StorageError> {
        let mut families = self.families.write();
        for (cf, key, record) in ops {
            let family = families
                .get_mut(cf.0 as usize)
                .ok_or_else(|| StorageError::ColumnFamilyNotFound(format!("id {}", cf.0)))?;
            match record {
                Some(columns) => {
                    family.rows.insert(key, columns.encode()?);
                }
                None => {
                    family.rows.remove(&key);
                }
            }
        }
        Ok(())
    }
}

impl Default for MemEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionEngine for MemEngine {
    type Transaction<'a>
        = MemTransaction<'a>
    where
        Self: 'a;
    type Iterator = MemIterator;

    fn create_column_family(&self, name: &str) -> Result<ColumnFamilyId, StorageError> {
        let mut families = self.families.write();
        if families.iter().any(|f| f.name == name) {
            return Err(StorageError::ColumnFamilyExists(name.to_string()));
        }
        let id = u32::try_from(families.len())
            .map_err(|_| StorageError::InvalidArgument("too many column families".to_string()))?;
        families.push(Family { name: name.to_string(), rows: BTreeMap::new() });
        Ok(ColumnFamilyId(id))
    }

    fn column_family(&self, name: &str) -> Option<ColumnFamilyId> {
        let families = self.families.read();
        families
            .iter()
            .position(|f| f.name == name)
            .map(|i| ColumnFamilyId(i as u32))
    }

    fn default_column_family(&self) -> ColumnFamilyId {
        ColumnFamilyId(0)
    }

    fn begin_transaction(&self) -> Result<Self::Transaction<'_>, StorageError> {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::Relaxed);
        Ok(MemTransaction::new(self, txn_id))
    }

    fn iterator(&self, cf: ColumnFamilyId) -> Result<Self::Iterator, StorageError> {
        let families = self.families.read();
        let family = families
            .get(cf.0 as usize)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(format!("id {}", cf.0)))?;
        let entries = family
            .rows
            .iter()
            .map(|(k, v)| Ok((k.clone(), WideColumns::decode(v)?)))
            .collect::<Result<Vec<_>, StorageError>>()?;
        Ok(MemIterator::new(entries))
    }
}
