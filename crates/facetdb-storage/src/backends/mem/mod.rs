//! In-memory pessimistic storage backend.
//!
//! This backend keeps all data in process memory and implements the full
//! engine contract: column families, exclusive row locks with a configurable
//! acquisition timeout, savepoint-aware write sets, and snapshot iterators.
//!
//! # Locking
//!
//! Row locks are exclusive and per `(column family, key)`. A transaction
//! blocked on a lock held by another transaction waits until the holder
//! finishes or the engine's lock timeout elapses, in which case the
//! operation fails with [`StorageError::LockTimeout`](crate::StorageError).
//! Locks are released on commit, rollback, and rollback to a savepoint set
//! before the lock was taken.
//!
//! # Example
//!
//! ```ignore
//! use facetdb_storage::{MemEngine, MemEngineOptions, Transaction, TransactionEngine};
//! use std::time::Duration;
//!
//! let engine = MemEngine::with_options(
//!     MemEngineOptions::new().with_lock_timeout(Duration::from_millis(100)),
//! );
//!
//! let mut tx = engine.begin_transaction()?;
//! tx.put(engine.default_column_family(), b"key", b"value", false)?;
//! tx.commit()?;
//! ```

mod engine;
mod iterator;
mod transaction;

pub use engine::{MemEngine, MemEngineOptions};
pub use iterator::MemIterator;
pub use transaction::MemTransaction;
