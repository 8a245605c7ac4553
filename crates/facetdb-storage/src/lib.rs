//! FacetDB Storage
//!
//! This crate provides the transactional wide-column key-value engine that
//! FacetDB's secondary-index layer is built on.
//!
//! # Overview
//!
//! The storage layer exposes a pessimistic transaction interface over a set
//! of column families (independent ordered key spaces). Records are
//! wide-column values: a list of `(column name, column value)` pairs with
//! unique names sorted by name. A plain key-value record is modeled as the
//! single column with the default (empty) column name.
//!
//! # Core Traits
//!
//! - [`TransactionEngine`] - The main entry point for storage operations
//! - [`Transaction`] - Pessimistic transaction with locking reads, savepoints,
//!   and single-key writes
//! - [`RawIterator`] - Ordered iteration over a column family
//!
//! # Concurrency Model
//!
//! Write operations acquire exclusive row locks that are held until the
//! transaction commits or rolls back. Lock acquisition blocks up to a
//! configurable timeout and then fails with [`StorageError::LockTimeout`].
//! Savepoints mark positions in the transaction's write set; rolling back to
//! a savepoint discards writes and releases locks taken after the mark.
//!
//! # Example
//!
//! ```ignore
//! use facetdb_storage::{MemEngine, Transaction, TransactionEngine};
//!
//! let engine = MemEngine::new();
//! let cf = engine.create_column_family("data")?;
//!
//! let mut tx = engine.begin_transaction()?;
//! tx.put(cf, b"key", b"value", false)?;
//! tx.commit()?;
//! ```
//!
//! # Modules
//!
//! - [`engine`] - Storage engine traits and error types
//! - [`backends`] - Concrete engine implementations
//! - [`wide`] - Wide-column record representation

#![deny(clippy::unwrap_used)]

pub mod backends;
pub mod engine;
pub mod wide;

pub use backends::mem::{MemEngine, MemEngineOptions, MemIterator, MemTransaction};
pub use engine::{
    ColumnFamilyId, RawIterator, StorageError, StorageResult, Transaction, TransactionEngine,
};
pub use wide::{WideColumn, WideColumns, DEFAULT_COLUMN_NAME};
