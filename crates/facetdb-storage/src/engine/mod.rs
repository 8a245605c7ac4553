//! Storage engine traits and abstractions.
//!
//! This module defines the core traits that storage backends must implement:
//!
//! - [`TransactionEngine`] - Main entry point for creating transactions and
//!   column families
//! - [`Transaction`] - Pessimistic transaction with locking reads, savepoint
//!   control, and single-key writes
//! - [`RawIterator`] - Ordered iteration over a column family
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`] which is an alias for
//! `Result<T, StorageError>`. See [`StorageError`] for the possible error
//! variants.

mod error;
mod traits;

pub use error::{StorageError, StorageResult};
pub use traits::{ColumnFamilyId, RawIterator, Transaction, TransactionEngine};
