//! Storage error types.
//!
//! This module defines the error types for storage operations. All errors
//! implement [`std::error::Error`] and provide descriptive messages.

use thiserror::Error;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A column family does not exist.
    #[error("column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// A column family with the given name already exists.
    #[error("column family already exists: {0}")]
    ColumnFamilyExists(String),

    /// An exclusive row lock could not be acquired within the engine's
    /// lock timeout.
    #[error("timed out waiting for lock: {0}")]
    LockTimeout(String),

    /// The transaction has already been committed or rolled back.
    #[error("transaction already completed")]
    TransactionCompleted,

    /// A savepoint operation was issued with no savepoint set.
    #[error("no active savepoint")]
    NoActiveSavepoint,

    /// An invalid argument was provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Returns `true` if this error is a lock acquisition timeout.
    #[must_use]
    pub const fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout(_))
    }

    /// Returns `true` if this error is recoverable (e.g., may succeed on
    /// retry after the conflicting transaction finishes).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::LockTimeout(_))
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
