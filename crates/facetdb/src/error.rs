//! Error types for the secondary-index layer.

use facetdb_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the secondary-index layer.
///
/// Engine failures pass through unchanged as [`Error::Storage`]; the other
/// variants originate in this crate: precondition violations, invariant
/// violations observed during index callbacks, and unsupported operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A precondition was violated (wrong-sized embedding, zero search
    /// parameter, unbound index, malformed columns).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not supported with secondary indices.
    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// An index invariant was violated: out-of-range cluster id, code size
    /// mismatch, or an unexpected id from the vector search.
    #[error("corruption: {0}")]
    Corruption(String),

    /// An engine failure, including lock timeouts.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Error {
    /// Returns `true` for precondition violations.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Returns `true` for unsupported operations.
    #[must_use]
    pub const fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported(_))
    }

    /// Returns `true` for invariant violations.
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption(_))
    }

    /// Returns `true` if the underlying engine timed out acquiring a row
    /// lock.
    #[must_use]
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_lock_timeout())
    }
}

/// Result type alias for secondary-index operations.
pub type Result<T> = std::result::Result<T, Error>;
