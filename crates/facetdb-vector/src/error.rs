//! Error types for the vector crate.

use thiserror::Error;

/// Errors that can occur in vector operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Dimension mismatch between a vector and the index.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The expected dimension.
        expected: usize,
        /// The actual dimension.
        actual: usize,
    },

    /// Training data is too small for the requested number of lists.
    #[error("not enough training points: {points} for {lists} lists")]
    NotEnoughTraining {
        /// The number of training points provided.
        points: usize,
        /// The number of inverted lists requested.
        lists: usize,
    },

    /// An inverted list number is outside `[0, num_lists)`.
    #[error("inverted list out of range: {list} >= {num_lists}")]
    ListOutOfRange {
        /// The offending list number.
        list: usize,
        /// The number of lists in the index.
        num_lists: usize,
    },

    /// A stored code does not have the index's code size.
    #[error("code size mismatch: expected {expected}, got {actual}")]
    CodeSizeMismatch {
        /// The index's code size.
        expected: usize,
        /// The observed code length.
        actual: usize,
    },

    /// A search parameter is invalid (zero k or nprobe).
    #[error("invalid search parameter: {0}")]
    InvalidParameter(&'static str),

    /// An inverted list could not be read.
    ///
    /// This error is non-recoverable for the current search; it indicates
    /// the list source observed corrupt or unreadable state.
    #[error("inverted list access failed: {0}")]
    ListAccess(String),
}

/// Result type alias for vector operations.
pub type VectorResult<T> = Result<T, VectorError>;
