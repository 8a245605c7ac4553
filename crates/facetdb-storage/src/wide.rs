//! Wide-column record representation.
//!
//! A record's value is an ordered list of `(column name, column value)`
//! pairs with unique names, sorted by name. A plain key-value record is the
//! single column with the default (empty) column name.
//!
//! Records are persisted as the bincode encoding of the sorted column list;
//! this is the engine's record format referenced by the iterator and
//! transaction interfaces.

use serde::{Deserialize, Serialize};

use crate::engine::StorageError;

/// The name of the default column, used to model plain key-value records.
///
/// The empty byte string is reserved for this purpose; an explicitly named
/// column with the empty name *is* the default column.
pub const DEFAULT_COLUMN_NAME: &[u8] = b"";

/// A single named column inside a wide-column record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WideColumn {
    /// The column name.
    pub name: Vec<u8>,
    /// The column value.
    pub value: Vec<u8>,
}

impl WideColumn {
    /// Create a new column.
    #[must_use]
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// A wide-column record value: columns with unique names, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WideColumns {
    columns: Vec<WideColumn>,
}

impl WideColumns {
    /// Create a record from a list of columns. The columns are not sorted or
    /// checked here; call [`sort`](Self::sort) or validate with
    /// [`is_sorted_unique`](Self::is_sorted_unique) before persisting.
    #[must_use]
    pub fn new(columns: Vec<WideColumn>) -> Self {
        Self { columns }
    }

    /// Create a record holding a single default column, modeling a plain
    /// key-value pair.
    #[must_use]
    pub fn from_plain(value: impl Into<Vec<u8>>) -> Self {
        Self { columns: vec![WideColumn::new(DEFAULT_COLUMN_NAME, value)] }
    }

    /// Create a record from `(name, value)` pairs. Convenience for tests and
    /// callers assembling records inline.
    #[must_use]
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        Self {
            columns: pairs.into_iter().map(|(n, v)| WideColumn::new(n, v)).collect(),
        }
    }

    /// Sort the columns by name.
    pub fn sort(&mut self) {
        self.columns.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Whether the columns are sorted by strictly increasing name.
    #[must_use]
    pub fn is_sorted_unique(&self) -> bool {
        self.columns.windows(2).all(|w| w[0].name < w[1].name)
    }

    /// Look up a column value by name.
    #[must_use]
    pub fn get(&self, name: &[u8]) -> Option<&[u8]> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.value.as_slice())
    }

    /// Replace the value of the column with the given name. Returns `false`
    /// if no such column exists.
    pub fn set_value(&mut self, name: &[u8], value: Vec<u8>) -> bool {
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => {
                column.value = value;
                true
            }
            None => false,
        }
    }

    /// The default column's value, or empty if the record has no default
    /// column.
    #[must_use]
    pub fn default_value(&self) -> &[u8] {
        self.get(DEFAULT_COLUMN_NAME).unwrap_or_default()
    }

    /// Iterate over the columns.
    pub fn iter(&self) -> impl Iterator<Item = &WideColumn> {
        self.columns.iter()
    }

    /// The number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the record has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Serialize to the engine's record format.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| StorageError::Serialization(format!("failed to encode record: {e}")))
    }

    /// Deserialize from the engine's record format.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the bytes are not a valid
    /// record.
    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(v, _)| v)
            .map_err(|e| StorageError::Serialization(format!("failed to decode record: {e}")))
    }
}
