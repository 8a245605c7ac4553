//! FacetDB
//!
//! A transactional secondary-index framework layered over a wide-column
//! key-value store, with an IVF vector index as its flagship index kind.
//!
//! # Overview
//!
//! Applications declare secondary indices over primary records; every write
//! through a database transaction atomically keeps primary data and index
//! entries consistent, in the same transaction and under the same row
//! locks. The framework is generic over index semantics via the
//! [`SecondaryIndex`] trait; [`IvfIndex`] implements it for approximate
//! K-nearest-neighbor search, persisting the vector index's inverted lists
//! as ordinary key-value entries.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use facetdb::{
//!     IvfFlatIndex, IvfIndex, KMeansConfig, MemEngine, SecondaryIndex,
//!     SecondaryIndexIterator, TransactionDb, WideColumns,
//! };
//! use facetdb_vector::floats_to_bytes;
//!
//! // Train the vector index up front, then declare it at open time.
//! let vector_index = IvfFlatIndex::train(4, 2, &training, &KMeansConfig::new().with_seed(42))?;
//! let ivf = Arc::new(IvfIndex::new(vector_index, "embedding"));
//!
//! let db = TransactionDb::open(MemEngine::new(), vec![ivf.clone()]);
//! let primary = db.create_column_family("primary")?;
//! let secondary = db.create_column_family("secondary")?;
//! ivf.bind_column_families(primary, secondary)?;
//!
//! // Writes maintain the index automatically.
//! let mut txn = db.begin_transaction()?;
//! txn.put_entity(
//!     Some(primary),
//!     b"42",
//!     WideColumns::from_pairs([(b"embedding".to_vec(), floats_to_bytes(&[0.0, 1.0, 0.0, 0.0]))]),
//!     true,
//! )?;
//! txn.commit()?;
//!
//! // KNN queries run over a cursor on the secondary column family.
//! let mut cursor = SecondaryIndexIterator::new(ivf.as_ref(), db.new_iterator(secondary)?);
//! let neighbors = ivf.find_knn(&mut cursor, &floats_to_bytes(&query), 8, 2)?;
//! ```
//!
//! # Modules
//!
//! - [`codec`] - Byte codecs for secondary-index keys
//! - [`cursor`] - Prefix-bounded cursor over a secondary column family
//! - [`db`] - Database wiring for secondary indices
//! - [`error`] - Error types
//! - [`index`] - The secondary-index contract
//! - [`ivf`] - The IVF vector secondary index
//! - [`transaction`] - The index-maintaining transaction wrapper

#![deny(clippy::unwrap_used)]

pub mod codec;
pub mod cursor;
pub mod db;
pub mod error;
pub mod index;
pub mod ivf;
pub mod transaction;

pub use cursor::SecondaryIndexIterator;
pub use db::TransactionDb;
pub use error::{Error, Result};
pub use index::{ColumnFamilyBinding, SecondaryIndex};
pub use ivf::IvfIndex;
pub use transaction::IndexedTransaction;

// Re-export the storage types that appear in this crate's API.
pub use facetdb_storage::{
    ColumnFamilyId, MemEngine, MemEngineOptions, RawIterator, StorageError, Transaction,
    TransactionEngine, WideColumn, WideColumns, DEFAULT_COLUMN_NAME,
};

// Re-export the vector types needed to construct and feed an [`IvfIndex`].
pub use facetdb_vector::{bytes_to_floats, floats_to_bytes, IvfFlatIndex, KMeansConfig};
