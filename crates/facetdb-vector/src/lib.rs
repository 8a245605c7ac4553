//! FacetDB Vector
//!
//! This crate provides the inverted-file (IVF) vector index consumed by
//! FacetDB's vector secondary index.
//!
//! # Overview
//!
//! An IVF index partitions the embedding space with a pre-trained coarse
//! quantizer: every vector is assigned to its nearest cluster centroid, and
//! each cluster's member vectors are kept in an "inverted list" as compact
//! codes. A K-nearest-neighbor search probes the `nprobe` clusters closest
//! to the query and scores every code streamed from their lists.
//!
//! The index does not own its inverted lists. They are pulled through the
//! [`InvertedListSource`] trait, so the lists can live in memory
//! ([`ArrayInvertedLists`]) or be streamed from a storage engine by the
//! caller.
//!
//! # Example
//!
//! ```ignore
//! use facetdb_vector::{ArrayInvertedLists, IvfFlatIndex, KMeansConfig};
//!
//! let index = IvfFlatIndex::train(4, 2, &training, &KMeansConfig::new().with_seed(42))?;
//!
//! let mut lists = ArrayInvertedLists::new(index.num_lists());
//! for (id, vector) in vectors.iter().enumerate() {
//!     let list_no = index.assign(vector)?;
//!     lists.add(list_no, id, index.encode(vector, list_no)?)?;
//! }
//!
//! let hits = index.search(&query, 8, index.num_lists(), &mut lists)?;
//! ```
//!
//! # Modules
//!
//! - [`distance`] - Distance functions
//! - [`encoding`] - Embedding byte layout
//! - [`error`] - Error types
//! - [`ivf`] - The IVF index and inverted-list traits
//! - [`kmeans`] - Coarse quantizer training

#![deny(clippy::unwrap_used)]

pub mod distance;
pub mod encoding;
pub mod error;
pub mod ivf;
pub mod kmeans;

pub use encoding::{bytes_to_floats, floats_to_bytes};
pub use error::{VectorError, VectorResult};
pub use ivf::{ArrayInvertedLists, InvertedListSource, IvfFlatIndex, ListEntries, ListEntry};
pub use kmeans::{FlatQuantizer, KMeansConfig};
