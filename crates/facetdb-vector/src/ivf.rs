//! The IVF index and inverted-list traits.
//!
//! [`IvfFlatIndex`] combines a trained [`FlatQuantizer`] with flat codes:
//! the fine code of a vector is its raw little-endian byte layout, so
//! `code_size == 4 * dim` and decoding loses nothing.
//!
//! The index reads inverted lists exclusively through the pull-based
//! [`InvertedListSource`] / [`ListEntries`] traits. A search probes one list
//! at a time and streams `(local id, code)` entries from it; the ids are
//! whatever the source hands out and are returned to the caller with the
//! final distances. [`ArrayInvertedLists`] is the in-memory source used as
//! the reference implementation and by tests.

use std::cmp::Ordering;

use crate::distance::l2_squared;
use crate::encoding::{bytes_to_floats, floats_to_bytes};
use crate::error::VectorError;
use crate::kmeans::{FlatQuantizer, KMeansConfig};

/// One entry streamed from an inverted list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// The id the source assigned to this vector.
    pub id: usize,
    /// The vector's fine code.
    pub code: Vec<u8>,
}

impl ListEntry {
    /// Create a new entry.
    #[must_use]
    pub const fn new(id: usize, code: Vec<u8>) -> Self {
        Self { id, code }
    }
}

/// A pull iterator over one inverted list.
pub trait ListEntries {
    /// The next entry of the list, or `None` when the list is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::ListAccess`] or
    /// [`VectorError::CodeSizeMismatch`] if the list cannot be read; such
    /// errors abort the current search.
    fn next_entry(&mut self) -> Result<Option<ListEntry>, VectorError>;
}

/// A source of inverted lists, probed one list at a time during a search.
pub trait InvertedListSource {
    /// Open an iterator over the given list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be opened.
    fn probe(&mut self, list_no: usize) -> Result<Box<dyn ListEntries + '_>, VectorError>;
}

/// In-memory inverted lists, the reference [`InvertedListSource`].
///
/// Entries keep their insertion order within each list.
#[derive(Debug, Clone)]
pub struct ArrayInvertedLists {
    lists: Vec<Vec<ListEntry>>,
}

impl ArrayInvertedLists {
    /// Create empty lists.
    #[must_use]
    pub fn new(num_lists: usize) -> Self {
        Self { lists: vec![Vec::new(); num_lists] }
    }

    /// The number of lists.
    #[must_use]
    pub fn num_lists(&self) -> usize {
        self.lists.len()
    }

    /// The number of entries in one list.
    #[must_use]
    pub fn list_len(&self, list_no: usize) -> usize {
        self.lists.get(list_no).map_or(0, Vec::len)
    }

    /// Append an entry to a list.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::ListOutOfRange`] if `list_no` is invalid.
    pub fn add(&mut self, list_no: usize, id: usize, code: Vec<u8>) -> Result<(), VectorError> {
        let num_lists = self.lists.len();
        let list = self
            .lists
            .get_mut(list_no)
            .ok_or(VectorError::ListOutOfRange { list: list_no, num_lists })?;
        list.push(ListEntry::new(id, code));
        Ok(())
    }
}

struct ArrayListEntries<'a> {
    entries: &'a [ListEntry],
    pos: usize,
}

impl ListEntries for ArrayListEntries<'_> {
    fn next_entry(&mut self) -> Result<Option<ListEntry>, VectorError> {
        let entry = self.entries.get(self.pos).cloned();
        self.pos += 1;
        Ok(entry)
    }
}

impl InvertedListSource for ArrayInvertedLists {
    fn probe(&mut self, list_no: usize) -> Result<Box<dyn ListEntries + '_>, VectorError> {
        let num_lists = self.lists.len();
        let entries = self
            .lists
            .get(list_no)
            .ok_or(VectorError::ListOutOfRange { list: list_no, num_lists })?;
        Ok(Box::new(ArrayListEntries { entries, pos: 0 }))
    }
}

/// An IVF index with flat (uncompressed) fine codes.
///
/// The quantizer is read-only after construction and the index holds no
/// other state, so a shared reference can serve concurrent searches; each
/// search's mutable state lives in the caller's list source.
#[derive(Debug, Clone)]
pub struct IvfFlatIndex {
    quantizer: FlatQuantizer,
}

impl IvfFlatIndex {
    /// Build an index around a pre-trained quantizer.
    #[must_use]
    pub fn new(quantizer: FlatQuantizer) -> Self {
        Self { quantizer }
    }

    /// Train a quantizer and build an index in one step.
    ///
    /// # Errors
    ///
    /// Propagates training errors from [`FlatQuantizer::train`].
    pub fn train(
        dim: usize,
        num_lists: usize,
        data: &[&[f32]],
        config: &KMeansConfig,
    ) -> Result<Self, VectorError> {
        Ok(Self::new(FlatQuantizer::train(dim, num_lists, data, config)?))
    }

    /// The dimensionality of indexed vectors.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.quantizer.dim()
    }

    /// The number of inverted lists.
    #[must_use]
    pub fn num_lists(&self) -> usize {
        self.quantizer.num_lists()
    }

    /// The byte length of every fine code.
    #[must_use]
    pub fn code_size(&self) -> usize {
        self.quantizer.dim() * 4
    }

    /// The underlying coarse quantizer.
    #[must_use]
    pub fn quantizer(&self) -> &FlatQuantizer {
        &self.quantizer
    }

    /// Assign a vector to its inverted list.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::DimensionMismatch`] for wrongly sized vectors.
    pub fn assign(&self, vector: &[f32]) -> Result<usize, VectorError> {
        self.quantizer.assign(vector)
    }

    /// Produce the fine code of a vector for the given list.
    ///
    /// The result is always `code_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::DimensionMismatch`] for wrongly sized vectors
    /// or [`VectorError::ListOutOfRange`] for an invalid list number.
    pub fn encode(&self, vector: &[f32], list_no: usize) -> Result<Vec<u8>, VectorError> {
        if vector.len() != self.dim() {
            return Err(VectorError::DimensionMismatch {
                expected: self.dim(),
                actual: vector.len(),
            });
        }
        if list_no >= self.num_lists() {
            return Err(VectorError::ListOutOfRange {
                list: list_no,
                num_lists: self.num_lists(),
            });
        }
        Ok(floats_to_bytes(vector))
    }

    /// Decode a fine code back into a vector.
    fn decode(&self, code: &[u8]) -> Result<Vec<f32>, VectorError> {
        if code.len() != self.code_size() {
            return Err(VectorError::CodeSizeMismatch {
                expected: self.code_size(),
                actual: code.len(),
            });
        }
        bytes_to_floats(code).ok_or(VectorError::CodeSizeMismatch {
            expected: self.code_size(),
            actual: code.len(),
        })
    }

    /// K-nearest-neighbor search.
    ///
    /// Probes the `nprobe` lists whose centroids are closest to the query
    /// and scores every entry streamed from them with squared L2 distance.
    /// Returns up to `k` `(id, distance)` pairs ordered by ascending
    /// distance; fewer if the probed lists hold fewer entries.
    ///
    /// # Errors
    ///
    /// Returns [`VectorError::DimensionMismatch`] for a wrongly sized query,
    /// [`VectorError::InvalidParameter`] for zero `k` or `nprobe`, and
    /// propagates list source failures.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        nprobe: usize,
        lists: &mut dyn InvertedListSource,
    ) -> Result<Vec<(usize, f32)>, VectorError> {
        if query.len() != self.dim() {
            return Err(VectorError::DimensionMismatch {
                expected: self.dim(),
                actual: query.len(),
            });
        }
        if k == 0 {
            return Err(VectorError::InvalidParameter("k must be positive"));
        }
        if nprobe == 0 {
            return Err(VectorError::InvalidParameter("nprobe must be positive"));
        }

        let probes = self.quantizer.nearest_lists(query, nprobe);
        let mut candidates: Vec<(usize, f32)> = Vec::new();

        for list_no in probes {
            let mut entries = lists.probe(list_no)?;
            while let Some(entry) = entries.next_entry()? {
                let stored = self.decode(&entry.code)?;
                candidates.push((entry.id, l2_squared(query, &stored)));
            }
        }

        candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        candidates.truncate(k);
        Ok(candidates)
    }
}
