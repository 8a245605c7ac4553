//! The IVF vector secondary index.
//!
//! [`IvfIndex`] binds a pre-trained [`IvfFlatIndex`] to the secondary-index
//! contract. On write, the indexed embedding column is rewritten to its
//! coarse cluster id, the cluster id becomes the secondary key prefix, and
//! the fine code becomes the secondary value, so the secondary column
//! family holds the index's inverted lists as
//! `varint(cluster_id) ∥ primary_key → code` entries.
//!
//! On read, [`find_knn`](IvfIndex::find_knn) drives the vector library's
//! search over those entries: each probed cluster streams its codes through
//! a cursor seek, and every streamed entry is assigned a dense local id
//! whose primary key is recorded in a per-call context. The returned local
//! ids are translated back to primary keys and paired with their distances.

use facetdb_storage::{ColumnFamilyId, RawIterator};
use facetdb_vector::{
    bytes_to_floats, InvertedListSource, IvfFlatIndex, ListEntries, ListEntry, VectorError,
};

use crate::codec::{decode_varint_signed, encode_varint_signed};
use crate::cursor::SecondaryIndexIterator;
use crate::error::{Error, Result};
use crate::index::{ColumnFamilyBinding, SecondaryIndex};

/// A secondary index over an embedding column, backed by an IVF vector
/// index with the key-value store as its inverted-list persistence layer.
///
/// The vector index is treated as read-only after construction and searches
/// run serially per call, so one `IvfIndex` serves concurrent transactions.
pub struct IvfIndex {
    index: IvfFlatIndex,
    primary_column_name: Vec<u8>,
    binding: ColumnFamilyBinding,
}

impl IvfIndex {
    /// Create an index over the given primary column, taking ownership of
    /// the pre-trained vector index.
    #[must_use]
    pub fn new(index: IvfFlatIndex, primary_column_name: impl Into<Vec<u8>>) -> Self {
        Self { index, primary_column_name: primary_column_name.into(), binding: ColumnFamilyBinding::new() }
    }

    /// The wrapped vector index.
    #[must_use]
    pub fn vector_index(&self) -> &IvfFlatIndex {
        &self.index
    }

    /// Decode an embedding from its byte layout, checking the dimension.
    fn embedding_from_bytes(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        let dim = self.index.dim();
        if bytes.len() != dim * 4 {
            return Err(Error::InvalidArgument(format!(
                "incorrectly sized vector: expected {} bytes, got {}",
                dim * 4,
                bytes.len()
            )));
        }
        bytes_to_floats(bytes).ok_or_else(|| {
            Error::InvalidArgument("incorrectly sized vector".to_string())
        })
    }

    /// Parse a serialized cluster id, requiring exact consumption and a
    /// label in `[0, num_lists)`.
    fn parse_label(&self, bytes: &[u8]) -> Option<i64> {
        let (label, read) = decode_varint_signed(bytes)?;
        let in_range = label >= 0 && (label as usize) < self.index.num_lists();
        (read == bytes.len() && in_range).then_some(label)
    }

    /// Assign an embedding (as bytes) to its cluster.
    fn assign_label(&self, embedding_bytes: &[u8]) -> Result<i64> {
        let embedding = self.embedding_from_bytes(embedding_bytes)?;
        let label = self
            .index
            .assign(&embedding)
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        if label >= self.index.num_lists() {
            return Err(Error::InvalidArgument(
                "unexpected label returned by coarse quantizer".to_string(),
            ));
        }
        Ok(label as i64)
    }

    /// K-nearest-neighbors search for `target` using a cursor over this
    /// index's secondary column family.
    ///
    /// Up to `neighbors` `(primary_key, distance)` pairs are returned in
    /// ascending distance order, searching the `probes` inverted lists
    /// closest to the target; fewer if the probed lists are exhausted
    /// first. Distances are squared L2.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the target is not `dim * 4`
    /// bytes or `neighbors` or `probes` is zero, and [`Error::Corruption`]
    /// if the stored entries or the vector search violate the index's
    /// invariants; nothing is returned in either case.
    pub fn find_knn<I: RawIterator>(
        &self,
        it: &mut SecondaryIndexIterator<'_, I>,
        target: &[u8],
        neighbors: usize,
        probes: usize,
    ) -> Result<Vec<(Vec<u8>, f32)>> {
        let query = self.embedding_from_bytes(target)?;
        if neighbors == 0 {
            return Err(Error::InvalidArgument("invalid number of neighbors".to_string()));
        }
        if probes == 0 {
            return Err(Error::InvalidArgument("invalid number of probes".to_string()));
        }

        let mut lists =
            KvInvertedLists { it, keys: Vec::new(), code_size: self.index.code_size() };

        let hits = self
            .index
            .search(&query, neighbors, probes, &mut lists)
            .map_err(|e| Error::Corruption(e.to_string()))?;

        let mut result = Vec::with_capacity(hits.len());
        for (id, distance) in hits {
            let key = lists.keys.get(id).ok_or_else(|| {
                Error::Corruption("unexpected id returned by vector search".to_string())
            })?;
            result.push((key.clone(), distance));
        }
        Ok(result)
    }
}

impl SecondaryIndex for IvfIndex {
    fn bind_column_families(
        &self,
        primary: ColumnFamilyId,
        secondary: ColumnFamilyId,
    ) -> Result<()> {
        self.binding.bind(primary, secondary)
    }

    fn primary_column_family(&self) -> Option<ColumnFamilyId> {
        self.binding.primary()
    }

    fn secondary_column_family(&self) -> Option<ColumnFamilyId> {
        self.binding.secondary()
    }

    fn primary_column_name(&self) -> &[u8] {
        &self.primary_column_name
    }

    /// Rewrite the stored embedding to its serialized cluster id.
    fn update_primary_column_value(
        &self,
        _primary_key: &[u8],
        primary_column_value: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let label = self.assign_label(primary_column_value)?;
        Ok(Some(encode_varint_signed(label)))
    }

    /// The serialized cluster id is the prefix. Accepts two input forms: a
    /// rewritten column value (an exact, in-range varint) passes through,
    /// while a raw query embedding is assigned to its cluster first.
    fn secondary_key_prefix(
        &self,
        _primary_key: &[u8],
        primary_column_value: &[u8],
    ) -> Result<Vec<u8>> {
        if self.parse_label(primary_column_value).is_some() {
            return Ok(primary_column_value.to_vec());
        }
        let label = self.assign_label(primary_column_value)?;
        Ok(encode_varint_signed(label))
    }

    /// The fine code of the original embedding, relative to the rewritten
    /// cluster id.
    fn secondary_value(
        &self,
        _primary_key: &[u8],
        primary_column_value: &[u8],
        previous_column_value: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let label = self.parse_label(primary_column_value).ok_or_else(|| {
            Error::Corruption("invalid cluster id in rewritten column value".to_string())
        })?;
        let embedding = self
            .embedding_from_bytes(previous_column_value)
            .map_err(|e| Error::Corruption(e.to_string()))?;

        let code = self
            .index
            .encode(&embedding, label as usize)
            .map_err(|e| Error::Corruption(e.to_string()))?;
        if code.len() != self.index.code_size() {
            return Err(Error::Corruption(
                "code with unexpected size returned by fine encoder".to_string(),
            ));
        }
        Ok(Some(code))
    }
}

/// Per-call KNN context: the cursor being driven and the table translating
/// dense local ids back to primary keys.
///
/// Local ids densely enumerate the vectors visited during one
/// [`IvfIndex::find_knn`] call, in visit order; they are not stable across
/// calls.
struct KvInvertedLists<'c, 'a, I: RawIterator> {
    it: &'c mut SecondaryIndexIterator<'a, I>,
    keys: Vec<Vec<u8>>,
    code_size: usize,
}

impl<I: RawIterator> InvertedListSource for KvInvertedLists<'_, '_, I> {
    fn probe(
        &mut self,
        list_no: usize,
    ) -> std::result::Result<Box<dyn ListEntries + '_>, VectorError> {
        let label = encode_varint_signed(list_no as i64);
        self.it.seek(&label).map_err(|e| VectorError::ListAccess(e.to_string()))?;
        Ok(Box::new(KvListEntries { lists: self }))
    }
}

/// Streams one probed cluster's entries from the cursor, interning each
/// primary key under the next local id.
struct KvListEntries<'p, 'c, 'a, I: RawIterator> {
    lists: &'p mut KvInvertedLists<'c, 'a, I>,
}

impl<I: RawIterator> ListEntries for KvListEntries<'_, '_, '_, I> {
    fn next_entry(&mut self) -> std::result::Result<Option<ListEntry>, VectorError> {
        let it = &mut *self.lists.it;

        it.status().map_err(|e| VectorError::ListAccess(e.to_string()))?;
        if !it.valid() {
            return Ok(None);
        }
        if !it.prepare_value() {
            return Err(VectorError::ListAccess(
                "failed to prepare value during iteration".to_string(),
            ));
        }

        let code = match it.value() {
            Some(code) => code.to_vec(),
            None => {
                return Err(VectorError::ListAccess(
                    "missing value during iteration".to_string(),
                ))
            }
        };
        if code.len() != self.lists.code_size {
            return Err(VectorError::CodeSizeMismatch {
                expected: self.lists.code_size,
                actual: code.len(),
            });
        }

        let key = match it.primary_key() {
            Some(key) => key.to_vec(),
            None => {
                return Err(VectorError::ListAccess(
                    "missing key during iteration".to_string(),
                ))
            }
        };

        let id = self.lists.keys.len();
        self.lists.keys.push(key);
        it.next();

        Ok(Some(ListEntry::new(id, code)))
    }
}
