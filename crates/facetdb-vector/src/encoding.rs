//! Embedding byte layout.
//!
//! Embeddings cross the storage boundary as little-endian `f32` bytes, four
//! bytes per component. The layout is fixed; a stored embedding's byte
//! length is always `4 * dim`.

/// Encode a float vector as little-endian bytes.
#[must_use]
pub fn floats_to_bytes(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode little-endian bytes into a float vector.
///
/// Returns `None` if the length is not a multiple of four.
#[must_use]
pub fn bytes_to_floats(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}
