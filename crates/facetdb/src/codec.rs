//! Byte codecs for secondary-index keys.
//!
//! Cluster ids are signed 64-bit values encoded as zigzag LEB128 varints.
//! The encoding is self-terminating, which is why a secondary key can be
//! `varint(cluster_id) ∥ primary_key` with no separator: decoding consumes
//! exactly the prefix.

/// Map a signed value to an unsigned one so small magnitudes stay short.
#[inline]
const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[inline]
const fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Encode a signed 64-bit value as a zigzag LEB128 varint (at most ten
/// bytes).
#[must_use]
pub fn encode_varint_signed(value: i64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    let mut rest = zigzag_encode(value);
    loop {
        let byte = (rest & 0x7F) as u8;
        rest >>= 7;
        if rest == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

/// Decode a zigzag LEB128 varint from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed, or `None` if the
/// input is truncated or overlong.
#[must_use]
pub fn decode_varint_signed(bytes: &[u8]) -> Option<(i64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in bytes.iter().enumerate() {
        if shift >= 64 {
            return None;
        }
        result |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Some((zigzag_decode(result), i + 1));
        }
        shift += 7;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn small_values_are_one_byte() {
        for value in -64..64 {
            assert_eq!(encode_varint_signed(value).len(), 1, "value {value}");
        }
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode_varint_signed(0), vec![0x00]);
        assert_eq!(encode_varint_signed(-1), vec![0x01]);
        assert_eq!(encode_varint_signed(1), vec![0x02]);
        assert_eq!(encode_varint_signed(-2), vec![0x03]);
    }

    #[test]
    fn decode_reports_consumed_length() {
        let mut bytes = encode_varint_signed(300);
        let prefix_len = bytes.len();
        bytes.extend_from_slice(b"primary-key");

        let (value, read) = decode_varint_signed(&bytes).expect("decode");
        assert_eq!(value, 300);
        assert_eq!(read, prefix_len);
        assert_eq!(&bytes[read..], b"primary-key");
    }

    #[test]
    fn decode_rejects_truncated_input() {
        assert_eq!(decode_varint_signed(&[]), None);
        assert_eq!(decode_varint_signed(&[0x80]), None);
        assert_eq!(decode_varint_signed(&[0xFF, 0xFF]), None);
    }

    proptest! {
        #[test]
        fn roundtrip(value in any::<i64>()) {
            let encoded = encode_varint_signed(value);
            prop_assert!(encoded.len() <= 10);
            let (decoded, read) = decode_varint_signed(&encoded).expect("decode");
            prop_assert_eq!(decoded, value);
            prop_assert_eq!(read, encoded.len());
        }

        #[test]
        fn roundtrip_with_suffix(value in any::<i64>(), suffix in proptest::collection::vec(any::<u8>(), 0..32)) {
            let mut bytes = encode_varint_signed(value);
            let prefix_len = bytes.len();
            bytes.extend_from_slice(&suffix);
            let (decoded, read) = decode_varint_signed(&bytes).expect("decode");
            prop_assert_eq!(decoded, value);
            prop_assert_eq!(read, prefix_len);
        }
    }
}
