//! zstd framing for payloads.
//!
//! A compressed payload is `SWZ1` magic + uncompressed size (varint) + zstd
//! data. The magic's first byte is not a wire tag, so a reader can tell both
//! forms apart from the first byte alone.

use std::io::Read;

use crate::codec::primitives::{Reader, Writer};
use crate::error::DataError;
use crate::limits::{MAGIC_COMPRESSED, MAX_PAYLOAD_SIZE};

/// Returns true if `input` starts with the compressed-payload magic.
pub fn is_compressed(input: &[u8]) -> bool {
    input.starts_with(MAGIC_COMPRESSED)
}

/// Compresses an encoded payload.
pub fn compress(payload: &[u8], level: i32) -> Result<Vec<u8>, DataError> {
    let compressed = zstd::encode_all(payload, level)
        .map_err(|e| DataError::CompressionFailed(e.to_string()))?;

    let mut writer = Writer::with_capacity(MAGIC_COMPRESSED.len() + 10 + compressed.len());
    writer.write_bytes(MAGIC_COMPRESSED);
    writer.write_varint(payload.len() as u64);
    writer.write_bytes(&compressed);
    Ok(writer.into_bytes())
}

/// Decompresses a framed payload.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, DataError> {
    if !is_compressed(input) {
        return Err(DataError::InvalidMagic);
    }
    let mut reader = Reader::new(&input[MAGIC_COMPRESSED.len()..]);
    let declared_size = reader.read_varint("uncompressed_size")? as usize;

    if declared_size > MAX_PAYLOAD_SIZE {
        return Err(DataError::LengthExceedsLimit {
            field: "uncompressed_size",
            len: declared_size,
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let decoder = zstd::Decoder::new(reader.remaining())
        .map_err(|e| DataError::DecompressionFailed(e.to_string()))?;

    // Read at most one byte past the declared size so an oversized stream is
    // caught without inflating it completely.
    let mut decompressed = Vec::with_capacity(declared_size);
    decoder
        .take(declared_size as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| DataError::DecompressionFailed(e.to_string()))?;

    if decompressed.len() != declared_size {
        return Err(DataError::UncompressedSizeMismatch {
            declared: declared_size,
            actual: decompressed.len(),
        });
    }

    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let payload = vec![2u8; 4096];
        let framed = compress(&payload, 3).unwrap();
        assert!(is_compressed(&framed));
        assert!(framed.len() < payload.len());
        assert_eq!(decompress(&framed).unwrap(), payload);
    }

    #[test]
    fn test_size_mismatch() {
        let mut framed = compress(b"hello", 3).unwrap();
        // Declared size lives right after the magic.
        framed[MAGIC_COMPRESSED.len()] = 4;
        assert!(matches!(
            decompress(&framed),
            Err(DataError::UncompressedSizeMismatch { declared: 4, .. })
        ));
    }

    #[test]
    fn test_invalid_magic() {
        assert!(matches!(decompress(&[2, 0]), Err(DataError::InvalidMagic)));
    }

    #[test]
    fn test_declared_size_limit() {
        let mut writer = Writer::new();
        writer.write_bytes(MAGIC_COMPRESSED);
        writer.write_varint(MAX_PAYLOAD_SIZE as u64 + 1);
        assert!(matches!(
            decompress(writer.as_bytes()),
            Err(DataError::LengthExceedsLimit { .. })
        ));
    }
}
