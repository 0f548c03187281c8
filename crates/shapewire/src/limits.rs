//! Security limits for decoding.
//!
//! The decoder reads untrusted input; every length it allocates from is
//! checked against one of these bounds first.

/// Maximum bytes in a varint.
pub const MAX_VARINT_BYTES: usize = 10;

/// Bytes reserved for a collection length that is patched in after the
/// elements are written (padded varint, fits any u32).
pub const LENGTH_SLOT_BYTES: usize = 5;

/// Maximum text length in bytes.
pub const MAX_STRING_LEN: usize = 16 * 1024 * 1024;

/// Maximum byte-sequence length.
pub const MAX_BYTES_LEN: usize = 64 * 1024 * 1024;

/// Maximum element count of a collection, dictionary or array.
pub const MAX_COLLECTION_LEN: usize = 16 * 1024 * 1024;

/// Maximum nesting depth of values in one stream.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Maximum stable type name length in a header.
pub const MAX_TYPE_NAME_LEN: usize = 1024;

/// Maximum generic nesting depth accepted by the type name parser.
pub const MAX_TYPE_NAME_DEPTH: usize = 32;

/// Maximum array rank.
pub const MAX_ARRAY_RANK: u8 = 32;

/// Maximum tuple arity.
pub const MAX_TUPLE_ARITY: usize = 7;

/// Maximum decompressed payload size.
pub const MAX_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;

/// Magic prefix of a zstd-compressed payload.
pub const MAGIC_COMPRESSED: &[u8; 4] = b"SWZ1";
