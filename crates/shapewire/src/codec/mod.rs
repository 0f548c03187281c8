//! Binary encoding/decoding.
//!
//! [`Serializer`] is the entry point. The lower layers are public for custom
//! converters: [`primitives`] holds the varint/zig-zag byte codec,
//! [`envelope`] the tag/header layer that every nested value goes through.

pub mod compress;
pub mod envelope;
pub mod options;
pub mod primitives;
pub mod serializer;

pub use compress::{compress, decompress, is_compressed};
pub use envelope::{ReadContext, WireTag, WriteContext};
pub use options::{Purpose, SerializerOptions, TypeInfoEmission};
pub use primitives::{
    zigzag_decode32, zigzag_decode64, zigzag_encode32, zigzag_encode64, LengthSlot, Reader, Writer,
};
pub use serializer::Serializer;
