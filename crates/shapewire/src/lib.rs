//! Shapewire: polymorphic binary object serialization.
//!
//! This crate encodes dynamically typed object graphs into a compact binary
//! stream that carries just enough type information to be read back, and
//! evolves stored data across schema versions.
//!
//! # Overview
//!
//! - **Stable type names**: every type has a short, language-neutral name
//!   (`i`, `s`, `li<Person>`, `di<s,i>`) used in type headers
//! - **Polymorphism**: a value stored in a slot of a wider type carries a
//!   header naming its concrete type; a value whose slot pins its type does
//!   not
//! - **Versioning**: a logical model lists its historical shapes; old data is
//!   migrated step by step to the current shape on read
//! - **Compactness**: canonical defaults are written as a single tag byte
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use shapewire::{ModelDef, ObjectValue, Registry, Serializer, TypeRef, Value};
//!
//! let registry = Registry::new();
//! registry
//!     .register(
//!         ModelDef::builder("Person")
//!             .sealed()
//!             .field(0, "name", TypeRef::text())
//!             .field(1, "age", TypeRef::i32())
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! let serializer = Serializer::new(Arc::new(registry));
//! let person = Value::Object(ObjectValue::new("Person", vec!["Ann".into(), Value::I32(36)]));
//!
//! let bytes = serializer.to_bytes(&person, &TypeRef::named("Person")).unwrap();
//! let decoded = serializer.from_bytes(&bytes, &TypeRef::named("Person")).unwrap();
//! assert_eq!(decoded, person);
//! ```
//!
//! # Modules
//!
//! - [`model`]: Runtime types, values and type definitions
//! - [`registry`]: Name ↔ type registry and version chains
//! - [`convert`]: Converter resolution and per-shape strategies
//! - [`codec`]: Wire envelope, byte codec, compression and the serializer
//! - [`validate`]: Validation collaborator and schema conformance checks
//! - [`error`]: Error types
//! - [`limits`]: Security limits for decoding
//!
//! # Security
//!
//! The decoder is designed to safely handle untrusted input:
//! - Lengths are checked against limits and the remaining input before
//!   anything is allocated
//! - Varints are limited to prevent overflow
//! - Nesting depth is bounded
//! - Invalid data is rejected with descriptive errors
//!
//! # Wire Format
//!
//! Each value starts with a tag byte: `0` null, `1` canonical default, `2`
//! value, `3` header (type name + version, then `1` or `2`). Payloads may be
//! zstd-compressed behind a `SWZ1` magic; the decoder detects both forms.

pub mod codec;
pub mod convert;
pub mod error;
pub mod limits;
pub mod model;
pub mod registry;
pub mod validate;

// Re-export commonly used types at crate root
pub use codec::{Purpose, Serializer, SerializerOptions, TypeInfoEmission};
pub use convert::{Converter, ConverterFactory, Resolver, StructuralComparer};
pub use error::{BoxError, DataError, ErrorCode, SchemaError, SerializeError, ValidationError};
pub use model::{
    ArrayValue, ByteBuf, CollectionKind, CollectionValue, EnumDef, EnumValue, FromValue,
    GenericKind, MapKind, MapValue, Model, ModelDef, ObjectValue, PairValue, Primitive,
    PropertyDef, ScalarKind, ToValue, TupleValue, TypeDef, TypeName, TypeRef, Value, WrapperDef,
    WrapperValue,
};
pub use registry::{format_type, parse_type, Registry};
pub use validate::{SchemaValidator, Validator};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
