//! Data model.
//!
//! This module contains the in-memory side of the engine:
//! - Runtime type descriptors ([`TypeRef`])
//! - Dynamic values ([`Value`])
//! - Type definitions and their builders
//! - The bridge between Rust types and values ([`ToValue`], [`FromValue`])

pub mod schema;
pub mod type_ref;
pub mod typed;
pub mod value;

pub use schema::{
    EnumDef, HistoricalLink, MigrateFn, ModelBuilder, ModelDef, PropertyDef, ScalarKind, TypeDef,
    WrapperDef, WrapperFactory,
};
pub use type_ref::{CollectionKind, GenericKind, MapKind, Primitive, TypeName, TypeRef};
pub use typed::{ByteBuf, FromValue, Model, ToValue};
pub use value::{
    ArrayValue, CollectionValue, EnumValue, MapValue, ObjectValue, PairValue, TupleValue, Value,
    WrapperValue,
};
