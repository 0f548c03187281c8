//! Converters: per-shape encode/decode strategies.
//!
//! A [`Converter`] writes and reads the payload that follows a Value tag.
//! Nested values go back through the envelope
//! ([`WriteContext::write_value`]/[`ReadContext::read_value`]) with their
//! declared slot type as the expected type.
//!
//! Shapes are a closed set ([`ShapeFamily`]), probed in a fixed priority
//! order after the built-in primitives and any custom converter declared on
//! a model.

pub mod collection;
pub mod dictionary;
pub mod enumeration;
pub mod nullable;
pub mod object;
pub mod primitive;
pub mod resolver;
pub mod scalar;
pub mod tuple;

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHasher;

use crate::codec::envelope::{ReadContext, WriteContext};
use crate::error::{DataError, SchemaError, SerializeError};
use crate::model::{GenericKind, TypeDef, TypeRef, Value};
use crate::registry::Registry;

pub use resolver::Resolver;

/// Encode/decode strategy for one runtime type.
pub trait Converter: Send + Sync {
    /// Writes the payload of `value`, whose converter type is `ty`.
    fn write(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &Value,
        ty: &TypeRef,
    ) -> Result<(), SerializeError>;

    /// Reads a payload of type `ty`.
    fn read(&self, ctx: &mut ReadContext<'_, '_>, ty: &TypeRef) -> Result<Value, SerializeError>;

    /// Structural equality and hashing, when they differ from the values'
    /// own `==` and `Hash`.
    fn comparer(&self) -> Option<&dyn StructuralComparer> {
        None
    }
}

/// Equality and hashing consistent with a converter's encoding.
pub trait StructuralComparer: Send + Sync {
    fn equals(&self, resolver: &Resolver, a: &Value, b: &Value) -> bool;
    fn hash(&self, resolver: &Resolver, value: &Value) -> u64;
}

/// Builds the custom converter declared on a model, once per subject type.
pub trait ConverterFactory: Send + Sync {
    fn build(&self, subject: &TypeRef) -> Result<Arc<dyn Converter>, SchemaError>;
}

impl<F> ConverterFactory for F
where
    F: Fn(&TypeRef) -> Result<Arc<dyn Converter>, SchemaError> + Send + Sync,
{
    fn build(&self, subject: &TypeRef) -> Result<Arc<dyn Converter>, SchemaError> {
        self(subject)
    }
}

/// Shape families, in probe order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeFamily {
    Nullable,
    Array,
    Collection,
    Dictionary,
    KeyValuePair,
    Tuple,
    Enum,
    ScalarWrapper,
    Object,
}

impl ShapeFamily {
    pub const PRIORITY: [ShapeFamily; 9] = [
        ShapeFamily::Nullable,
        ShapeFamily::Array,
        ShapeFamily::Collection,
        ShapeFamily::Dictionary,
        ShapeFamily::KeyValuePair,
        ShapeFamily::Tuple,
        ShapeFamily::Enum,
        ShapeFamily::ScalarWrapper,
        ShapeFamily::Object,
    ];

    /// Returns true if this family can handle `ty`.
    pub fn accepts(self, registry: &Registry, ty: &TypeRef) -> bool {
        let named = |ty: &TypeRef| match ty {
            TypeRef::Named(name) => registry.try_lookup(name),
            _ => None,
        };
        match self {
            ShapeFamily::Nullable => matches!(ty, TypeRef::Nullable(_)),
            ShapeFamily::Array => matches!(ty, TypeRef::Array { .. }),
            ShapeFamily::Collection => matches!(
                ty,
                TypeRef::Generic { kind: GenericKind::Collection(_), .. }
            ),
            ShapeFamily::Dictionary => {
                matches!(ty, TypeRef::Generic { kind: GenericKind::Map(_), .. })
            }
            ShapeFamily::KeyValuePair => matches!(
                ty,
                TypeRef::Generic { kind: GenericKind::KeyValuePair, args } if args.len() == 2
            ),
            ShapeFamily::Tuple => matches!(
                ty,
                TypeRef::Generic { kind: GenericKind::Tuple, args } if !args.is_empty()
            ),
            ShapeFamily::Enum => matches!(named(ty).as_deref(), Some(TypeDef::Enum(_))),
            ShapeFamily::ScalarWrapper => matches!(named(ty).as_deref(), Some(TypeDef::Wrapper(_))),
            ShapeFamily::Object => matches!(named(ty).as_deref(), Some(TypeDef::Model(_))),
        }
    }

    /// The family's converter.
    pub fn converter(self) -> Arc<dyn Converter> {
        match self {
            ShapeFamily::Nullable => Arc::new(nullable::NullableConverter),
            ShapeFamily::Array => Arc::new(collection::ArrayConverter),
            ShapeFamily::Collection => Arc::new(collection::CollectionConverter),
            ShapeFamily::Dictionary => Arc::new(dictionary::DictionaryConverter),
            ShapeFamily::KeyValuePair => Arc::new(tuple::PairConverter),
            ShapeFamily::Tuple => Arc::new(tuple::TupleConverter),
            ShapeFamily::Enum => Arc::new(enumeration::EnumConverter),
            ShapeFamily::ScalarWrapper => Arc::new(scalar::WrapperConverter),
            ShapeFamily::Object => Arc::new(object::ObjectConverter),
        }
    }
}

/// Fault for a value whose shape does not match its converter type.
pub(crate) fn shape_mismatch(ty: &TypeRef, value: &Value) -> SerializeError {
    DataError::TypeMismatch {
        expected: ty.to_string(),
        found: value
            .runtime_type()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "null".to_string()),
    }
    .into()
}

/// Fault for a converter type the converter cannot handle.
pub(crate) fn unsupported(ty: &TypeRef) -> SerializeError {
    SchemaError::UnsupportedType {
        type_name: ty.to_string(),
    }
    .into()
}

/// Element-wise equality in order.
pub(crate) fn sequence_equals(resolver: &Resolver, a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| resolver.equals(x, y))
}

/// Order-insensitive equality: every element of `a` matches a distinct
/// element of `b`.
pub(crate) fn unordered_equals<T>(a: &[T], b: &[T], eq: impl Fn(&T, &T) -> bool) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|x| {
        let found = b
            .iter()
            .enumerate()
            .position(|(j, y)| !used[j] && eq(x, y));
        match found {
            Some(j) => {
                used[j] = true;
                true
            }
            None => false,
        }
    })
}

/// Order-sensitive hash of a sequence.
pub(crate) fn sequence_hash<'v>(
    resolver: &Resolver,
    items: impl IntoIterator<Item = &'v Value>,
) -> u64 {
    let mut hasher = FxHasher::default();
    let mut len = 0usize;
    for item in items {
        hasher.write_u64(resolver.hash(item));
        len += 1;
    }
    len.hash(&mut hasher);
    hasher.finish()
}

/// Order-insensitive hash: a wrapping sum of element hashes.
pub(crate) fn unordered_hash(hashes: impl IntoIterator<Item = u64>) -> u64 {
    let mut len = 0u64;
    let sum = hashes.into_iter().fold(0u64, |acc, h| {
        len += 1;
        acc.wrapping_add(h)
    });
    let mut hasher = FxHasher::default();
    hasher.write_u64(sum);
    hasher.write_u64(len);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnumDef, ModelDef, ScalarKind, WrapperDef};

    #[test]
    fn test_family_probe_order() {
        let registry = Registry::new();
        registry
            .register_all::<_, TypeDef>([
                ModelDef::builder("Person").build().unwrap().into(),
                EnumDef::new("Color", ["Red"]).unwrap().into(),
                WrapperDef::new("Email", ScalarKind::Text).into(),
            ])
            .unwrap();
        let first = |ty: &TypeRef| {
            ShapeFamily::PRIORITY
                .into_iter()
                .find(|f| f.accepts(&registry, ty))
        };
        assert_eq!(first(&TypeRef::nullable(TypeRef::i32())), Some(ShapeFamily::Nullable));
        assert_eq!(first(&TypeRef::array(TypeRef::i32())), Some(ShapeFamily::Array));
        assert_eq!(first(&TypeRef::set(TypeRef::i32())), Some(ShapeFamily::Collection));
        assert_eq!(
            first(&TypeRef::dictionary(TypeRef::i32(), TypeRef::text())),
            Some(ShapeFamily::Dictionary)
        );
        assert_eq!(
            first(&TypeRef::pair(TypeRef::i32(), TypeRef::text())),
            Some(ShapeFamily::KeyValuePair)
        );
        assert_eq!(first(&TypeRef::tuple(vec![TypeRef::i32()])), Some(ShapeFamily::Tuple));
        assert_eq!(first(&TypeRef::named("Color")), Some(ShapeFamily::Enum));
        assert_eq!(first(&TypeRef::named("Email")), Some(ShapeFamily::ScalarWrapper));
        assert_eq!(first(&TypeRef::named("Person")), Some(ShapeFamily::Object));
        assert_eq!(first(&TypeRef::named("Unknown")), None);
        assert_eq!(first(&TypeRef::Any), None);
    }

    #[test]
    fn test_unordered_equals_respects_multiplicity() {
        let eq = |a: &i32, b: &i32| a == b;
        assert!(unordered_equals(&[1, 2, 2], &[2, 1, 2], eq));
        assert!(!unordered_equals(&[1, 1, 2], &[1, 2, 2], eq));
        assert!(!unordered_equals(&[1], &[1, 1], eq));
    }

    #[test]
    fn test_unordered_hash_ignores_order() {
        assert_eq!(unordered_hash([1, 2, 3]), unordered_hash([3, 1, 2]));
        assert_ne!(unordered_hash([1, 2]), unordered_hash([1, 2, 0]));
    }
}
