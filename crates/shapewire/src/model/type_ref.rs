//! Runtime type descriptors.
//!
//! A [`TypeRef`] names the shape of a value: a built-in primitive, a
//! registered named type, or a composition of those through nullability,
//! arrays and the closed set of generic containers.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Stable name of a registered type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(Arc<str>);

impl TypeName {
    /// Creates a type name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for TypeName {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TypeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    Bool,
    U8,
    I8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Char,
    Text,
    Bytes,
    Uuid,
}

impl Primitive {
    /// All primitives, in mnemonic table order.
    pub const ALL: [Primitive; 15] = [
        Primitive::Bool,
        Primitive::U8,
        Primitive::I8,
        Primitive::I16,
        Primitive::U16,
        Primitive::I32,
        Primitive::U32,
        Primitive::I64,
        Primitive::U64,
        Primitive::F32,
        Primitive::F64,
        Primitive::Char,
        Primitive::Text,
        Primitive::Bytes,
        Primitive::Uuid,
    ];

    /// Returns the stable short name used on the wire.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Primitive::Bool => "z",
            Primitive::U8 => "u1",
            Primitive::I8 => "i1",
            Primitive::I16 => "i2",
            Primitive::U16 => "u2",
            Primitive::I32 => "i",
            Primitive::U32 => "u4",
            Primitive::I64 => "i8",
            Primitive::U64 => "u8",
            Primitive::F32 => "f",
            Primitive::F64 => "d",
            Primitive::Char => "c",
            Primitive::Text => "s",
            Primitive::Bytes => "by",
            Primitive::Uuid => "g",
        }
    }

    /// Returns true for fixed-size value types (everything but text and bytes).
    pub fn is_value_type(self) -> bool {
        !matches!(self, Primitive::Text | Primitive::Bytes)
    }

    /// Returns true if the primitive has a canonical zero that may be elided.
    pub fn has_default(self) -> bool {
        self != Primitive::Bytes
    }
}

/// Homogeneous collection containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionKind {
    List,
    ImmutableList,
    HashSet,
    SortedSet,
    ImmutableSet,
}

impl CollectionKind {
    /// Returns true if element order is not part of the value's identity.
    pub fn is_unordered(self) -> bool {
        matches!(self, CollectionKind::HashSet | CollectionKind::ImmutableSet)
    }

    /// Returns true if elements are unique.
    pub fn is_set(self) -> bool {
        matches!(
            self,
            CollectionKind::HashSet | CollectionKind::SortedSet | CollectionKind::ImmutableSet
        )
    }
}

/// Key-value containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapKind {
    Dictionary,
    SortedDictionary,
    ImmutableDictionary,
}

impl MapKind {
    /// Returns true if entry order is not part of the value's identity.
    pub fn is_unordered(self) -> bool {
        !matches!(self, MapKind::SortedDictionary)
    }
}

/// Open generic container definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GenericKind {
    Collection(CollectionKind),
    Map(MapKind),
    KeyValuePair,
    /// Fixed-arity tuple; the arity is the argument count.
    Tuple,
}

impl GenericKind {
    /// All generic definitions, in mnemonic table order.
    pub const ALL: [GenericKind; 10] = [
        GenericKind::Collection(CollectionKind::List),
        GenericKind::Collection(CollectionKind::ImmutableList),
        GenericKind::Collection(CollectionKind::HashSet),
        GenericKind::Collection(CollectionKind::SortedSet),
        GenericKind::Collection(CollectionKind::ImmutableSet),
        GenericKind::Map(MapKind::Dictionary),
        GenericKind::Map(MapKind::SortedDictionary),
        GenericKind::Map(MapKind::ImmutableDictionary),
        GenericKind::KeyValuePair,
        GenericKind::Tuple,
    ];

    /// Returns the stable short name used on the wire.
    pub fn mnemonic(self) -> &'static str {
        match self {
            GenericKind::Collection(CollectionKind::List) => "li",
            GenericKind::Collection(CollectionKind::ImmutableList) => "il",
            GenericKind::Collection(CollectionKind::HashSet) => "hs",
            GenericKind::Collection(CollectionKind::SortedSet) => "ss",
            GenericKind::Collection(CollectionKind::ImmutableSet) => "is",
            GenericKind::Map(MapKind::Dictionary) => "di",
            GenericKind::Map(MapKind::SortedDictionary) => "sd",
            GenericKind::Map(MapKind::ImmutableDictionary) => "id",
            GenericKind::KeyValuePair => "kv",
            GenericKind::Tuple => "t",
        }
    }

    /// Returns the required argument count, or None for tuples.
    pub fn arity(self) -> Option<usize> {
        match self {
            GenericKind::Collection(_) => Some(1),
            GenericKind::Map(_) | GenericKind::KeyValuePair => Some(2),
            GenericKind::Tuple => None,
        }
    }
}

/// A runtime type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// The extendable root type; any value is assignable to it.
    Any,
    Primitive(Primitive),
    /// A registered model, enumeration or scalar wrapper.
    Named(TypeName),
    Nullable(Box<TypeRef>),
    Array { element: Box<TypeRef>, rank: u8 },
    Generic { kind: GenericKind, args: Vec<TypeRef> },
}

impl TypeRef {
    pub fn named(name: impl Into<TypeName>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn bool() -> Self {
        TypeRef::Primitive(Primitive::Bool)
    }

    pub fn i32() -> Self {
        TypeRef::Primitive(Primitive::I32)
    }

    pub fn i64() -> Self {
        TypeRef::Primitive(Primitive::I64)
    }

    pub fn f64() -> Self {
        TypeRef::Primitive(Primitive::F64)
    }

    pub fn text() -> Self {
        TypeRef::Primitive(Primitive::Text)
    }

    pub fn bytes() -> Self {
        TypeRef::Primitive(Primitive::Bytes)
    }

    /// Nullable form of a value type; reference types are already nullable
    /// and are returned unchanged, as are types that are nullable already.
    pub fn nullable(inner: TypeRef) -> Self {
        if inner.is_static_value_type() {
            TypeRef::Nullable(Box::new(inner))
        } else {
            inner
        }
    }

    pub fn array(element: TypeRef) -> Self {
        Self::array_of_rank(element, 1)
    }

    pub fn array_of_rank(element: TypeRef, rank: u8) -> Self {
        TypeRef::Array {
            element: Box::new(element),
            rank,
        }
    }

    pub fn collection(kind: CollectionKind, element: TypeRef) -> Self {
        TypeRef::Generic {
            kind: GenericKind::Collection(kind),
            args: vec![element],
        }
    }

    pub fn list(element: TypeRef) -> Self {
        Self::collection(CollectionKind::List, element)
    }

    pub fn set(element: TypeRef) -> Self {
        Self::collection(CollectionKind::HashSet, element)
    }

    pub fn sorted_set(element: TypeRef) -> Self {
        Self::collection(CollectionKind::SortedSet, element)
    }

    pub fn map(kind: MapKind, key: TypeRef, value: TypeRef) -> Self {
        TypeRef::Generic {
            kind: GenericKind::Map(kind),
            args: vec![key, value],
        }
    }

    pub fn dictionary(key: TypeRef, value: TypeRef) -> Self {
        Self::map(MapKind::Dictionary, key, value)
    }

    pub fn sorted_dictionary(key: TypeRef, value: TypeRef) -> Self {
        Self::map(MapKind::SortedDictionary, key, value)
    }

    pub fn pair(key: TypeRef, value: TypeRef) -> Self {
        TypeRef::Generic {
            kind: GenericKind::KeyValuePair,
            args: vec![key, value],
        }
    }

    pub fn tuple(items: Vec<TypeRef>) -> Self {
        TypeRef::Generic {
            kind: GenericKind::Tuple,
            args: items,
        }
    }

    /// Strips one level of nullability.
    pub fn underlying(&self) -> &TypeRef {
        match self {
            TypeRef::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Returns true if the type is known to be a value type without
    /// consulting the registry (named types are decided by their definition).
    pub fn is_static_value_type(&self) -> bool {
        match self {
            TypeRef::Primitive(p) => p.is_value_type(),
            TypeRef::Generic {
                kind: GenericKind::KeyValuePair | GenericKind::Tuple,
                ..
            } => true,
            _ => false,
        }
    }
}

impl From<Primitive> for TypeRef {
    fn from(primitive: Primitive) -> Self {
        TypeRef::Primitive(primitive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullable_only_wraps_value_types() {
        assert_eq!(
            TypeRef::nullable(TypeRef::i32()),
            TypeRef::Nullable(Box::new(TypeRef::i32()))
        );
        assert_eq!(TypeRef::nullable(TypeRef::text()), TypeRef::text());
        assert_eq!(TypeRef::nullable(TypeRef::named("Person")), TypeRef::named("Person"));

        let twice = TypeRef::nullable(TypeRef::nullable(TypeRef::i64()));
        assert_eq!(twice.underlying(), &TypeRef::i64());
    }

    #[test]
    fn test_mnemonics_unique() {
        let mut seen = std::collections::HashSet::new();
        for p in Primitive::ALL {
            assert!(seen.insert(p.mnemonic()), "duplicate {}", p.mnemonic());
        }
        for g in GenericKind::ALL {
            assert!(seen.insert(g.mnemonic()), "duplicate {}", g.mnemonic());
        }
        assert!(!seen.contains("o"));
    }

    #[test]
    fn test_type_name_borrows_as_str() {
        let mut map = std::collections::HashMap::new();
        map.insert(TypeName::from("Person"), 1);
        assert_eq!(map.get("Person"), Some(&1));
    }
}
