//! Conversions between Rust types and [`Value`] trees.
//!
//! Each implementing type reports the static [`TypeRef`] it is encoded as,
//! which the serializer uses as the expected type of the top-level value.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::{BuildHasher, Hash};

use uuid::Uuid;

use crate::error::{DataError, SchemaError};
use crate::model::schema::TypeDef;
use crate::model::type_ref::{CollectionKind, MapKind, TypeRef};
use crate::model::value::{CollectionValue, MapValue, TupleValue, Value};

/// Converts a Rust value into a [`Value`].
pub trait ToValue {
    /// Static type this Rust type is encoded as.
    fn type_ref() -> TypeRef
    where
        Self: Sized;

    fn to_value(&self) -> Value;
}

/// Reconstructs a Rust value from a [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, DataError>;
}

/// A Rust type backed by a registered model definition.
pub trait Model: ToValue + FromValue + 'static {
    /// Definition registered for this type.
    fn definition() -> Result<TypeDef, SchemaError>;
}

/// Owned byte sequence, encoded as the `by` primitive rather than a list of
/// bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ByteBuf(pub Vec<u8>);

/// Builds the fault for a value of the wrong shape.
pub fn mismatch<T: ToValue>(found: &Value) -> DataError {
    DataError::TypeMismatch {
        expected: T::type_ref().to_string(),
        found: found
            .runtime_type()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "null".to_string()),
    }
}

macro_rules! impl_primitive {
    ($($ty:ty => $variant:ident, $ctor:expr);* $(;)?) => {
        $(
            impl ToValue for $ty {
                fn type_ref() -> TypeRef {
                    TypeRef::Primitive($ctor)
                }

                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, DataError> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(mismatch::<Self>(&other)),
                    }
                }
            }
        )*
    };
}

use crate::model::type_ref::Primitive as P;

impl_primitive! {
    bool => Bool, P::Bool;
    u8 => U8, P::U8;
    i8 => I8, P::I8;
    i16 => I16, P::I16;
    u16 => U16, P::U16;
    i32 => I32, P::I32;
    u32 => U32, P::U32;
    i64 => I64, P::I64;
    u64 => U64, P::U64;
    f32 => F32, P::F32;
    f64 => F64, P::F64;
    char => Char, P::Char;
    String => Text, P::Text;
    Uuid => Uuid, P::Uuid;
}

impl ToValue for ByteBuf {
    fn type_ref() -> TypeRef {
        TypeRef::bytes()
    }

    fn to_value(&self) -> Value {
        Value::Bytes(self.0.clone())
    }
}

impl FromValue for ByteBuf {
    fn from_value(value: Value) -> Result<Self, DataError> {
        match value {
            Value::Bytes(v) => Ok(ByteBuf(v)),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn type_ref() -> TypeRef {
        TypeRef::nullable(T::type_ref())
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, DataError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

fn collection_items(
    value: Value,
    kind: CollectionKind,
    expected: impl FnOnce() -> TypeRef,
) -> Result<Vec<Value>, DataError> {
    match value {
        Value::Collection(c) if c.kind == kind => Ok(c.items),
        other => Err(DataError::TypeMismatch {
            expected: expected().to_string(),
            found: other
                .runtime_type()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "null".to_string()),
        }),
    }
}

fn map_entries(
    value: Value,
    kind: MapKind,
    expected: impl FnOnce() -> TypeRef,
) -> Result<Vec<(Value, Value)>, DataError> {
    match value {
        Value::Map(m) if m.kind == kind => Ok(m.entries),
        other => Err(DataError::TypeMismatch {
            expected: expected().to_string(),
            found: other
                .runtime_type()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "null".to_string()),
        }),
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn type_ref() -> TypeRef {
        TypeRef::list(T::type_ref())
    }

    fn to_value(&self) -> Value {
        Value::Collection(CollectionValue::list(
            T::type_ref(),
            self.iter().map(ToValue::to_value).collect(),
        ))
    }
}

impl<T: ToValue + FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, DataError> {
        collection_items(value, CollectionKind::List, Self::type_ref)?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

impl<T: ToValue, S> ToValue for HashSet<T, S> {
    fn type_ref() -> TypeRef {
        TypeRef::set(T::type_ref())
    }

    fn to_value(&self) -> Value {
        Value::Collection(CollectionValue::new(
            CollectionKind::HashSet,
            T::type_ref(),
            self.iter().map(ToValue::to_value).collect(),
        ))
    }
}

impl<T, S> FromValue for HashSet<T, S>
where
    T: ToValue + FromValue + Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_value(value: Value) -> Result<Self, DataError> {
        collection_items(value, CollectionKind::HashSet, Self::type_ref)?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

impl<T: ToValue> ToValue for BTreeSet<T> {
    fn type_ref() -> TypeRef {
        TypeRef::sorted_set(T::type_ref())
    }

    fn to_value(&self) -> Value {
        Value::Collection(CollectionValue::new(
            CollectionKind::SortedSet,
            T::type_ref(),
            self.iter().map(ToValue::to_value).collect(),
        ))
    }
}

impl<T: ToValue + FromValue + Ord> FromValue for BTreeSet<T> {
    fn from_value(value: Value) -> Result<Self, DataError> {
        collection_items(value, CollectionKind::SortedSet, Self::type_ref)?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

impl<K: ToValue, V: ToValue, S> ToValue for HashMap<K, V, S> {
    fn type_ref() -> TypeRef {
        TypeRef::dictionary(K::type_ref(), V::type_ref())
    }

    fn to_value(&self) -> Value {
        Value::Map(MapValue::dictionary(
            K::type_ref(),
            V::type_ref(),
            self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect(),
        ))
    }
}

impl<K, V, S> FromValue for HashMap<K, V, S>
where
    K: ToValue + FromValue + Eq + Hash,
    V: ToValue + FromValue,
    S: BuildHasher + Default,
{
    fn from_value(value: Value) -> Result<Self, DataError> {
        map_entries(value, MapKind::Dictionary, Self::type_ref)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect()
    }
}

impl<K: ToValue, V: ToValue> ToValue for BTreeMap<K, V> {
    fn type_ref() -> TypeRef {
        TypeRef::sorted_dictionary(K::type_ref(), V::type_ref())
    }

    fn to_value(&self) -> Value {
        Value::Map(MapValue::new(
            MapKind::SortedDictionary,
            K::type_ref(),
            V::type_ref(),
            self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect(),
        ))
    }
}

impl<K, V> FromValue for BTreeMap<K, V>
where
    K: ToValue + FromValue + Ord,
    V: ToValue + FromValue,
{
    fn from_value(value: Value) -> Result<Self, DataError> {
        map_entries(value, MapKind::SortedDictionary, Self::type_ref)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect()
    }
}

macro_rules! impl_tuple {
    ($len:expr; $($name:ident : $idx:tt),+) => {
        impl<$($name: ToValue),+> ToValue for ($($name,)+) {
            fn type_ref() -> TypeRef {
                TypeRef::tuple(vec![$($name::type_ref()),+])
            }

            fn to_value(&self) -> Value {
                Value::Tuple(TupleValue::new(
                    vec![$($name::type_ref()),+],
                    vec![$(self.$idx.to_value()),+],
                ))
            }
        }

        impl<$($name: ToValue + FromValue),+> FromValue for ($($name,)+) {
            fn from_value(value: Value) -> Result<Self, DataError> {
                let tuple = match value {
                    Value::Tuple(t) if t.items.len() == $len => t,
                    other => return Err(mismatch::<Self>(&other)),
                };
                let mut items = tuple.items.into_iter();
                Ok(($($name::from_value(items.next().unwrap_or_default())?,)+))
            }
        }
    };
}

impl_tuple!(2; A: 0, B: 1);
impl_tuple!(3; A: 0, B: 1, C: 2);
