//! In-memory values.
//!
//! A [`Value`] is an owned tree. Every non-null value knows its own runtime
//! type: containers carry their declared element types and named values carry
//! their concrete type name. Owned trees cannot form cycles.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use uuid::Uuid;

use crate::model::type_ref::{CollectionKind, GenericKind, MapKind, Primitive, TypeName, TypeRef};

/// A dynamically typed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    U8(u8),
    I8(i8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(char),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Enum(EnumValue),
    Wrapper(WrapperValue),
    Object(ObjectValue),
    Collection(CollectionValue),
    Map(MapValue),
    Pair(PairValue),
    Tuple(TupleValue),
    Array(ArrayValue),
}

/// A variant of a registered enumeration.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub type_name: TypeName,
    pub variant: String,
}

/// A registered scalar wrapper around a single primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct WrapperValue {
    pub type_name: TypeName,
    pub inner: Box<Value>,
}

/// An instance of a registered model; `fields[i]` holds property index `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValue {
    pub type_name: TypeName,
    pub fields: Vec<Value>,
}

/// A homogeneous collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionValue {
    pub kind: CollectionKind,
    pub element: TypeRef,
    pub items: Vec<Value>,
}

/// A dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct MapValue {
    pub kind: MapKind,
    pub key: TypeRef,
    pub value: TypeRef,
    pub entries: Vec<(Value, Value)>,
}

/// A key-value pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairValue {
    pub key_type: TypeRef,
    pub value_type: TypeRef,
    pub key: Box<Value>,
    pub value: Box<Value>,
}

/// A fixed-arity tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleValue {
    pub types: Vec<TypeRef>,
    pub items: Vec<Value>,
}

/// A (possibly multi-dimensional) array stored in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub element: TypeRef,
    pub lengths: Vec<usize>,
    pub items: Vec<Value>,
}

impl EnumValue {
    pub fn new(type_name: impl Into<TypeName>, variant: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            variant: variant.into(),
        }
    }
}

impl WrapperValue {
    pub fn new(type_name: impl Into<TypeName>, inner: Value) -> Self {
        Self {
            type_name: type_name.into(),
            inner: Box::new(inner),
        }
    }
}

impl ObjectValue {
    pub fn new(type_name: impl Into<TypeName>, fields: Vec<Value>) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }

    /// Returns the field at a property index.
    pub fn field(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    /// Takes the field at a property index, leaving Null behind.
    pub fn take(&mut self, index: usize) -> Value {
        self.fields
            .get_mut(index)
            .map(std::mem::take)
            .unwrap_or(Value::Null)
    }
}

impl CollectionValue {
    /// Creates a collection; sorted sets are sorted and deduplicated.
    pub fn new(kind: CollectionKind, element: TypeRef, mut items: Vec<Value>) -> Self {
        if kind == CollectionKind::SortedSet {
            items.sort_by(Value::total_cmp);
            items.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
        }
        Self {
            kind,
            element,
            items,
        }
    }

    pub fn list(element: TypeRef, items: Vec<Value>) -> Self {
        Self::new(CollectionKind::List, element, items)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl MapValue {
    /// Creates a dictionary; sorted dictionaries are ordered by key.
    pub fn new(
        kind: MapKind,
        key: TypeRef,
        value: TypeRef,
        mut entries: Vec<(Value, Value)>,
    ) -> Self {
        if kind == MapKind::SortedDictionary {
            entries.sort_by(|a, b| a.0.total_cmp(&b.0));
            entries.dedup_by(|a, b| a.0.total_cmp(&b.0) == Ordering::Equal);
        }
        Self {
            kind,
            key,
            value,
            entries,
        }
    }

    pub fn dictionary(key: TypeRef, value: TypeRef, entries: Vec<(Value, Value)>) -> Self {
        Self::new(MapKind::Dictionary, key, value, entries)
    }

    /// Looks up a value by key using plain equality.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PairValue {
    pub fn new(key_type: TypeRef, value_type: TypeRef, key: Value, value: Value) -> Self {
        Self {
            key_type,
            value_type,
            key: Box::new(key),
            value: Box::new(value),
        }
    }
}

impl TupleValue {
    pub fn new(types: Vec<TypeRef>, items: Vec<Value>) -> Self {
        Self { types, items }
    }
}

impl ArrayValue {
    /// Creates a one-dimensional array.
    pub fn new(element: TypeRef, items: Vec<Value>) -> Self {
        Self {
            element,
            lengths: vec![items.len()],
            items,
        }
    }

    /// Creates a multi-dimensional array from row-major items.
    ///
    /// Returns None if the item count does not match the dimensions.
    pub fn with_lengths(element: TypeRef, lengths: Vec<usize>, items: Vec<Value>) -> Option<Self> {
        let expected = lengths
            .iter()
            .try_fold(1usize, |acc, len| acc.checked_mul(*len))?;
        if lengths.is_empty() || expected != items.len() {
            return None;
        }
        Some(Self {
            element,
            lengths,
            items,
        })
    }

    pub fn rank(&self) -> u8 {
        self.lengths.len() as u8
    }
}

impl Value {
    /// Canonical zero of a primitive.
    pub fn primitive_default(primitive: Primitive) -> Value {
        match primitive {
            Primitive::Bool => Value::Bool(false),
            Primitive::U8 => Value::U8(0),
            Primitive::I8 => Value::I8(0),
            Primitive::I16 => Value::I16(0),
            Primitive::U16 => Value::U16(0),
            Primitive::I32 => Value::I32(0),
            Primitive::U32 => Value::U32(0),
            Primitive::I64 => Value::I64(0),
            Primitive::U64 => Value::U64(0),
            Primitive::F32 => Value::F32(0.0),
            Primitive::F64 => Value::F64(0.0),
            Primitive::Char => Value::Char('\0'),
            Primitive::Text => Value::Text(String::new()),
            Primitive::Bytes => Value::Bytes(Vec::new()),
            Primitive::Uuid => Value::Uuid(Uuid::nil()),
        }
    }

    /// Returns true for Null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the primitive kind of a scalar value.
    pub fn primitive(&self) -> Option<Primitive> {
        Some(match self {
            Value::Bool(_) => Primitive::Bool,
            Value::U8(_) => Primitive::U8,
            Value::I8(_) => Primitive::I8,
            Value::I16(_) => Primitive::I16,
            Value::U16(_) => Primitive::U16,
            Value::I32(_) => Primitive::I32,
            Value::U32(_) => Primitive::U32,
            Value::I64(_) => Primitive::I64,
            Value::U64(_) => Primitive::U64,
            Value::F32(_) => Primitive::F32,
            Value::F64(_) => Primitive::F64,
            Value::Char(_) => Primitive::Char,
            Value::Text(_) => Primitive::Text,
            Value::Bytes(_) => Primitive::Bytes,
            Value::Uuid(_) => Primitive::Uuid,
            _ => return None,
        })
    }

    /// Returns the concrete runtime type, or None for Null.
    pub fn runtime_type(&self) -> Option<TypeRef> {
        if let Some(primitive) = self.primitive() {
            return Some(TypeRef::Primitive(primitive));
        }
        Some(match self {
            Value::Enum(v) => TypeRef::Named(v.type_name.clone()),
            Value::Wrapper(v) => TypeRef::Named(v.type_name.clone()),
            Value::Object(v) => TypeRef::Named(v.type_name.clone()),
            Value::Collection(v) => TypeRef::collection(v.kind, v.element.clone()),
            Value::Map(v) => TypeRef::map(v.kind, v.key.clone(), v.value.clone()),
            Value::Pair(v) => TypeRef::pair(v.key_type.clone(), v.value_type.clone()),
            Value::Tuple(v) => TypeRef::Generic {
                kind: GenericKind::Tuple,
                args: v.types.clone(),
            },
            Value::Array(v) => TypeRef::array_of_rank(v.element.clone(), v.rank()),
            _ => return None,
        })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<ObjectValue> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::U8(_) => 2,
            Value::I8(_) => 3,
            Value::I16(_) => 4,
            Value::U16(_) => 5,
            Value::I32(_) => 6,
            Value::U32(_) => 7,
            Value::I64(_) => 8,
            Value::U64(_) => 9,
            Value::F32(_) => 10,
            Value::F64(_) => 11,
            Value::Char(_) => 12,
            Value::Text(_) => 13,
            Value::Bytes(_) => 14,
            Value::Uuid(_) => 15,
            Value::Enum(_) => 16,
            Value::Wrapper(_) => 17,
            Value::Object(_) => 18,
            Value::Collection(_) => 19,
            Value::Map(_) => 20,
            Value::Pair(_) => 21,
            Value::Tuple(_) => 22,
            Value::Array(_) => 23,
        }
    }

    /// Total order used by sorted containers.
    ///
    /// Values of different kinds order by kind; floats use IEEE total order.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::U8(a), Value::U8(b)) => a.cmp(b),
            (Value::I8(a), Value::I8(b)) => a.cmp(b),
            (Value::I16(a), Value::I16(b)) => a.cmp(b),
            (Value::U16(a), Value::U16(b)) => a.cmp(b),
            (Value::I32(a), Value::I32(b)) => a.cmp(b),
            (Value::U32(a), Value::U32(b)) => a.cmp(b),
            (Value::I64(a), Value::I64(b)) => a.cmp(b),
            (Value::U64(a), Value::U64(b)) => a.cmp(b),
            (Value::F32(a), Value::F32(b)) => a.total_cmp(b),
            (Value::F64(a), Value::F64(b)) => a.total_cmp(b),
            (Value::Char(a), Value::Char(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Uuid(a), Value::Uuid(b)) => a.cmp(b),
            (Value::Enum(a), Value::Enum(b)) => a
                .type_name
                .cmp(&b.type_name)
                .then_with(|| a.variant.cmp(&b.variant)),
            (Value::Wrapper(a), Value::Wrapper(b)) => a
                .type_name
                .cmp(&b.type_name)
                .then_with(|| a.inner.total_cmp(&b.inner)),
            (Value::Object(a), Value::Object(b)) => a
                .type_name
                .cmp(&b.type_name)
                .then_with(|| cmp_slices(&a.fields, &b.fields)),
            (Value::Collection(a), Value::Collection(b)) => cmp_slices(&a.items, &b.items),
            (Value::Map(a), Value::Map(b)) => {
                for ((ak, av), (bk, bv)) in a.entries.iter().zip(&b.entries) {
                    let ord = ak.total_cmp(bk).then_with(|| av.total_cmp(bv));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.entries.len().cmp(&b.entries.len())
            }
            (Value::Pair(a), Value::Pair(b)) => a
                .key
                .total_cmp(&b.key)
                .then_with(|| a.value.total_cmp(&b.value)),
            (Value::Tuple(a), Value::Tuple(b)) => cmp_slices(&a.items, &b.items),
            (Value::Array(a), Value::Array(b)) => a
                .lengths
                .cmp(&b.lengths)
                .then_with(|| cmp_slices(&a.items, &b.items)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

fn cmp_slices(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = x.total_cmp(y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

// Order-sensitive; unordered containers hash through their converter instead.
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::U8(v) => v.hash(state),
            Value::I8(v) => v.hash(state),
            Value::I16(v) => v.hash(state),
            Value::U16(v) => v.hash(state),
            Value::I32(v) => v.hash(state),
            Value::U32(v) => v.hash(state),
            Value::I64(v) => v.hash(state),
            Value::U64(v) => v.hash(state),
            Value::F32(v) => v.to_bits().hash(state),
            Value::F64(v) => v.to_bits().hash(state),
            Value::Char(v) => v.hash(state),
            Value::Text(v) => v.hash(state),
            Value::Bytes(v) => v.hash(state),
            Value::Uuid(v) => v.hash(state),
            Value::Enum(v) => {
                v.type_name.hash(state);
                v.variant.hash(state);
            }
            Value::Wrapper(v) => {
                v.type_name.hash(state);
                v.inner.hash(state);
            }
            Value::Object(v) => {
                v.type_name.hash(state);
                v.fields.hash(state);
            }
            Value::Collection(v) => v.items.hash(state),
            Value::Map(v) => v.entries.hash(state),
            Value::Pair(v) => {
                v.key.hash(state);
                v.value.hash(state);
            }
            Value::Tuple(v) => v.items.hash(state),
            Value::Array(v) => {
                v.lengths.hash(state);
                v.items.hash(state);
            }
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    u8 => U8,
    i8 => I8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    char => Char,
    String => Text,
    Vec<u8> => Bytes,
    Uuid => Uuid,
    EnumValue => Enum,
    WrapperValue => Wrapper,
    ObjectValue => Object,
    CollectionValue => Collection,
    MapValue => Map,
    PairValue => Pair,
    TupleValue => Tuple,
    ArrayValue => Array,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_type() {
        assert_eq!(Value::Null.runtime_type(), None);
        assert_eq!(Value::I32(5).runtime_type(), Some(TypeRef::i32()));
        let list = CollectionValue::list(TypeRef::text(), vec!["a".into()]);
        assert_eq!(
            Value::from(list).runtime_type(),
            Some(TypeRef::list(TypeRef::text()))
        );
        let obj = ObjectValue::new("Person", vec![]);
        assert_eq!(Value::from(obj).runtime_type(), Some(TypeRef::named("Person")));
        let grid =
            ArrayValue::with_lengths(TypeRef::i32(), vec![2, 2], vec![Value::I32(0); 4]).unwrap();
        assert_eq!(
            Value::from(grid).runtime_type(),
            Some(TypeRef::array_of_rank(TypeRef::i32(), 2))
        );
    }

    #[test]
    fn test_sorted_containers_normalize() {
        let set = CollectionValue::new(
            CollectionKind::SortedSet,
            TypeRef::i32(),
            vec![Value::I32(3), Value::I32(1), Value::I32(3), Value::I32(2)],
        );
        assert_eq!(set.items, vec![Value::I32(1), Value::I32(2), Value::I32(3)]);

        let map = MapValue::new(
            MapKind::SortedDictionary,
            TypeRef::text(),
            TypeRef::i32(),
            vec![("b".into(), Value::I32(2)), ("a".into(), Value::I32(1))],
        );
        assert_eq!(map.entries[0].0, Value::from("a"));
        assert_eq!(map.get(&"b".into()), Some(&Value::I32(2)));
    }

    #[test]
    fn test_total_cmp_floats() {
        assert_eq!(Value::F64(-0.0).total_cmp(&Value::F64(0.0)), Ordering::Less);
        assert_eq!(Value::F64(f64::NAN).total_cmp(&Value::F64(f64::NAN)), Ordering::Equal);
        assert_eq!(Value::I32(1).total_cmp(&Value::Text("a".into())), Ordering::Less);
    }

    #[test]
    fn test_array_dimensions_checked() {
        assert!(
            ArrayValue::with_lengths(TypeRef::i32(), vec![2, 3], vec![Value::I32(0); 5]).is_none()
        );
        assert!(ArrayValue::with_lengths(TypeRef::i32(), vec![], vec![]).is_none());
        let empty = ArrayValue::with_lengths(TypeRef::i32(), vec![0, 3], vec![]).unwrap();
        assert_eq!(empty.rank(), 2);
    }

    #[test]
    fn test_take_field() {
        let mut obj = ObjectValue::new("P", vec![Value::I32(1)]);
        assert_eq!(obj.take(0), Value::I32(1));
        assert_eq!(obj.field(0), Some(&Value::Null));
        assert_eq!(obj.take(7), Value::Null);
    }
}
