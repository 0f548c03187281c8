//! Collection and array converters.
//!
//! Collections are written as a length followed by the elements, each as a
//! full envelope against the element type. The length goes into a reserved
//! fixed-width slot that is patched once the elements are written. Arrays
//! know their dimensions up front and write them as plain varints.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::codec::envelope::{ReadContext, WriteContext};
use crate::convert::{
    sequence_equals, sequence_hash, shape_mismatch, unordered_equals, unordered_hash, unsupported,
    Converter, Resolver, StructuralComparer,
};
use crate::error::{DataError, SerializeError};
use crate::limits::MAX_COLLECTION_LEN;
use crate::model::{ArrayValue, CollectionKind, CollectionValue, GenericKind, TypeRef, Value};

/// Converter for lists and sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionConverter;

fn collection_type(ty: &TypeRef) -> Result<(CollectionKind, &TypeRef), SerializeError> {
    match ty {
        TypeRef::Generic {
            kind: GenericKind::Collection(kind),
            args,
        } => match args.as_slice() {
            [element] => Ok((*kind, element)),
            _ => Err(unsupported(ty)),
        },
        _ => Err(unsupported(ty)),
    }
}

impl Converter for CollectionConverter {
    fn write(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &Value,
        ty: &TypeRef,
    ) -> Result<(), SerializeError> {
        let (_, element) = collection_type(ty)?;
        let Value::Collection(collection) = value else {
            return Err(shape_mismatch(ty, value));
        };
        let slot = ctx.writer().reserve_length();
        for item in &collection.items {
            ctx.write_value(item, element)?;
        }
        ctx.writer()
            .patch_length(slot, collection.items.len(), "collection")?;
        Ok(())
    }

    fn read(&self, ctx: &mut ReadContext<'_, '_>, ty: &TypeRef) -> Result<Value, SerializeError> {
        let (kind, element) = collection_type(ty)?;
        let len = ctx.reader().read_length("collection")?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(ctx.read_value(element)?);
        }
        Ok(Value::Collection(CollectionValue::new(kind, element.clone(), items)))
    }

    fn comparer(&self) -> Option<&dyn StructuralComparer> {
        Some(self)
    }
}

impl StructuralComparer for CollectionConverter {
    fn equals(&self, resolver: &Resolver, a: &Value, b: &Value) -> bool {
        let (Value::Collection(a), Value::Collection(b)) = (a, b) else {
            return false;
        };
        if a.kind != b.kind {
            return false;
        }
        if a.kind.is_unordered() {
            unordered_equals(&a.items, &b.items, |x, y| resolver.equals(x, y))
        } else {
            sequence_equals(resolver, &a.items, &b.items)
        }
    }

    fn hash(&self, resolver: &Resolver, value: &Value) -> u64 {
        let Value::Collection(collection) = value else {
            return 0;
        };
        if collection.kind.is_unordered() {
            unordered_hash(collection.items.iter().map(|item| resolver.hash(item)))
        } else {
            sequence_hash(resolver, &collection.items)
        }
    }
}

/// Converter for single and multi-dimensional arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayConverter;

fn array_type(ty: &TypeRef) -> Result<(&TypeRef, usize), SerializeError> {
    match ty {
        TypeRef::Array { element, rank } if *rank > 0 => Ok((element, *rank as usize)),
        _ => Err(unsupported(ty)),
    }
}

impl Converter for ArrayConverter {
    fn write(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &Value,
        ty: &TypeRef,
    ) -> Result<(), SerializeError> {
        let (element, rank) = array_type(ty)?;
        let Value::Array(array) = value else {
            return Err(shape_mismatch(ty, value));
        };
        if array.lengths.len() != rank {
            return Err(DataError::ArityMismatch {
                type_name: ty.to_string(),
                expected: rank,
                found: array.lengths.len(),
            }
            .into());
        }
        let total = array
            .lengths
            .iter()
            .try_fold(1usize, |acc, len| acc.checked_mul(*len))
            .unwrap_or(usize::MAX);
        if total > MAX_COLLECTION_LEN {
            return Err(DataError::TooLong {
                field: "array",
                len: total,
                max: MAX_COLLECTION_LEN,
            }
            .into());
        }
        if total != array.items.len() {
            return Err(DataError::ArityMismatch {
                type_name: ty.to_string(),
                expected: total,
                found: array.items.len(),
            }
            .into());
        }
        for len in &array.lengths {
            ctx.writer().write_varint(*len as u64);
        }
        for item in &array.items {
            ctx.write_value(item, element)?;
        }
        Ok(())
    }

    fn read(&self, ctx: &mut ReadContext<'_, '_>, ty: &TypeRef) -> Result<Value, SerializeError> {
        let (element, rank) = array_type(ty)?;
        let mut lengths = Vec::with_capacity(rank);
        for _ in 0..rank {
            lengths.push(ctx.reader().read_length("array")?);
        }
        let total = lengths
            .iter()
            .try_fold(1usize, |acc, len| acc.checked_mul(*len))
            .unwrap_or(usize::MAX);
        if total > MAX_COLLECTION_LEN {
            return Err(DataError::LengthExceedsLimit {
                field: "array",
                len: total,
                max: MAX_COLLECTION_LEN,
            }
            .into());
        }
        if total > ctx.reader().remaining_len() {
            return Err(DataError::UnexpectedEof { context: "array" }.into());
        }
        let mut items = Vec::with_capacity(total);
        for _ in 0..total {
            items.push(ctx.read_value(element)?);
        }
        let array = ArrayValue::with_lengths(element.clone(), lengths, items).ok_or_else(|| {
            DataError::ArityMismatch {
                type_name: ty.to_string(),
                expected: rank,
                found: 0,
            }
        })?;
        Ok(Value::Array(array))
    }

    fn comparer(&self) -> Option<&dyn StructuralComparer> {
        Some(self)
    }
}

impl StructuralComparer for ArrayConverter {
    fn equals(&self, resolver: &Resolver, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Array(a), Value::Array(b)) => {
                a.lengths == b.lengths && sequence_equals(resolver, &a.items, &b.items)
            }
            _ => false,
        }
    }

    fn hash(&self, resolver: &Resolver, value: &Value) -> u64 {
        let mut hasher = FxHasher::default();
        if let Value::Array(array) = value {
            array.lengths.hash(&mut hasher);
            hasher.write_u64(sequence_hash(resolver, &array.items));
        }
        hasher.finish()
    }
}
