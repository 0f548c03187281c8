//! Key-value pair and tuple converters: the slots in declaration order.

use std::hash::Hasher;

use rustc_hash::FxHasher;

use crate::codec::envelope::{ReadContext, WriteContext};
use crate::convert::{
    sequence_equals, sequence_hash, shape_mismatch, unsupported, Converter, Resolver,
    StructuralComparer,
};
use crate::error::{DataError, SerializeError};
use crate::model::{GenericKind, PairValue, TupleValue, TypeRef, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct PairConverter;

fn pair_type(ty: &TypeRef) -> Result<(&TypeRef, &TypeRef), SerializeError> {
    match ty {
        TypeRef::Generic {
            kind: GenericKind::KeyValuePair,
            args,
        } => match args.as_slice() {
            [key, value] => Ok((key, value)),
            _ => Err(unsupported(ty)),
        },
        _ => Err(unsupported(ty)),
    }
}

impl Converter for PairConverter {
    fn write(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &Value,
        ty: &TypeRef,
    ) -> Result<(), SerializeError> {
        let (key_type, value_type) = pair_type(ty)?;
        let Value::Pair(pair) = value else {
            return Err(shape_mismatch(ty, value));
        };
        ctx.write_value(&pair.key, key_type)?;
        ctx.write_value(&pair.value, value_type)
    }

    fn read(&self, ctx: &mut ReadContext<'_, '_>, ty: &TypeRef) -> Result<Value, SerializeError> {
        let (key_type, value_type) = pair_type(ty)?;
        let key = ctx.read_value(key_type)?;
        let value = ctx.read_value(value_type)?;
        Ok(Value::Pair(PairValue::new(
            key_type.clone(),
            value_type.clone(),
            key,
            value,
        )))
    }

    fn comparer(&self) -> Option<&dyn StructuralComparer> {
        Some(self)
    }
}

impl StructuralComparer for PairConverter {
    fn equals(&self, resolver: &Resolver, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Pair(a), Value::Pair(b)) => {
                resolver.equals(&a.key, &b.key) && resolver.equals(&a.value, &b.value)
            }
            _ => false,
        }
    }

    fn hash(&self, resolver: &Resolver, value: &Value) -> u64 {
        let mut hasher = FxHasher::default();
        if let Value::Pair(pair) = value {
            hasher.write_u64(resolver.hash(&pair.key));
            hasher.write_u64(resolver.hash(&pair.value));
        }
        hasher.finish()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TupleConverter;

fn tuple_types(ty: &TypeRef) -> Result<&[TypeRef], SerializeError> {
    match ty {
        TypeRef::Generic {
            kind: GenericKind::Tuple,
            args,
        } if !args.is_empty() => Ok(args),
        _ => Err(unsupported(ty)),
    }
}

impl Converter for TupleConverter {
    fn write(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &Value,
        ty: &TypeRef,
    ) -> Result<(), SerializeError> {
        let types = tuple_types(ty)?;
        let Value::Tuple(tuple) = value else {
            return Err(shape_mismatch(ty, value));
        };
        if tuple.items.len() != types.len() {
            return Err(DataError::ArityMismatch {
                type_name: ty.to_string(),
                expected: types.len(),
                found: tuple.items.len(),
            }
            .into());
        }
        for (item, item_type) in tuple.items.iter().zip(types) {
            ctx.write_value(item, item_type)?;
        }
        Ok(())
    }

    fn read(&self, ctx: &mut ReadContext<'_, '_>, ty: &TypeRef) -> Result<Value, SerializeError> {
        let types = tuple_types(ty)?;
        let items = types
            .iter()
            .map(|item_type| ctx.read_value(item_type))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Tuple(TupleValue::new(types.to_vec(), items)))
    }

    fn comparer(&self) -> Option<&dyn StructuralComparer> {
        Some(self)
    }
}

impl StructuralComparer for TupleConverter {
    fn equals(&self, resolver: &Resolver, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Tuple(a), Value::Tuple(b)) => sequence_equals(resolver, &a.items, &b.items),
            _ => false,
        }
    }

    fn hash(&self, resolver: &Resolver, value: &Value) -> u64 {
        match value {
            Value::Tuple(tuple) => sequence_hash(resolver, &tuple.items),
            _ => 0,
        }
    }
}
