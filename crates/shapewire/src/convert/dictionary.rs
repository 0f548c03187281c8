//! Dictionary converter.
//!
//! A dictionary is a collection of `kv<K,V>` pairs: each entry is a full pair
//! envelope behind a patched length slot, so an all-default entry shrinks to
//! a single Default tag. Keys may not be null.

use std::hash::Hasher;

use rustc_hash::FxHasher;

use crate::codec::envelope::{ReadContext, WriteContext};
use crate::convert::{
    shape_mismatch, unordered_equals, unordered_hash, unsupported, Converter, Resolver,
    StructuralComparer,
};
use crate::error::{DataError, SerializeError};
use crate::model::{GenericKind, MapKind, MapValue, PairValue, TypeRef, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct DictionaryConverter;

fn map_type(ty: &TypeRef) -> Result<(MapKind, &TypeRef, &TypeRef), SerializeError> {
    match ty {
        TypeRef::Generic {
            kind: GenericKind::Map(kind),
            args,
        } => match args.as_slice() {
            [key, value] => Ok((*kind, key, value)),
            _ => Err(unsupported(ty)),
        },
        _ => Err(unsupported(ty)),
    }
}

fn null_key() -> SerializeError {
    DataError::NullNotAllowed {
        context: "dictionary key",
    }
    .into()
}

fn null_entry() -> SerializeError {
    DataError::NullNotAllowed {
        context: "dictionary entry",
    }
    .into()
}

impl Converter for DictionaryConverter {
    fn write(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &Value,
        ty: &TypeRef,
    ) -> Result<(), SerializeError> {
        let (_, key_type, value_type) = map_type(ty)?;
        let Value::Map(map) = value else {
            return Err(shape_mismatch(ty, value));
        };
        let entry_type = TypeRef::pair(key_type.clone(), value_type.clone());
        let slot = ctx.writer().reserve_length();
        for (key, value) in &map.entries {
            if key.is_null() {
                return Err(null_key());
            }
            let entry = PairValue::new(
                key_type.clone(),
                value_type.clone(),
                key.clone(),
                value.clone(),
            );
            ctx.write_value(&Value::Pair(entry), &entry_type)?;
        }
        ctx.writer().patch_length(slot, map.entries.len(), "dictionary")?;
        Ok(())
    }

    fn read(&self, ctx: &mut ReadContext<'_, '_>, ty: &TypeRef) -> Result<Value, SerializeError> {
        let (kind, key_type, value_type) = map_type(ty)?;
        let entry_type = TypeRef::pair(key_type.clone(), value_type.clone());
        let len = ctx.reader().read_length("dictionary")?;
        let mut entries = Vec::with_capacity(len);
        for _ in 0..len {
            let pair = match ctx.read_value(&entry_type)? {
                Value::Pair(pair) => pair,
                Value::Null => return Err(null_entry()),
                other => return Err(shape_mismatch(&entry_type, &other)),
            };
            if pair.key.is_null() {
                return Err(null_key());
            }
            entries.push((*pair.key, *pair.value));
        }
        Ok(Value::Map(MapValue::new(
            kind,
            key_type.clone(),
            value_type.clone(),
            entries,
        )))
    }

    fn comparer(&self) -> Option<&dyn StructuralComparer> {
        Some(self)
    }
}

fn entry_hash(resolver: &Resolver, key: &Value, value: &Value) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write_u64(resolver.hash(key));
    hasher.write_u64(resolver.hash(value));
    hasher.finish()
}

impl StructuralComparer for DictionaryConverter {
    fn equals(&self, resolver: &Resolver, a: &Value, b: &Value) -> bool {
        let (Value::Map(a), Value::Map(b)) = (a, b) else {
            return false;
        };
        if a.kind != b.kind {
            return false;
        }
        let entry_eq = |x: &(Value, Value), y: &(Value, Value)| {
            resolver.equals(&x.0, &y.0) && resolver.equals(&x.1, &y.1)
        };
        if a.kind.is_unordered() {
            unordered_equals(&a.entries, &b.entries, entry_eq)
        } else {
            a.entries.len() == b.entries.len()
                && a.entries.iter().zip(&b.entries).all(|(x, y)| entry_eq(x, y))
        }
    }

    fn hash(&self, resolver: &Resolver, value: &Value) -> u64 {
        let Value::Map(map) = value else {
            return 0;
        };
        let hashes = map.entries.iter().map(|(k, v)| entry_hash(resolver, k, v));
        if map.kind.is_unordered() {
            unordered_hash(hashes)
        } else {
            let mut hasher = FxHasher::default();
            for hash in hashes {
                hasher.write_u64(hash);
            }
            hasher.write_usize(map.entries.len());
            hasher.finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::codec::options::SerializerOptions;
    use crate::registry::Registry;

    fn resolver() -> Resolver {
        Resolver::new(Arc::new(Registry::new()))
    }

    #[test]
    fn test_entries_roundtrip() {
        let resolver = resolver();
        let options = SerializerOptions::default();
        let ty = TypeRef::dictionary(TypeRef::text(), TypeRef::nullable(TypeRef::i32()));
        let map = Value::Map(MapValue::dictionary(
            TypeRef::text(),
            TypeRef::nullable(TypeRef::i32()),
            vec![("a".into(), Value::I32(1)), ("b".into(), Value::Null)],
        ));

        let mut ctx = WriteContext::new(&resolver, &options, None);
        ctx.write_value(&map, &ty).unwrap();
        let bytes = ctx.into_bytes();
        assert_eq!(bytes[1..6], [0x82, 0x80, 0x80, 0x80, 0x00]);

        let mut ctx = ReadContext::new(&resolver, &options, None, &bytes);
        assert_eq!(ctx.read_value(&ty).unwrap(), map);
        ctx.finish().unwrap();
    }

    #[test]
    fn test_null_key_rejected() {
        let resolver = resolver();
        let options = SerializerOptions::default();
        let ty = TypeRef::dictionary(TypeRef::nullable(TypeRef::text()), TypeRef::i32());
        let map = Value::Map(MapValue::dictionary(
            TypeRef::nullable(TypeRef::text()),
            TypeRef::i32(),
            vec![(Value::Null, Value::I32(1))],
        ));
        let mut ctx = WriteContext::new(&resolver, &options, None);
        assert!(matches!(
            ctx.write_value(&map, &ty),
            Err(SerializeError::Data(DataError::NullNotAllowed { .. }))
        ));

        // One pair entry whose key is a Null tag.
        let input = [2, 0x81, 0x80, 0x80, 0x80, 0x00, 2, 0, 2, 2];
        let mut ctx = ReadContext::new(&resolver, &options, None, &input);
        assert!(matches!(
            ctx.read_value(&ty),
            Err(SerializeError::Data(DataError::NullNotAllowed { context: "dictionary key" }))
        ));

        // One entry that is itself a Null tag.
        let input = [2, 0x81, 0x80, 0x80, 0x80, 0x00, 0];
        let mut ctx = ReadContext::new(&resolver, &options, None, &input);
        assert!(matches!(
            ctx.read_value(&ty),
            Err(SerializeError::Data(DataError::NullNotAllowed { context: "dictionary entry" }))
        ));
    }

    #[test]
    fn test_entries_are_pair_envelopes() {
        let resolver = resolver();
        let options = SerializerOptions::default();
        let ty = TypeRef::dictionary(TypeRef::text(), TypeRef::i32());
        let map = Value::Map(MapValue::dictionary(
            TypeRef::text(),
            TypeRef::i32(),
            vec![("a".into(), Value::I32(1)), ("".into(), Value::I32(0))],
        ));

        let mut ctx = WriteContext::new(&resolver, &options, None);
        ctx.write_value(&map, &ty).unwrap();
        let bytes = ctx.into_bytes();
        // Value tag, length slot, then a pair envelope per entry; the
        // all-default entry collapses to one Default tag.
        assert_eq!(bytes, [2, 0x82, 0x80, 0x80, 0x80, 0x00, 2, 2, 1, b'a', 2, 2, 1]);

        let mut ctx = ReadContext::new(&resolver, &options, None, &bytes);
        assert_eq!(ctx.read_value(&ty).unwrap(), map);
        ctx.finish().unwrap();
    }

    #[test]
    fn test_sorted_dictionary_is_ordered() {
        let resolver = resolver();
        let sorted = |entries: Vec<(Value, Value)>| {
            Value::Map(MapValue::new(
                MapKind::SortedDictionary,
                TypeRef::text(),
                TypeRef::i32(),
                entries,
            ))
        };
        let a = sorted(vec![("a".into(), Value::I32(1)), ("b".into(), Value::I32(2))]);
        let b = sorted(vec![("b".into(), Value::I32(2)), ("a".into(), Value::I32(1))]);
        // Construction sorts both, so they are equal entry by entry.
        assert!(resolver.equals(&a, &b));
        assert_eq!(resolver.hash(&a), resolver.hash(&b));
    }
}
