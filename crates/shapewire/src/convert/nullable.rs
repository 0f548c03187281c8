//! Nullable wrapper converter.
//!
//! Null itself never reaches a converter (it is a tag of its own), so a
//! nullable slot holding a value is encoded exactly like its inner type.

use crate::codec::envelope::{ReadContext, WriteContext};
use crate::convert::{unsupported, Converter};
use crate::error::SerializeError;
use crate::model::{TypeRef, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct NullableConverter;

fn inner(ty: &TypeRef) -> Result<&TypeRef, SerializeError> {
    match ty {
        TypeRef::Nullable(inner) => Ok(inner),
        other => Err(unsupported(other)),
    }
}

impl Converter for NullableConverter {
    fn write(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &Value,
        ty: &TypeRef,
    ) -> Result<(), SerializeError> {
        let inner = inner(ty)?;
        let converter = ctx.resolver().resolve(inner)?;
        converter.write(ctx, value, inner)
    }

    fn read(&self, ctx: &mut ReadContext<'_, '_>, ty: &TypeRef) -> Result<Value, SerializeError> {
        let inner = inner(ty)?;
        let converter = ctx.resolver().resolve(inner)?;
        converter.read(ctx, inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::codec::options::SerializerOptions;
    use crate::convert::Resolver;
    use crate::registry::Registry;

    #[test]
    fn test_nullable_payload_matches_inner() {
        let resolver = Resolver::new(Arc::new(Registry::new()));
        let options = SerializerOptions::default();
        let ty = TypeRef::nullable(TypeRef::i32());

        let mut ctx = WriteContext::new(&resolver, &options, None);
        ctx.write_value(&Value::I32(-2), &ty).unwrap();
        ctx.write_value(&Value::Null, &ty).unwrap();
        ctx.write_value(&Value::I32(0), &ty).unwrap();
        let bytes = ctx.into_bytes();
        assert_eq!(bytes, [2, 3, 0, 1]);

        let mut ctx = ReadContext::new(&resolver, &options, None, &bytes);
        assert_eq!(ctx.read_value(&ty).unwrap(), Value::I32(-2));
        assert_eq!(ctx.read_value(&ty).unwrap(), Value::Null);
        assert_eq!(ctx.read_value(&ty).unwrap(), Value::I32(0));
        ctx.finish().unwrap();
    }
}
