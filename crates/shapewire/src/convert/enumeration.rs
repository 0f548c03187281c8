//! Enumeration converter: a variant is written as its name.

use crate::codec::envelope::{ReadContext, WriteContext};
use crate::convert::{shape_mismatch, unsupported, Converter};
use crate::error::{DataError, SerializeError};
use crate::limits::MAX_TYPE_NAME_LEN;
use crate::model::{EnumDef, EnumValue, TypeDef, TypeRef, Value};
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, Default)]
pub struct EnumConverter;

fn lookup_enum(registry: &Registry, ty: &TypeRef) -> Result<EnumDef, SerializeError> {
    let TypeRef::Named(name) = ty else {
        return Err(unsupported(ty));
    };
    match registry.lookup(name)?.as_ref() {
        TypeDef::Enum(def) => Ok(def.clone()),
        _ => Err(unsupported(ty)),
    }
}

impl Converter for EnumConverter {
    fn write(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &Value,
        ty: &TypeRef,
    ) -> Result<(), SerializeError> {
        let def = lookup_enum(ctx.registry(), ty)?;
        let Value::Enum(variant) = value else {
            return Err(shape_mismatch(ty, value));
        };
        if !def.contains(&variant.variant) {
            return Err(DataError::UnknownEnumVariant {
                type_name: def.name().to_string(),
                variant: variant.variant.clone(),
            }
            .into());
        }
        ctx.writer().write_string(&variant.variant);
        Ok(())
    }

    fn read(&self, ctx: &mut ReadContext<'_, '_>, ty: &TypeRef) -> Result<Value, SerializeError> {
        let def = lookup_enum(ctx.registry(), ty)?;
        let variant = ctx.reader().read_string(MAX_TYPE_NAME_LEN, "enum variant")?;
        if !def.contains(&variant) {
            return Err(DataError::UnknownEnumVariant {
                type_name: def.name().to_string(),
                variant,
            }
            .into());
        }
        Ok(Value::Enum(EnumValue::new(def.name().clone(), variant)))
    }
}
