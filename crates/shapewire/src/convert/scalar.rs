//! Scalar wrapper converter.
//!
//! A wrapper is written as its single inner primitive. On read the wrapper's
//! factory, if any, rebuilds (and may reject) the inner value.

use crate::codec::envelope::{ReadContext, WriteContext};
use crate::convert::primitive::{read_primitive, write_primitive};
use crate::convert::{shape_mismatch, unsupported, Converter};
use crate::error::{Operation, SerializeError};
use crate::model::{TypeDef, TypeRef, Value, WrapperDef, WrapperValue};
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, Default)]
pub struct WrapperConverter;

fn lookup_wrapper(registry: &Registry, ty: &TypeRef) -> Result<WrapperDef, SerializeError> {
    let TypeRef::Named(name) = ty else {
        return Err(unsupported(ty));
    };
    match registry.lookup(name)?.as_ref() {
        TypeDef::Wrapper(def) => Ok(def.clone()),
        _ => Err(unsupported(ty)),
    }
}

impl Converter for WrapperConverter {
    fn write(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &Value,
        ty: &TypeRef,
    ) -> Result<(), SerializeError> {
        let def = lookup_wrapper(ctx.registry(), ty)?;
        let Value::Wrapper(wrapper) = value else {
            return Err(shape_mismatch(ty, value));
        };
        write_primitive(ctx.writer(), def.scalar().primitive(), &wrapper.inner)?;
        Ok(())
    }

    fn read(&self, ctx: &mut ReadContext<'_, '_>, ty: &TypeRef) -> Result<Value, SerializeError> {
        let def = lookup_wrapper(ctx.registry(), ty)?;
        let mut inner = read_primitive(ctx.reader(), def.scalar().primitive())?;
        if let Some(factory) = def.factory() {
            inner = factory(inner)
                .map_err(|e| SerializeError::wrap(Operation::Deserialize, def.name().as_str(), e))?;
        }
        Ok(Value::Wrapper(WrapperValue::new(def.name().clone(), inner)))
    }
}
