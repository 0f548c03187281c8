//! Composite object converter.
//!
//! Walks the model's ordered property schema. Each property is written as a
//! full envelope with the property's declared type as the expected type, so
//! the payload is simply the properties in index order.

use std::hash::Hasher;
use std::sync::Arc;

use rustc_hash::FxHasher;

use crate::codec::envelope::{ReadContext, WriteContext};
use crate::convert::{shape_mismatch, unsupported, Converter, Resolver, StructuralComparer};
use crate::error::{DataError, SerializeError};
use crate::model::{ModelDef, ObjectValue, TypeDef, TypeRef, Value};
use crate::registry::Registry;

/// Converter for registered models.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectConverter;

fn lookup_model(registry: &Registry, ty: &TypeRef) -> Result<Arc<TypeDef>, SerializeError> {
    let TypeRef::Named(name) = ty else {
        return Err(unsupported(ty));
    };
    Ok(registry.lookup(name)?)
}

fn serializable<'d>(def: &'d TypeDef, ty: &TypeRef) -> Result<&'d ModelDef, SerializeError> {
    match def.as_model() {
        Some(model) if !model.is_serializable() => Err(DataError::NotSerializable {
            type_name: model.name().to_string(),
        }
        .into()),
        Some(model) => Ok(model),
        None => Err(unsupported(ty)),
    }
}

impl Converter for ObjectConverter {
    fn write(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &Value,
        ty: &TypeRef,
    ) -> Result<(), SerializeError> {
        let def = lookup_model(ctx.registry(), ty)?;
        let model = serializable(&def, ty)?;
        let Value::Object(object) = value else {
            return Err(shape_mismatch(ty, value));
        };
        if object.fields.len() != model.properties().len() {
            return Err(DataError::FieldCountMismatch {
                type_name: model.name().to_string(),
                expected: model.properties().len(),
                found: object.fields.len(),
            }
            .into());
        }
        let include_inspect_only = ctx.options().includes_inspect_only();
        for (property, field) in model.properties().iter().zip(&object.fields) {
            if property.inspect_only && !include_inspect_only {
                continue;
            }
            ctx.write_member(field, &property.ty, property.emit_default_value)?;
        }
        Ok(())
    }

    fn read(&self, ctx: &mut ReadContext<'_, '_>, ty: &TypeRef) -> Result<Value, SerializeError> {
        let def = lookup_model(ctx.registry(), ty)?;
        let model = serializable(&def, ty)?;
        let include_inspect_only = ctx.options().includes_inspect_only();
        let mut fields = Vec::with_capacity(model.properties().len());
        for property in model.properties() {
            let field = if property.inspect_only && !include_inspect_only {
                ctx.registry().default_or_null(&property.ty)?
            } else {
                ctx.read_value(&property.ty)?
            };
            fields.push(field);
        }
        Ok(Value::Object(ObjectValue::new(model.name().clone(), fields)))
    }

    fn comparer(&self) -> Option<&dyn StructuralComparer> {
        Some(self)
    }
}

impl StructuralComparer for ObjectConverter {
    fn equals(&self, resolver: &Resolver, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Object(a), Value::Object(b)) => {
                a.type_name == b.type_name
                    && a.fields.len() == b.fields.len()
                    && a.fields.iter().zip(&b.fields).all(|(x, y)| resolver.equals(x, y))
            }
            _ => false,
        }
    }

    fn hash(&self, resolver: &Resolver, value: &Value) -> u64 {
        let mut hasher = FxHasher::default();
        if let Value::Object(object) = value {
            hasher.write(object.type_name.as_bytes());
            for field in &object.fields {
                hasher.write_u64(resolver.hash(field));
            }
        }
        hasher.finish()
    }
}
