//! Validation of objects on write and read.
//!
//! The serializer calls a [`Validator`] before writing and after reading
//! (and migrating) each object, when
//! [`SerializerOptions::validate_on_read_write`] is set. Failures propagate
//! unchanged as [`ValidationError`].
//!
//! [`SchemaValidator`] checks that an object's fields conform to its model's
//! declared property types. Applications plug in their own rules by
//! implementing the trait or passing a closure.

use std::sync::Arc;

use crate::codec::options::SerializerOptions;
use crate::error::ValidationError;
use crate::model::{ObjectValue, TypeDef, Value};
use crate::registry::Registry;

/// Validation collaborator.
pub trait Validator: Send + Sync {
    fn validate(&self, value: &Value, options: &SerializerOptions) -> Result<(), ValidationError>;
}

impl<F> Validator for F
where
    F: Fn(&Value, &SerializerOptions) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, value: &Value, options: &SerializerOptions) -> Result<(), ValidationError> {
        self(value, options)
    }
}

/// Checks objects against their registered property schema.
#[derive(Clone)]
pub struct SchemaValidator {
    registry: Arc<Registry>,
}

impl SchemaValidator {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    fn validate_object(&self, object: &ObjectValue) -> Result<(), ValidationError> {
        let model = match self.registry.try_lookup(&object.type_name).as_deref() {
            Some(TypeDef::Model(model)) => model.clone(),
            _ => {
                return Err(ValidationError::Rejected {
                    type_name: object.type_name.to_string(),
                    message: "not a registered model".to_string(),
                })
            }
        };
        if object.fields.len() != model.properties().len() {
            return Err(ValidationError::PropertyCountMismatch {
                type_name: model.name().to_string(),
                expected: model.properties().len(),
                found: object.fields.len(),
            });
        }
        for (property, field) in model.properties().iter().zip(&object.fields) {
            // Null fits any slot.
            let Some(found) = field.runtime_type() else {
                continue;
            };
            if !self.registry.is_assignable(&found, &property.ty) {
                return Err(ValidationError::PropertyTypeMismatch {
                    type_name: model.name().to_string(),
                    property: property.name.clone(),
                    expected: property.ty.to_string(),
                    found: found.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Validator for SchemaValidator {
    fn validate(&self, value: &Value, _options: &SerializerOptions) -> Result<(), ValidationError> {
        match value {
            Value::Object(object) => self.validate_object(object),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Serializer;
    use crate::error::SerializeError;
    use crate::model::{ModelDef, TypeRef};

    fn registry() -> Arc<Registry> {
        let registry = Registry::new();
        registry
            .register(
                ModelDef::builder("Person")
                    .sealed()
                    .field(0, "name", TypeRef::text())
                    .field(1, "age", TypeRef::i32())
                    .build()
                    .unwrap(),
            )
            .unwrap();
        Arc::new(registry)
    }

    fn person(name: Value, age: Value) -> Value {
        Value::Object(ObjectValue::new("Person", vec![name, age]))
    }

    #[test]
    fn test_schema_validator() {
        let validator = SchemaValidator::new(registry());
        let options = SerializerOptions::default();
        assert!(validator.validate(&person("Ann".into(), Value::I32(3)), &options).is_ok());
        assert!(validator.validate(&person(Value::Null, Value::I32(3)), &options).is_ok());
        assert!(matches!(
            validator.validate(&person("Ann".into(), Value::I64(3)), &options),
            Err(ValidationError::PropertyTypeMismatch { .. })
        ));
        assert!(matches!(
            validator.validate(&Value::Object(ObjectValue::new("Person", vec![])), &options),
            Err(ValidationError::PropertyCountMismatch { expected: 2, found: 0, .. })
        ));
        assert!(validator.validate(&Value::I32(1), &options).is_ok());
    }

    #[test]
    fn test_validator_runs_only_when_enabled() {
        let reject = |value: &Value, _: &SerializerOptions| match value.as_object() {
            Some(object) if object.field(1).and_then(Value::as_i32).is_some_and(|age| age < 0) => {
                Err(ValidationError::Rejected {
                    type_name: object.type_name.to_string(),
                    message: "negative age".to_string(),
                })
            }
            _ => Ok(()),
        };
        let bad = person("Ann".into(), Value::I32(-1));
        let ty = TypeRef::named("Person");

        let plain = Serializer::new(registry()).with_validator(Arc::new(reject));
        let bytes = plain.to_bytes(&bad, &ty).unwrap();

        let checked = plain
            .clone()
            .with_options(SerializerOptions::default().with_validation(true));
        assert!(matches!(
            checked.to_bytes(&bad, &ty),
            Err(SerializeError::Validation(ValidationError::Rejected { .. }))
        ));
        assert!(matches!(
            checked.from_bytes(&bytes, &ty),
            Err(SerializeError::Validation(ValidationError::Rejected { .. }))
        ));
    }
}
