//! Converter resolution.
//!
//! Resolution order for a runtime type:
//! 1. built-in primitives, from a static table;
//! 2. a custom converter declared on a model;
//! 3. the first [`ShapeFamily`] that accepts the type.
//!
//! Anything else is an unsupported-type fault. Results are memoized per
//! type; a model's version chain is validated the first time its converter
//! is resolved.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use lazy_static::lazy_static;
use log::debug;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};

use crate::convert::primitive::PrimitiveConverter;
use crate::convert::{Converter, ShapeFamily};
use crate::error::SchemaError;
use crate::model::{Primitive, TypeRef, Value};
use crate::registry::Registry;

lazy_static! {
    static ref PRIMITIVES: FxHashMap<Primitive, Arc<dyn Converter>> = Primitive::ALL
        .into_iter()
        .map(|p| (p, Arc::new(PrimitiveConverter(p)) as Arc<dyn Converter>))
        .collect();
    static ref GLOBAL: Arc<Resolver> = Arc::new(Resolver::new(Registry::global()));
}

/// Memoizing converter resolver over a registry.
pub struct Resolver {
    registry: Arc<Registry>,
    converters: RwLock<FxHashMap<TypeRef, Arc<dyn Converter>>>,
}

impl Resolver {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            converters: RwLock::new(FxHashMap::default()),
        }
    }

    /// Resolver over [`Registry::global`].
    pub fn global() -> Arc<Resolver> {
        GLOBAL.clone()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_arc(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Returns the converter for `ty`, building it on first use.
    pub fn resolve(&self, ty: &TypeRef) -> Result<Arc<dyn Converter>, SchemaError> {
        if let TypeRef::Primitive(p) = ty {
            if let Some(converter) = PRIMITIVES.get(p) {
                return Ok(converter.clone());
            }
        }
        if let Some(converter) = self.converters.read().get(ty) {
            return Ok(converter.clone());
        }

        let built = self.build(ty)?;
        let mut converters = self.converters.write();
        let converter = converters.entry(ty.clone()).or_insert_with(|| {
            debug!("resolved converter for {}", ty);
            built
        });
        Ok(converter.clone())
    }

    fn build(&self, ty: &TypeRef) -> Result<Arc<dyn Converter>, SchemaError> {
        if let TypeRef::Named(name) = ty {
            let def = self.registry.lookup(name)?;
            if let Some(model) = def.as_model() {
                self.registry.chains().chain(&self.registry, model)?;
                if let Some(factory) = model.converter() {
                    debug!("building custom converter for {}", ty);
                    return factory.build(ty);
                }
            }
        }
        ShapeFamily::PRIORITY
            .into_iter()
            .find(|family| family.accepts(&self.registry, ty))
            .map(ShapeFamily::converter)
            .ok_or_else(|| SchemaError::UnsupportedType {
                type_name: ty.to_string(),
            })
    }

    /// Number of memoized (non-primitive) converters.
    pub fn cached(&self) -> usize {
        self.converters.read().len()
    }

    /// Structural equality consistent with the encoding.
    ///
    /// Values of different runtime types are never equal. Floats compare by
    /// bit pattern, so `0.0 != -0.0` and a NaN equals its own decode. Types
    /// whose converter has no structural comparer fall back to `==`.
    pub fn equals(&self, a: &Value, b: &Value) -> bool {
        match (a.runtime_type(), b.runtime_type()) {
            (None, None) => true,
            (Some(ta), Some(tb)) if ta == tb => match self.comparer_for(&ta) {
                Some(converter) => converter
                    .comparer()
                    .map_or_else(|| a == b, |c| c.equals(self, a, b)),
                None => primitive_equals(a, b),
            },
            _ => false,
        }
    }

    /// Structural hash consistent with [`Resolver::equals`].
    pub fn hash(&self, value: &Value) -> u64 {
        let Some(ty) = value.runtime_type() else {
            return 0;
        };
        if let Some(converter) = self.comparer_for(&ty) {
            if let Some(comparer) = converter.comparer() {
                return comparer.hash(self, value);
            }
        }
        let mut hasher = FxHasher::default();
        value.hash(&mut hasher);
        hasher.finish()
    }

    fn comparer_for(&self, ty: &TypeRef) -> Option<Arc<dyn Converter>> {
        if matches!(ty, TypeRef::Primitive(_)) {
            return None;
        }
        self.resolve(ty).ok()
    }
}

/// Bitwise for floats, matching the `to_bits` hash.
fn primitive_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::F32(x), Value::F32(y)) => x.to_bits() == y.to_bits(),
        (Value::F64(x), Value::F64(y)) => x.to_bits() == y.to_bits(),
        _ => a == b,
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("cached", &self.cached())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::envelope::{ReadContext, WriteContext};
    use crate::convert::StructuralComparer;
    use crate::error::SerializeError;
    use crate::model::{MapValue, ModelDef, ObjectValue};

    struct Fixed;

    impl Converter for Fixed {
        fn write(
            &self,
            ctx: &mut WriteContext<'_>,
            _value: &Value,
            _ty: &TypeRef,
        ) -> Result<(), SerializeError> {
            ctx.writer().write_byte(0x2A);
            Ok(())
        }

        fn read(
            &self,
            ctx: &mut ReadContext<'_, '_>,
            ty: &TypeRef,
        ) -> Result<Value, SerializeError> {
            ctx.reader().read_byte("fixed")?;
            let TypeRef::Named(name) = ty else {
                return Err(SchemaError::UnsupportedType { type_name: ty.to_string() }.into());
            };
            Ok(Value::Object(ObjectValue::new(name.clone(), vec![])))
        }

        fn comparer(&self) -> Option<&dyn StructuralComparer> {
            Some(self)
        }
    }

    impl StructuralComparer for Fixed {
        fn equals(&self, _resolver: &Resolver, _a: &Value, _b: &Value) -> bool {
            true
        }

        fn hash(&self, _resolver: &Resolver, _value: &Value) -> u64 {
            7
        }
    }

    fn registry() -> Arc<Registry> {
        let registry = Registry::new();
        registry
            .register(
                ModelDef::builder("Token")
                    .converter(Arc::new(|_: &TypeRef| {
                        Ok::<_, SchemaError>(Arc::new(Fixed) as Arc<dyn Converter>)
                    }))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_memoized() {
        let resolver = Resolver::new(registry());
        let ty = TypeRef::list(TypeRef::i32());
        let a = resolver.resolve(&ty).unwrap();
        let b = resolver.resolve(&ty).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        resolver.resolve(&TypeRef::i32()).unwrap();
        assert_eq!(resolver.cached(), 1);
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        use crate::codec::options::SerializerOptions;
        use crate::model::CollectionValue;

        let resolver = Resolver::new(registry());
        let zero = Value::F64(0.0);
        let negative_zero = Value::F64(-0.0);
        assert!(!resolver.equals(&zero, &negative_zero));
        assert_ne!(resolver.hash(&zero), resolver.hash(&negative_zero));
        assert!(!resolver.equals(&Value::F32(0.0), &Value::F32(-0.0)));

        let options = SerializerOptions::default();
        let nan = Value::Collection(CollectionValue::list(
            TypeRef::f64(),
            vec![Value::F64(f64::NAN), Value::F64(-0.0)],
        ));
        let ty = TypeRef::list(TypeRef::f64());
        let mut ctx = WriteContext::new(&resolver, &options, None);
        ctx.write_value(&nan, &ty).unwrap();
        let bytes = ctx.into_bytes();
        let mut ctx = ReadContext::new(&resolver, &options, None, &bytes);
        let decoded = ctx.read_value(&ty).unwrap();
        assert!(resolver.equals(&decoded, &nan));
        assert_eq!(resolver.hash(&decoded), resolver.hash(&nan));
        assert!(resolver.equals(&Value::F32(f32::NAN), &Value::F32(f32::NAN)));
    }

    #[test]
    fn test_unsupported() {
        let resolver = Resolver::new(registry());
        assert!(matches!(
            resolver.resolve(&TypeRef::Any),
            Err(SchemaError::UnsupportedType { .. })
        ));
        assert!(matches!(
            resolver.resolve(&TypeRef::named("Nope")),
            Err(SchemaError::UnknownName { .. })
        ));
    }

    #[test]
    fn test_custom_converter_comparer() {
        let resolver = Resolver::new(registry());
        let a = Value::Object(ObjectValue::new("Token", vec![Value::I32(1)]));
        let b = Value::Object(ObjectValue::new("Token", vec![Value::I32(2)]));
        assert!(resolver.equals(&a, &b));
        assert_eq!(resolver.hash(&a), 7);
    }

    #[test]
    fn test_map_equality_ignores_order() {
        let resolver = Resolver::new(registry());
        let a = Value::Map(MapValue::dictionary(
            TypeRef::text(),
            TypeRef::i32(),
            vec![("a".into(), Value::I32(1)), ("b".into(), Value::I32(2))],
        ));
        let b = Value::Map(MapValue::dictionary(
            TypeRef::text(),
            TypeRef::i32(),
            vec![("b".into(), Value::I32(2)), ("a".into(), Value::I32(1))],
        ));
        assert_ne!(a, b);
        assert!(resolver.equals(&a, &b));
        assert_eq!(resolver.hash(&a), resolver.hash(&b));
        assert!(!resolver.equals(&a, &Value::Null));
        assert!(resolver.equals(&Value::Null, &Value::Null));
    }
}
