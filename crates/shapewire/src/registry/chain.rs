//! Schema version chains.
//!
//! A logical model at version N owns the ordered list of its historical
//! shapes `[v1 .. vN-1]`; the model itself is vN. The chain is validated the
//! first time the model is resolved and cached for the life of the registry.
//! A failed validation is not cached, so every resolution of a broken model
//! reports the same fault.

use std::sync::Arc;

use log::{debug, trace};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{DataError, Operation, SchemaError, SerializeError};
use crate::model::{ModelDef, ObjectValue, TypeDef, TypeName};
use crate::registry::Registry;

/// Validated, ordered shapes of one logical model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionChain {
    logical: TypeName,
    /// `versions[v - 1]` is the concrete shape of version `v`; the last
    /// entry is the logical model itself.
    versions: Vec<TypeName>,
}

impl VersionChain {
    /// Validates the history of `model` and builds its chain.
    pub fn build(registry: &Registry, model: &ModelDef) -> Result<Self, SchemaError> {
        let logical = model.name().clone();
        let mut versions: Vec<TypeName> = Vec::with_capacity(model.history().len() + 1);

        for (i, listed) in model.history().iter().enumerate() {
            let expected = i as u32 + 1;
            let def = registry.lookup(listed)?;
            let TypeDef::Model(shape) = def.as_ref() else {
                return Err(SchemaError::NotHistorical {
                    type_name: listed.to_string(),
                });
            };
            let name = shape.name().clone();
            if versions.contains(&name) || name == logical {
                return Err(SchemaError::RepeatedHistoricalType {
                    logical: logical.to_string(),
                    type_name: name.to_string(),
                });
            }
            let Some(link) = shape.historical_of() else {
                return Err(SchemaError::BackLinkMismatch {
                    type_name: name.to_string(),
                    expected: logical.to_string(),
                    found: None,
                });
            };
            if link.version != expected {
                return Err(SchemaError::VersionNotConsecutive {
                    type_name: name.to_string(),
                    expected,
                    found: link.version,
                });
            }
            let linked = registry
                .try_lookup(&link.logical)
                .map(|d| d.name().clone())
                .unwrap_or_else(|| link.logical.clone());
            if linked != logical {
                return Err(SchemaError::BackLinkMismatch {
                    type_name: name.to_string(),
                    expected: logical.to_string(),
                    found: Some(link.logical.to_string()),
                });
            }
            if let Some(previous) = versions.last() {
                if shape.migration().is_none() {
                    return Err(SchemaError::MissingMigration {
                        type_name: name.to_string(),
                        previous: previous.to_string(),
                    });
                }
            }
            versions.push(name);
        }

        if let Some(previous) = versions.last() {
            if model.migration().is_none() {
                return Err(SchemaError::MissingMigration {
                    type_name: logical.to_string(),
                    previous: previous.to_string(),
                });
            }
        }
        let expected = versions.len() as u32 + 1;
        if model.version() != expected {
            return Err(SchemaError::DeclaredVersionMismatch {
                type_name: logical.to_string(),
                declared: model.version(),
                expected,
            });
        }
        versions.push(logical.clone());
        Ok(Self { logical, versions })
    }

    pub fn logical(&self) -> &TypeName {
        &self.logical
    }

    /// Version of the logical model's own shape.
    pub fn current_version(&self) -> u32 {
        self.versions.len() as u32
    }

    /// All shapes, oldest first, ending with the logical model.
    pub fn versions(&self) -> &[TypeName] {
        &self.versions
    }

    /// Concrete shape of `version`; version 0 means unversioned and resolves
    /// to the logical model.
    pub fn resolve(&self, version: u32) -> Result<&TypeName, DataError> {
        if version == 0 {
            return Ok(&self.logical);
        }
        self.versions
            .get(version as usize - 1)
            .ok_or_else(|| DataError::UnsupportedVersion {
                type_name: self.logical.to_string(),
                version,
                current: self.current_version(),
            })
    }

    /// 1-based position of a concrete shape in the chain.
    pub fn version_of(&self, name: &str) -> Option<u32> {
        self.versions
            .iter()
            .position(|v| v.as_str() == name)
            .map(|i| i as u32 + 1)
    }

    /// Walks an instance of `from` forward to the current version.
    pub fn migrate(
        &self,
        registry: &Registry,
        mut value: ObjectValue,
        from: u32,
    ) -> Result<ObjectValue, SerializeError> {
        for version in from + 1..=self.current_version() {
            let target = self.resolve(version)?;
            let def = registry.lookup(target)?;
            let step = def.as_model().and_then(ModelDef::migration).ok_or_else(|| {
                SchemaError::MissingMigration {
                    type_name: target.to_string(),
                    previous: self.versions[version as usize - 2].to_string(),
                }
            })?;
            trace!("migrating {} from v{} to v{}", self.logical, version - 1, version);
            value = step(value)
                .map_err(|err| SerializeError::wrap(Operation::Deserialize, target.as_str(), err))?;
            let produced = registry
                .try_lookup(&value.type_name)
                .map(|d| d.name().clone());
            if produced.as_ref() != Some(target) {
                return Err(DataError::TypeMismatch {
                    expected: target.to_string(),
                    found: value.type_name.to_string(),
                }
                .into());
            }
        }
        Ok(value)
    }
}

/// Cache of validated chains, keyed by logical model name.
#[derive(Default)]
pub struct ChainCache {
    chains: RwLock<FxHashMap<TypeName, Arc<VersionChain>>>,
}

impl ChainCache {
    /// Returns the chain `model` belongs to, validating it on first use.
    ///
    /// For a historical shape this is the chain of its logical model.
    pub fn chain(
        &self,
        registry: &Registry,
        model: &ModelDef,
    ) -> Result<Arc<VersionChain>, SchemaError> {
        let logical = match model.historical_of() {
            Some(link) => {
                let def = registry.lookup(&link.logical)?;
                match def.as_ref() {
                    TypeDef::Model(logical) => return self.chain_of_logical(registry, logical),
                    _ => {
                        return Err(SchemaError::BackLinkMismatch {
                            type_name: model.name().to_string(),
                            expected: def.name().to_string(),
                            found: Some(link.logical.to_string()),
                        })
                    }
                }
            }
            None => model,
        };
        self.chain_of_logical(registry, logical)
    }

    fn chain_of_logical(
        &self,
        registry: &Registry,
        model: &ModelDef,
    ) -> Result<Arc<VersionChain>, SchemaError> {
        if let Some(chain) = self.chains.read().get(model.name()) {
            return Ok(chain.clone());
        }
        let built = Arc::new(VersionChain::build(registry, model)?);
        let mut chains = self.chains.write();
        let chain = chains.entry(model.name().clone()).or_insert_with(|| {
            debug!(
                "validated version chain of {} ({} versions)",
                built.logical,
                built.current_version()
            );
            built
        });
        Ok(chain.clone())
    }

    /// Version of a concrete model shape: its chain position.
    pub fn version_of(&self, registry: &Registry, model: &ModelDef) -> Result<u32, SchemaError> {
        let chain = self.chain(registry, model)?;
        chain
            .version_of(model.name())
            .ok_or_else(|| SchemaError::BackLinkMismatch {
                type_name: model.name().to_string(),
                expected: chain.logical().to_string(),
                found: model.historical_of().map(|link| link.logical.to_string()),
            })
    }

    /// Number of validated chains.
    pub fn len(&self) -> usize {
        self.chains.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::model::{TypeRef, Value};

    fn rename(
        to: &'static str,
    ) -> impl Fn(ObjectValue) -> Result<ObjectValue, BoxError> + Send + Sync {
        move |old: ObjectValue| Ok(ObjectValue::new(to, old.fields))
    }

    fn person_registry(v2_version: u32) -> Registry {
        let registry = Registry::new();
        registry
            .register_all([
                ModelDef::builder("PersonV1")
                    .historical_of("Person", 1)
                    .field(0, "name", TypeRef::text())
                    .build()
                    .unwrap(),
                ModelDef::builder("PersonV2")
                    .historical_of("Person", v2_version)
                    .field(0, "name", TypeRef::text())
                    .migrate_from_previous(rename("PersonV2"))
                    .build()
                    .unwrap(),
                ModelDef::builder("Person")
                    .version(3)
                    .history(["PersonV1", "PersonV2"])
                    .field(0, "name", TypeRef::text())
                    .migrate_from_previous(rename("Person"))
                    .build()
                    .unwrap(),
            ])
            .unwrap();
        registry
    }

    fn chain_of(registry: &Registry, name: &str) -> Result<Arc<VersionChain>, SchemaError> {
        let def = registry.lookup(name)?;
        registry.chains().chain(registry, def.as_model().unwrap())
    }

    #[test]
    fn test_valid_chain() {
        let registry = person_registry(2);
        let chain = chain_of(&registry, "Person").unwrap();
        assert_eq!(chain.current_version(), 3);
        assert_eq!(chain.resolve(0).unwrap().as_str(), "Person");
        assert_eq!(chain.resolve(1).unwrap().as_str(), "PersonV1");
        assert_eq!(chain.resolve(3).unwrap().as_str(), "Person");
        assert!(matches!(
            chain.resolve(4),
            Err(DataError::UnsupportedVersion { version: 4, current: 3, .. })
        ));
        assert_eq!(chain.version_of("PersonV2"), Some(2));

        // Historical shapes share the logical chain.
        let via_history = chain_of(&registry, "PersonV1").unwrap();
        assert!(Arc::ptr_eq(&chain, &via_history));
        assert_eq!(registry.chains().len(), 1);
    }

    #[test]
    fn test_duplicate_version_names_required_version() {
        let registry = person_registry(1);
        let err = chain_of(&registry, "Person").unwrap_err();
        assert!(matches!(
            err,
            SchemaError::VersionNotConsecutive { ref type_name, expected: 2, found: 1 }
                if type_name == "PersonV2"
        ));
        assert!(err.to_string().contains("required version is 2"));
        // Not cached; the fault repeats.
        assert!(chain_of(&registry, "Person").is_err());
        assert!(registry.chains().is_empty());
    }

    #[test]
    fn test_declared_version_must_match() {
        let registry = Registry::new();
        registry
            .register_all([
                ModelDef::builder("OrderV1").historical_of("Order", 1).build().unwrap(),
                ModelDef::builder("Order")
                    .version(3)
                    .history(["OrderV1"])
                    .migrate_from_previous(rename("Order"))
                    .build()
                    .unwrap(),
            ])
            .unwrap();
        assert!(matches!(
            chain_of(&registry, "Order"),
            Err(SchemaError::DeclaredVersionMismatch { declared: 3, expected: 2, .. })
        ));
    }

    #[test]
    fn test_missing_migration() {
        let registry = Registry::new();
        registry
            .register_all([
                ModelDef::builder("OrderV1").historical_of("Order", 1).build().unwrap(),
                ModelDef::builder("Order").version(2).history(["OrderV1"]).build().unwrap(),
            ])
            .unwrap();
        assert!(matches!(
            chain_of(&registry, "Order"),
            Err(SchemaError::MissingMigration { ref previous, .. }) if previous == "OrderV1"
        ));
    }

    #[test]
    fn test_back_link_and_repeat() {
        let registry = Registry::new();
        registry
            .register_all([
                ModelDef::builder("Other").build().unwrap(),
                ModelDef::builder("OrderV1").historical_of("Other", 1).build().unwrap(),
                ModelDef::builder("Order")
                    .version(2)
                    .history(["OrderV1"])
                    .migrate_from_previous(rename("Order"))
                    .build()
                    .unwrap(),
                ModelDef::builder("CartV1").historical_of("Cart", 1).build().unwrap(),
                ModelDef::builder("Cart")
                    .version(3)
                    .history(["CartV1", "CartV1"])
                    .migrate_from_previous(rename("Cart"))
                    .build()
                    .unwrap(),
            ])
            .unwrap();
        assert!(matches!(
            chain_of(&registry, "Order"),
            Err(SchemaError::BackLinkMismatch { found: Some(ref f), .. }) if f == "Other"
        ));
        assert!(matches!(
            chain_of(&registry, "Cart"),
            Err(SchemaError::RepeatedHistoricalType { ref type_name, .. }) if type_name == "CartV1"
        ));
    }

    #[test]
    fn test_migrate_walks_forward() {
        let registry = Registry::new();
        registry
            .register_all([
                ModelDef::builder("TempV1")
                    .historical_of("Temp", 1)
                    .field(0, "fahrenheit", TypeRef::f64())
                    .build()
                    .unwrap(),
                ModelDef::builder("Temp")
                    .version(2)
                    .history(["TempV1"])
                    .field(0, "celsius", TypeRef::f64())
                    .migrate_from_previous(|old: ObjectValue| {
                        let f = match old.field(0) {
                            Some(Value::F64(f)) => *f,
                            _ => return Err("missing fahrenheit".into()),
                        };
                        Ok(ObjectValue::new("Temp", vec![Value::F64((f - 32.0) / 1.8)]))
                    })
                    .build()
                    .unwrap(),
            ])
            .unwrap();
        let chain = chain_of(&registry, "Temp").unwrap();
        let old = ObjectValue::new("TempV1", vec![Value::F64(212.0)]);
        let migrated = chain.migrate(&registry, old, 1).unwrap();
        assert_eq!(migrated, ObjectValue::new("Temp", vec![Value::F64(100.0)]));

        let err = chain
            .migrate(&registry, ObjectValue::new("TempV1", vec![]), 1)
            .unwrap_err();
        assert!(matches!(err, SerializeError::Failed { operation: Operation::Deserialize, .. }));
    }
}
