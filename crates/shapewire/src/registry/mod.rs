//! Type registry: bidirectional type ↔ stable name store.
//!
//! The registry is seeded with the built-in mnemonics and generic container
//! definitions (see [`type_name`]); user definitions are added through
//! [`Registry::register`] at startup or lazily as new definitions are
//! discovered. Entries are never removed. Reads take a shared lock; the
//! populate path takes the write lock, so the first writer wins and a later
//! duplicate is rejected.

pub mod chain;
pub mod type_name;

use std::any::{type_name as rust_type_name, TypeId};
use std::sync::Arc;

use lazy_static::lazy_static;
use log::debug;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{DataError, SchemaError, SerializeError};
use crate::model::{
    EnumValue, GenericKind, Model, ObjectValue, PairValue, TupleValue, TypeDef, TypeName, TypeRef,
    Value, WrapperValue,
};

pub use chain::{ChainCache, VersionChain};
pub use type_name::{format_type, parse_type};

lazy_static! {
    static ref GLOBAL: Arc<Registry> = Arc::new(Registry::new());
}

#[derive(Default)]
struct RegistryState {
    /// Primary names and aliases.
    defs: FxHashMap<TypeName, Arc<TypeDef>>,
    /// Rust types bound to a primary name.
    rust_types: FxHashMap<TypeId, TypeName>,
    rust_names: FxHashMap<TypeName, &'static str>,
}

/// Registry of named types and their version chains.
#[derive(Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
    chains: ChainCache,
}

impl Registry {
    /// Creates a registry holding only the built-ins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry, created on first use.
    pub fn global() -> Arc<Registry> {
        GLOBAL.clone()
    }

    /// Registers a definition under its name and aliases.
    pub fn register(&self, def: impl Into<TypeDef>) -> Result<(), SchemaError> {
        let def = Arc::new(def.into());
        let mut state = self.state.write();
        let names: Vec<&TypeName> = std::iter::once(def.name()).chain(def.aliases()).collect();
        for (i, name) in names.iter().enumerate() {
            if type_name::is_reserved(name) {
                return Err(SchemaError::ReservedName {
                    name: name.to_string(),
                });
            }
            if !type_name::is_valid_ident(name) {
                return Err(SchemaError::InvalidDefinition {
                    type_name: name.to_string(),
                    reason: "name is not a valid identifier",
                });
            }
            if state.defs.contains_key(name.as_str()) || names[..i].contains(name) {
                return Err(SchemaError::DuplicateName {
                    name: name.to_string(),
                });
            }
        }
        if let Some(base) = def.as_model().and_then(|m| m.base()) {
            let reason = match state.defs.get(base.as_str()).map(|b| b.as_ref()) {
                None => Some("base model is not registered"),
                Some(TypeDef::Model(b)) if b.is_sealed() => Some("base model is sealed"),
                Some(TypeDef::Model(_)) => None,
                Some(_) => Some("base is not a model"),
            };
            if let Some(reason) = reason {
                return Err(SchemaError::InvalidDefinition {
                    type_name: def.name().to_string(),
                    reason,
                });
            }
        }
        for name in &names {
            state.defs.insert((*name).clone(), def.clone());
        }
        debug!(
            "registered {} {} (aliases: {:?})",
            def.kind(),
            def.name(),
            def.aliases()
        );
        Ok(())
    }

    /// Registers several definitions, stopping at the first fault.
    pub fn register_all<I, D>(&self, defs: I) -> Result<(), SchemaError>
    where
        I: IntoIterator<Item = D>,
        D: Into<TypeDef>,
    {
        defs.into_iter().try_for_each(|def| self.register(def))
    }

    /// Binds a Rust type to a registered name.
    pub fn bind<T: 'static>(&self, name: &str) -> Result<(), SchemaError> {
        let mut state = self.state.write();
        let primary = state
            .defs
            .get(name)
            .map(|def| def.name().clone())
            .ok_or_else(|| SchemaError::UnknownName {
                name: name.to_string(),
            })?;
        if let Some(existing) = state.rust_types.get(&TypeId::of::<T>()) {
            return Err(SchemaError::DuplicateType {
                name: primary.to_string(),
                existing: existing.to_string(),
            });
        }
        if let Some(existing) = state.rust_names.get(&primary) {
            return Err(SchemaError::DuplicateType {
                name: rust_type_name::<T>().to_string(),
                existing: existing.to_string(),
            });
        }
        state.rust_types.insert(TypeId::of::<T>(), primary.clone());
        state.rust_names.insert(primary.clone(), rust_type_name::<T>());
        debug!("bound {} to {}", rust_type_name::<T>(), primary);
        Ok(())
    }

    /// Registers a Rust type's definition and binds the type to it.
    pub fn register_model<T: Model>(&self) -> Result<(), SchemaError> {
        let def = T::definition()?;
        let name = def.name().clone();
        self.register(def)?;
        self.bind::<T>(&name)
    }

    /// Returns the name a Rust type is bound to.
    pub fn name_of_rust<T: 'static>(&self) -> Option<TypeName> {
        self.state.read().rust_types.get(&TypeId::of::<T>()).cloned()
    }

    /// Looks up a definition by primary name or alias.
    pub fn lookup(&self, name: &str) -> Result<Arc<TypeDef>, SchemaError> {
        self.try_lookup(name).ok_or_else(|| SchemaError::UnknownName {
            name: name.to_string(),
        })
    }

    pub fn try_lookup(&self, name: &str) -> Option<Arc<TypeDef>> {
        self.state.read().defs.get(name).cloned()
    }

    /// Returns true if a name (or alias) is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.state.read().defs.contains_key(name)
    }

    pub fn chains(&self) -> &ChainCache {
        &self.chains
    }

    /// Stable name of a type; aliases are replaced by primary names.
    pub fn name_of(&self, ty: &TypeRef) -> Result<String, SchemaError> {
        Ok(format_type(&self.canonicalize(ty)?))
    }

    /// Parses a stable name and resolves every named component.
    pub fn type_of(&self, name: &str) -> Result<TypeRef, SchemaError> {
        let ty = parse_type(name)?;
        self.canonicalize(&ty)
    }

    /// Replaces aliases by primary names, failing on unknown names and on
    /// types that have no stable name.
    pub fn canonicalize(&self, ty: &TypeRef) -> Result<TypeRef, SchemaError> {
        type_name::check_node(ty)?;
        Ok(match ty {
            TypeRef::Named(name) => TypeRef::Named(self.lookup(name)?.name().clone()),
            TypeRef::Nullable(inner) => TypeRef::Nullable(Box::new(self.canonicalize(inner)?)),
            TypeRef::Array { element, rank } => TypeRef::Array {
                element: Box::new(self.canonicalize(element)?),
                rank: *rank,
            },
            TypeRef::Generic { kind, args } => TypeRef::Generic {
                kind: *kind,
                args: args
                    .iter()
                    .map(|arg| self.canonicalize(arg))
                    .collect::<Result<_, _>>()?,
            },
            other => other.clone(),
        })
    }

    /// Returns true if no other runtime type can stand in for `ty`.
    pub fn is_sealed(&self, ty: &TypeRef) -> Result<bool, SchemaError> {
        match ty {
            TypeRef::Any => Ok(false),
            TypeRef::Named(name) => Ok(self.lookup(name)?.is_sealed()),
            TypeRef::Nullable(inner) => self.is_sealed(inner),
            _ => Ok(true),
        }
    }

    /// Returns true if a value of runtime type `from` may be stored where
    /// `to` is expected.
    pub fn is_assignable(&self, from: &TypeRef, to: &TypeRef) -> bool {
        let to = to.underlying();
        if matches!(to, TypeRef::Any) || from == to {
            return true;
        }
        match (from, to) {
            (TypeRef::Named(from), TypeRef::Named(to)) => self.derives_from(from, to),
            _ => false,
        }
    }

    /// Walks the base chain of `model` looking for `base`.
    fn derives_from(&self, model: &str, base: &str) -> bool {
        let Some(target) = self.try_lookup(base) else {
            return false;
        };
        let mut current = self.try_lookup(model);
        // Bounded by the registry size so a base cycle cannot hang us.
        let mut remaining = self.state.read().defs.len();
        while let Some(def) = current {
            if def.name() == target.name() {
                return true;
            }
            if remaining == 0 {
                return false;
            }
            remaining -= 1;
            // A historical shape stands in for its logical model.
            current = def
                .as_model()
                .and_then(|m| m.base().or(m.historical_of().map(|link| &link.logical)))
                .and_then(|b| self.try_lookup(b));
        }
        false
    }

    /// Canonical zero of a type, or None if the type is never elided.
    pub fn canonical_default(&self, ty: &TypeRef) -> Result<Option<Value>, SchemaError> {
        Ok(match ty {
            TypeRef::Primitive(p) if p.has_default() => Some(Value::primitive_default(*p)),
            TypeRef::Nullable(inner) => return self.canonical_default(inner),
            TypeRef::Named(name) => match self.lookup(name)?.as_ref() {
                TypeDef::Enum(def) => Some(Value::Enum(EnumValue::new(
                    def.name().clone(),
                    def.default_variant(),
                ))),
                TypeDef::Wrapper(def) if def.scalar().primitive().has_default() => {
                    Some(Value::Wrapper(WrapperValue::new(
                        def.name().clone(),
                        Value::primitive_default(def.scalar().primitive()),
                    )))
                }
                TypeDef::Model(def) if def.is_value_type() => {
                    let fields = def
                        .properties()
                        .iter()
                        .map(|p| self.default_or_null(&p.ty))
                        .collect::<Result<_, _>>()?;
                    Some(Value::Object(ObjectValue::new(def.name().clone(), fields)))
                }
                _ => None,
            },
            TypeRef::Generic { kind, args } if ty.is_static_value_type() => {
                let items = args
                    .iter()
                    .map(|arg| self.default_or_null(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                match (kind, args.as_slice(), items.as_slice()) {
                    (GenericKind::KeyValuePair, [key_type, value_type], [key, value]) => {
                        Some(Value::Pair(PairValue::new(
                            key_type.clone(),
                            value_type.clone(),
                            key.clone(),
                            value.clone(),
                        )))
                    }
                    (GenericKind::Tuple, _, _) => {
                        Some(Value::Tuple(TupleValue::new(args.clone(), items)))
                    }
                    _ => None,
                }
            }
            _ => None,
        })
    }

    /// Default of a slot: its canonical zero, or Null for reference types.
    pub fn default_or_null(&self, ty: &TypeRef) -> Result<Value, SchemaError> {
        if matches!(ty, TypeRef::Nullable(_)) {
            return Ok(Value::Null);
        }
        Ok(self.canonical_default(ty)?.unwrap_or(Value::Null))
    }

    /// Returns true if `value` is bit-for-bit the canonical zero of its type.
    ///
    /// Negative zero and NaN are never defaults, so eliding them cannot lose
    /// information.
    pub fn is_canonical_default(&self, value: &Value) -> bool {
        match value {
            Value::Bool(v) => !v,
            Value::U8(v) => *v == 0,
            Value::I8(v) => *v == 0,
            Value::I16(v) => *v == 0,
            Value::U16(v) => *v == 0,
            Value::I32(v) => *v == 0,
            Value::U32(v) => *v == 0,
            Value::I64(v) => *v == 0,
            Value::U64(v) => *v == 0,
            Value::F32(v) => v.to_bits() == 0,
            Value::F64(v) => v.to_bits() == 0,
            Value::Char(v) => *v == '\0',
            Value::Text(v) => v.is_empty(),
            Value::Uuid(v) => v.is_nil(),
            Value::Enum(v) => match self.try_lookup(&v.type_name).as_deref() {
                Some(TypeDef::Enum(def)) => def.default_variant() == v.variant,
                _ => false,
            },
            Value::Wrapper(v) => match self.try_lookup(&v.type_name).as_deref() {
                Some(TypeDef::Wrapper(def)) => {
                    def.scalar().primitive().has_default() && self.is_canonical_default(&v.inner)
                }
                _ => false,
            },
            Value::Object(v) => match self.try_lookup(&v.type_name).as_deref() {
                Some(TypeDef::Model(def)) if def.is_value_type() => {
                    def.properties().len() == v.fields.len()
                        && def
                            .properties()
                            .iter()
                            .zip(&v.fields)
                            .all(|(p, f)| self.is_slot_default(&p.ty, f))
                }
                _ => false,
            },
            Value::Pair(v) => {
                self.is_slot_default(&v.key_type, &v.key)
                    && self.is_slot_default(&v.value_type, &v.value)
            }
            Value::Tuple(v) => {
                v.types.len() == v.items.len()
                    && v.types
                        .iter()
                        .zip(&v.items)
                        .all(|(t, item)| self.is_slot_default(t, item))
            }
            _ => false,
        }
    }

    /// Returns true if `value` equals [`Registry::default_or_null`] of `ty`.
    ///
    /// A zero only counts when its runtime type is exactly the slot type; an
    /// `Any` or base-typed slot defaults to Null.
    fn is_slot_default(&self, ty: &TypeRef, value: &Value) -> bool {
        match value {
            Value::Null => self
                .canonical_default(ty)
                .map(|d| d.is_none() || matches!(ty, TypeRef::Nullable(_)))
                .unwrap_or(false),
            other => {
                !matches!(ty, TypeRef::Nullable(_))
                    && other.runtime_type().is_some_and(|runtime| {
                        runtime == *ty || self.canonicalize(ty).is_ok_and(|slot| slot == runtime)
                    })
                    && self.is_canonical_default(other)
            }
        }
    }

    /// Stable name and version written in a header for a runtime type.
    ///
    /// Historical shapes are written under their logical model's name.
    pub fn header_of(&self, ty: &TypeRef) -> Result<(String, u32), SchemaError> {
        if let TypeRef::Named(name) = ty {
            if let TypeDef::Model(def) = self.lookup(name)?.as_ref() {
                let version = self.chains.version_of(self, def)?;
                let logical = match def.historical_of() {
                    Some(link) => self.lookup(&link.logical)?.name().to_string(),
                    None => def.name().to_string(),
                };
                return Ok((logical, version));
            }
        }
        Ok((self.name_of(ty)?, 0))
    }

    /// Resolves a header back to the concrete type to read.
    ///
    /// Returns the logical type (for assignability checks) and the concrete
    /// shape the payload was written with.
    pub fn resolve_header(
        &self,
        name: &str,
        version: u32,
    ) -> Result<(TypeRef, TypeRef), SerializeError> {
        let ty = parse_type(name).map_err(DataError::MalformedHeader)?;
        let logical = self.canonicalize(&ty)?;
        if version == 0 {
            return Ok((logical.clone(), logical));
        }
        let TypeRef::Named(logical_name) = &logical else {
            return Err(DataError::UnsupportedVersion {
                type_name: name.to_string(),
                version,
                current: 0,
            }
            .into());
        };
        let def = self.lookup(logical_name)?;
        let Some(model) = def.as_model() else {
            return Err(DataError::UnsupportedVersion {
                type_name: name.to_string(),
                version,
                current: 0,
            }
            .into());
        };
        let chain = self.chains.chain(self, model)?;
        let concrete = chain.resolve(version)?;
        Ok((logical, TypeRef::Named(concrete.clone())))
    }
}
