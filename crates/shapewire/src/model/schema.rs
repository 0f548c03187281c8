//! Type definitions registered under stable names.
//!
//! Definitions are plain data assembled through builders at startup and
//! handed to the [`Registry`](crate::registry::Registry). A logical model
//! lists its historical shapes by name; each historical shape links back to
//! the logical model and supplies the step that migrates the previous shape
//! into itself.

use std::fmt;
use std::sync::Arc;

use crate::convert::ConverterFactory;
use crate::error::{BoxError, SchemaError};
use crate::model::type_ref::{Primitive, TypeName, TypeRef};
use crate::model::value::{ObjectValue, Value};

/// Migration step: turns an instance of the previous shape into this shape.
pub type MigrateFn = Arc<dyn Fn(ObjectValue) -> Result<ObjectValue, BoxError> + Send + Sync>;

/// Reconstructs a scalar wrapper's inner primitive, rejecting invalid content.
pub type WrapperFactory = Arc<dyn Fn(Value) -> Result<Value, BoxError> + Send + Sync>;

/// Primitives a scalar wrapper may wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Text,
    Bool,
    Int32,
    Int64,
    Bytes,
}

impl ScalarKind {
    pub fn primitive(self) -> Primitive {
        match self {
            ScalarKind::Text => Primitive::Text,
            ScalarKind::Bool => Primitive::Bool,
            ScalarKind::Int32 => Primitive::I32,
            ScalarKind::Int64 => Primitive::I64,
            ScalarKind::Bytes => Primitive::Bytes,
        }
    }
}

/// One entry of a model's ordered property schema.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef {
    pub index: usize,
    pub name: String,
    pub ty: TypeRef,
    /// Always emit the value, even when it equals its canonical default.
    pub emit_default_value: bool,
    /// Only written for inspection; defaulted when reading a contract payload.
    pub inspect_only: bool,
}

impl PropertyDef {
    pub fn new(index: usize, name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            index,
            name: name.into(),
            ty,
            emit_default_value: false,
            inspect_only: false,
        }
    }

    pub fn emit_default_value(mut self) -> Self {
        self.emit_default_value = true;
        self
    }

    pub fn inspect_only(mut self) -> Self {
        self.inspect_only = true;
        self
    }
}

/// Back-link from a historical shape to its logical model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalLink {
    pub logical: TypeName,
    pub version: u32,
}

/// A composite model.
#[derive(Clone)]
pub struct ModelDef {
    name: TypeName,
    aliases: Vec<TypeName>,
    properties: Vec<PropertyDef>,
    base: Option<TypeName>,
    sealed: bool,
    value_type: bool,
    serializable: bool,
    version: u32,
    history: Vec<TypeName>,
    historical_of: Option<HistoricalLink>,
    migrate_from_previous: Option<MigrateFn>,
    converter: Option<Arc<dyn ConverterFactory>>,
}

impl ModelDef {
    /// Starts building a model definition.
    pub fn builder(name: impl Into<TypeName>) -> ModelBuilder {
        ModelBuilder::new(name)
    }

    pub fn name(&self) -> &TypeName {
        &self.name
    }

    pub fn aliases(&self) -> &[TypeName] {
        &self.aliases
    }

    /// Properties ordered by index; `properties()[i].index == i`.
    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    pub fn base(&self) -> Option<&TypeName> {
        self.base.as_ref()
    }

    /// Returns true if no other model may stand in for this one.
    pub fn is_sealed(&self) -> bool {
        self.sealed || self.value_type
    }

    pub fn is_value_type(&self) -> bool {
        self.value_type
    }

    pub fn is_serializable(&self) -> bool {
        self.serializable
    }

    /// Declared current version (1 when the model has no history).
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Historical shapes, oldest first.
    pub fn history(&self) -> &[TypeName] {
        &self.history
    }

    pub fn historical_of(&self) -> Option<&HistoricalLink> {
        self.historical_of.as_ref()
    }

    pub fn migration(&self) -> Option<&MigrateFn> {
        self.migrate_from_previous.as_ref()
    }

    pub fn converter(&self) -> Option<&Arc<dyn ConverterFactory>> {
        self.converter.as_ref()
    }
}

impl fmt::Debug for ModelDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDef")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("properties", &self.properties)
            .field("base", &self.base)
            .field("sealed", &self.sealed)
            .field("value_type", &self.value_type)
            .field("serializable", &self.serializable)
            .field("version", &self.version)
            .field("history", &self.history)
            .field("historical_of", &self.historical_of)
            .field("has_migration", &self.migrate_from_previous.is_some())
            .field("has_converter", &self.converter.is_some())
            .finish()
    }
}

/// Builder for [`ModelDef`].
pub struct ModelBuilder {
    def: ModelDef,
}

impl ModelBuilder {
    pub fn new(name: impl Into<TypeName>) -> Self {
        Self {
            def: ModelDef {
                name: name.into(),
                aliases: Vec::new(),
                properties: Vec::new(),
                base: None,
                sealed: false,
                value_type: false,
                serializable: true,
                version: 1,
                history: Vec::new(),
                historical_of: None,
                migrate_from_previous: None,
                converter: None,
            },
        }
    }

    /// Adds a property.
    pub fn property(mut self, property: PropertyDef) -> Self {
        self.def.properties.push(property);
        self
    }

    /// Adds a plain property.
    pub fn field(self, index: usize, name: impl Into<String>, ty: TypeRef) -> Self {
        self.property(PropertyDef::new(index, name, ty))
    }

    /// Registers an extra name resolving to this model.
    pub fn alias(mut self, name: impl Into<TypeName>) -> Self {
        self.def.aliases.push(name.into());
        self
    }

    /// Declares the model a subtype of another model.
    pub fn base(mut self, base: impl Into<TypeName>) -> Self {
        self.def.base = Some(base.into());
        self
    }

    pub fn sealed(mut self) -> Self {
        self.def.sealed = true;
        self
    }

    /// Declares a value type: sealed, with every field at its default as the
    /// canonical zero.
    pub fn value_type(mut self) -> Self {
        self.def.value_type = true;
        self
    }

    pub fn non_serializable(mut self) -> Self {
        self.def.serializable = false;
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.def.version = version;
        self
    }

    /// Lists the historical shapes, oldest first.
    pub fn history<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<TypeName>,
    {
        self.def.history = names.into_iter().map(Into::into).collect();
        self
    }

    /// Declares this model a historical shape of `logical` at `version`.
    pub fn historical_of(mut self, logical: impl Into<TypeName>, version: u32) -> Self {
        self.def.historical_of = Some(HistoricalLink {
            logical: logical.into(),
            version,
        });
        self
    }

    /// Supplies the step migrating the previous shape into this one.
    pub fn migrate_from_previous<F>(mut self, migrate: F) -> Self
    where
        F: Fn(ObjectValue) -> Result<ObjectValue, BoxError> + Send + Sync + 'static,
    {
        self.def.migrate_from_previous = Some(Arc::new(migrate));
        self
    }

    /// Replaces the composite converter with a custom one.
    pub fn converter(mut self, factory: Arc<dyn ConverterFactory>) -> Self {
        self.def.converter = Some(factory);
        self
    }

    /// Validates the property schema and finishes the definition.
    pub fn build(mut self) -> Result<ModelDef, SchemaError> {
        let def = &mut self.def;
        def.properties.sort_by_key(|p| p.index);
        for (expected, property) in def.properties.iter().enumerate() {
            if property.index < expected {
                return Err(SchemaError::DuplicatePropertyIndex {
                    type_name: def.name.to_string(),
                    index: property.index,
                });
            }
            if property.index != expected {
                return Err(SchemaError::PropertyIndexGap {
                    type_name: def.name.to_string(),
                    expected,
                    found: property.index,
                });
            }
        }
        if def.version == 0 {
            return Err(SchemaError::InvalidDefinition {
                type_name: def.name.to_string(),
                reason: "version must be at least 1",
            });
        }
        if def.historical_of.is_some() && !def.history.is_empty() {
            return Err(SchemaError::InvalidDefinition {
                type_name: def.name.to_string(),
                reason: "a historical shape cannot own a history",
            });
        }
        Ok(self.def)
    }
}

/// An enumeration, encoded by variant name.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    name: TypeName,
    aliases: Vec<TypeName>,
    variants: Vec<String>,
}

impl EnumDef {
    /// Creates an enumeration; the first variant is the canonical default.
    pub fn new<I, S>(name: impl Into<TypeName>, variants: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let variants: Vec<String> = variants.into_iter().map(Into::into).collect();
        if variants.is_empty() {
            return Err(SchemaError::InvalidDefinition {
                type_name: name.to_string(),
                reason: "enumeration has no variants",
            });
        }
        for (i, variant) in variants.iter().enumerate() {
            if variants[..i].contains(variant) {
                return Err(SchemaError::InvalidDefinition {
                    type_name: name.to_string(),
                    reason: "enumeration declares a variant twice",
                });
            }
        }
        Ok(Self {
            name,
            aliases: Vec::new(),
            variants,
        })
    }

    pub fn with_alias(mut self, name: impl Into<TypeName>) -> Self {
        self.aliases.push(name.into());
        self
    }

    pub fn name(&self) -> &TypeName {
        &self.name
    }

    pub fn aliases(&self) -> &[TypeName] {
        &self.aliases
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    pub fn contains(&self, variant: &str) -> bool {
        self.variants.iter().any(|v| v == variant)
    }

    pub fn default_variant(&self) -> &str {
        &self.variants[0]
    }
}

/// A user type represented on the wire as exactly one primitive.
#[derive(Clone)]
pub struct WrapperDef {
    name: TypeName,
    aliases: Vec<TypeName>,
    scalar: ScalarKind,
    factory: Option<WrapperFactory>,
}

impl WrapperDef {
    pub fn new(name: impl Into<TypeName>, scalar: ScalarKind) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            scalar,
            factory: None,
        }
    }

    /// Sets the factory used to reconstruct the wrapper on read.
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn with_alias(mut self, name: impl Into<TypeName>) -> Self {
        self.aliases.push(name.into());
        self
    }

    pub fn name(&self) -> &TypeName {
        &self.name
    }

    pub fn aliases(&self) -> &[TypeName] {
        &self.aliases
    }

    pub fn scalar(&self) -> ScalarKind {
        self.scalar
    }

    pub fn factory(&self) -> Option<&WrapperFactory> {
        self.factory.as_ref()
    }
}

impl fmt::Debug for WrapperDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperDef")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("scalar", &self.scalar)
            .field("has_factory", &self.factory.is_some())
            .finish()
    }
}

/// Any registrable definition.
#[derive(Debug, Clone)]
pub enum TypeDef {
    Model(ModelDef),
    Enum(EnumDef),
    Wrapper(WrapperDef),
}

impl TypeDef {
    pub fn name(&self) -> &TypeName {
        match self {
            TypeDef::Model(def) => def.name(),
            TypeDef::Enum(def) => def.name(),
            TypeDef::Wrapper(def) => def.name(),
        }
    }

    pub fn aliases(&self) -> &[TypeName] {
        match self {
            TypeDef::Model(def) => def.aliases(),
            TypeDef::Enum(def) => def.aliases(),
            TypeDef::Wrapper(def) => def.aliases(),
        }
    }

    /// Short description used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            TypeDef::Model(def) if def.historical_of().is_some() => "historical model",
            TypeDef::Model(_) => "model",
            TypeDef::Enum(_) => "enum",
            TypeDef::Wrapper(_) => "scalar wrapper",
        }
    }

    pub fn is_sealed(&self) -> bool {
        match self {
            TypeDef::Model(def) => def.is_sealed(),
            TypeDef::Enum(_) | TypeDef::Wrapper(_) => true,
        }
    }

    /// Returns true if the type has a canonical zero.
    pub fn has_default(&self) -> bool {
        match self {
            TypeDef::Model(def) => def.is_value_type(),
            TypeDef::Enum(_) => true,
            TypeDef::Wrapper(def) => def.scalar().primitive().has_default(),
        }
    }

    pub fn as_model(&self) -> Option<&ModelDef> {
        match self {
            TypeDef::Model(def) => Some(def),
            _ => None,
        }
    }
}

impl From<ModelDef> for TypeDef {
    fn from(def: ModelDef) -> Self {
        TypeDef::Model(def)
    }
}

impl From<EnumDef> for TypeDef {
    fn from(def: EnumDef) -> Self {
        TypeDef::Enum(def)
    }
}

impl From<WrapperDef> for TypeDef {
    fn from(def: WrapperDef) -> Self {
        TypeDef::Wrapper(def)
    }
}
