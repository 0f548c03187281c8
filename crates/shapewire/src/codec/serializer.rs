//! Top-level serializer.

use std::sync::Arc;

use log::trace;

use crate::codec::compress;
use crate::codec::envelope::{ReadContext, WriteContext};
use crate::codec::options::SerializerOptions;
use crate::convert::Resolver;
use crate::error::SerializeError;
use crate::model::{FromValue, ToValue, TypeRef, Value};
use crate::registry::Registry;
use crate::validate::Validator;

/// Encodes and decodes values against a registry.
///
/// A serializer is cheap to clone and safe to share between threads; the
/// converter cache lives in its [`Resolver`].
#[derive(Clone)]
pub struct Serializer {
    resolver: Arc<Resolver>,
    options: SerializerOptions,
    validator: Option<Arc<dyn Validator>>,
}

impl Serializer {
    /// Creates a serializer with default options over `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_resolver(Arc::new(Resolver::new(registry)))
    }

    /// Creates a serializer sharing an existing converter cache.
    pub fn with_resolver(resolver: Arc<Resolver>) -> Self {
        Self {
            resolver,
            options: SerializerOptions::default(),
            validator: None,
        }
    }

    /// Serializer over the process-wide registry.
    pub fn global() -> Self {
        Self::with_resolver(Resolver::global())
    }

    pub fn with_options(mut self, options: SerializerOptions) -> Self {
        self.options = options;
        self
    }

    /// Installs the validator run on objects when
    /// [`SerializerOptions::validate_on_read_write`] is set.
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        self.resolver.registry()
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// Encodes `value` for a slot of static type `expected`.
    pub fn to_bytes(&self, value: &Value, expected: &TypeRef) -> Result<Vec<u8>, SerializeError> {
        let mut ctx = WriteContext::new(&self.resolver, &self.options, self.validator.as_deref());
        ctx.write_value(value, expected)?;
        let bytes = ctx.into_bytes();
        trace!("serialized {} into {} bytes", expected, bytes.len());
        Ok(bytes)
    }

    /// Encodes and zstd-compresses `value`.
    pub fn to_bytes_compressed(
        &self,
        value: &Value,
        expected: &TypeRef,
        level: i32,
    ) -> Result<Vec<u8>, SerializeError> {
        let bytes = self.to_bytes(value, expected)?;
        Ok(compress::compress(&bytes, level)?)
    }

    /// Decodes one value of static type `expected`.
    ///
    /// Compressed input is detected and inflated first. The whole input must
    /// be consumed.
    pub fn from_bytes(&self, input: &[u8], expected: &TypeRef) -> Result<Value, SerializeError> {
        if compress::is_compressed(input) {
            let inflated = compress::decompress(input)?;
            return self.decode(&inflated, expected);
        }
        self.decode(input, expected)
    }

    fn decode(&self, input: &[u8], expected: &TypeRef) -> Result<Value, SerializeError> {
        let mut ctx =
            ReadContext::new(&self.resolver, &self.options, self.validator.as_deref(), input);
        let value = ctx.read_value(expected)?;
        ctx.finish()?;
        trace!("deserialized {} from {} bytes", expected, input.len());
        Ok(value)
    }

    /// Encodes a Rust value under its own static type.
    pub fn serialize<T: ToValue>(&self, value: &T) -> Result<Vec<u8>, SerializeError> {
        self.to_bytes(&value.to_value(), &T::type_ref())
    }

    /// Decodes a Rust value written by [`Serializer::serialize`].
    pub fn deserialize<T: ToValue + FromValue>(&self, input: &[u8]) -> Result<T, SerializeError> {
        let value = self.from_bytes(input, &T::type_ref())?;
        Ok(T::from_value(value)?)
    }

    /// Structural equality consistent with the encoding.
    pub fn equals(&self, a: &Value, b: &Value) -> bool {
        self.resolver.equals(a, b)
    }

    /// Structural hash consistent with [`Serializer::equals`].
    pub fn hash(&self, value: &Value) -> u64 {
        self.resolver.hash(value)
    }
}

impl std::fmt::Debug for Serializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Serializer")
            .field("options", &self.options)
            .field("has_validator", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}
