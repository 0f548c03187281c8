//! Wire envelope.
//!
//! Every value in the stream starts with one tag byte:
//!
//! | Tag | Byte | Followed by |
//! |-----|------|-------------|
//! | Null | 0 | nothing |
//! | Default | 1 | nothing; the value is the canonical zero of its type |
//! | Value | 2 | converter payload |
//! | Header | 3 | type name (string) + version (zig-zag varint), then a Default or Value tag |
//!
//! The expected type at each recursion point is passed down explicitly. A
//! header is written only when the expected type does not already pin the
//! runtime type (see [`TypeInfoEmission`]).

use log::trace;

use crate::codec::options::{SerializerOptions, TypeInfoEmission};
use crate::codec::primitives::{Reader, Writer};
use crate::convert::Resolver;
use crate::error::{DataError, SerializeError};
use crate::limits::{MAX_NESTING_DEPTH, MAX_TYPE_NAME_LEN};
use crate::model::{TypeRef, Value};
use crate::registry::Registry;
use crate::validate::Validator;

/// Envelope tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireTag {
    Null = 0,
    Default = 1,
    Value = 2,
    Header = 3,
}

impl WireTag {
    pub fn from_byte(byte: u8) -> Result<Self, DataError> {
        match byte {
            0 => Ok(WireTag::Null),
            1 => Ok(WireTag::Default),
            2 => Ok(WireTag::Value),
            3 => Ok(WireTag::Header),
            tag => Err(DataError::InvalidTag { tag }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WireTag::Null => "null",
            WireTag::Default => "default",
            WireTag::Value => "value",
            WireTag::Header => "header",
        }
    }
}

fn mismatch(expected: &TypeRef, found: &TypeRef) -> SerializeError {
    DataError::TypeMismatch {
        expected: expected.to_string(),
        found: found.to_string(),
    }
    .into()
}

/// Encoding state for one top-level call.
pub struct WriteContext<'a> {
    resolver: &'a Resolver,
    options: &'a SerializerOptions,
    validator: Option<&'a dyn Validator>,
    writer: Writer,
    depth: usize,
}

impl<'a> WriteContext<'a> {
    pub fn new(
        resolver: &'a Resolver,
        options: &'a SerializerOptions,
        validator: Option<&'a dyn Validator>,
    ) -> Self {
        Self {
            resolver,
            options,
            validator,
            writer: Writer::new(),
            depth: 0,
        }
    }

    pub fn resolver(&self) -> &'a Resolver {
        self.resolver
    }

    pub fn registry(&self) -> &'a Registry {
        self.resolver.registry()
    }

    pub fn options(&self) -> &'a SerializerOptions {
        self.options
    }

    pub fn writer(&mut self) -> &mut Writer {
        &mut self.writer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_bytes()
    }

    /// Writes a value in a slot whose static type is `expected`.
    pub fn write_value(&mut self, value: &Value, expected: &TypeRef) -> Result<(), SerializeError> {
        self.write_member(value, expected, false)
    }

    /// Writes a value; `emit_default` forces the full payload even for a
    /// canonical zero.
    pub fn write_member(
        &mut self,
        value: &Value,
        expected: &TypeRef,
        emit_default: bool,
    ) -> Result<(), SerializeError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(DataError::NestingTooDeep { max: MAX_NESTING_DEPTH }.into());
        }
        self.depth += 1;
        let result = self.write_nested(value, expected, emit_default);
        self.depth -= 1;
        result
    }

    fn write_nested(
        &mut self,
        value: &Value,
        expected: &TypeRef,
        emit_default: bool,
    ) -> Result<(), SerializeError> {
        let Some(runtime) = value.runtime_type() else {
            self.writer.write_byte(WireTag::Null as u8);
            return Ok(());
        };
        let registry = self.registry();
        if !registry.is_assignable(&runtime, expected) {
            return Err(mismatch(expected, &runtime));
        }
        if self.options.validate_on_read_write && matches!(value, Value::Object(_)) {
            if let Some(validator) = self.validator {
                validator.validate(value, self.options)?;
            }
        }

        let exact = runtime == *expected.underlying();
        let omit_header = match self.options.type_info {
            TypeInfoEmission::Always => false,
            // A headerless payload is read back as `expected`.
            TypeInfoEmission::Never if !exact => {
                return Err(DataError::HeaderRequired {
                    expected: expected.to_string(),
                    found: runtime.to_string(),
                }
                .into());
            }
            TypeInfoEmission::Never => true,
            TypeInfoEmission::Auto => exact && registry.is_sealed(expected)?,
        };
        if !omit_header {
            let (name, version) = registry.header_of(&runtime)?;
            self.writer.write_byte(WireTag::Header as u8);
            self.writer.write_string(&name);
            self.writer.write_zigzag32(version as i32);
        }

        if !self.options.emit_default_values
            && !emit_default
            && registry.is_canonical_default(value)
        {
            self.writer.write_byte(WireTag::Default as u8);
            return Ok(());
        }

        // Without a header the reader only knows `expected`, so the payload
        // is produced by the converter of the expected type.
        let ty = if omit_header && exact { expected } else { &runtime };
        let converter = self.resolver.resolve(ty)?;
        self.writer.write_byte(WireTag::Value as u8);
        converter.write(self, value, ty)
    }
}

/// Decoding state for one top-level call.
pub struct ReadContext<'a, 'b> {
    resolver: &'a Resolver,
    options: &'a SerializerOptions,
    validator: Option<&'a dyn Validator>,
    reader: Reader<'b>,
    depth: usize,
}

impl<'a, 'b> ReadContext<'a, 'b> {
    pub fn new(
        resolver: &'a Resolver,
        options: &'a SerializerOptions,
        validator: Option<&'a dyn Validator>,
        input: &'b [u8],
    ) -> Self {
        Self {
            resolver,
            options,
            validator,
            reader: Reader::new(input),
            depth: 0,
        }
    }

    pub fn resolver(&self) -> &'a Resolver {
        self.resolver
    }

    pub fn registry(&self) -> &'a Registry {
        self.resolver.registry()
    }

    pub fn options(&self) -> &'a SerializerOptions {
        self.options
    }

    pub fn reader(&mut self) -> &mut Reader<'b> {
        &mut self.reader
    }

    /// Fails if input remains after the top-level value.
    pub fn finish(self) -> Result<(), DataError> {
        match self.reader.remaining_len() {
            0 => Ok(()),
            count => Err(DataError::TrailingBytes { count }),
        }
    }

    fn read_tag(&mut self) -> Result<WireTag, DataError> {
        WireTag::from_byte(self.reader.read_byte("tag")?)
    }

    /// Reads a value from a slot whose static type is `expected`.
    pub fn read_value(&mut self, expected: &TypeRef) -> Result<Value, SerializeError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(DataError::NestingTooDeep { max: MAX_NESTING_DEPTH }.into());
        }
        self.depth += 1;
        let result = self.read_nested(expected);
        self.depth -= 1;
        result
    }

    fn read_nested(&mut self, expected: &TypeRef) -> Result<Value, SerializeError> {
        let mut tag = self.read_tag()?;
        if tag == WireTag::Null {
            return Ok(Value::Null);
        }
        let registry = self.registry();

        let (ty, from_version) = if tag == WireTag::Header {
            let name = self.reader.read_string(MAX_TYPE_NAME_LEN, "type name")?;
            let version = self.reader.read_zigzag32("type version")?;
            let version =
                u32::try_from(version).map_err(|_| DataError::InvalidHeaderVersion { version })?;
            let (logical, concrete) = registry.resolve_header(&name, version)?;
            if !registry.is_assignable(&logical, expected) {
                return Err(mismatch(expected, &logical));
            }
            tag = self.read_tag()?;
            if matches!(tag, WireTag::Null | WireTag::Header) {
                return Err(DataError::UnexpectedTag { tag: tag.name() }.into());
            }
            let from_version = (concrete != logical).then_some(version);
            (concrete, from_version)
        } else {
            if matches!(expected.underlying(), TypeRef::Any) {
                return Err(DataError::MissingTypeInfo {
                    expected: expected.to_string(),
                }
                .into());
            }
            (expected.clone(), None)
        };

        let mut value = if tag == WireTag::Default {
            registry
                .canonical_default(&ty)?
                .ok_or_else(|| DataError::NoDefault {
                    type_name: ty.to_string(),
                })?
        } else {
            let converter = self.resolver.resolve(&ty)?;
            converter.read(self, &ty)?
        };

        if let Some(version) = from_version {
            value = self.migrate(value, &ty, version)?;
        }
        if self.options.validate_on_read_write && matches!(value, Value::Object(_)) {
            if let Some(validator) = self.validator {
                validator.validate(&value, self.options)?;
            }
        }
        Ok(value)
    }

    fn migrate(&self, value: Value, ty: &TypeRef, version: u32) -> Result<Value, SerializeError> {
        let registry = self.registry();
        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(DataError::TypeMismatch {
                    expected: ty.to_string(),
                    found: other
                        .runtime_type()
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "null".to_string()),
                }
                .into());
            }
        };
        let def = registry.lookup(&object.type_name)?;
        let Some(model) = def.as_model() else {
            return Err(mismatch(ty, &TypeRef::Named(object.type_name.clone())));
        };
        let chain = registry.chains().chain(registry, model)?;
        trace!(
            "read {} v{}, migrating to v{}",
            chain.logical(),
            version,
            chain.current_version()
        );
        Ok(Value::Object(chain.migrate(registry, object, version)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::model::{ModelDef, ObjectValue};

    fn resolver() -> Resolver {
        let registry = Registry::new();
        registry
            .register_all([
                ModelDef::builder("Shape").build().unwrap(),
                ModelDef::builder("Circle")
                    .base("Shape")
                    .field(0, "radius", TypeRef::i32())
                    .build()
                    .unwrap(),
            ])
            .unwrap();
        Resolver::new(Arc::new(registry))
    }

    fn encode(
        resolver: &Resolver,
        options: &SerializerOptions,
        value: &Value,
        expected: &TypeRef,
    ) -> Vec<u8> {
        let mut ctx = WriteContext::new(resolver, options, None);
        ctx.write_value(value, expected).unwrap();
        ctx.into_bytes()
    }

    #[test]
    fn test_tag_bytes() {
        assert_eq!(WireTag::from_byte(0).unwrap(), WireTag::Null);
        assert_eq!(WireTag::from_byte(3).unwrap(), WireTag::Header);
        assert!(matches!(WireTag::from_byte(4), Err(DataError::InvalidTag { tag: 4 })));
    }

    #[test]
    fn test_null_is_one_byte() {
        let resolver = resolver();
        let options = SerializerOptions::default();
        assert_eq!(encode(&resolver, &options, &Value::Null, &TypeRef::Any), [0]);
    }

    #[test]
    fn test_header_layout() {
        let resolver = resolver();
        let options = SerializerOptions::default();
        let bytes = encode(&resolver, &options, &Value::I32(5), &TypeRef::Any);
        // Header, name "i", version 0, Value, zig-zag 5.
        assert_eq!(bytes, [3, 1, b'i', 0, 2, 10]);
    }

    #[test]
    fn test_subtype_carries_header() {
        let resolver = resolver();
        let options = SerializerOptions::default();
        let circle = Value::Object(ObjectValue::new("Circle", vec![Value::I32(2)]));
        let bytes = encode(&resolver, &options, &circle, &TypeRef::named("Shape"));
        assert_eq!(bytes[0], WireTag::Header as u8);

        let mut ctx = ReadContext::new(&resolver, &options, None, &bytes);
        assert_eq!(ctx.read_value(&TypeRef::named("Shape")).unwrap(), circle);
        ctx.finish().unwrap();
    }

    #[test]
    fn test_never_requires_exact_type() {
        let resolver = resolver();
        let options = SerializerOptions::default().with_type_info(TypeInfoEmission::Never);
        let circle = Value::Object(ObjectValue::new("Circle", vec![Value::I32(2)]));

        let mut ctx = WriteContext::new(&resolver, &options, None);
        let err = ctx.write_value(&circle, &TypeRef::named("Shape")).unwrap_err();
        assert!(matches!(
            err,
            SerializeError::Data(DataError::HeaderRequired { ref expected, ref found })
                if expected == "Shape" && found == "Circle"
        ));
        assert_eq!(err.code().code(), "D002");

        let mut ctx = WriteContext::new(&resolver, &options, None);
        assert!(matches!(
            ctx.write_value(&Value::I32(1), &TypeRef::Any),
            Err(SerializeError::Data(DataError::HeaderRequired { .. }))
        ));

        // Exact matches and nulls need no header.
        assert_eq!(encode(&resolver, &options, &circle, &TypeRef::named("Circle")), [2, 2, 4]);
        assert_eq!(encode(&resolver, &options, &Value::Null, &TypeRef::named("Shape")), [0]);
    }

    #[test]
    fn test_rejects_unassignable() {
        let resolver = resolver();
        let options = SerializerOptions::default();
        let mut ctx = WriteContext::new(&resolver, &options, None);
        let err = ctx.write_value(&Value::Text("x".into()), &TypeRef::i32()).unwrap_err();
        assert!(matches!(err, SerializeError::Data(DataError::TypeMismatch { .. })));
    }

    #[test]
    fn test_missing_type_info() {
        let resolver = resolver();
        let options = SerializerOptions::default();
        let mut ctx = ReadContext::new(&resolver, &options, None, &[2, 10]);
        assert!(matches!(
            ctx.read_value(&TypeRef::Any),
            Err(SerializeError::Data(DataError::MissingTypeInfo { .. }))
        ));
    }

    #[test]
    fn test_header_followed_by_header() {
        let resolver = resolver();
        let options = SerializerOptions::default();
        let input = [3, 1, b'i', 0, 3];
        let mut ctx = ReadContext::new(&resolver, &options, None, &input);
        assert!(matches!(
            ctx.read_value(&TypeRef::Any),
            Err(SerializeError::Data(DataError::UnexpectedTag { tag: "header" }))
        ));
    }

    #[test]
    fn test_negative_header_version() {
        let resolver = resolver();
        let options = SerializerOptions::default();
        let input = [3, 1, b'i', 1, 2, 0];
        let mut ctx = ReadContext::new(&resolver, &options, None, &input);
        assert!(matches!(
            ctx.read_value(&TypeRef::Any),
            Err(SerializeError::Data(DataError::InvalidHeaderVersion { version: -1 }))
        ));
    }

    #[test]
    fn test_nesting_depth_limit() {
        use crate::model::CollectionValue;

        let resolver = resolver();
        let options = SerializerOptions::default();

        let mut nested = Value::Null;
        for _ in 0..MAX_NESTING_DEPTH + 8 {
            nested = Value::Collection(CollectionValue::list(TypeRef::Any, vec![nested]));
        }
        let mut ctx = WriteContext::new(&resolver, &options, None);
        assert!(matches!(
            ctx.write_value(&nested, &TypeRef::Any),
            Err(SerializeError::Data(DataError::NestingTooDeep { max: MAX_NESTING_DEPTH }))
        ));

        // Each level: header "li<o>" v0, value tag, padded length 1.
        let level = [3, 5, b'l', b'i', b'<', b'o', b'>', 0, 2, 0x81, 0x80, 0x80, 0x80, 0x00];
        let input: Vec<u8> = level.repeat(MAX_NESTING_DEPTH + 8);
        let mut ctx = ReadContext::new(&resolver, &options, None, &input);
        assert!(matches!(
            ctx.read_value(&TypeRef::Any),
            Err(SerializeError::Data(DataError::NestingTooDeep { .. }))
        ));
    }

    #[test]
    fn test_trailing_bytes() {
        let resolver = resolver();
        let options = SerializerOptions::default();
        let input = [0, 0];
        let mut ctx = ReadContext::new(&resolver, &options, None, &input);
        assert_eq!(ctx.read_value(&TypeRef::Any).unwrap(), Value::Null);
        assert!(matches!(ctx.finish(), Err(DataError::TrailingBytes { count: 1 })));
    }
}
