//! Caller-facing serializer options.

/// What a payload is written for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Exchange between programs; inspect-only properties are skipped.
    #[default]
    Contract,
    /// Human or tool inspection; every property is written.
    Inspection,
}

/// When a value's type identity is embedded in the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TypeInfoEmission {
    /// Omit the header when the expected type is sealed and matches the
    /// runtime type exactly.
    #[default]
    Auto,
    /// Always write a header, even when redundant.
    Always,
    /// Never write a header. Writing a value whose runtime type differs
    /// from the slot type fails with `HeaderRequired`.
    Never,
}

/// Options for encoding and decoding.
///
/// Writer and reader must agree on `purpose`: a contract payload has no
/// bytes for inspect-only properties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SerializerOptions {
    /// Run the validator before writing and after reading each object.
    pub validate_on_read_write: bool,
    pub purpose: Purpose,
    pub type_info: TypeInfoEmission,
    /// Write canonical defaults in full instead of eliding them.
    pub emit_default_values: bool,
}

impl SerializerOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for program-to-program exchange (the default).
    pub fn contract() -> Self {
        Self::default()
    }

    /// Options for inspection: every property and every value in full.
    pub fn inspection() -> Self {
        Self {
            purpose: Purpose::Inspection,
            emit_default_values: true,
            ..Self::default()
        }
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_on_read_write = enabled;
        self
    }

    pub fn with_purpose(mut self, purpose: Purpose) -> Self {
        self.purpose = purpose;
        self
    }

    pub fn with_type_info(mut self, type_info: TypeInfoEmission) -> Self {
        self.type_info = type_info;
        self
    }

    pub fn with_emit_default_values(mut self, enabled: bool) -> Self {
        self.emit_default_values = enabled;
        self
    }

    /// Returns true if inspect-only properties are written.
    pub fn includes_inspect_only(&self) -> bool {
        self.purpose == Purpose::Inspection
    }
}
