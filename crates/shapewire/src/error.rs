//! Error types for registration, encoding/decoding and validation.
//!
//! Faults come in two tiers. [`SchemaError`] is raised while a type is being
//! registered or first resolved and is permanent for that type. [`DataError`]
//! is raised per call by a malformed stream or an unencodable value. Both, and
//! the validator's [`ValidationError`], pass through [`SerializeError`]
//! unchanged; anything else is wrapped into [`SerializeError::Failed`].

use std::fmt;

use thiserror::Error;

/// Boxed error produced by user code (migrations, factories, custom converters).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse error classes, each with a stable code string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// S001: Malformed schema definition
    InvalidSchema,
    /// S002: Name or type could not be resolved
    Resolution,
    /// D001: Truncated or malformed stream
    MalformedData,
    /// D002: Value does not match the expected type
    TypeMismatch,
    /// D003: Value cannot be encoded
    Unencodable,
    /// V001: Validator rejected the value
    Validation,
    /// F001: Lower-level failure wrapped by the serializer
    Failed,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "S001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::InvalidSchema => "S001",
            ErrorCode::Resolution => "S002",
            ErrorCode::MalformedData => "D001",
            ErrorCode::TypeMismatch => "D002",
            ErrorCode::Unencodable => "D003",
            ErrorCode::Validation => "V001",
            ErrorCode::Failed => "F001",
        }
    }
}

/// Malformed stable type name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed type name {name:?} at offset {offset}: {reason}")]
pub struct TypeNameError {
    pub name: String,
    pub offset: usize,
    pub reason: &'static str,
}

/// Schema-definition fault, raised when a type is registered or first resolved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    // === S001: Version chain ===
    #[error("[S001] historical type {type_name} declares version {found}, required version is {expected}")]
    VersionNotConsecutive {
        type_name: String,
        expected: u32,
        found: u32,
    },

    #[error("[S001] historical type {type_name} belongs to {found:?}, not to {expected}")]
    BackLinkMismatch {
        type_name: String,
        expected: String,
        found: Option<String>,
    },

    #[error("[S001] type {type_name} has no migration from previous shape {previous}")]
    MissingMigration { type_name: String, previous: String },

    #[error("[S001] historical type {type_name} appears more than once in the chain of {logical}")]
    RepeatedHistoricalType { logical: String, type_name: String },

    #[error("[S001] type {type_name} declares version {declared}, chain requires {expected}")]
    DeclaredVersionMismatch {
        type_name: String,
        declared: u32,
        expected: u32,
    },

    #[error("[S001] {type_name} is listed as a historical type but is not a model")]
    NotHistorical { type_name: String },

    // === S001: Registration ===
    #[error("[S001] name {name:?} is already registered")]
    DuplicateName { name: String },

    #[error("[S001] type is already registered as {existing:?}, cannot register it as {name:?}")]
    DuplicateType { name: String, existing: String },

    #[error("[S001] name {name:?} is reserved for a built-in type")]
    ReservedName { name: String },

    #[error("[S001] property index {found} of {type_name} breaks the sequence, expected {expected}")]
    PropertyIndexGap {
        type_name: String,
        expected: usize,
        found: usize,
    },

    #[error("[S001] property index {index} of {type_name} is declared twice")]
    DuplicatePropertyIndex { type_name: String, index: usize },

    #[error("[S001] invalid definition of {type_name}: {reason}")]
    InvalidDefinition {
        type_name: String,
        reason: &'static str,
    },

    // === S002: Resolution ===
    #[error("[S002] no type registered under name {name:?}")]
    UnknownName { name: String },

    #[error("[S002] {0}")]
    MalformedTypeName(#[from] TypeNameError),

    #[error("[S002] no converter supports type {type_name}")]
    UnsupportedType { type_name: String },
}

impl SchemaError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            SchemaError::UnknownName { .. }
            | SchemaError::MalformedTypeName(_)
            | SchemaError::UnsupportedType { .. } => ErrorCode::Resolution,
            _ => ErrorCode::InvalidSchema,
        }
    }
}

/// Per-call data fault.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    // === D001: Malformed stream ===
    #[error("[D001] unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("[D001] varint exceeds maximum length (10 bytes)")]
    VarintTooLong,

    #[error("[D001] varint overflow while reading {context}")]
    VarintOverflow { context: &'static str },

    #[error("[D001] invalid wire tag {tag:#04x}")]
    InvalidTag { tag: u8 },

    #[error("[D001] {tag} tag is not allowed after a type header")]
    UnexpectedTag { tag: &'static str },

    #[error("[D001] header carries invalid version {version}")]
    InvalidHeaderVersion { version: i32 },

    #[error("[D001] {0}")]
    MalformedHeader(#[from] TypeNameError),

    #[error("[D001] invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("[D001] invalid char scalar {value:#x}")]
    InvalidChar { value: u32 },

    #[error("[D001] invalid bool value: {value} (expected 0x00 or 0x01)")]
    InvalidBool { value: u8 },

    #[error("[D001] {field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("[D001] {context} value is out of range")]
    ValueOutOfRange { context: &'static str },

    #[error("[D001] {count} trailing bytes after top-level value")]
    TrailingBytes { count: usize },

    #[error("[D001] values nested deeper than {max} levels")]
    NestingTooDeep { max: usize },

    #[error("[D001] input does not start with the compressed-payload magic")]
    InvalidMagic,

    #[error("[D001] decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("[D001] uncompressed size mismatch: declared {declared}, actual {actual}")]
    UncompressedSizeMismatch { declared: usize, actual: usize },

    // === D002: Type mismatch ===
    #[error("[D002] expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("[D002] stream omits type information and {expected} does not pin a concrete type")]
    MissingTypeInfo { expected: String },

    #[error("[D002] {found} cannot be stored in a {expected} slot without a type header")]
    HeaderRequired { expected: String, found: String },

    #[error("[D002] type {type_name} has no canonical default")]
    NoDefault { type_name: String },

    #[error("[D002] {type_name} version {version} is newer than current version {current}")]
    UnsupportedVersion {
        type_name: String,
        version: u32,
        current: u32,
    },

    #[error("[D002] {type_name} has no variant {variant:?}")]
    UnknownEnumVariant { type_name: String, variant: String },

    #[error("[D002] {type_name} expects {expected} slots, found {found}")]
    ArityMismatch {
        type_name: String,
        expected: usize,
        found: usize,
    },

    #[error("[D002] {type_name} declares {expected} properties, value has {found}")]
    FieldCountMismatch {
        type_name: String,
        expected: usize,
        found: usize,
    },

    #[error("[D002] null is not allowed as {context}")]
    NullNotAllowed { context: &'static str },

    // === D003: Unencodable ===
    #[error("[D003] type {type_name} is marked non-serializable")]
    NotSerializable { type_name: String },

    #[error("[D003] {field} length {len} exceeds maximum {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("[D003] compression failed: {0}")]
    CompressionFailed(String),
}

impl DataError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DataError::TypeMismatch { .. }
            | DataError::MissingTypeInfo { .. }
            | DataError::HeaderRequired { .. }
            | DataError::NoDefault { .. }
            | DataError::UnsupportedVersion { .. }
            | DataError::UnknownEnumVariant { .. }
            | DataError::ArityMismatch { .. }
            | DataError::FieldCountMismatch { .. }
            | DataError::NullNotAllowed { .. } => ErrorCode::TypeMismatch,
            DataError::NotSerializable { .. }
            | DataError::TooLong { .. }
            | DataError::CompressionFailed(_) => ErrorCode::Unencodable,
            _ => ErrorCode::MalformedData,
        }
    }
}

/// Fault raised by a validator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("property {property} of {type_name} expects {expected}, found {found}")]
    PropertyTypeMismatch {
        type_name: String,
        property: String,
        expected: String,
        found: String,
    },

    #[error("{type_name} declares {expected} properties, value has {found}")]
    PropertyCountMismatch {
        type_name: String,
        expected: usize,
        found: usize,
    },

    #[error("{type_name}: {message}")]
    Rejected { type_name: String, message: String },
}

/// Direction of the call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Serialize,
    Deserialize,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Serialize => f.write_str("serialization"),
            Operation::Deserialize => f.write_str("deserialization"),
        }
    }
}

/// Top-level error returned by every serializer entry point.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("[F001] {operation} of {type_name} failed")]
    Failed {
        operation: Operation,
        type_name: String,
        #[source]
        source: BoxError,
    },
}

impl SerializeError {
    /// Wraps a lower-level error, unless it already belongs to this taxonomy.
    pub fn wrap(operation: Operation, type_name: impl Into<String>, source: BoxError) -> Self {
        let source = match source.downcast::<SerializeError>() {
            Ok(err) => return *err,
            Err(source) => source,
        };
        let source = match source.downcast::<SchemaError>() {
            Ok(err) => return SerializeError::Schema(*err),
            Err(source) => source,
        };
        let source = match source.downcast::<DataError>() {
            Ok(err) => return SerializeError::Data(*err),
            Err(source) => source,
        };
        match source.downcast::<ValidationError>() {
            Ok(err) => SerializeError::Validation(*err),
            Err(source) => SerializeError::Failed {
                operation,
                type_name: type_name.into(),
                source,
            },
        }
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            SerializeError::Schema(err) => err.code(),
            SerializeError::Data(err) => err.code(),
            SerializeError::Validation(_) => ErrorCode::Validation,
            SerializeError::Failed { .. } => ErrorCode::Failed,
        }
    }
}
