//! Built-in scalar converters.
//!
//! | Primitive | Encoding |
//! |-----------|----------|
//! | bool | one byte, 0 or 1 |
//! | u8, i8 | one raw byte |
//! | i16, i32 | 32-bit zig-zag varint |
//! | i64 | 64-bit zig-zag varint |
//! | u16, u32, u64 | varint |
//! | f32, f64 | little-endian IEEE 754 |
//! | char | varint scalar value |
//! | text, bytes | varint length + bytes |
//! | uuid | 16 bytes |

use crate::codec::envelope::{ReadContext, WriteContext};
use crate::codec::primitives::{Reader, Writer};
use crate::convert::Converter;
use crate::error::{DataError, SerializeError};
use crate::limits::{MAX_BYTES_LEN, MAX_STRING_LEN};
use crate::model::{Primitive, TypeRef, Value};

/// Converter for one built-in primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveConverter(pub Primitive);

impl Converter for PrimitiveConverter {
    fn write(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &Value,
        _ty: &TypeRef,
    ) -> Result<(), SerializeError> {
        Ok(write_primitive(ctx.writer(), self.0, value)?)
    }

    fn read(&self, ctx: &mut ReadContext<'_, '_>, _ty: &TypeRef) -> Result<Value, SerializeError> {
        Ok(read_primitive(ctx.reader(), self.0)?)
    }
}

/// Writes the payload of a primitive value.
pub fn write_primitive(
    writer: &mut Writer,
    primitive: Primitive,
    value: &Value,
) -> Result<(), DataError> {
    match (primitive, value) {
        (Primitive::Bool, Value::Bool(v)) => writer.write_bool(*v),
        (Primitive::U8, Value::U8(v)) => writer.write_byte(*v),
        (Primitive::I8, Value::I8(v)) => writer.write_byte(*v as u8),
        (Primitive::I16, Value::I16(v)) => writer.write_zigzag32(*v as i32),
        (Primitive::U16, Value::U16(v)) => writer.write_varint(*v as u64),
        (Primitive::I32, Value::I32(v)) => writer.write_zigzag32(*v),
        (Primitive::U32, Value::U32(v)) => writer.write_varint(*v as u64),
        (Primitive::I64, Value::I64(v)) => writer.write_zigzag64(*v),
        (Primitive::U64, Value::U64(v)) => writer.write_varint(*v),
        (Primitive::F32, Value::F32(v)) => writer.write_f32(*v),
        (Primitive::F64, Value::F64(v)) => writer.write_f64(*v),
        (Primitive::Char, Value::Char(v)) => writer.write_char(*v),
        (Primitive::Text, Value::Text(v)) => {
            if v.len() > MAX_STRING_LEN {
                return Err(DataError::TooLong {
                    field: "text",
                    len: v.len(),
                    max: MAX_STRING_LEN,
                });
            }
            writer.write_string(v);
        }
        (Primitive::Bytes, Value::Bytes(v)) => {
            if v.len() > MAX_BYTES_LEN {
                return Err(DataError::TooLong {
                    field: "bytes",
                    len: v.len(),
                    max: MAX_BYTES_LEN,
                });
            }
            writer.write_bytes_prefixed(v);
        }
        (Primitive::Uuid, Value::Uuid(v)) => writer.write_uuid(v),
        (primitive, other) => {
            return Err(DataError::TypeMismatch {
                expected: primitive.mnemonic().to_string(),
                found: other
                    .runtime_type()
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "null".to_string()),
            })
        }
    }
    Ok(())
}

/// Reads the payload of a primitive value.
pub fn read_primitive(reader: &mut Reader<'_>, primitive: Primitive) -> Result<Value, DataError> {
    Ok(match primitive {
        Primitive::Bool => Value::Bool(reader.read_bool("bool")?),
        Primitive::U8 => Value::U8(reader.read_byte("u8")?),
        Primitive::I8 => Value::I8(reader.read_byte("i8")? as i8),
        Primitive::I16 => {
            let v = reader.read_zigzag32("i16")?;
            Value::I16(i16::try_from(v).map_err(|_| DataError::ValueOutOfRange { context: "i16" })?)
        }
        Primitive::U16 => {
            let v = reader.read_varint("u16")?;
            Value::U16(u16::try_from(v).map_err(|_| DataError::ValueOutOfRange { context: "u16" })?)
        }
        Primitive::I32 => Value::I32(reader.read_zigzag32("i32")?),
        Primitive::U32 => Value::U32(reader.read_varint32("u32")?),
        Primitive::I64 => Value::I64(reader.read_zigzag64("i64")?),
        Primitive::U64 => Value::U64(reader.read_varint("u64")?),
        Primitive::F32 => Value::F32(reader.read_f32("f32")?),
        Primitive::F64 => Value::F64(reader.read_f64("f64")?),
        Primitive::Char => Value::Char(reader.read_char("char")?),
        Primitive::Text => Value::Text(reader.read_string(MAX_STRING_LEN, "text")?),
        Primitive::Bytes => Value::Bytes(reader.read_bytes_prefixed(MAX_BYTES_LEN, "bytes")?),
        Primitive::Uuid => Value::Uuid(reader.read_uuid("uuid")?),
    })
}
