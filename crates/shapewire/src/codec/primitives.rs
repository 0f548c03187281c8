//! Primitive encoding/decoding.
//!
//! Implements varint, zig-zag signed varint, length slots and fixed-width
//! scalars. The zig-zag varint is byte-compatible with protobuf's `sint32`
//! and `sint64`.

use uuid::Uuid;

use crate::error::DataError;
use crate::limits::{LENGTH_SLOT_BYTES, MAX_COLLECTION_LEN, MAX_VARINT_BYTES};

// =============================================================================
// DECODING
// =============================================================================

/// Cursor over an encoded buffer.
///
/// Every read is bounds-checked; faults name the field being read.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Unread input.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Count of unread bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True once the whole input has been read.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, DataError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(DataError::UnexpectedEof { context })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Borrows the next `n` bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DataError> {
        if n > self.remaining_len() {
            return Err(DataError::UnexpectedEof { context });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads a fixed-size array.
    #[inline]
    pub fn read_array<const N: usize>(
        &mut self,
        context: &'static str,
    ) -> Result<[u8; N], DataError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N, context)?);
        Ok(out)
    }

    /// Reads a LEB128 varint of at most 10 bytes.
    #[inline]
    pub fn read_varint(&mut self, context: &'static str) -> Result<u64, DataError> {
        let mut result: u64 = 0;
        let mut shift = 0;

        for i in 0..MAX_VARINT_BYTES {
            let byte = self.read_byte(context)?;
            let value = (byte & 0x7F) as u64;

            if shift == 63 && value > 1 {
                return Err(DataError::VarintOverflow { context });
            }

            result |= value << shift;

            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;

            if i == MAX_VARINT_BYTES - 1 {
                return Err(DataError::VarintTooLong);
            }
        }

        Err(DataError::VarintTooLong)
    }

    /// Reads an unsigned varint that must fit in 32 bits.
    pub fn read_varint32(&mut self, context: &'static str) -> Result<u32, DataError> {
        u32::try_from(self.read_varint(context)?).map_err(|_| DataError::VarintOverflow { context })
    }

    /// Reads a 32-bit zig-zag varint.
    pub fn read_zigzag32(&mut self, context: &'static str) -> Result<i32, DataError> {
        Ok(zigzag_decode32(self.read_varint32(context)?))
    }

    /// Reads a 64-bit zig-zag varint.
    pub fn read_zigzag64(&mut self, context: &'static str) -> Result<i64, DataError> {
        Ok(zigzag_decode64(self.read_varint(context)?))
    }

    /// Reads a collection length and checks it against the remaining input.
    ///
    /// Every element occupies at least one byte, so a length larger than the
    /// rest of the input is rejected before anything is allocated.
    pub fn read_length(&mut self, field: &'static str) -> Result<usize, DataError> {
        let len = self.read_varint(field)? as usize;
        if len > MAX_COLLECTION_LEN {
            return Err(DataError::LengthExceedsLimit {
                field,
                len,
                max: MAX_COLLECTION_LEN,
            });
        }
        if len > self.remaining_len() {
            return Err(DataError::UnexpectedEof { context: field });
        }
        Ok(len)
    }

    /// Reads a string: varint byte count, then UTF-8.
    #[inline]
    pub fn read_string(
        &mut self,
        max_len: usize,
        field: &'static str,
    ) -> Result<String, DataError> {
        let bytes = self.read_prefixed(max_len, field)?;
        std::str::from_utf8(bytes)
            .map(|s| s.to_string())
            .map_err(|_| DataError::InvalidUtf8 { field })
    }

    /// Reads a byte buffer: varint count, then raw bytes.
    pub fn read_bytes_prefixed(
        &mut self,
        max_len: usize,
        field: &'static str,
    ) -> Result<Vec<u8>, DataError> {
        Ok(self.read_prefixed(max_len, field)?.to_vec())
    }

    fn read_prefixed(
        &mut self,
        max_len: usize,
        field: &'static str,
    ) -> Result<&'a [u8], DataError> {
        let len = self.read_varint(field)? as usize;
        if len > max_len {
            return Err(DataError::LengthExceedsLimit {
                field,
                len,
                max: max_len,
            });
        }
        self.read_bytes(len, field)
    }

    /// Reads a boolean byte (0x00 or 0x01).
    pub fn read_bool(&mut self, context: &'static str) -> Result<bool, DataError> {
        match self.read_byte(context)? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(DataError::InvalidBool { value }),
        }
    }

    /// Reads a Unicode scalar value; surrogates are rejected.
    pub fn read_char(&mut self, context: &'static str) -> Result<char, DataError> {
        let value = self.read_varint32(context)?;
        char::from_u32(value).ok_or(DataError::InvalidChar { value })
    }

    /// Reads a little-endian f32. NaN is preserved bit for bit.
    pub fn read_f32(&mut self, context: &'static str) -> Result<f32, DataError> {
        Ok(f32::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a little-endian f64. NaN is preserved bit for bit.
    pub fn read_f64(&mut self, context: &'static str) -> Result<f64, DataError> {
        Ok(f64::from_le_bytes(self.read_array(context)?))
    }

    /// Reads a 16-byte UUID.
    pub fn read_uuid(&mut self, context: &'static str) -> Result<Uuid, DataError> {
        Ok(Uuid::from_bytes(self.read_array(context)?))
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Reserved length slot, patched once the element count is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthSlot(usize);

/// Growable output buffer.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Preallocates `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Consumes the writer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a LEB128 varint.
    #[inline]
    pub fn write_varint(&mut self, mut value: u64) {
        let mut buf = [0u8; MAX_VARINT_BYTES];
        let mut len = 0;
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            buf[len] = byte;
            len += 1;
            if value == 0 {
                break;
            }
        }
        self.buf.extend_from_slice(&buf[..len]);
    }

    /// Writes a 32-bit zig-zag varint.
    pub fn write_zigzag32(&mut self, value: i32) {
        self.write_varint(zigzag_encode32(value) as u64);
    }

    /// Writes a 64-bit zig-zag varint.
    pub fn write_zigzag64(&mut self, value: i64) {
        self.write_varint(zigzag_encode64(value));
    }

    /// Reserves a fixed-width length slot ahead of a sequence whose count is
    /// only known once every element has been written.
    pub fn reserve_length(&mut self) -> LengthSlot {
        let slot = LengthSlot(self.buf.len());
        self.buf.extend_from_slice(&[0u8; LENGTH_SLOT_BYTES]);
        slot
    }

    /// Fills a reserved slot with a padded varint.
    pub fn patch_length(
        &mut self,
        slot: LengthSlot,
        len: usize,
        field: &'static str,
    ) -> Result<(), DataError> {
        if len > MAX_COLLECTION_LEN {
            return Err(DataError::TooLong {
                field,
                len,
                max: MAX_COLLECTION_LEN,
            });
        }
        let value = len as u32;
        let bytes = &mut self.buf[slot.0..slot.0 + LENGTH_SLOT_BYTES];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let chunk = ((value >> (7 * i)) & 0x7F) as u8;
            *byte = if i + 1 < LENGTH_SLOT_BYTES { chunk | 0x80 } else { chunk };
        }
        Ok(())
    }

    /// Writes a string as varint byte count plus UTF-8.
    pub fn write_string(&mut self, s: &str) {
        self.write_varint(s.len() as u64);
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Writes a byte buffer as varint count plus raw bytes.
    pub fn write_bytes_prefixed(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    pub fn write_char(&mut self, value: char) {
        self.write_varint(value as u64);
    }

    /// Writes the IEEE bits of an f32, little-endian.
    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes the IEEE bits of an f64, little-endian.
    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a UUID in its 16-byte big-endian form.
    pub fn write_uuid(&mut self, value: &Uuid) {
        self.buf.extend_from_slice(value.as_bytes());
    }
}

// =============================================================================
// ZIGZAG ENCODING
// =============================================================================

/// Zig-zag maps signed to unsigned so small magnitudes stay short:
/// 0, -1, 1, -2, 2 become 0, 1, 2, 3, 4.
#[inline]
pub fn zigzag_encode32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Decodes a 32-bit zig-zag value back to signed.
#[inline]
pub fn zigzag_decode32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ (-((n & 1) as i32))
}

#[inline]
pub fn zigzag_encode64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Decodes a 64-bit zig-zag value back to signed.
#[inline]
pub fn zigzag_decode64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ (-((n & 1) as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode32(v: i32) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_zigzag32(v);
        writer.into_bytes()
    }

    #[test]
    fn test_zigzag_reference_table() {
        assert_eq!(encode32(0), [0x00]);
        assert_eq!(encode32(-1), [0x01]);
        assert_eq!(encode32(1), [0x02]);
        assert_eq!(encode32(64), [0x80, 0x01]);
        assert_eq!(encode32(i32::MIN), [0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
        assert_eq!(encode32(i32::MAX), [0xFE, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    #[test]
    fn test_zigzag_values() {
        assert_eq!(zigzag_encode64(0), 0);
        assert_eq!(zigzag_encode64(-1), 1);
        assert_eq!(zigzag_encode64(1), 2);
        assert_eq!(zigzag_encode64(-2), 3);
        assert_eq!(zigzag_encode64(2), 4);
        assert_eq!(zigzag_encode64(i64::MIN), u64::MAX);
    }

    #[test]
    fn test_varint_boundaries() {
        for v in [0u64, 127, 128, 16383, 16384, u32::MAX as u64, u64::MAX] {
            let mut writer = Writer::new();
            writer.write_varint(v);
            let mut reader = Reader::new(writer.as_bytes());
            assert_eq!(reader.read_varint("len").unwrap(), v, "boundary {v}");
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn test_varint_too_long() {
        let data = [0x80u8; 11];
        let mut reader = Reader::new(&data);
        assert!(matches!(reader.read_varint("test"), Err(DataError::VarintTooLong)));
    }

    #[test]
    fn test_varint_overflow() {
        let mut data = [0xFFu8; 10];
        data[9] = 0x02;
        let mut reader = Reader::new(&data);
        assert!(matches!(reader.read_varint("test"), Err(DataError::VarintOverflow { .. })));

        let mut writer = Writer::new();
        writer.write_varint(u32::MAX as u64 + 1);
        let mut reader = Reader::new(writer.as_bytes());
        assert!(matches!(reader.read_zigzag32("test"), Err(DataError::VarintOverflow { .. })));
    }

    #[test]
    fn test_length_slot_is_padded_varint() {
        let mut writer = Writer::new();
        assert!(writer.is_empty());
        writer.write_byte(0xAA);
        let slot = writer.reserve_length();
        writer.write_byte(0xBB);
        writer.patch_length(slot, 3, "test").unwrap();
        assert_eq!(writer.as_bytes(), [0xAA, 0x83, 0x80, 0x80, 0x80, 0x00, 0xBB]);
        assert_eq!(writer.len(), 2 + LENGTH_SLOT_BYTES);

        let mut reader = Reader::new(&writer.as_bytes()[1..]);
        assert_eq!(reader.read_varint("test").unwrap(), 3);
        assert_eq!(reader.position(), LENGTH_SLOT_BYTES);
    }

    #[test]
    fn test_length_checked_against_input() {
        let mut writer = Writer::new();
        writer.write_varint(1000);
        writer.write_bytes(&[0u8; 10]);
        let mut reader = Reader::new(writer.as_bytes());
        assert!(matches!(reader.read_length("items"), Err(DataError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_string_too_long() {
        let mut writer = Writer::new();
        writer.write_varint(1000);
        writer.write_bytes(&[0u8; 1000]);

        let mut reader = Reader::new(writer.as_bytes());
        let result = reader.read_string(100, "test");
        assert!(matches!(result, Err(DataError::LengthExceedsLimit { max: 100, .. })));
    }

    #[test]
    fn test_invalid_scalars() {
        let mut reader = Reader::new(&[0x02]);
        assert!(matches!(reader.read_bool("test"), Err(DataError::InvalidBool { value: 2 })));

        let mut writer = Writer::new();
        writer.write_varint(0xD800);
        let mut reader = Reader::new(writer.as_bytes());
        assert!(matches!(reader.read_char("test"), Err(DataError::InvalidChar { value: 0xD800 })));

        let mut reader = Reader::new(&[0x02, 0xC3, 0x28]);
        assert!(matches!(reader.read_string(10, "text"), Err(DataError::InvalidUtf8 { .. })));
    }

    #[test]
    fn test_unexpected_eof() {
        let data = [0u8; 5];
        let mut reader = Reader::new(&data);
        let result = reader.read_bytes(10, "test");
        assert!(matches!(result, Err(DataError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_nan_preserved() {
        let nan = f64::from_bits(0x7FF8_0000_0000_0001);
        let mut writer = Writer::new();
        writer.write_f64(nan);
        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_f64("test").unwrap().to_bits(), nan.to_bits());
    }

    proptest! {
        #[test]
        fn prop_zigzag32_roundtrip(v in any::<i32>()) {
            let bytes = encode32(v);
            let mut reader = Reader::new(&bytes);
            prop_assert_eq!(reader.read_zigzag32("test").unwrap(), v);
            prop_assert!(reader.is_empty());
        }

        #[test]
        fn prop_zigzag64_roundtrip(v in any::<i64>()) {
            prop_assert_eq!(zigzag_decode64(zigzag_encode64(v)), v);
        }

        #[test]
        fn prop_zigzag32_matches_64_for_small_values(v in any::<i32>()) {
            prop_assert_eq!(zigzag_encode32(v) as u64, zigzag_encode64(v as i64));
        }
    }
}
