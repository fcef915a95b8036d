//! Legacy `VKV\x03` encoding.
//!
//! Only the first-generation container is written: uncompressed, or wrapped
//! in a single LZ4 block.  Layout (all little-endian):
//!
//! ```text
//! magic (4) · encoding UUID (16) · format UUID (16)
//! u32 string_count · strings (UTF-8 + NUL)…
//! root-value block
//! FF FF FF FF
//! ```
//!
//! A root-value block is `type_byte [flag_byte] payload`.  The value block
//! is serialized first so string interning happens in document order; the
//! table is then emitted ahead of it.

use indexmap::IndexSet;

use crate::binary::types::{write_type_byte, Kind, LEGACY_TERMINATOR};
use crate::compress::lz4_compress;
use crate::error::{Error, Result};
use crate::header::{Format, ENCODING_BINARY_BLOCK_LZ4, ENCODING_BINARY_UNCOMPRESSED};
use crate::value::{Flag, TypedArray, Value, MAX_DEPTH};

/// Flags with a legacy wire bit.  `MULTILINE_STRING` is a text transport
/// marker and is silently dropped; anything else outside this set cannot be
/// persisted by this container.
const PERSISTABLE: Flag = Flag::RESOURCE
    .union(Flag::RESOURCE_NAME)
    .union(Flag::PANORAMA)
    .union(Flag::SOUNDEVENT)
    .union(Flag::SUBCLASS);

/// Writer for the legacy container.
pub struct LegacyWriter {
    format: Format,
    strings: IndexSet<String>,
}

impl LegacyWriter {
    pub fn new(format: Format) -> LegacyWriter {
        LegacyWriter {
            format,
            strings: IndexSet::new(),
        }
    }

    /// Encode with the binary-uncompressed wrapping.
    pub fn encode(mut self, value: &Value) -> Result<Vec<u8>> {
        value.validate()?;
        let body = self.body(value)?;
        let mut out = self.header(ENCODING_BINARY_UNCOMPRESSED.wire_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Encode with the binary-block-LZ4 wrapping: the same header, then the
    /// uncompressed body size and one raw LZ4 block.
    pub fn encode_lz4(mut self, value: &Value) -> Result<Vec<u8>> {
        value.validate()?;
        let body = self.body(value)?;
        let mut out = self.header(ENCODING_BINARY_BLOCK_LZ4.wire_bytes());
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(&lz4_compress(&body));
        Ok(out)
    }

    fn header(&self, encoding: [u8; 16]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"VKV\x03");
        out.extend_from_slice(&encoding);
        out.extend_from_slice(&self.format.wire_bytes());
        out
    }

    /// String table, root-value block, terminator.
    fn body(&mut self, value: &Value) -> Result<Vec<u8>> {
        let mut block = Vec::new();
        self.write_value(&mut block, value, 0)?;

        let mut body = Vec::new();
        body.extend_from_slice(&(self.strings.len() as u32).to_le_bytes());
        for string in &self.strings {
            body.extend_from_slice(string.as_bytes());
            body.push(0);
        }
        body.extend_from_slice(&block);
        body.extend_from_slice(&LEGACY_TERMINATOR.to_le_bytes());
        Ok(body)
    }

    /// Intern a non-empty string, returning its stable table index.
    fn intern(&mut self, s: &str) -> i32 {
        debug_assert!(!s.is_empty());
        match self.strings.get_index_of(s) {
            Some(index) => index as i32,
            None => {
                let (index, _) = self.strings.insert_full(s.to_owned());
                index as i32
            }
        }
    }

    fn string_index(&mut self, s: &str) -> i32 {
        if s.is_empty() {
            -1
        } else {
            self.intern(s)
        }
    }

    /// Resolve the single wire flag for a value, or fail.
    fn wire_flags(flags: Flag) -> Result<Flag> {
        let persisted = flags - Flag::MULTILINE_STRING;
        if persisted.is_empty() {
            return Ok(Flag::empty());
        }
        if !PERSISTABLE.contains(persisted) {
            return Err(Error::InvalidValue(format!(
                "flag set {persisted:?} has no legacy wire form"
            )));
        }
        if persisted.bits().count_ones() > 1 {
            return Err(Error::InvalidValue(format!(
                "legacy containers persist at most one flag per value, got {persisted:?}"
            )));
        }
        Ok(persisted)
    }

    fn write_value(&mut self, out: &mut Vec<u8>, value: &Value, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(Error::RecursionLimit(MAX_DEPTH));
        }
        let flags = Self::wire_flags(value.flags())?;
        let value = value.unflagged();

        match value {
            Value::Null => write_type_byte(out, Kind::Null, flags),
            Value::Bool(true) => write_type_byte(out, Kind::BoolTrue, flags),
            Value::Bool(false) => write_type_byte(out, Kind::BoolFalse, flags),
            Value::Double(_) | Value::Float(_) => {
                let v = value.as_double().unwrap();
                // Canonicalization: exact 0.0 / 1.0 become constant kinds.
                if v == 0.0 {
                    write_type_byte(out, Kind::DoubleZero, flags);
                } else if v == 1.0 {
                    write_type_byte(out, Kind::DoubleOne, flags);
                } else {
                    write_type_byte(out, Kind::Double, flags);
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            Value::String(s) => {
                write_type_byte(out, Kind::String, flags);
                let index = self.string_index(s);
                out.extend_from_slice(&index.to_le_bytes());
            }
            Value::Blob(bytes) => {
                write_type_byte(out, Kind::Blob, flags);
                out.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
                out.extend_from_slice(bytes);
            }
            Value::Array(items) => {
                write_type_byte(out, Kind::Array, flags);
                out.extend_from_slice(&(items.len() as i32).to_le_bytes());
                for item in items {
                    self.write_value(out, item, depth + 1)?;
                }
            }
            Value::TypedArray(array) => {
                write_type_byte(out, Kind::TypedArray, flags);
                out.extend_from_slice(&(array.items.len() as i32).to_le_bytes());
                self.write_typed_elements(out, array, depth)?;
            }
            Value::Object(map) => {
                write_type_byte(out, Kind::Object, flags);
                out.extend_from_slice(&(map.len() as i32).to_le_bytes());
                for (key, member) in map {
                    let index = self.intern(key);
                    out.extend_from_slice(&index.to_le_bytes());
                    self.write_value(out, member, depth + 1)?;
                }
            }
            Value::Flagged(..) => unreachable!("unflagged() strips the wrapper"),
            // Integers, canonicalized: 0 and 1 become constant kinds, values
            // that fit i64 are Int64, the remainder UInt64.
            _ => {
                let v = value.as_int().expect("remaining variants are integers");
                if v == 0 {
                    write_type_byte(out, Kind::Int64Zero, flags);
                } else if v == 1 {
                    write_type_byte(out, Kind::Int64One, flags);
                } else if let Ok(v) = i64::try_from(v) {
                    write_type_byte(out, Kind::Int64, flags);
                    out.extend_from_slice(&v.to_le_bytes());
                } else {
                    let v = u64::try_from(v).expect("validated range");
                    write_type_byte(out, Kind::UInt64, flags);
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
        Ok(())
    }

    /// Emit the element type byte and the homogeneous payloads — exactly
    /// what the reader's typed-array path consumes: no per-element type
    /// bytes follow the declared kind.
    fn write_typed_elements(
        &mut self,
        out: &mut Vec<u8>,
        array: &TypedArray,
        depth: usize,
    ) -> Result<()> {
        let elem_flags = Self::wire_flags(array.elem_specifier.to_flag())?;
        write_type_byte(out, array.elem_kind, elem_flags);
        for item in &array.items {
            self.write_element(out, array.elem_kind, item, depth + 1)?;
        }
        Ok(())
    }

    fn write_element(
        &mut self,
        out: &mut Vec<u8>,
        kind: Kind,
        item: &Value,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(Error::RecursionLimit(MAX_DEPTH));
        }
        if !item.flags().is_empty() {
            return Err(Error::InvalidValue(
                "typed-array elements cannot carry their own flags".into(),
            ));
        }
        let mismatch = || {
            Error::InvalidValue(format!(
                "typed-array element {item:?} does not match declared kind {kind:?}"
            ))
        };

        match kind {
            // Constant kinds carry no payload; the element must agree.
            Kind::Null => match item {
                Value::Null => {}
                _ => return Err(mismatch()),
            },
            Kind::BoolTrue => match item {
                Value::Bool(true) => {}
                _ => return Err(mismatch()),
            },
            Kind::BoolFalse => match item {
                Value::Bool(false) => {}
                _ => return Err(mismatch()),
            },
            Kind::Int64Zero | Kind::Int64One => {
                let expected = (kind == Kind::Int64One) as i128;
                if item.as_int() != Some(expected) {
                    return Err(mismatch());
                }
            }
            Kind::DoubleZero | Kind::DoubleOne => {
                let expected = (kind == Kind::DoubleOne) as u8 as f64;
                if item.as_double() != Some(expected) {
                    return Err(mismatch());
                }
            }
            Kind::Bool => match item {
                Value::Bool(b) => out.push(*b as u8),
                _ => return Err(mismatch()),
            },
            Kind::Int64 => {
                let v = item.as_int().ok_or_else(mismatch)?;
                let v = i64::try_from(v).map_err(|_| mismatch())?;
                out.extend_from_slice(&v.to_le_bytes());
            }
            Kind::UInt64 => {
                let v = item.as_int().ok_or_else(mismatch)?;
                let v = u64::try_from(v).map_err(|_| mismatch())?;
                out.extend_from_slice(&v.to_le_bytes());
            }
            Kind::Int32 => {
                let v = item.as_int().ok_or_else(mismatch)?;
                let v = i32::try_from(v).map_err(|_| mismatch())?;
                out.extend_from_slice(&v.to_le_bytes());
            }
            Kind::UInt32 => {
                let v = item.as_int().ok_or_else(mismatch)?;
                let v = u32::try_from(v).map_err(|_| mismatch())?;
                out.extend_from_slice(&v.to_le_bytes());
            }
            Kind::Int16 => {
                let v = item.as_int().ok_or_else(mismatch)?;
                let v = i16::try_from(v).map_err(|_| mismatch())?;
                out.extend_from_slice(&v.to_le_bytes());
            }
            Kind::UInt16 => {
                let v = item.as_int().ok_or_else(mismatch)?;
                let v = u16::try_from(v).map_err(|_| mismatch())?;
                out.extend_from_slice(&v.to_le_bytes());
            }
            Kind::Int8 => {
                let v = item.as_int().ok_or_else(mismatch)?;
                let v = i8::try_from(v).map_err(|_| mismatch())?;
                out.push(v as u8);
            }
            Kind::UInt8 => {
                let v = item.as_int().ok_or_else(mismatch)?;
                let v = u8::try_from(v).map_err(|_| mismatch())?;
                out.push(v);
            }
            Kind::Double => {
                let v = item.as_double().ok_or_else(mismatch)?;
                out.extend_from_slice(&v.to_le_bytes());
            }
            Kind::Float => {
                let v = item.as_double().ok_or_else(mismatch)?;
                out.extend_from_slice(&(v as f32).to_le_bytes());
            }
            Kind::String => match item.unflagged() {
                Value::String(s) => {
                    let index = self.string_index(s);
                    out.extend_from_slice(&index.to_le_bytes());
                }
                _ => return Err(mismatch()),
            },
            Kind::Blob => match item.unflagged() {
                Value::Blob(bytes) => {
                    out.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
                    out.extend_from_slice(bytes);
                }
                _ => return Err(mismatch()),
            },
            // Container elements resume the type-byte'd encoding for their
            // own children, matching the reader's recursion.
            Kind::Array => match item.unflagged() {
                Value::Array(items) => {
                    out.extend_from_slice(&(items.len() as i32).to_le_bytes());
                    for nested in items {
                        self.write_value(out, nested, depth + 1)?;
                    }
                }
                _ => return Err(mismatch()),
            },
            Kind::Object => match item.unflagged() {
                Value::Object(map) => {
                    out.extend_from_slice(&(map.len() as i32).to_le_bytes());
                    for (key, member) in map {
                        let index = self.intern(key);
                        out.extend_from_slice(&index.to_le_bytes());
                        self.write_value(out, member, depth + 1)?;
                    }
                }
                _ => return Err(mismatch()),
            },
            Kind::TypedArray => match item.unflagged() {
                Value::TypedArray(nested) => {
                    out.extend_from_slice(&(nested.items.len() as i32).to_le_bytes());
                    self.write_typed_elements(out, nested, depth)?;
                }
                _ => return Err(mismatch()),
            },
            Kind::TypedArrayByteLen | Kind::TypedArrayByteLen2 => {
                return Err(Error::InvalidValue(
                    "byte-length typed arrays are not written by the legacy container".into(),
                ))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::reader::decode;
    use crate::binary::types::Specifier;
    use crate::header::FORMAT_GENERIC;
    use crate::value::Object;

    fn encode(value: &Value) -> Vec<u8> {
        LegacyWriter::new(FORMAT_GENERIC).encode(value).unwrap()
    }

    fn roundtrip(value: Value) {
        let bytes = encode(&value);
        let decoded = decode(&bytes).expect("decode of encode");
        assert_eq!(decoded.value, value);
    }

    #[test]
    fn null_document_bytes() {
        // magic · encoding uuid · format uuid · empty table · Null · trailer
        let expected: Vec<u8> = [
            &b"VKV\x03"[..],
            &[
                0x00, 0x05, 0x86, 0x1B, 0xD8, 0xF7, 0xC1, 0x40, 0xAD, 0x82, 0x75, 0xA4, 0x82,
                0x67, 0xE7, 0x14,
            ],
            &[
                0x7C, 0x16, 0x12, 0x74, 0xE9, 0x06, 0x98, 0x46, 0xAF, 0xF2, 0xE6, 0x3E, 0xB5,
                0x90, 0x37, 0xE7,
            ],
            &[0x00, 0x00, 0x00, 0x00],
            &[0x01],
            &[0xFF, 0xFF, 0xFF, 0xFF],
        ]
        .concat();
        assert_eq!(encode(&Value::Null), expected);
    }

    #[test]
    fn single_pair_object_bytes() {
        let mut map = Object::new();
        map.insert("A".into(), Value::Int64(1));
        let bytes = encode(&Value::Object(map));
        let tail = &bytes[36..];
        assert_eq!(
            tail,
            [
                0x01, 0x00, 0x00, 0x00, // one string
                0x41, 0x00, // "A"
                0x09, // Object
                0x01, 0x00, 0x00, 0x00, // one member
                0x00, 0x00, 0x00, 0x00, // key index 0
                0x10, // Int64One
                0xFF, 0xFF, 0xFF, 0xFF,
            ]
        );
    }

    #[test]
    fn integer_canonicalization() {
        for zero in [Value::Int64(0), Value::Int32(0), Value::UInt8(0)] {
            let bytes = encode(&zero);
            assert_eq!(bytes[40], Kind::Int64Zero as u8);
            assert_eq!(bytes.len(), 45, "constant kinds carry no payload");
        }
        let bytes = encode(&Value::UInt64(1));
        assert_eq!(bytes[40], Kind::Int64One as u8);
        let bytes = encode(&Value::Double(0.0));
        assert_eq!(bytes[40], Kind::DoubleZero as u8);
        let bytes = encode(&Value::Float(1.0));
        assert_eq!(bytes[40], Kind::DoubleOne as u8);
    }

    #[test]
    fn huge_uint64_gets_its_own_kind() {
        let value = Value::UInt64(u64::MAX - 1);
        let bytes = encode(&value);
        assert_eq!(bytes[40], Kind::UInt64 as u8);
        roundtrip(value);
    }

    #[test]
    fn string_table_is_minimal() {
        let mut map = Object::new();
        map.insert("name".into(), Value::from("name")); // key == value
        map.insert("other".into(), Value::from("name"));
        map.insert("empty".into(), Value::from(""));
        let bytes = encode(&Value::Object(map));
        let table_len = u32::from_le_bytes(bytes[36..40].try_into().unwrap());
        // "name", "other", "empty" — the empty string is never interned.
        assert_eq!(table_len, 3);
    }

    #[test]
    fn scalar_roundtrips() {
        roundtrip(Value::Null);
        roundtrip(Value::Bool(true));
        roundtrip(Value::Bool(false));
        roundtrip(Value::Int64(-123456789));
        roundtrip(Value::Double(2.75));
        roundtrip(Value::from("hello world"));
        roundtrip(Value::from(""));
        roundtrip(Value::Blob(vec![0xDE, 0xAD, 0xBE, 0xEF]));
    }

    #[test]
    fn container_roundtrips() {
        let mut inner = Object::new();
        inner.insert("deep".into(), Value::Array(vec![Value::Null, Value::from(2i64)]));
        let mut map = Object::new();
        map.insert("nested".into(), Value::Object(inner));
        map.insert("blob".into(), Value::Blob(b"raw bytes".to_vec()));
        roundtrip(Value::Object(map));
    }

    #[test]
    fn flagged_value_roundtrips() {
        let mut map = Object::new();
        map.insert("particle".into(), Flag::RESOURCE.wrap("explosion.vpcf"));
        roundtrip(Value::Object(map));
    }

    #[test]
    fn multiline_flag_is_stripped() {
        let value = Flag::MULTILINE_STRING.wrap("a\nb\n");
        let bytes = encode(&value);
        // Plain String kind, no flag byte.
        assert_eq!(bytes[40], Kind::String as u8);
        let decoded = decode(&bytes).unwrap().value;
        assert_eq!(decoded, Value::from("a\nb\n"));
    }

    #[test]
    fn multiple_flags_are_rejected() {
        let value = (Flag::RESOURCE | Flag::SUBCLASS).wrap("x");
        assert!(matches!(
            LegacyWriter::new(FORMAT_GENERIC).encode(&value),
            Err(Error::InvalidValue(_))
        ));
    }

    #[test]
    fn unpersistable_flag_is_rejected() {
        let value = Flag::ENTITY_NAME.wrap("npc_strider");
        assert!(matches!(
            LegacyWriter::new(FORMAT_GENERIC).encode(&value),
            Err(Error::InvalidValue(_))
        ));
    }

    #[test]
    fn typed_array_roundtrips() {
        let value = Value::TypedArray(TypedArray {
            elem_kind: Kind::Double,
            elem_specifier: Specifier::Unspecified,
            items: vec![Value::Double(0.5), Value::Double(-3.25), Value::Double(8.0)],
        });
        roundtrip(value);
    }

    #[test]
    fn constant_typed_array_has_no_payload() {
        let value = Value::TypedArray(TypedArray {
            elem_kind: Kind::Int64Zero,
            elem_specifier: Specifier::Unspecified,
            items: vec![Value::Int64(0); 4],
        });
        let bytes = encode(&value);
        // table(4) + type(1) + count(4) + elem type(1) + trailer(4)
        assert_eq!(bytes.len(), 36 + 4 + 1 + 4 + 1 + 4);
        roundtrip(value);
    }

    #[test]
    fn mismatched_typed_element_is_rejected() {
        let value = Value::TypedArray(TypedArray {
            elem_kind: Kind::Double,
            elem_specifier: Specifier::Unspecified,
            items: vec![Value::from("not a double")],
        });
        assert!(matches!(
            LegacyWriter::new(FORMAT_GENERIC).encode(&value),
            Err(Error::InvalidValue(_))
        ));
    }

    #[test]
    fn lz4_wrapper_roundtrips() {
        let mut map = Object::new();
        map.insert("stringValue".into(), Value::from("hello world"));
        let value = Value::Object(map);
        let bytes = LegacyWriter::new(FORMAT_GENERIC)
            .encode_lz4(&value)
            .unwrap();
        assert_eq!(&bytes[..4], b"VKV\x03");
        assert_eq!(
            bytes[4..20],
            crate::header::ENCODING_BINARY_BLOCK_LZ4.wire_bytes()
        );
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.value, value);
        assert_eq!(
            decoded.encoding,
            Some(crate::header::ENCODING_BINARY_BLOCK_LZ4)
        );
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let mut value = Value::Null;
        for _ in 0..(MAX_DEPTH + 2) {
            value = Value::Array(vec![value]);
        }
        assert!(matches!(
            LegacyWriter::new(FORMAT_GENERIC).encode(&value),
            Err(Error::RecursionLimit(_))
        ));
    }
}
