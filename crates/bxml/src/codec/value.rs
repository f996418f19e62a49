//! Value type codes and the fixed-width value codecs.
//!
//! A value on the wire starts with one type byte. Bytes `0..=239` are
//! `SmallNum` values (the byte is the value). `0xF0..=0xFB` select a typed
//! payload. `0xF5` and `0xF7` are reserved.

use std::fmt::Write as _;

use crate::error::{DecodeError, Result};
use crate::io::ByteReader;

/// Primitive value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Inline integer 0..=239 carried in the type byte itself.
    SmallNum,
    Bool,
    Byte,
    Short,
    UShort,
    Int,
    Long,
    Float,
    Double,
    String,
    Array,
}

impl ValueType {
    /// Creates a ValueType from its wire representation.
    pub fn from_u8(code: u8) -> Option<ValueType> {
        match code {
            0..=239 => Some(ValueType::SmallNum),
            0xF0 => Some(ValueType::Bool),
            0xF1 => Some(ValueType::Byte),
            0xF2 => Some(ValueType::Short),
            0xF3 => Some(ValueType::UShort),
            0xF4 => Some(ValueType::Int),
            0xF6 => Some(ValueType::Long),
            0xF8 => Some(ValueType::Float),
            0xF9 => Some(ValueType::Double),
            0xFA => Some(ValueType::String),
            0xFB => Some(ValueType::Array),
            _ => None,
        }
    }

    /// The type byte, or `None` for `SmallNum` whose byte is its value.
    pub fn code(self) -> Option<u8> {
        match self {
            ValueType::SmallNum => None,
            ValueType::Bool => Some(0xF0),
            ValueType::Byte => Some(0xF1),
            ValueType::Short => Some(0xF2),
            ValueType::UShort => Some(0xF3),
            ValueType::Int => Some(0xF4),
            ValueType::Long => Some(0xF6),
            ValueType::Float => Some(0xF8),
            ValueType::Double => Some(0xF9),
            ValueType::String => Some(0xFA),
            ValueType::Array => Some(0xFB),
        }
    }

    /// Payload size after the type byte; `None` for variable-length kinds.
    pub fn byte_len(self) -> Option<usize> {
        match self {
            ValueType::SmallNum => Some(0),
            ValueType::Bool | ValueType::Byte => Some(1),
            ValueType::Short | ValueType::UShort => Some(2),
            ValueType::Int | ValueType::Float => Some(4),
            ValueType::Long | ValueType::Double => Some(8),
            ValueType::String | ValueType::Array => None,
        }
    }

    /// Whether this type may appear as an array element type.
    pub fn is_array_element(self) -> bool {
        !matches!(
            self,
            ValueType::SmallNum | ValueType::String | ValueType::Array
        )
    }

    /// Lowercase name for messages.
    pub fn name(self) -> &'static str {
        match self {
            ValueType::SmallNum => "smallnum",
            ValueType::Bool => "bool",
            ValueType::Byte => "byte",
            ValueType::Short => "short",
            ValueType::UShort => "ushort",
            ValueType::Int => "int",
            ValueType::Long => "long",
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::Array => "array",
        }
    }
}

/// Reads an array element type byte.
pub fn read_array_element_type(reader: &mut ByteReader) -> Result<ValueType> {
    let code = reader.read_u8("array element type")?;
    match ValueType::from_u8(code) {
        Some(vt) if vt.is_array_element() && code >= 0xF0 => Ok(vt),
        _ => Err(DecodeError::InvalidArrayElementType { code }.into()),
    }
}

/// Narrowest single-value representation of an `int`.
pub fn narrowest_int_type(value: i32) -> ValueType {
    match value {
        0..=239 => ValueType::SmallNum,
        v if i16::try_from(v).is_ok() => ValueType::Short,
        v if u16::try_from(v).is_ok() => ValueType::UShort,
        _ => ValueType::Int,
    }
}

// =============================================================================
// TEXT RENDERING
// =============================================================================

/// Appends a double using the XML Schema lexical forms for specials.
pub fn push_double(out: &mut String, value: f64) {
    if value.is_nan() {
        out.push_str("NaN");
    } else if value.is_infinite() {
        out.push_str(if value > 0.0 { "INF" } else { "-INF" });
    } else {
        let _ = write!(out, "{value}");
    }
}

/// Appends a float using the XML Schema lexical forms for specials.
pub fn push_float(out: &mut String, value: f32) {
    if value.is_nan() {
        out.push_str("NaN");
    } else if value.is_infinite() {
        out.push_str(if value > 0.0 { "INF" } else { "-INF" });
    } else {
        let _ = write!(out, "{value}");
    }
}

/// Reads `count` fixed-width values of `value_type` and appends them to
/// `out`, space separated as in an XML list type.
///
/// `separated` puts a separator before the first value too, for text that
/// already holds earlier values.
pub fn append_values_text(
    reader: &mut ByteReader,
    value_type: ValueType,
    count: usize,
    out: &mut String,
    separated: bool,
) -> Result<()> {
    for i in 0..count {
        if separated || i > 0 {
            out.push(' ');
        }
        match value_type {
            ValueType::Bool => out.push_str(if reader.read_bool("bool value")? {
                "true"
            } else {
                "false"
            }),
            ValueType::Byte => {
                let _ = write!(out, "{}", reader.read_i8("byte value")?);
            }
            ValueType::Short => {
                let _ = write!(out, "{}", reader.read_i16("short value")?);
            }
            ValueType::UShort => {
                let _ = write!(out, "{}", reader.read_u16("ushort value")?);
            }
            ValueType::Int => {
                let _ = write!(out, "{}", reader.read_i32("int value")?);
            }
            ValueType::Long => {
                let _ = write!(out, "{}", reader.read_i64("long value")?);
            }
            ValueType::Float => push_float(out, reader.read_f32("float value")?),
            ValueType::Double => push_double(out, reader.read_f64("double value")?),
            ValueType::String => out.push_str(&reader.read_string("string value")?),
            ValueType::SmallNum | ValueType::Array => {
                return Err(DecodeError::InvalidArrayElementType {
                    code: value_type.code().unwrap_or(0),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Skips `count` values of `value_type` by byte length, without decoding.
pub fn skip_values(reader: &mut ByteReader, value_type: ValueType, count: usize) -> Result<()> {
    match value_type.byte_len() {
        Some(width) => reader.skip((width * count) as u64, "value"),
        None if value_type == ValueType::String => {
            for _ in 0..count {
                reader.skip_string()?;
            }
            Ok(())
        }
        None => Err(DecodeError::InvalidArrayElementType {
            code: value_type.code().unwrap_or(0),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{ByteOrder, Source};

    #[test]
    fn test_code_bijection() {
        for code in 0xF0u8..=0xFF {
            match ValueType::from_u8(code) {
                Some(vt) => assert_eq!(vt.code(), Some(code)),
                None => assert!(matches!(code, 0xF5 | 0xF7 | 0xFC..=0xFF)),
            }
        }
        assert_eq!(ValueType::from_u8(0), Some(ValueType::SmallNum));
        assert_eq!(ValueType::from_u8(239), Some(ValueType::SmallNum));
    }

    #[test]
    fn test_array_element_types() {
        assert!(ValueType::Double.is_array_element());
        assert!(!ValueType::SmallNum.is_array_element());
        assert!(!ValueType::String.is_array_element());
        assert!(!ValueType::Array.is_array_element());
    }

    #[test]
    fn test_narrowest_int() {
        assert_eq!(narrowest_int_type(0), ValueType::SmallNum);
        assert_eq!(narrowest_int_type(239), ValueType::SmallNum);
        assert_eq!(narrowest_int_type(240), ValueType::Short);
        assert_eq!(narrowest_int_type(-1), ValueType::Short);
        assert_eq!(narrowest_int_type(40_000), ValueType::UShort);
        assert_eq!(narrowest_int_type(-40_000), ValueType::Int);
        assert_eq!(narrowest_int_type(i32::MAX), ValueType::Int);
    }

    #[test]
    fn test_special_doubles() {
        let mut out = String::new();
        push_double(&mut out, f64::NEG_INFINITY);
        out.push(' ');
        push_double(&mut out, 1.0);
        out.push(' ');
        push_double(&mut out, 2.5);
        assert_eq!(out, "-INF 1 2.5");
    }

    #[test]
    fn test_append_values_text() {
        let mut bytes = Vec::new();
        for v in [1i32, -2, 3] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        let mut reader = ByteReader::open(Source::from_bytes(bytes), ByteOrder::BigEndian).unwrap();
        let mut out = String::new();
        append_values_text(&mut reader, ValueType::Int, 2, &mut out, false).unwrap();
        assert_eq!(out, "1 -2");
        append_values_text(&mut reader, ValueType::Int, 1, &mut out, true).unwrap();
        assert_eq!(out, "1 -2 3");
    }

    #[test]
    fn test_invalid_array_element_type() {
        let mut reader =
            ByteReader::open(Source::from_bytes(vec![0xFA]), ByteOrder::BigEndian).unwrap();
        let result = read_array_element_type(&mut reader);
        assert!(matches!(
            result,
            Err(crate::Error::Decode(DecodeError::InvalidArrayElementType { code: 0xFA }))
        ));
    }
}
