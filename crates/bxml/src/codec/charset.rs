//! Character encodings a stream may declare in its header.

use crate::error::{DecodeError, EncodeError};

/// Character encoding of every string on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Charset {
    /// UTF-8 (the default).
    #[default]
    Utf8,
    /// 7-bit ASCII.
    UsAscii,
    /// ISO-8859-1; every byte maps to the code point of the same value.
    Latin1,
    /// UTF-16 with the byte order taken from the header's character byte-order flag.
    Utf16 { little_endian: bool },
}

impl Charset {
    /// Resolves a header charset name (case-insensitive).
    pub fn from_name(name: &str, char_little_endian: bool) -> Result<Self, DecodeError> {
        match name.to_ascii_uppercase().as_str() {
            "UTF-8" | "UTF8" => Ok(Charset::Utf8),
            "US-ASCII" | "ASCII" => Ok(Charset::UsAscii),
            "ISO-8859-1" | "LATIN1" => Ok(Charset::Latin1),
            "UTF-16" | "UTF16" => Ok(Charset::Utf16 {
                little_endian: char_little_endian,
            }),
            _ => Err(DecodeError::UnsupportedCharset {
                name: name.to_string(),
            }),
        }
    }

    /// Canonical name written to the header.
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::UsAscii => "US-ASCII",
            Charset::Latin1 => "ISO-8859-1",
            Charset::Utf16 { .. } => "UTF-16",
        }
    }

    /// Whether multi-byte characters are stored least significant byte first.
    pub fn char_little_endian(&self) -> bool {
        matches!(self, Charset::Utf16 { little_endian: true })
    }

    /// Decodes wire bytes into a string.
    pub fn decode(&self, bytes: &[u8], field: &'static str) -> Result<String, DecodeError> {
        let invalid = || DecodeError::InvalidText {
            charset: self.name(),
            field,
        };
        match self {
            Charset::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_string)
                .map_err(|_| invalid()),
            Charset::UsAscii => {
                if bytes.is_ascii() {
                    // ASCII is a UTF-8 subset.
                    Ok(bytes.iter().map(|&b| b as char).collect())
                } else {
                    Err(invalid())
                }
            }
            Charset::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            Charset::Utf16 { little_endian } => {
                if bytes.len() % 2 != 0 {
                    return Err(invalid());
                }
                let units = bytes.chunks_exact(2).map(|pair| {
                    let pair = [pair[0], pair[1]];
                    if *little_endian {
                        u16::from_le_bytes(pair)
                    } else {
                        u16::from_be_bytes(pair)
                    }
                });
                char::decode_utf16(units)
                    .collect::<Result<String, _>>()
                    .map_err(|_| invalid())
            }
        }
    }

    /// Appends the encoded form of `s` to `out`.
    pub fn encode_into(&self, s: &str, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        match self {
            Charset::Utf8 => out.extend_from_slice(s.as_bytes()),
            Charset::UsAscii | Charset::Latin1 => {
                let max = if *self == Charset::UsAscii { 0x7F } else { 0xFF };
                out.reserve(s.len());
                for c in s.chars() {
                    let code = c as u32;
                    if code > max {
                        return Err(EncodeError::Unmappable {
                            charset: self.name(),
                            code,
                        });
                    }
                    out.push(code as u8);
                }
            }
            Charset::Utf16 { little_endian } => {
                out.reserve(s.len() * 2);
                for unit in s.encode_utf16() {
                    let bytes = if *little_endian {
                        unit.to_le_bytes()
                    } else {
                        unit.to_be_bytes()
                    };
                    out.extend_from_slice(&bytes);
                }
            }
        }
        Ok(())
    }
}

/// Returns true if `c` matches the XML 1.0 `Char` production.
#[inline]
pub fn is_xml_char(c: char) -> bool {
    matches!(c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF)
}

/// Returns the first character of `s` that is not a legal XML 1.0 character.
pub fn first_illegal_xml_char(s: &str) -> Option<char> {
    s.chars().find(|&c| !is_xml_char(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(Charset::from_name("utf-8", false).unwrap(), Charset::Utf8);
        assert_eq!(
            Charset::from_name("UTF-16", true).unwrap(),
            Charset::Utf16 { little_endian: true }
        );
        assert!(matches!(
            Charset::from_name("EBCDIC", false),
            Err(DecodeError::UnsupportedCharset { .. })
        ));
    }

    #[test]
    fn test_utf16_both_orders() {
        for little_endian in [false, true] {
            let cs = Charset::Utf16 { little_endian };
            let mut out = Vec::new();
            cs.encode_into("h\u{e9}llo \u{1F600}", &mut out).unwrap();
            assert_eq!(cs.decode(&out, "test").unwrap(), "h\u{e9}llo \u{1F600}");
        }
    }

    #[test]
    fn test_latin1_and_ascii() {
        let mut out = Vec::new();
        Charset::Latin1.encode_into("caf\u{e9}", &mut out).unwrap();
        assert_eq!(out, b"caf\xe9");
        assert_eq!(Charset::Latin1.decode(&out, "test").unwrap(), "caf\u{e9}");

        let mut out = Vec::new();
        let err = Charset::UsAscii.encode_into("caf\u{e9}", &mut out).unwrap_err();
        assert!(matches!(err, EncodeError::Unmappable { code: 0xe9, .. }));
        assert!(Charset::UsAscii.decode(b"\xe9", "test").is_err());
    }

    #[test]
    fn test_invalid_utf8() {
        let result = Charset::Utf8.decode(&[0xff, 0xfe], "name");
        assert!(matches!(result, Err(DecodeError::InvalidText { field: "name", .. })));
    }

    #[test]
    fn test_xml_chars() {
        assert!(is_xml_char('a'));
        assert!(is_xml_char('\t'));
        assert!(!is_xml_char('\u{0}'));
        assert!(!is_xml_char('\u{FFFE}'));
        assert_eq!(first_illegal_xml_char("ok\u{1}bad"), Some('\u{1}'));
        assert_eq!(first_illegal_xml_char("fine"), None);
    }
}
