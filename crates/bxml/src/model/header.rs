//! Stream header: identification, version, flags, compression, charset.

use std::io::Write;

use crate::codec::Charset;
use crate::error::{DecodeError, Result};
use crate::io::{ByteOrder, ByteReader, ByteWriter};
use crate::limits::{
    BINARY_CHECK, FORMAT_NAME, FORMAT_VERSION, MAX_CHARSET_LEN, MIN_POINT_VERSION, NON_TEXT_MARKER,
};
use crate::model::EncodingOptions;

/// Length of the identification block (marker, name, binary check).
const IDENTIFIER_LEN: usize = 1 + FORMAT_NAME.len() + BINARY_CHECK.len();

/// Format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub point: u8,
}

impl Version {
    /// The version written by this crate.
    pub const CURRENT: Version = Version {
        major: FORMAT_VERSION.0,
        minor: FORMAT_VERSION.1,
        point: FORMAT_VERSION.2,
    };

    /// Whether a reader of [`Version::CURRENT`] can decode this version.
    pub fn is_supported(&self) -> bool {
        self.major == Self::CURRENT.major
            && self.minor == Self::CURRENT.minor
            && (MIN_POINT_VERSION..=Self::CURRENT.point).contains(&self.point)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.point)
    }
}

/// Bit view over the first header flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u8);

impl Flags {
    /// Multi-byte numbers are little-endian.
    pub const LITTLE_ENDIAN: u8 = 0x01;
    /// Multi-byte characters are little-endian.
    pub const CHAR_LITTLE_ENDIAN: u8 = 0x02;
    /// The trailer carries random-access indices.
    pub const RANDOM_ACCESS: u8 = 0x04;
    /// Strings are restricted to legal XML 1.0 characters.
    pub const STRICT_STRINGS: u8 = 0x08;
    /// The content was validated when written.
    pub const VALIDATED: u8 = 0x10;

    const DEFINED: u8 = 0x1F;

    /// Parses a flag byte, rejecting undefined bits.
    pub fn from_bits(bits: u8) -> Result<Flags, DecodeError> {
        if bits & !Self::DEFINED != 0 {
            return Err(DecodeError::ReservedBitsSet { context: "header flags" });
        }
        Ok(Flags(bits))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, flag: u8) -> bool {
        self.0 & flag == flag
    }

    /// Sets or clears `flag`; undefined bits are ignored.
    pub fn set(&mut self, flag: u8, on: bool) {
        let flag = flag & Self::DEFINED;
        if on {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    /// Returns a copy with `flag` set to `on`.
    pub fn with(mut self, flag: u8, on: bool) -> Flags {
        self.set(flag, on);
        self
    }

    pub fn byte_order(self) -> ByteOrder {
        if self.contains(Self::LITTLE_ENDIAN) {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        }
    }

    pub fn char_little_endian(self) -> bool {
        self.contains(Self::CHAR_LITTLE_ENDIAN)
    }

    pub fn has_random_access(self) -> bool {
        self.contains(Self::RANDOM_ACCESS)
    }

    pub fn strict_strings(self) -> bool {
        self.contains(Self::STRICT_STRINGS)
    }

    pub fn validated(self) -> bool {
        self.contains(Self::VALIDATED)
    }
}

/// Compression applied to everything after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Compression {
    #[default]
    None = 0,
    Gzip = 1,
}

impl Compression {
    pub fn from_u8(code: u8) -> Option<Compression> {
        match code {
            0 => Some(Compression::None),
            1 => Some(Compression::Gzip),
            _ => None,
        }
    }
}

/// Parsed or to-be-written stream header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: Version,
    pub flags: Flags,
    pub compression: Compression,
    pub charset: Charset,
}

impl Header {
    /// Builds the header a writer with `options` emits.
    pub fn from_options(options: &EncodingOptions) -> Header {
        let flags = Flags::default()
            .with(
                Flags::LITTLE_ENDIAN,
                options.byte_order == ByteOrder::LittleEndian,
            )
            .with(Flags::CHAR_LITTLE_ENDIAN, options.charset.char_little_endian())
            .with(
                Flags::RANDOM_ACCESS,
                options.wants_random_access() && !options.compressed,
            )
            .with(Flags::STRICT_STRINGS, options.strict_strings)
            .with(Flags::VALIDATED, options.validated);
        Header {
            version: Version::CURRENT,
            flags,
            compression: if options.compressed {
                Compression::Gzip
            } else {
                Compression::None
            },
            charset: options.charset,
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.flags.byte_order()
    }

    // =========================================================================
    // DECODING
    // =========================================================================

    /// Reads a header and configures `reader` for the body that follows.
    ///
    /// Does not switch the reader to gzip; callers do that after deciding
    /// whether to locate the trailer first.
    pub fn read(reader: &mut ByteReader) -> Result<Header> {
        let id = reader.take(IDENTIFIER_LEN, "header")?;
        if id[0] != NON_TEXT_MARKER
            || &id[1..1 + FORMAT_NAME.len()] != FORMAT_NAME
            || &id[1 + FORMAT_NAME.len()..] != BINARY_CHECK
        {
            return Err(DecodeError::InvalidMagic { found: id.to_vec() }.into());
        }

        let version = Version {
            major: reader.read_u8("version")?,
            minor: reader.read_u8("version")?,
            point: reader.read_u8("version")?,
        };
        if !version.is_supported() {
            return Err(DecodeError::UnsupportedVersion {
                major: version.major,
                minor: version.minor,
                point: version.point,
            }
            .into());
        }

        let flags = Flags::from_bits(reader.read_u8("header flags")?)?;
        if reader.read_u8("header flags")? != 0 {
            return Err(DecodeError::ReservedBitsSet {
                context: "second header flag byte",
            }
            .into());
        }
        reader.set_byte_order(flags.byte_order());

        let code = reader.read_u8("compression")?;
        let compression =
            Compression::from_u8(code).ok_or(DecodeError::InvalidCompression { code })?;

        let len = reader.read_len("charset", MAX_CHARSET_LEN)?;
        let name = reader.take(len, "charset")?;
        if !name.is_ascii() {
            return Err(DecodeError::InvalidText {
                charset: "US-ASCII",
                field: "charset",
            }
            .into());
        }
        let name = String::from_utf8_lossy(name).into_owned();
        let charset = Charset::from_name(&name, flags.char_little_endian())?;
        reader.set_charset(charset);
        reader.set_strict_strings(flags.strict_strings());

        Ok(Header {
            version,
            flags,
            compression,
            charset,
        })
    }

    // =========================================================================
    // ENCODING
    // =========================================================================

    /// Writes the header and configures `writer` for the body that follows.
    pub fn write<W: Write>(&self, writer: &mut ByteWriter<W>) -> Result<()> {
        writer.set_byte_order(self.byte_order());
        writer.write_u8(NON_TEXT_MARKER)?;
        writer.put(FORMAT_NAME)?;
        writer.put(BINARY_CHECK)?;
        writer.put(&[self.version.major, self.version.minor, self.version.point])?;
        writer.put(&[self.flags.bits(), 0, self.compression as u8])?;
        let name = self.charset.name();
        writer.write_count(name.len() as u64)?;
        writer.put(name.as_bytes())?;
        writer.set_charset(self.charset);
        writer.set_strict_strings(self.flags.strict_strings());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::io::Source;

    fn encode(header: &Header) -> Vec<u8> {
        let mut writer = ByteWriter::new(Vec::new(), ByteOrder::BigEndian);
        header.write(&mut writer).unwrap();
        writer.into_inner().unwrap()
    }

    fn decode(bytes: Vec<u8>) -> Result<Header> {
        let mut reader = ByteReader::open(Source::from_bytes(bytes), ByteOrder::BigEndian)?;
        Header::read(&mut reader)
    }

    #[test]
    fn test_default_header_bytes() {
        let header = Header::from_options(&EncodingOptions::default());
        let bytes = encode(&header);
        assert_eq!(
            &bytes[..14],
            &[0x01, b'B', b'X', b'M', b'L', 0x00, 0xFF, 0x0D, 0x0A, 0, 0, 8, 0x00, 0x00]
        );
        assert_eq!(bytes[14], 0);
        assert_eq!(&bytes[15..], b"\x05UTF-8");
        assert_eq!(decode(bytes).unwrap(), header);
    }

    #[test]
    fn test_flags_roundtrip() {
        let options = EncodingOptions::default()
            .with_byte_order(ByteOrder::LittleEndian)
            .with_charset(Charset::Utf16 { little_endian: true })
            .with_strict_strings(true)
            .with_validated(true)
            .with_compressed(true);
        let header = Header::from_options(&options);
        assert_eq!(header.flags.bits(), 0x1B);
        assert_eq!(header.compression, Compression::Gzip);
        assert_eq!(decode(encode(&header)).unwrap(), header);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = encode(&Header::from_options(&EncodingOptions::default()));
        bytes[2] = b'Y';
        assert!(matches!(
            decode(bytes),
            Err(Error::Decode(DecodeError::InvalidMagic { .. }))
        ));
    }

    #[test]
    fn test_text_mode_mangling_detected() {
        let mut bytes = encode(&Header::from_options(&EncodingOptions::default()));
        // CRLF -> LF translation drops the 0x0D.
        bytes.remove(7);
        assert!(decode(bytes).is_err());
    }

    #[test]
    fn test_version_window() {
        let mut bytes = encode(&Header::from_options(&EncodingOptions::default()));
        bytes[11] = 3;
        assert_eq!(decode(bytes.clone()).unwrap().version.point, 3);
        bytes[11] = 9;
        assert!(matches!(
            decode(bytes.clone()),
            Err(Error::Decode(DecodeError::UnsupportedVersion { point: 9, .. }))
        ));
        bytes[11] = 8;
        bytes[9] = 1;
        assert!(decode(bytes).is_err());
    }

    #[test]
    fn test_reserved_bits() {
        let mut bytes = encode(&Header::from_options(&EncodingOptions::default()));
        bytes[12] = 0x20;
        assert!(matches!(
            decode(bytes.clone()),
            Err(Error::Decode(DecodeError::ReservedBitsSet { .. }))
        ));
        bytes[12] = 0;
        bytes[13] = 1;
        assert!(matches!(
            decode(bytes),
            Err(Error::Decode(DecodeError::ReservedBitsSet { .. }))
        ));
    }

    #[test]
    fn test_invalid_compression() {
        let mut bytes = encode(&Header::from_options(&EncodingOptions::default()));
        bytes[14] = 2;
        assert!(matches!(
            decode(bytes),
            Err(Error::Decode(DecodeError::InvalidCompression { code: 2 }))
        ));
    }

    #[test]
    fn test_truncated_header() {
        let bytes = encode(&Header::from_options(&EncodingOptions::default()));
        assert!(matches!(
            decode(bytes[..10].to_vec()),
            Err(Error::Decode(DecodeError::UnexpectedEof { .. }))
        ));
    }

    #[test]
    fn test_flag_accessors() {
        let mut flags = Flags::default();
        flags.set(Flags::RANDOM_ACCESS, true);
        flags.set(0x80, true);
        assert_eq!(flags.bits(), Flags::RANDOM_ACCESS);
        assert!(flags.has_random_access());
        flags.set(Flags::RANDOM_ACCESS, false);
        assert_eq!(flags.bits(), 0);
    }
}
