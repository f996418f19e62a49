//! Stream trailer and its random-access indices.
//!
//! The trailer is the last token of a stream. Its final four bytes hold the
//! trailer's own length, so a reader with random access finds it by reading
//! the end of the file and stepping back.

use std::io::Write;

use crate::codec::TokenType;
use crate::error::{DecodeError, Result};
use crate::io::{ByteReader, ByteWriter};
use crate::limits::{MAX_INDEX_ENTRIES, MAX_STRING_LEN, TRAILER_ID};

/// Token byte, id, two empty index flags, and the length field.
const MIN_TRAILER_LEN: u64 = 1 + TRAILER_ID.len() as u64 + 2 + 4;

/// Location of one string-table fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTableIndexEntry {
    pub offset: u64,
    pub count: u64,
}

/// Location of one index table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTableIndexEntry {
    pub path: String,
    pub offset: u64,
}

/// Final token of a stream.
///
/// `None` for an index means the stream offers no random access for it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Trailer {
    /// Offset of the trailer token.
    pub position: u64,
    pub string_tables: Option<Vec<StringTableIndexEntry>>,
    pub index_tables: Option<Vec<IndexTableIndexEntry>>,
}

fn read_offset(reader: &mut ByteReader, context: &'static str) -> Result<u64> {
    let value = reader.read_i64(context)?;
    u64::try_from(value).map_err(|_| DecodeError::NegativeCount { value }.into())
}

impl Trailer {
    // =========================================================================
    // DECODING
    // =========================================================================

    /// Reads the trailer body; the token byte at `position` is already consumed.
    pub fn read_body(reader: &mut ByteReader, position: u64) -> Result<Trailer> {
        let id = reader.take(TRAILER_ID.len(), "trailer id")?;
        if id != TRAILER_ID {
            return Err(DecodeError::InvalidTrailerId { found: id.to_vec() }.into());
        }

        let string_tables = if reader.read_bool("string table index")? {
            let n = reader.read_len("string table index", MAX_INDEX_ENTRIES)?;
            let mut entries = Vec::with_capacity(n);
            for _ in 0..n {
                entries.push(StringTableIndexEntry {
                    offset: read_offset(reader, "string table offset")?,
                    count: reader.read_count("string table count")?,
                });
            }
            Some(entries)
        } else {
            None
        };

        let index_tables = if reader.read_bool("index table index")? {
            let n = reader.read_len("index table index", MAX_INDEX_ENTRIES)?;
            let mut entries = Vec::with_capacity(n);
            for _ in 0..n {
                entries.push(IndexTableIndexEntry {
                    path: reader.read_string("index path")?,
                    offset: read_offset(reader, "index table offset")?,
                });
            }
            Some(entries)
        } else {
            None
        };

        let len = i64::from(reader.read_i32("trailer length")?);
        let expected = reader.position() - position;
        if len < 0 || len as u64 != expected {
            return Err(DecodeError::InvalidTrailerLength {
                len,
                size: expected,
            }
            .into());
        }

        Ok(Trailer {
            position,
            string_tables,
            index_tables,
        })
    }

    /// Locates and reads the trailer of a random-access stream, leaving the
    /// reader position unspecified.
    pub fn locate(reader: &mut ByteReader) -> Result<Trailer> {
        let size = reader.size().ok_or(crate::Error::Unsupported {
            operation: "locate trailer",
        })?;
        if size < MIN_TRAILER_LEN {
            return Err(DecodeError::UnexpectedEof { context: "trailer" }.into());
        }
        reader.set_position(size - 4)?;
        let len = i64::from(reader.read_i32("trailer length")?);
        if len < MIN_TRAILER_LEN as i64 || len as u64 > size {
            return Err(DecodeError::InvalidTrailerLength { len, size }.into());
        }
        let position = size - len as u64;
        reader.set_position(position)?;
        let token = reader.read_token_type()?;
        if token != TokenType::Trailer {
            return Err(DecodeError::UnexpectedToken {
                found: token.name(),
                context: "where the trailer length points",
            }
            .into());
        }
        let trailer = Self::read_body(reader, position)?;
        log::debug!(
            "[bxml::trailer] located at {} ({} string table fragments, {} index tables)",
            position,
            trailer.string_tables.as_ref().map_or(0, Vec::len),
            trailer.index_tables.as_ref().map_or(0, Vec::len)
        );
        Ok(trailer)
    }

    // =========================================================================
    // ENCODING
    // =========================================================================

    /// Writes the trailer at the writer's current position.
    pub fn write<W: Write>(&self, writer: &mut ByteWriter<W>) -> Result<()> {
        let start = writer.position();
        writer.write_token_type(TokenType::Trailer)?;
        writer.put(TRAILER_ID)?;

        match &self.string_tables {
            Some(entries) => {
                writer.write_bool(true)?;
                writer.write_count(entries.len() as u64)?;
                for entry in entries {
                    writer.write_i64(entry.offset as i64)?;
                    writer.write_count(entry.count)?;
                }
            }
            None => writer.write_bool(false)?,
        }

        match &self.index_tables {
            Some(entries) => {
                writer.write_bool(true)?;
                writer.write_count(entries.len() as u64)?;
                for entry in entries {
                    if entry.path.len() > MAX_STRING_LEN {
                        return Err(crate::EncodeError::LengthExceedsLimit {
                            field: "index path",
                            len: entry.path.len(),
                            max: MAX_STRING_LEN,
                        }
                        .into());
                    }
                    writer.write_string(&entry.path)?;
                    writer.write_i64(entry.offset as i64)?;
                }
            }
            None => writer.write_bool(false)?,
        }

        let len = writer.position() + 4 - start;
        writer.write_i32(len as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::io::{ByteOrder, Source};

    fn sample() -> Trailer {
        Trailer {
            position: 3,
            string_tables: Some(vec![
                StringTableIndexEntry { offset: 20, count: 4 },
                StringTableIndexEntry { offset: 90, count: 300 },
            ]),
            index_tables: Some(vec![IndexTableIndexEntry {
                path: "/root/item".into(),
                offset: 120,
            }]),
        }
    }

    fn with_prefix(trailer: &Trailer, order: ByteOrder) -> Vec<u8> {
        let mut writer = ByteWriter::new(Vec::new(), order);
        writer.put(&[0xAA, 0xBB, 0xCC]).unwrap();
        trailer.write(&mut writer).unwrap();
        writer.into_inner().unwrap()
    }

    #[test]
    fn test_locate_from_end() {
        for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
            let bytes = with_prefix(&sample(), order);
            let mut reader = ByteReader::open(Source::from_bytes(bytes), order).unwrap();
            assert_eq!(Trailer::locate(&mut reader).unwrap(), sample());
        }
    }

    #[test]
    fn test_empty_indices() {
        let trailer = Trailer {
            position: 3,
            ..Trailer::default()
        };
        let bytes = with_prefix(&trailer, ByteOrder::BigEndian);
        assert_eq!(bytes.len() as u64, 3 + MIN_TRAILER_LEN);
        let mut reader = ByteReader::open(Source::from_bytes(bytes), ByteOrder::BigEndian).unwrap();
        assert_eq!(Trailer::locate(&mut reader).unwrap(), trailer);
    }

    #[test]
    fn test_bad_trailer_id() {
        let mut bytes = with_prefix(&sample(), ByteOrder::BigEndian);
        bytes[5] = b'X';
        let mut reader = ByteReader::open(Source::from_bytes(bytes), ByteOrder::BigEndian).unwrap();
        assert!(matches!(
            Trailer::locate(&mut reader),
            Err(Error::Decode(DecodeError::InvalidTrailerId { .. }))
        ));
    }

    #[test]
    fn test_bad_length() {
        let mut bytes = with_prefix(&sample(), ByteOrder::BigEndian);
        let n = bytes.len();
        bytes[n - 4..].copy_from_slice(&1000i32.to_be_bytes());
        let mut reader = ByteReader::open(Source::from_bytes(bytes), ByteOrder::BigEndian).unwrap();
        assert!(matches!(
            Trailer::locate(&mut reader),
            Err(Error::Decode(DecodeError::InvalidTrailerLength { len: 1000, .. }))
        ));
    }

    #[test]
    fn test_stream_cannot_locate() {
        let bytes = with_prefix(&sample(), ByteOrder::BigEndian);
        let source = Source::from_reader(std::io::Cursor::new(bytes));
        let mut reader = ByteReader::open(source, ByteOrder::BigEndian).unwrap();
        assert!(matches!(
            Trailer::locate(&mut reader),
            Err(Error::Unsupported { .. })
        ));
    }
}
