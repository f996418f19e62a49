//! Per-stream string tables.
//!
//! Both tables are append-only. Indices are assigned sequentially, and a
//! `StringTable` token on the wire is a batch insert of consecutive entries.
//! An index must be defined by an earlier fragment before it is referenced.

use std::io::Write;

use rustc_hash::FxHashMap;

use crate::codec::TokenType;
use crate::error::{DecodeError, EncodeError, Result};
use crate::io::{ByteReader, ByteWriter};
use crate::limits::{MAX_STRING_TABLE_FRAGMENT, MAX_STRING_TABLE_SIZE};

// =============================================================================
// DECODING
// =============================================================================

/// String table assembled by a reader from the fragments it has seen.
#[derive(Debug, Default, Clone)]
pub struct StringTable {
    entries: Vec<String>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends `value`, returning its index.
    pub fn add(&mut self, value: String) -> usize {
        self.entries.push(value);
        self.entries.len() - 1
    }

    /// Looks up a previously defined entry.
    pub fn resolve(&self, index: u64) -> Result<&str, DecodeError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.entries.get(i))
            .map(String::as_str)
            .ok_or(DecodeError::StringIndexOutOfBounds {
                index,
                size: self.entries.len(),
            })
    }

    /// Reads the payload of a `StringTable` token (the token byte already
    /// consumed), appending its entries. Returns the number of entries read.
    pub fn read_fragment(&mut self, reader: &mut ByteReader) -> Result<usize> {
        let count = reader.read_len("string table fragment", MAX_STRING_TABLE_FRAGMENT)?;
        let total = self.entries.len() + count;
        if total > MAX_STRING_TABLE_SIZE {
            return Err(DecodeError::LengthExceedsLimit {
                field: "string table",
                len: total as u64,
                max: MAX_STRING_TABLE_SIZE,
            }
            .into());
        }
        self.entries.reserve(count);
        for _ in 0..count {
            let value = reader.read_string("string table entry")?;
            self.entries.push(value);
        }
        Ok(count)
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Offset and size of one fragment written to the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentInfo {
    pub offset: u64,
    pub count: u64,
}

/// String table built by a writer.
///
/// Interned strings are deduplicated. New entries stay pending until
/// [`write_pending`](Self::write_pending) emits them as a fragment, which the
/// writer does before the first token referencing them.
#[derive(Debug, Default)]
pub struct WriterStringTable {
    index: FxHashMap<String, usize>,
    entries: Vec<String>,
    /// First entry not yet written to the stream.
    written: usize,
}

impl WriterStringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the index of `value`, allocating one if new.
    pub fn intern(&mut self, value: &str) -> usize {
        if let Some(&idx) = self.index.get(value) {
            return idx;
        }
        let idx = self.entries.len();
        self.entries.push(value.to_string());
        self.index.insert(value.to_string(), idx);
        idx
    }

    /// Index of `value`, if interned.
    pub fn get(&self, value: &str) -> Option<usize> {
        self.index.get(value).copied()
    }

    /// Checks that `index` has been allocated.
    pub fn check_defined(&self, index: usize) -> Result<(), EncodeError> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(EncodeError::UndefinedStringReference {
                index,
                size: self.entries.len(),
            })
        }
    }

    pub fn has_pending(&self) -> bool {
        self.written < self.entries.len()
    }

    /// Writes all pending entries as one `StringTable` token.
    pub fn write_pending<W: Write>(
        &mut self,
        writer: &mut ByteWriter<W>,
    ) -> Result<Option<FragmentInfo>> {
        if !self.has_pending() {
            return Ok(None);
        }
        let offset = writer.position();
        let pending = &self.entries[self.written..];
        writer.write_token_type(TokenType::StringTable)?;
        writer.write_count(pending.len() as u64)?;
        for value in pending {
            writer.write_string(value)?;
        }
        let count = pending.len() as u64;
        log::trace!(
            "[bxml::writer] string table fragment at {} with {} entries",
            offset,
            count
        );
        self.written = self.entries.len();
        Ok(Some(FragmentInfo { offset, count }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::io::{ByteOrder, Source};

    #[test]
    fn test_resolve_forward_reference_fails() {
        let mut table = StringTable::new();
        assert_eq!(table.add("a".into()), 0);
        assert_eq!(table.resolve(0).unwrap(), "a");
        assert!(matches!(
            table.resolve(1),
            Err(DecodeError::StringIndexOutOfBounds { index: 1, size: 1 })
        ));
    }

    #[test]
    fn test_intern_dedups() {
        let mut table = WriterStringTable::new();
        assert_eq!(table.intern("crs"), 0);
        assert_eq!(table.intern("x"), 1);
        assert_eq!(table.intern("crs"), 0);
        assert_eq!(table.len(), 2);
        assert!(table.check_defined(1).is_ok());
        assert!(table.check_defined(2).is_err());
    }

    #[test]
    fn test_fragments_roundtrip() {
        let mut writer = ByteWriter::new(Vec::new(), ByteOrder::BigEndian);
        let mut table = WriterStringTable::new();
        table.intern("root");
        table.intern("item");
        let first = table.write_pending(&mut writer).unwrap().unwrap();
        assert_eq!(first, FragmentInfo { offset: 0, count: 2 });
        assert!(table.write_pending(&mut writer).unwrap().is_none());
        table.intern("root");
        table.intern("tail");
        let second = table.write_pending(&mut writer).unwrap().unwrap();
        assert_eq!(second.count, 1);
        let bytes = writer.into_inner().unwrap();

        let mut reader = ByteReader::open(Source::from_bytes(bytes), ByteOrder::BigEndian).unwrap();
        let mut decoded = StringTable::new();
        for expected in [2, 1] {
            assert_eq!(reader.read_token_type().unwrap(), TokenType::StringTable);
            assert_eq!(decoded.read_fragment(&mut reader).unwrap(), expected);
        }
        assert_eq!(decoded.resolve(2).unwrap(), "tail");
    }

    #[test]
    fn test_fragment_limit() {
        let mut bytes = vec![0xF4];
        bytes.extend_from_slice(&(MAX_STRING_TABLE_FRAGMENT as i32 + 1).to_be_bytes());
        let mut reader = ByteReader::open(Source::from_bytes(bytes), ByteOrder::BigEndian).unwrap();
        assert!(matches!(
            StringTable::new().read_fragment(&mut reader),
            Err(Error::Decode(DecodeError::LengthExceedsLimit { .. }))
        ));
    }
}
