//! Byte sources a reader can be opened on.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Where a [`ByteReader`](super::ByteReader) takes its bytes from.
pub enum Source {
    /// Forward-only stream (socket, pipe, decompressor, plain file handle).
    Stream(Box<dyn Read + Send>),
    /// Bytes already in memory; supports random access.
    Memory(Vec<u8>),
    /// A file read through re-mappable memory windows; supports random access.
    Mapped(File),
}

impl Source {
    /// Wraps any reader as a forward-only stream.
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Source::Stream(Box::new(reader))
    }

    /// Uses an in-memory buffer.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Source::Memory(bytes.into())
    }

    /// Memory-maps an open file.
    pub fn mapped(file: File) -> Self {
        Source::Mapped(file)
    }

    /// Opens and memory-maps the file at `path`.
    pub fn open_mapped(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Source::Mapped(File::open(path)?))
    }

    /// Whether readers over this source can reposition.
    pub fn supports_random_access(&self) -> bool {
        !matches!(self, Source::Stream(_))
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Stream(_) => f.write_str("Source::Stream"),
            Source::Memory(bytes) => write!(f, "Source::Memory({} bytes)", bytes.len()),
            Source::Mapped(file) => f.debug_tuple("Source::Mapped").field(file).finish(),
        }
    }
}
