//! BXML: streaming reader and writer for the binary XML interchange format.
//!
//! This crate translates between a compact BXML token stream and a sequence
//! of parse events, without ever building a document tree.
//!
//! # Overview
//!
//! - **Pull reader**: [`BxmlReader`] is an event cursor with typed value
//!   access, bulk array reads, namespace resolution, and random access on
//!   seekable media
//! - **Writer**: [`BxmlWriter`] mirrors the reader and rejects calls that
//!   cannot follow the last event written
//! - **Contracts**: [`CheckedReader`] and [`CheckedWriter`] re-check every
//!   call against the event protocol (the `contracts` feature)
//!
//! # Quick Start
//!
//! ```rust
//! use bxml::{BxmlFactory, BxmlReader, BxmlWriter, EventType, Source, ValueType};
//!
//! let factory = BxmlFactory::new();
//!
//! let mut writer = factory.create_writer(Vec::new()).unwrap();
//! writer.write_start_document().unwrap();
//! writer.write_start_element("", "pos").unwrap();
//! writer.start_array(ValueType::Int, 3).unwrap();
//! writer.write_values_int(&[1, 2, 3]).unwrap();
//! writer.end_array().unwrap();
//! writer.write_end_document().unwrap();
//! let bytes = writer.into_inner().into_inner().unwrap();
//!
//! let mut reader = factory.create_reader(Source::from_bytes(bytes)).unwrap();
//! assert_eq!(reader.next().unwrap(), EventType::StartElement);
//! assert_eq!(reader.next().unwrap(), EventType::ValueInt);
//! assert_eq!(reader.value_count().unwrap(), 3);
//! assert_eq!(reader.get_string_value().unwrap(), "1 2 3");
//! ```
//!
//! # Modules
//!
//! - [`io`]: Buffered byte I/O over streams, memory, and mapped files
//! - [`codec`]: Tokens, counts, typed values, and character sets
//! - [`model`]: Header, trailer, string tables, events, and options
//! - [`reader`] / [`writer`]: The two event state machines
//! - [`contract`]: Protocol-checking wrappers
//! - [`factory`]: Reader and writer construction
//! - [`error`]: Error types
//! - [`limits`]: Format constants and decoder safety limits
//!
//! # Security
//!
//! Every length read from the wire is checked against [`limits`] before
//! anything is allocated, and truncated input fails with an end-of-input
//! error rather than a short result.

pub mod codec;
pub mod contract;
pub mod error;
pub mod factory;
pub mod io;
pub mod limits;
pub mod model;
pub mod reader;
pub mod writer;

// Re-export commonly used types at crate root
pub use codec::{Charset, TokenType, ValueType};
pub use contract::{CheckedReader, CheckedWriter};
pub use error::{
    ContractViolation, DecodeError, EncodeError, Error, ErrorCategory, ErrorCode, Phase, Result,
};
pub use factory::{BxmlFactory, StreamFactory};
pub use io::{ByteOrder, Source};
pub use model::{
    Attribute, Compression, EncodingOptions, EventType, Flags, Header, NamespaceDecl, QName,
    ReaderOptions, Standalone, Trailer, Version,
};
pub use reader::{BxmlReader, NamespaceAware, NamespaceStrategy, NamespaceUnaware, StreamReader};
pub use writer::{BxmlWriter, StreamWriter};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// BXML format version this crate writes.
pub const FORMAT_VERSION: &str = "0.0.8";
