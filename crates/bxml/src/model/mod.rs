//! Data model types for BXML.
//!
//! - Header and trailer (the fixed edges of every stream)
//! - String tables (reader and writer side)
//! - Events, names, and attributes (what consumers see)
//! - Encoding and reader options
//! - Namespace scopes

pub mod event;
pub mod header;
pub mod namespace;
pub mod options;
pub mod string_table;
pub mod trailer;

pub use event::{split_qualified, Attribute, EventType, NamespaceDecl, QName};
pub use header::{Compression, Flags, Header, Version};
pub use namespace::NamespaceScope;
pub use options::{path_matches, EncodingOptions, ReaderOptions, Standalone};
pub use string_table::{FragmentInfo, StringTable, WriterStringTable};
pub use trailer::{IndexTableIndexEntry, StringTableIndexEntry, Trailer};
