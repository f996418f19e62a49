//! Format constants and decoder safety limits.
//!
//! The decoder reads untrusted input, so every length taken from the wire is
//! checked against one of these bounds before anything is allocated.

/// Non-text marker that opens every BXML stream.
pub const NON_TEXT_MARKER: u8 = 0x01;

/// Format name following the non-text marker.
pub const FORMAT_NAME: &[u8; 5] = b"BXML\0";

/// Bytes that detect text-mode (CR/LF) mangling of the file.
pub const BINARY_CHECK: &[u8; 3] = &[0xFF, 0x0D, 0x0A];

/// Format version written by this crate (major, minor, point).
pub const FORMAT_VERSION: (u8, u8, u8) = (0, 0, 8);

/// Oldest point release the reader accepts for the current major/minor.
pub const MIN_POINT_VERSION: u8 = 0;

/// Identifier following the trailer token code.
pub const TRAILER_ID: &[u8; 4] = &[0x01, b'T', b'R', 0x00];

/// Maximum length in bytes of a single string on the wire (64 MB).
pub const MAX_STRING_LEN: usize = 64 * 1024 * 1024;

/// Maximum number of entries in one string-table fragment.
pub const MAX_STRING_TABLE_FRAGMENT: usize = 1_000_000;

/// Maximum number of entries in the whole string table.
pub const MAX_STRING_TABLE_SIZE: usize = 16_000_000;

/// Maximum element count of a single array value.
pub const MAX_ARRAY_LEN: usize = 256 * 1024 * 1024;

/// Maximum length of the charset name in the header.
pub const MAX_CHARSET_LEN: usize = 64;

/// Maximum number of entries in a trailer index.
pub const MAX_INDEX_ENTRIES: usize = 1_000_000;

/// Default capacity of the scratch buffers used for buffered I/O.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Size of the window mapped at a time for memory-mapped sources.
pub const MAP_WINDOW_SIZE: usize = 4 * 1024 * 1024;
