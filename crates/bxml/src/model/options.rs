//! Writer and reader configuration.

use crate::codec::Charset;
use crate::io::ByteOrder;

/// The `standalone` pseudo-attribute of the XML declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Standalone {
    #[default]
    Unspecified = 0,
    Yes = 1,
    No = 2,
}

impl Standalone {
    pub fn from_u8(code: u8) -> Option<Standalone> {
        match code {
            0 => Some(Standalone::Unspecified),
            1 => Some(Standalone::Yes),
            2 => Some(Standalone::No),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Options for encoding a document.
///
/// A plain value: writers take their own copy, so changing an options value
/// after a writer was created has no effect on that writer.
///
/// The index hints (`string_table_index`, `index_paths`) are advisory. They
/// are honoured for uncompressed output and ignored otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingOptions {
    pub byte_order: ByteOrder,
    pub charset: Charset,
    /// Gzip everything after the header.
    pub compressed: bool,
    /// Reject strings containing characters that are illegal in XML 1.0.
    pub strict_strings: bool,
    /// Mark the content as schema-validated.
    pub validated: bool,
    pub xml_version: String,
    pub standalone: Standalone,
    /// Record string-table fragment offsets in the trailer.
    pub string_table_index: bool,
    /// Element paths whose start offsets are recorded in index tables.
    ///
    /// A path is `/`-separated local names from the root (`/root/item`).
    /// A leading `//` matches the remaining path at any depth.
    pub index_paths: Vec<String>,
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::BigEndian,
            charset: Charset::Utf8,
            compressed: false,
            strict_strings: false,
            validated: false,
            xml_version: "1.0".to_string(),
            standalone: Standalone::Unspecified,
            string_table_index: false,
            index_paths: Vec::new(),
        }
    }
}

impl EncodingOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    pub fn with_compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    pub fn with_strict_strings(mut self, strict: bool) -> Self {
        self.strict_strings = strict;
        self
    }

    pub fn with_validated(mut self, validated: bool) -> Self {
        self.validated = validated;
        self
    }

    pub fn with_xml_version(mut self, version: impl Into<String>) -> Self {
        self.xml_version = version.into();
        self
    }

    pub fn with_standalone(mut self, standalone: Standalone) -> Self {
        self.standalone = standalone;
        self
    }

    pub fn with_string_table_index(mut self, enabled: bool) -> Self {
        self.string_table_index = enabled;
        self
    }

    /// Adds a path to index.
    pub fn with_index_path(mut self, path: impl Into<String>) -> Self {
        self.index_paths.push(path.into());
        self
    }

    /// Whether any random-access index was requested.
    pub fn wants_random_access(&self) -> bool {
        self.string_table_index || !self.index_paths.is_empty()
    }
}

/// Options for decoding a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Resolve prefixes to namespace URIs and hide `xmlns` attributes.
    pub namespace_aware: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            namespace_aware: true,
        }
    }
}

impl ReaderOptions {
    pub fn namespace_unaware() -> Self {
        Self {
            namespace_aware: false,
        }
    }
}

/// Returns true if the element path `stack` (root first) matches `pattern`.
pub fn path_matches(pattern: &str, stack: &[&str]) -> bool {
    if let Some(rest) = pattern.strip_prefix("//") {
        let tail: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        return !tail.is_empty() && stack.ends_with(&tail);
    }
    let steps = pattern.split('/').filter(|s| !s.is_empty());
    steps.eq(stack.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copies_are_independent() {
        let base = EncodingOptions::default().with_index_path("/a");
        let mut copy = base.clone();
        copy.index_paths.push("/b".into());
        copy.compressed = true;
        assert_eq!(base.index_paths, vec!["/a".to_string()]);
        assert!(!base.compressed);
    }

    #[test]
    fn test_path_matches() {
        assert!(path_matches("/root/item", &["root", "item"]));
        assert!(!path_matches("/root/item", &["root", "item", "x"]));
        assert!(!path_matches("/root", &["other"]));
        assert!(path_matches("//item", &["root", "list", "item"]));
        assert!(path_matches("//list/item", &["root", "list", "item"]));
        assert!(!path_matches("//item", &["root", "items"]));
        assert!(!path_matches("//", &["root"]));
    }

    #[test]
    fn test_standalone_codes() {
        for s in [Standalone::Unspecified, Standalone::Yes, Standalone::No] {
            assert_eq!(Standalone::from_u8(s.code()), Some(s));
        }
        assert_eq!(Standalone::from_u8(3), None);
    }
}
