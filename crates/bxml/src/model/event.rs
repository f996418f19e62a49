//! Consumer-facing events and names.

use std::fmt;

use crate::codec::ValueType;

/// The kind of the current reader event, or the last event a writer emitted.
///
/// Declaration order matters: [`is_value`](EventType::is_value) is the range
/// `ValueBool..=Space`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum EventType {
    #[default]
    None,
    StartDocument,
    EndDocument,
    StartElement,
    EndElement,
    ValueBool,
    ValueByte,
    ValueInt,
    ValueLong,
    ValueFloat,
    ValueDouble,
    ValueString,
    CData,
    Space,
    Comment,
    Attribute,
    AttributesEnd,
    NamespaceDecl,
}

impl EventType {
    /// True for the value kinds, CDATA, and SPACE.
    pub fn is_value(self) -> bool {
        self >= EventType::ValueBool && self <= EventType::Space
    }

    pub fn is_tag(self) -> bool {
        matches!(self, EventType::StartElement | EventType::EndElement)
    }

    /// Event reported for a value of the given wire type.
    ///
    /// Short, UShort, and SmallNum all surface as `ValueInt`.
    pub fn for_value_type(value_type: ValueType) -> EventType {
        match value_type {
            ValueType::Bool => EventType::ValueBool,
            ValueType::Byte => EventType::ValueByte,
            ValueType::SmallNum | ValueType::Short | ValueType::UShort | ValueType::Int => {
                EventType::ValueInt
            }
            ValueType::Long => EventType::ValueLong,
            ValueType::Float => EventType::ValueFloat,
            ValueType::Double => EventType::ValueDouble,
            ValueType::String | ValueType::Array => EventType::ValueString,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EventType::None => "NONE",
            EventType::StartDocument => "START_DOCUMENT",
            EventType::EndDocument => "END_DOCUMENT",
            EventType::StartElement => "START_ELEMENT",
            EventType::EndElement => "END_ELEMENT",
            EventType::ValueBool => "VALUE_BOOL",
            EventType::ValueByte => "VALUE_BYTE",
            EventType::ValueInt => "VALUE_INT",
            EventType::ValueLong => "VALUE_LONG",
            EventType::ValueFloat => "VALUE_FLOAT",
            EventType::ValueDouble => "VALUE_DOUBLE",
            EventType::ValueString => "VALUE_STRING",
            EventType::CData => "CDATA",
            EventType::Space => "SPACE",
            EventType::Comment => "COMMENT",
            EventType::Attribute => "ATTRIBUTE",
            EventType::AttributesEnd => "ATTRIBUTES_END",
            EventType::NamespaceDecl => "NAMESPACE_DECL",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A qualified name. An empty `namespace_uri` means no namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QName {
    pub namespace_uri: String,
    pub local_name: String,
    pub prefix: String,
}

impl QName {
    /// A name in no namespace.
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            ..Self::default()
        }
    }

    pub fn new(namespace_uri: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace_uri: namespace_uri.into(),
            local_name: local_name.into(),
            prefix: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// `prefix:local`, or just the local name without a prefix.
    pub fn qualified(&self) -> String {
        if self.prefix.is_empty() {
            self.local_name.clone()
        } else {
            format!("{}:{}", self.prefix, self.local_name)
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.namespace_uri.is_empty() {
            write!(f, "{{{}}}", self.namespace_uri)?;
        }
        f.write_str(&self.local_name)
    }
}

/// An attribute of the current element, its value rendered as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// A prefix binding declared on an element. An empty prefix is the default
/// namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: String,
    pub uri: String,
}

/// Splits a raw `prefix:local` name.
pub fn split_qualified(raw: &str) -> (&str, &str) {
    match raw.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_classification() {
        assert!(EventType::ValueBool.is_value());
        assert!(EventType::CData.is_value());
        assert!(EventType::Space.is_value());
        assert!(!EventType::Comment.is_value());
        assert!(!EventType::StartElement.is_value());
        assert!(EventType::EndElement.is_tag());
        assert!(!EventType::Attribute.is_tag());
    }

    #[test]
    fn test_for_value_type() {
        assert_eq!(EventType::for_value_type(ValueType::UShort), EventType::ValueInt);
        assert_eq!(EventType::for_value_type(ValueType::SmallNum), EventType::ValueInt);
        assert_eq!(EventType::for_value_type(ValueType::Long), EventType::ValueLong);
    }

    #[test]
    fn test_qname() {
        let name = QName::new("urn:a", "item").with_prefix("a");
        assert_eq!(name.qualified(), "a:item");
        assert_eq!(name.to_string(), "{urn:a}item");
        assert_eq!(QName::local("root").qualified(), "root");
        assert_eq!(split_qualified("gml:pos"), ("gml", "pos"));
        assert_eq!(split_qualified("pos"), ("", "pos"));
    }
}
