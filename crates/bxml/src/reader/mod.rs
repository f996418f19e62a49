//! Pull reader: maps the token stream to a cursor of events.
//!
//! A [`StreamReader`] starts on [`EventType::StartDocument`]. Each call to
//! [`next`](BxmlReader::next) decodes tokens until one produces an event.
//! String-table fragments, processing instructions, blobs, declarations, and
//! index tables are consumed silently.
//!
//! Values are read lazily. A value event declares a count; typed getters
//! consume values one at a time or in bulk, and moving on skips whatever is
//! left by byte length.

pub mod namespace;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::codec::value::{append_values_text, read_array_element_type, skip_values};
use crate::codec::{TokenType, ValueType};
use crate::error::{DecodeError, Error, Result};
use crate::io::{ByteOrder, ByteReader, Source};
use crate::limits::{MAX_ARRAY_LEN, MAX_INDEX_ENTRIES};
use crate::model::{
    Attribute, Compression, EventType, Header, NamespaceDecl, QName, ReaderOptions, Standalone,
    StringTable, Trailer,
};

pub use namespace::{NamespaceAware, NamespaceStrategy, NamespaceUnaware};

/// Event cursor over a BXML stream.
///
/// After [`close`](Self::close), every fallible operation fails with
/// [`Error::Closed`], `has_next` and `supports_random_access` are false, and
/// lookups returning an `Option` or a list report nothing. The plain
/// accessors (`header`, `event_type`, `depth`, `values_read`, `standalone`,
/// `is_namespace_aware`) keep reporting the state at the time of closing.
pub trait BxmlReader {
    /// The stream header.
    fn header(&self) -> &Header;

    /// The current event.
    fn event_type(&self) -> EventType;

    /// Advances to the next event.
    fn next(&mut self) -> Result<EventType>;

    /// Advances to the next START_ELEMENT, END_ELEMENT, or END_DOCUMENT,
    /// discarding everything in between.
    fn next_tag(&mut self) -> Result<EventType>;

    /// Whether `next` may be called.
    fn has_next(&self) -> bool;

    /// From START_ELEMENT, advances to the matching END_ELEMENT.
    fn skip_element(&mut self) -> Result<()>;

    /// Number of open elements, counting the current START_ELEMENT.
    fn depth(&self) -> usize;

    /// Name of the current element (START_ELEMENT or END_ELEMENT).
    fn name(&self) -> Result<&QName>;

    fn attribute_count(&self) -> Result<usize>;

    fn attribute(&self, index: usize) -> Result<&Attribute>;

    /// Value of the attribute with the given name, if present.
    fn attribute_value(&self, namespace_uri: &str, local_name: &str) -> Result<Option<&str>>;

    /// Number of namespace declarations on the current START_ELEMENT.
    fn namespace_count(&self) -> Result<usize>;

    fn namespace_decl(&self, index: usize) -> Result<&NamespaceDecl>;

    /// URI bound to `prefix` in the current scope.
    fn namespace_uri_for(&self, prefix: &str) -> Option<&str>;

    fn is_namespace_aware(&self) -> bool;

    /// Values declared by the current value (or COMMENT) event.
    fn value_count(&self) -> Result<usize>;

    /// Values of the current event consumed so far.
    fn values_read(&self) -> usize;

    fn get_bool_value(&mut self) -> Result<bool>;
    fn get_byte_value(&mut self) -> Result<i8>;
    /// Accepts byte and int events.
    fn get_int_value(&mut self) -> Result<i32>;
    /// Accepts byte, int, and long events.
    fn get_long_value(&mut self) -> Result<i64>;
    fn get_float_value(&mut self) -> Result<f32>;
    /// Accepts float and double events.
    fn get_double_value(&mut self) -> Result<f64>;

    /// Renders every remaining value of the event as text and consumes it.
    /// Arrays are space separated.
    fn get_string_value(&mut self) -> Result<String>;

    fn get_bool_values(&mut self, dst: &mut [bool]) -> Result<()>;
    fn get_byte_values(&mut self, dst: &mut [i8]) -> Result<()>;
    fn get_int_values(&mut self, dst: &mut [i32]) -> Result<()>;
    fn get_long_values(&mut self, dst: &mut [i64]) -> Result<()>;
    fn get_float_values(&mut self, dst: &mut [f32]) -> Result<()>;
    fn get_double_values(&mut self, dst: &mut [f64]) -> Result<()>;

    /// XML version from the declaration, if the stream has one.
    fn xml_version(&self) -> Option<&str>;

    fn standalone(&self) -> Standalone;

    fn supports_random_access(&self) -> bool;

    /// Offset of the current START_ELEMENT token.
    fn element_position(&self) -> Result<u64>;

    /// Jumps to the element starting at `position`. The element is read as
    /// a root: ancestors are forgotten and END_DOCUMENT follows its end.
    fn set_position(&mut self, position: u64) -> Result<EventType>;

    /// Paths with recorded element offsets.
    fn indexed_paths(&self) -> Vec<&str>;

    /// Recorded element offsets for `path`.
    fn index_positions(&self, path: &str) -> Option<&[u64]>;

    fn is_open(&self) -> bool;

    /// Releases the source. Idempotent.
    fn close(&mut self) -> Result<()>;
}

/// Per-event value cursor.
#[derive(Debug, Clone, Default)]
struct ValueCursor {
    /// Wire type of each value; array element type for arrays.
    value_type: Option<ValueType>,
    count: usize,
    read: usize,
    /// Payload of a SmallNum value.
    small: u8,
    /// Text already decoded (string-table references).
    text: Option<String>,
}

impl ValueCursor {
    fn single(value_type: ValueType) -> Self {
        Self {
            value_type: Some(value_type),
            count: 1,
            ..Self::default()
        }
    }
}

/// [`BxmlReader`] over a [`Source`].
pub struct StreamReader {
    io: ByteReader,
    header: Header,
    strategy: Box<dyn NamespaceStrategy>,
    strings: StringTable,
    /// Offsets of string-table fragments already added to `strings`.
    loaded_fragments: FxHashSet<u64>,
    trailer: Option<Trailer>,
    index: FxHashMap<String, Vec<u64>>,
    event: EventType,
    stack: Vec<QName>,
    name: QName,
    attributes: Vec<Attribute>,
    namespaces: Vec<NamespaceDecl>,
    element_position: u64,
    pending_end: bool,
    /// Set after `set_position`: END_DOCUMENT follows the positioned element.
    detached: bool,
    cursor: ValueCursor,
    xml_version: Option<String>,
    standalone: Standalone,
    open: bool,
}

impl StreamReader {
    /// Opens a reader and decodes the header.
    pub fn open(source: Source, options: ReaderOptions) -> Result<Self> {
        let strategy: Box<dyn NamespaceStrategy> = if options.namespace_aware {
            Box::new(NamespaceAware::new())
        } else {
            Box::new(NamespaceUnaware)
        };
        let mut io = ByteReader::open(source, ByteOrder::BigEndian)?;
        let header = Header::read(&mut io)?;

        let mut reader = StreamReader {
            io,
            header,
            strategy,
            strings: StringTable::new(),
            loaded_fragments: FxHashSet::default(),
            trailer: None,
            index: FxHashMap::default(),
            event: EventType::StartDocument,
            stack: Vec::new(),
            name: QName::default(),
            attributes: Vec::new(),
            namespaces: Vec::new(),
            element_position: 0,
            pending_end: false,
            detached: false,
            cursor: ValueCursor::default(),
            xml_version: None,
            standalone: Standalone::Unspecified,
            open: true,
        };

        if reader.header.compression == Compression::Gzip {
            reader.io.switch_to_gzip()?;
        } else if reader.io.supports_random_access() && reader.header.flags.has_random_access() {
            let body = reader.io.position();
            reader.load_random_access()?;
            reader.io.set_position(body)?;
        }

        if reader.io.peek_u8("first token")? == TokenType::XmlDeclaration.code() {
            reader.io.read_token_type()?;
            reader.read_xml_declaration()?;
        }

        log::debug!(
            "[bxml::reader] opened: version {}, {}, {:?} byte order, compression {:?}, random access {}",
            reader.header.version,
            reader.header.charset.name(),
            reader.header.byte_order(),
            reader.header.compression,
            reader.trailer.is_some()
        );
        Ok(reader)
    }

    /// The trailer, if it was located for random access.
    pub fn trailer(&self) -> Option<&Trailer> {
        self.trailer.as_ref()
    }

    fn load_random_access(&mut self) -> Result<()> {
        let trailer = Trailer::locate(&mut self.io)?;

        if let Some(entries) = &trailer.string_tables {
            let mut offsets: Vec<u64> = entries.iter().map(|e| e.offset).collect();
            offsets.sort_unstable();
            for offset in offsets {
                self.io.set_position(offset)?;
                self.expect_token(TokenType::StringTable, "at a string table index offset")?;
                self.strings.read_fragment(&mut self.io)?;
                self.loaded_fragments.insert(offset);
            }
            log::debug!(
                "[bxml::reader] preloaded {} string table fragments ({} entries)",
                self.loaded_fragments.len(),
                self.strings.len()
            );
        }

        if let Some(entries) = &trailer.index_tables {
            for entry in entries {
                self.io.set_position(entry.offset)?;
                self.expect_token(TokenType::IndexTable, "at an index table offset")?;
                let path = self.io.read_string("index path")?;
                let n = self.io.read_len("index table", MAX_INDEX_ENTRIES)?;
                let mut positions = vec![0i64; n];
                self.io.read_i64_into(&mut positions, "index table offsets")?;
                let slot = self.index.entry(path).or_default();
                for position in positions {
                    let position = u64::try_from(position)
                        .map_err(|_| DecodeError::NegativeCount { value: position })?;
                    slot.push(position);
                }
            }
        }

        self.trailer = Some(trailer);
        Ok(())
    }

    fn expect_token(&mut self, expected: TokenType, context: &'static str) -> Result<()> {
        let token = self.io.read_token_type()?;
        if token != expected {
            return Err(DecodeError::UnexpectedToken {
                found: token.name(),
                context,
            }
            .into());
        }
        Ok(())
    }

    fn check_open(&self, operation: &'static str) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::Closed { operation })
        }
    }

    fn require_event(&self, operation: &'static str, accepted: &[EventType]) -> Result<()> {
        self.check_open(operation)?;
        if accepted.contains(&self.event) {
            Ok(())
        } else {
            Err(Error::illegal_state(
                operation,
                format!("current event is {}", self.event),
            ))
        }
    }

    fn require_start_element(&self, operation: &'static str) -> Result<()> {
        self.require_event(operation, &[EventType::StartElement])
    }

    // =========================================================================
    // TOKEN DECODING
    // =========================================================================

    fn read_name(&mut self) -> Result<String> {
        let index = self.io.read_count("name index")?;
        Ok(self.strings.resolve(index)?.to_string())
    }

    fn read_string_table(&mut self, position: u64) -> Result<()> {
        if self.loaded_fragments.contains(&position) {
            let n = self.io.read_count("string table fragment")?;
            for _ in 0..n {
                self.io.skip_string()?;
            }
        } else {
            self.strings.read_fragment(&mut self.io)?;
            self.loaded_fragments.insert(position);
        }
        Ok(())
    }

    fn read_xml_declaration(&mut self) -> Result<()> {
        let version = self.io.read_string("xml version")?;
        let code = self.io.read_u8("standalone")?;
        self.standalone = Standalone::from_u8(code).ok_or(DecodeError::InvalidValueType { code })?;
        self.xml_version = Some(version);
        Ok(())
    }

    /// Reads one `CharContent` value and appends its text to `out`.
    /// `started` tracks whether `out` already holds a value; an empty string
    /// still counts as one.
    fn append_value_text(&mut self, out: &mut String, started: &mut bool) -> Result<()> {
        let code = self.io.read_u8("value type")?;
        let value_type = ValueType::from_u8(code).ok_or(DecodeError::InvalidValueType { code })?;
        match value_type {
            ValueType::SmallNum => {
                if *started {
                    out.push(' ');
                }
                out.push_str(&code.to_string());
                *started = true;
            }
            ValueType::String => {
                let text = self.io.read_string("string value")?;
                if *started {
                    out.push(' ');
                }
                out.push_str(&text);
                *started = true;
            }
            ValueType::Array => {
                let element = read_array_element_type(&mut self.io)?;
                let n = self.io.read_len("array", MAX_ARRAY_LEN)?;
                append_values_text(&mut self.io, element, n, out, *started)?;
                *started |= n > 0;
            }
            fixed => {
                append_values_text(&mut self.io, fixed, 1, out, *started)?;
                *started = true;
            }
        }
        Ok(())
    }

    fn start_element(&mut self, token: TokenType, position: u64) -> Result<EventType> {
        let raw_name = self.read_name()?;
        let mut raw_attributes: Vec<(String, String)> = Vec::new();
        if token.has_attributes() {
            // Name, text so far, and whether any value was appended.
            let mut current: Option<(String, String, bool)> = None;
            loop {
                let at = self.io.position();
                match self.io.read_token_type()? {
                    TokenType::AttributeStart => {
                        raw_attributes.extend(current.take().map(|(name, value, _)| (name, value)));
                        current = Some((self.read_name()?, String::new(), false));
                    }
                    TokenType::CharContent => {
                        let (_, value, started) = current.as_mut().ok_or(DecodeError::UnexpectedToken {
                            found: "CharContent",
                            context: "before the first attribute",
                        })?;
                        self.append_value_text(value, started)?;
                    }
                    TokenType::CharContentRef => {
                        let index = self.io.read_count("string reference")?;
                        let resolved = self.strings.resolve(index)?;
                        let (_, value, started) = current.as_mut().ok_or(DecodeError::UnexpectedToken {
                            found: "CharContentRef",
                            context: "before the first attribute",
                        })?;
                        if *started {
                            value.push(' ');
                        }
                        value.push_str(resolved);
                        *started = true;
                    }
                    TokenType::StringTable => self.read_string_table(at)?,
                    TokenType::AttributeListEnd => {
                        raw_attributes.extend(current.take().map(|(name, value, _)| (name, value)));
                        break;
                    }
                    other => {
                        return Err(DecodeError::UnexpectedToken {
                            found: other.name(),
                            context: "in an attribute list",
                        }
                        .into());
                    }
                }
            }
        }

        self.attributes.clear();
        self.namespaces.clear();
        let name = self.strategy.start_element(
            &raw_name,
            raw_attributes,
            &mut self.attributes,
            &mut self.namespaces,
        )?;
        self.stack.push(name.clone());
        self.name = name;
        self.element_position = position;
        self.pending_end = !token.has_content();
        self.event = EventType::StartElement;
        Ok(self.event)
    }

    fn end_element(&mut self) -> Result<EventType> {
        let name = self.stack.pop().ok_or(DecodeError::UnexpectedToken {
            found: "ElementEnd",
            context: "with no open element",
        })?;
        self.strategy.end_element();
        self.attributes.clear();
        self.namespaces.clear();
        self.name = name;
        self.event = EventType::EndElement;
        Ok(self.event)
    }

    fn start_value(&mut self, event: EventType, cursor: ValueCursor) -> Result<EventType> {
        self.cursor = cursor;
        self.event = event;
        Ok(event)
    }

    fn read_char_content(&mut self) -> Result<EventType> {
        let code = self.io.read_u8("value type")?;
        let value_type = ValueType::from_u8(code).ok_or(DecodeError::InvalidValueType { code })?;
        let cursor = match value_type {
            ValueType::SmallNum => ValueCursor {
                small: code,
                ..ValueCursor::single(ValueType::SmallNum)
            },
            ValueType::Array => {
                let element = read_array_element_type(&mut self.io)?;
                let count = self.io.read_len("array", MAX_ARRAY_LEN)?;
                ValueCursor {
                    value_type: Some(element),
                    count,
                    ..ValueCursor::default()
                }
            }
            other => ValueCursor::single(other),
        };
        let element = cursor.value_type.unwrap_or(ValueType::SmallNum);
        self.start_value(EventType::for_value_type(element), cursor)
    }

    /// Skips whatever the current event left unread.
    fn finish_event(&mut self) -> Result<()> {
        let remaining = self.cursor.count - self.cursor.read;
        if remaining > 0 && self.cursor.text.is_none() {
            match self.cursor.value_type {
                Some(ValueType::SmallNum) | None => {}
                Some(ValueType::String) => {
                    for _ in 0..remaining {
                        self.io.skip_string()?;
                    }
                }
                Some(value_type) => skip_values(&mut self.io, value_type, remaining)?,
            }
        }
        self.cursor = ValueCursor::default();
        Ok(())
    }

    fn advance(&mut self) -> Result<EventType> {
        self.finish_event()?;
        if self.pending_end {
            self.pending_end = false;
            return self.end_element();
        }
        if self.detached && self.stack.is_empty() {
            self.event = EventType::EndDocument;
            return Ok(self.event);
        }
        loop {
            let position = self.io.position();
            let token = self.io.read_token_type()?;
            log::trace!("[bxml::reader] {} at {}", token.name(), position);
            match token {
                TokenType::EmptyElement
                | TokenType::EmptyAttrElement
                | TokenType::ContentElement
                | TokenType::ContentAttrElement => return self.start_element(token, position),
                TokenType::ElementEnd => return self.end_element(),
                TokenType::CharContent => return self.read_char_content(),
                TokenType::CharContentRef => {
                    let index = self.io.read_count("string reference")?;
                    let text = self.strings.resolve(index)?.to_string();
                    let cursor = ValueCursor {
                        text: Some(text),
                        ..ValueCursor::single(ValueType::String)
                    };
                    return self.start_value(EventType::ValueString, cursor);
                }
                TokenType::Whitespace => {
                    return self.start_value(EventType::Space, ValueCursor::single(ValueType::String));
                }
                TokenType::CDataSection => {
                    return self.start_value(EventType::CData, ValueCursor::single(ValueType::String));
                }
                TokenType::Comment => {
                    return self.start_value(EventType::Comment, ValueCursor::single(ValueType::String));
                }
                TokenType::ProcessingInstruction => {
                    self.io.skip_string()?;
                    self.io.skip_string()?;
                }
                TokenType::Blob => {
                    let len = self.io.read_count("blob length")?;
                    self.io.skip(len, "blob")?;
                }
                TokenType::BangDoctype
                | TokenType::BangElement
                | TokenType::BangAttlist
                | TokenType::BangEntity
                | TokenType::BangNotation => self.io.skip_string()?,
                TokenType::XmlDeclaration => self.read_xml_declaration()?,
                TokenType::StringTable => self.read_string_table(position)?,
                TokenType::IndexTable => {
                    self.io.skip_string()?;
                    let n = self.io.read_len("index table", MAX_INDEX_ENTRIES)?;
                    self.io.skip(n as u64 * 8, "index table offsets")?;
                }
                TokenType::Trailer => {
                    if !self.stack.is_empty() {
                        return Err(DecodeError::UnclosedElements {
                            open: self.stack.len(),
                        }
                        .into());
                    }
                    Trailer::read_body(&mut self.io, position)?;
                    self.event = EventType::EndDocument;
                    log::debug!("[bxml::reader] end of document at {}", self.io.position());
                    return Ok(self.event);
                }
                TokenType::AttributeStart | TokenType::AttributeListEnd => {
                    return Err(DecodeError::UnexpectedToken {
                        found: token.name(),
                        context: "outside an element start",
                    }
                    .into());
                }
            }
        }
    }

    // =========================================================================
    // VALUE ACCESS
    // =========================================================================

    /// Checks and consumes `n` values of the current event.
    fn take_values(
        &mut self,
        operation: &'static str,
        accepted: &[EventType],
        n: usize,
    ) -> Result<ValueType> {
        self.require_event(operation, accepted)?;
        let remaining = self.cursor.count - self.cursor.read;
        if n > remaining {
            return Err(Error::illegal_state(
                operation,
                format!("{n} values requested, {remaining} left"),
            ));
        }
        let value_type = self
            .cursor
            .value_type
            .ok_or_else(|| Error::illegal_state(operation, "no value"))?;
        self.cursor.read += n;
        Ok(value_type)
    }

    fn mismatch(operation: &'static str, value_type: ValueType) -> Error {
        Error::illegal_state(
            operation,
            format!("value of type {} cannot be read this way", value_type.name()),
        )
    }
}

fn widen_into<S, T>(dst: &mut [T], read: impl FnOnce(&mut [S]) -> Result<()>) -> Result<()>
where
    S: Copy + Default,
    T: From<S>,
{
    let mut narrow = vec![S::default(); dst.len()];
    read(&mut narrow)?;
    for (slot, value) in dst.iter_mut().zip(narrow) {
        *slot = T::from(value);
    }
    Ok(())
}

const INT_EVENTS: &[EventType] = &[EventType::ValueByte, EventType::ValueInt];
const LONG_EVENTS: &[EventType] = &[EventType::ValueByte, EventType::ValueInt, EventType::ValueLong];
const DOUBLE_EVENTS: &[EventType] = &[EventType::ValueFloat, EventType::ValueDouble];

impl BxmlReader for StreamReader {
    fn header(&self) -> &Header {
        &self.header
    }

    fn event_type(&self) -> EventType {
        self.event
    }

    fn next(&mut self) -> Result<EventType> {
        self.check_open("next")?;
        if self.event == EventType::EndDocument {
            return Err(Error::illegal_state("next", "already at END_DOCUMENT"));
        }
        self.advance()
    }

    fn next_tag(&mut self) -> Result<EventType> {
        loop {
            match self.next()? {
                event @ (EventType::StartElement | EventType::EndElement | EventType::EndDocument) => {
                    return Ok(event);
                }
                _ => {}
            }
        }
    }

    fn has_next(&self) -> bool {
        self.open && self.event != EventType::EndDocument
    }

    fn skip_element(&mut self) -> Result<()> {
        self.require_start_element("skip_element")?;
        let depth = self.stack.len();
        loop {
            match self.next()? {
                EventType::EndElement if self.stack.len() < depth => return Ok(()),
                EventType::EndDocument => {
                    return Err(DecodeError::UnexpectedEof { context: "skip_element" }.into());
                }
                _ => {}
            }
        }
    }

    fn depth(&self) -> usize {
        self.stack.len()
    }

    fn name(&self) -> Result<&QName> {
        self.require_event("name", &[EventType::StartElement, EventType::EndElement])?;
        Ok(&self.name)
    }

    fn attribute_count(&self) -> Result<usize> {
        self.require_start_element("attribute_count")?;
        Ok(self.attributes.len())
    }

    fn attribute(&self, index: usize) -> Result<&Attribute> {
        self.require_start_element("attribute")?;
        self.attributes.get(index).ok_or_else(|| {
            Error::illegal_state(
                "attribute",
                format!("index {index} out of {} attributes", self.attributes.len()),
            )
        })
    }

    fn attribute_value(&self, namespace_uri: &str, local_name: &str) -> Result<Option<&str>> {
        self.require_start_element("attribute_value")?;
        Ok(self
            .attributes
            .iter()
            .find(|a| a.name.namespace_uri == namespace_uri && a.name.local_name == local_name)
            .map(|a| a.value.as_str()))
    }

    fn namespace_count(&self) -> Result<usize> {
        self.require_start_element("namespace_count")?;
        Ok(self.namespaces.len())
    }

    fn namespace_decl(&self, index: usize) -> Result<&NamespaceDecl> {
        self.require_start_element("namespace_decl")?;
        self.namespaces.get(index).ok_or_else(|| {
            Error::illegal_state(
                "namespace_decl",
                format!("index {index} out of {} declarations", self.namespaces.len()),
            )
        })
    }

    fn namespace_uri_for(&self, prefix: &str) -> Option<&str> {
        if !self.open {
            return None;
        }
        self.strategy.resolve(prefix)
    }

    fn is_namespace_aware(&self) -> bool {
        self.strategy.is_aware()
    }

    fn value_count(&self) -> Result<usize> {
        self.check_open("value_count")?;
        if !self.event.is_value() && self.event != EventType::Comment {
            return Err(Error::illegal_state(
                "value_count",
                format!("current event is {}", self.event),
            ));
        }
        Ok(self.cursor.count)
    }

    fn values_read(&self) -> usize {
        self.cursor.read
    }

    fn get_bool_value(&mut self) -> Result<bool> {
        self.take_values("get_bool_value", &[EventType::ValueBool], 1)?;
        self.io.read_bool("bool value")
    }

    fn get_byte_value(&mut self) -> Result<i8> {
        self.take_values("get_byte_value", &[EventType::ValueByte], 1)?;
        self.io.read_i8("byte value")
    }

    fn get_int_value(&mut self) -> Result<i32> {
        match self.take_values("get_int_value", INT_EVENTS, 1)? {
            ValueType::SmallNum => Ok(i32::from(self.cursor.small)),
            ValueType::Byte => Ok(i32::from(self.io.read_i8("byte value")?)),
            ValueType::Short => Ok(i32::from(self.io.read_i16("short value")?)),
            ValueType::UShort => Ok(i32::from(self.io.read_u16("ushort value")?)),
            ValueType::Int => self.io.read_i32("int value"),
            other => Err(Self::mismatch("get_int_value", other)),
        }
    }

    fn get_long_value(&mut self) -> Result<i64> {
        match self.take_values("get_long_value", LONG_EVENTS, 1)? {
            ValueType::SmallNum => Ok(i64::from(self.cursor.small)),
            ValueType::Byte => Ok(i64::from(self.io.read_i8("byte value")?)),
            ValueType::Short => Ok(i64::from(self.io.read_i16("short value")?)),
            ValueType::UShort => Ok(i64::from(self.io.read_u16("ushort value")?)),
            ValueType::Int => Ok(i64::from(self.io.read_i32("int value")?)),
            ValueType::Long => self.io.read_i64("long value"),
            other => Err(Self::mismatch("get_long_value", other)),
        }
    }

    fn get_float_value(&mut self) -> Result<f32> {
        self.take_values("get_float_value", &[EventType::ValueFloat], 1)?;
        self.io.read_f32("float value")
    }

    fn get_double_value(&mut self) -> Result<f64> {
        match self.take_values("get_double_value", DOUBLE_EVENTS, 1)? {
            ValueType::Float => Ok(f64::from(self.io.read_f32("float value")?)),
            ValueType::Double => self.io.read_f64("double value"),
            other => Err(Self::mismatch("get_double_value", other)),
        }
    }

    fn get_string_value(&mut self) -> Result<String> {
        self.check_open("get_string_value")?;
        if !self.event.is_value() && self.event != EventType::Comment {
            return Err(Error::illegal_state(
                "get_string_value",
                format!("current event is {}", self.event),
            ));
        }
        let remaining = self.cursor.count - self.cursor.read;
        if remaining == 0 && self.cursor.count > 0 {
            return Err(Error::illegal_state("get_string_value", "event already consumed"));
        }
        self.cursor.read = self.cursor.count;
        if let Some(text) = self.cursor.text.take() {
            return Ok(text);
        }
        let mut out = String::new();
        match self.cursor.value_type {
            None => {}
            Some(ValueType::SmallNum) => out.push_str(&self.cursor.small.to_string()),
            Some(ValueType::String) => out = self.io.read_string("string value")?,
            Some(value_type) => append_values_text(&mut self.io, value_type, remaining, &mut out, false)?,
        }
        Ok(out)
    }

    fn get_bool_values(&mut self, dst: &mut [bool]) -> Result<()> {
        self.take_values("get_bool_values", &[EventType::ValueBool], dst.len())?;
        self.io.read_bool_into(dst, "bool values")
    }

    fn get_byte_values(&mut self, dst: &mut [i8]) -> Result<()> {
        self.take_values("get_byte_values", &[EventType::ValueByte], dst.len())?;
        self.io.read_i8_into(dst, "byte values")
    }

    fn get_int_values(&mut self, dst: &mut [i32]) -> Result<()> {
        match self.take_values("get_int_values", INT_EVENTS, dst.len())? {
            ValueType::SmallNum => {
                dst.fill(i32::from(self.cursor.small));
                Ok(())
            }
            ValueType::Byte => widen_into(dst, |tmp: &mut [i8]| self.io.read_i8_into(tmp, "byte values")),
            ValueType::Short => widen_into(dst, |tmp: &mut [i16]| self.io.read_i16_into(tmp, "short values")),
            ValueType::UShort => widen_into(dst, |tmp: &mut [u16]| self.io.read_u16_into(tmp, "ushort values")),
            ValueType::Int => self.io.read_i32_into(dst, "int values"),
            other => Err(Self::mismatch("get_int_values", other)),
        }
    }

    fn get_long_values(&mut self, dst: &mut [i64]) -> Result<()> {
        match self.take_values("get_long_values", LONG_EVENTS, dst.len())? {
            ValueType::SmallNum => {
                dst.fill(i64::from(self.cursor.small));
                Ok(())
            }
            ValueType::Byte => widen_into(dst, |tmp: &mut [i8]| self.io.read_i8_into(tmp, "byte values")),
            ValueType::Short => widen_into(dst, |tmp: &mut [i16]| self.io.read_i16_into(tmp, "short values")),
            ValueType::UShort => widen_into(dst, |tmp: &mut [u16]| self.io.read_u16_into(tmp, "ushort values")),
            ValueType::Int => widen_into(dst, |tmp: &mut [i32]| self.io.read_i32_into(tmp, "int values")),
            ValueType::Long => self.io.read_i64_into(dst, "long values"),
            other => Err(Self::mismatch("get_long_values", other)),
        }
    }

    fn get_float_values(&mut self, dst: &mut [f32]) -> Result<()> {
        self.take_values("get_float_values", &[EventType::ValueFloat], dst.len())?;
        self.io.read_f32_into(dst, "float values")
    }

    fn get_double_values(&mut self, dst: &mut [f64]) -> Result<()> {
        match self.take_values("get_double_values", DOUBLE_EVENTS, dst.len())? {
            ValueType::Float => widen_into(dst, |tmp: &mut [f32]| self.io.read_f32_into(tmp, "float values")),
            ValueType::Double => self.io.read_f64_into(dst, "double values"),
            other => Err(Self::mismatch("get_double_values", other)),
        }
    }

    fn xml_version(&self) -> Option<&str> {
        if !self.open {
            return None;
        }
        self.xml_version.as_deref()
    }

    fn standalone(&self) -> Standalone {
        self.standalone
    }

    fn supports_random_access(&self) -> bool {
        self.open && self.io.supports_random_access()
    }

    fn element_position(&self) -> Result<u64> {
        self.check_open("element_position")?;
        if !self.io.supports_random_access() {
            return Err(Error::Unsupported {
                operation: "element_position",
            });
        }
        self.require_start_element("element_position")?;
        Ok(self.element_position)
    }

    fn set_position(&mut self, position: u64) -> Result<EventType> {
        self.check_open("set_position")?;
        if !self.io.supports_random_access() {
            return Err(Error::Unsupported {
                operation: "set_position",
            });
        }
        self.io.set_position(position)?;
        let token = match self.io.read_token_type() {
            Ok(token) if token.is_element_start() => token,
            Ok(_) | Err(Error::Decode(DecodeError::InvalidTokenType { .. })) => {
                return Err(DecodeError::NotAnElement { position }.into());
            }
            Err(err) => return Err(err),
        };
        self.cursor = ValueCursor::default();
        self.stack.clear();
        self.strategy.reset();
        self.pending_end = false;
        self.detached = true;
        self.start_element(token, position)
    }

    fn indexed_paths(&self) -> Vec<&str> {
        if !self.open {
            return Vec::new();
        }
        let mut paths: Vec<&str> = self.index.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    fn index_positions(&self, path: &str) -> Option<&[u64]> {
        if !self.open {
            return None;
        }
        self.index.get(path).map(Vec::as_slice)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.io.close();
            self.open = false;
            log::debug!("[bxml::reader] closed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("event", &self.event)
            .field("depth", &self.stack.len())
            .field("position", &self.io.position())
            .field("open", &self.open)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EncodingOptions;
    use crate::writer::{BxmlWriter, StreamWriter};

    /// Header (21 bytes) plus the XML declaration for "1.0" (6 bytes).
    const PREAMBLE_LEN: usize = 27;

    fn document(body: impl FnOnce(&mut StreamWriter<Vec<u8>>)) -> Vec<u8> {
        let mut w = StreamWriter::new(Vec::new(), EncodingOptions::default()).unwrap();
        w.write_start_document().unwrap();
        body(&mut w);
        w.write_end_document().unwrap();
        w.into_inner().unwrap()
    }

    fn open(bytes: Vec<u8>) -> StreamReader {
        StreamReader::open(Source::from_bytes(bytes), ReaderOptions::default()).unwrap()
    }

    #[test]
    fn test_oversized_index_table_rejected() {
        let mut bytes = document(|w| {
            w.write_start_element("", "root").unwrap();
            w.write_end_element().unwrap();
        });
        // IndexTable with an empty path and a count of i64::MAX.
        let mut token = vec![TokenType::IndexTable.code(), 0x00, 0xF6];
        token.extend_from_slice(&i64::MAX.to_be_bytes());
        let tail = bytes.split_off(PREAMBLE_LEN);
        bytes.extend(token);
        bytes.extend(tail);

        let mut reader = open(bytes);
        assert!(matches!(
            reader.next(),
            Err(Error::Decode(DecodeError::LengthExceedsLimit {
                field: "index table",
                ..
            }))
        ));
    }

    #[test]
    fn test_index_table_in_body_is_skipped() {
        let mut bytes = document(|w| {
            w.write_start_element("", "root").unwrap();
            w.write_end_element().unwrap();
        });
        let mut token = vec![TokenType::IndexTable.code(), 0x01, b'x', 0x02];
        token.extend_from_slice(&[0u8; 16]);
        let tail = bytes.split_off(PREAMBLE_LEN);
        bytes.extend(token);
        bytes.extend(tail);

        let mut reader = open(bytes);
        assert_eq!(reader.next().unwrap(), EventType::StartElement);
        assert_eq!(reader.name().unwrap().local_name, "root");
    }

    #[test]
    fn test_attribute_text_keeps_empty_first_value() {
        let bytes = document(|w| {
            w.write_start_element("", "a").unwrap();
            w.write_start_attribute("", "k").unwrap();
            w.write_value_str("").unwrap();
            w.write_value_int(5).unwrap();
            w.write_start_attribute("", "empty").unwrap();
            w.write_values_int(&[]).unwrap();
            w.write_value_int(6).unwrap();
            w.write_end_attributes().unwrap();
            w.write_end_element().unwrap();
        });
        let mut reader = open(bytes);
        reader.next().unwrap();
        assert_eq!(reader.attribute_value("", "k").unwrap(), Some(" 5"));
        // An empty array contributes no value.
        assert_eq!(reader.attribute_value("", "empty").unwrap(), Some("6"));
    }

    #[test]
    fn test_closed_reader() {
        let bytes = document(|w| {
            w.write_start_element("", "a").unwrap();
            w.write_value_int(1).unwrap();
            w.write_end_element().unwrap();
        });
        let mut reader = open(bytes);
        reader.next().unwrap();
        assert_eq!(reader.next().unwrap(), EventType::ValueInt);
        reader.close().unwrap();
        reader.close().unwrap();

        assert!(!reader.is_open());
        assert!(!reader.has_next());
        assert!(!reader.supports_random_access());
        assert!(matches!(reader.next(), Err(Error::Closed { .. })));
        assert!(matches!(reader.get_int_value(), Err(Error::Closed { .. })));
        assert!(matches!(reader.value_count(), Err(Error::Closed { .. })));
        assert!(matches!(reader.name(), Err(Error::Closed { .. })));
        assert!(matches!(reader.set_position(0), Err(Error::Closed { .. })));
        assert_eq!(reader.xml_version(), None);
        assert_eq!(reader.namespace_uri_for("xml"), None);
        assert!(reader.indexed_paths().is_empty());
        assert_eq!(reader.index_positions("//a"), None);
        assert_eq!(reader.event_type(), EventType::ValueInt);
    }
}
