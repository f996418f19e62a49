//! Event writer: the mirror image of the reader.
//!
//! The writer tracks the last event it emitted and rejects calls that cannot
//! follow it. Element start tokens are written as placeholders and patched in
//! place once the element is known to have attributes or content, so the
//! byte stream never needs a second pass.

use std::io::Write;

use crate::codec::value::narrowest_int_type;
use crate::codec::{TokenType, ValueType};
use crate::error::{EncodeError, Error, Result};
use crate::io::ByteWriter;
use crate::limits::MAX_ARRAY_LEN;
use crate::model::{
    path_matches, EncodingOptions, EventType, FragmentInfo, Header, IndexTableIndexEntry,
    NamespaceScope, StringTableIndexEntry, Trailer, WriterStringTable,
};

/// Writes BXML events.
pub trait BxmlWriter {
    /// The event most recently written.
    fn last_event(&self) -> EventType;

    /// Number of open elements.
    fn depth(&self) -> usize;

    /// Writes the XML declaration. Must be the first call.
    fn write_start_document(&mut self) -> Result<()>;

    /// Closes open elements, writes indices and the trailer, and flushes.
    fn write_end_document(&mut self) -> Result<()>;

    /// Opens an element. A non-empty `namespace_uri` must be bound to a prefix.
    fn write_start_element(&mut self, namespace_uri: &str, local_name: &str) -> Result<()>;

    fn write_end_element(&mut self) -> Result<()>;

    /// Opens an attribute of the current element; its value follows as values.
    fn write_start_attribute(&mut self, namespace_uri: &str, local_name: &str) -> Result<()>;

    /// Writes an attribute with a single string value. Unlike
    /// [`write_start_attribute`](Self::write_start_attribute), the attribute
    /// takes no further values: a value written next is element content.
    fn write_attribute(&mut self, namespace_uri: &str, local_name: &str, value: &str) -> Result<()>;

    /// Ends the attribute list of the current element.
    fn write_end_attributes(&mut self) -> Result<()>;

    /// Binds `prefix` in the current scope without declaring it.
    fn set_prefix(&mut self, prefix: &str, namespace_uri: &str) -> Result<()>;

    /// Declares and binds `prefix` on the current element.
    fn write_namespace(&mut self, prefix: &str, namespace_uri: &str) -> Result<()>;

    /// Declares the default namespace on the current element.
    fn write_default_namespace(&mut self, namespace_uri: &str) -> Result<()>;

    fn write_value_bool(&mut self, value: bool) -> Result<()>;
    fn write_value_byte(&mut self, value: i8) -> Result<()>;
    fn write_value_int(&mut self, value: i32) -> Result<()>;
    fn write_value_long(&mut self, value: i64) -> Result<()>;
    fn write_value_float(&mut self, value: f32) -> Result<()>;
    fn write_value_double(&mut self, value: f64) -> Result<()>;
    fn write_value_str(&mut self, value: &str) -> Result<()>;

    /// Writes a slice as one array value, or as elements of the open array.
    fn write_values_bool(&mut self, values: &[bool]) -> Result<()>;
    fn write_values_byte(&mut self, values: &[i8]) -> Result<()>;
    fn write_values_int(&mut self, values: &[i32]) -> Result<()>;
    fn write_values_long(&mut self, values: &[i64]) -> Result<()>;
    fn write_values_float(&mut self, values: &[f32]) -> Result<()>;
    fn write_values_double(&mut self, values: &[f64]) -> Result<()>;

    /// Starts an array of `len` values of `value_type`.
    fn start_array(&mut self, value_type: ValueType, len: usize) -> Result<()>;

    /// Ends the open array; exactly `len` values must have been written.
    fn end_array(&mut self) -> Result<()>;

    fn write_cdata(&mut self, text: &str) -> Result<()>;
    fn write_whitespace(&mut self, text: &str) -> Result<()>;
    fn write_comment(&mut self, text: &str) -> Result<()>;

    /// Index of `value` in the writer string table, allocating one if new.
    fn string_table_reference(&mut self, value: &str) -> Result<usize>;

    /// Writes a string value by string-table index.
    fn write_string_table_value(&mut self, index: usize) -> Result<()>;

    /// Hands buffered bytes to the sink, except an unpatched element start.
    fn flush(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Flushes and releases the sink. Idempotent.
    fn close(&mut self) -> Result<()>;
}

#[derive(Debug)]
struct OpenElement {
    local_name: String,
    /// Offset of the element start token.
    start: u64,
    has_attributes: bool,
    has_content: bool,
}

#[derive(Debug, Clone, Copy)]
struct ArrayState {
    element: ValueType,
    len: usize,
    written: usize,
}

/// Predecessors allowed for a value write.
fn value_may_follow(event: EventType) -> bool {
    event.is_value()
        || matches!(
            event,
            EventType::StartElement
                | EventType::Attribute
                | EventType::AttributesEnd
                | EventType::Comment
        )
}

/// [`BxmlWriter`] over any `std::io::Write`.
pub struct StreamWriter<W: Write> {
    io: ByteWriter<W>,
    options: EncodingOptions,
    strings: WriterStringTable,
    fragments: Vec<FragmentInfo>,
    scope: NamespaceScope,
    stack: Vec<OpenElement>,
    last_event: EventType,
    in_attribute_list: bool,
    /// Values go to the attribute opened last.
    in_attribute: bool,
    array: Option<ArrayState>,
    root_written: bool,
    /// Index hints are honoured.
    indexing: bool,
    /// Element offsets per index path, in `options.index_paths` order.
    index_hits: Vec<Vec<u64>>,
    open: bool,
}

impl<W: Write> StreamWriter<W> {
    /// Creates a writer and writes the header.
    pub fn new(sink: W, options: EncodingOptions) -> Result<Self> {
        let header = Header::from_options(&options);
        let mut io = ByteWriter::new(sink, header.byte_order());
        header.write(&mut io)?;
        if options.compressed {
            io.switch_to_gzip()?;
            if options.wants_random_access() {
                log::warn!("[bxml::writer] random-access index hints ignored for compressed output");
            }
        }
        let indexing = header.flags.has_random_access();
        log::debug!(
            "[bxml::writer] opened: {}, {:?} byte order, compressed {}, indexing {}",
            header.charset.name(),
            header.byte_order(),
            options.compressed,
            indexing
        );
        Ok(Self {
            io,
            index_hits: vec![Vec::new(); options.index_paths.len()],
            options,
            strings: WriterStringTable::new(),
            fragments: Vec::new(),
            scope: NamespaceScope::new(),
            stack: Vec::new(),
            last_event: EventType::None,
            in_attribute_list: false,
            in_attribute: false,
            array: None,
            root_written: false,
            indexing,
            open: true,
        })
    }

    /// The options this writer was created with.
    pub fn options(&self) -> &EncodingOptions {
        &self.options
    }

    /// Closes the writer and returns the sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.close()?;
        self.io.into_inner()
    }

    fn check_open(&self, operation: &'static str) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::Closed { operation })
        }
    }

    fn reject(&self, operation: &'static str, reason: &str) -> Error {
        Error::illegal_state(
            operation,
            format!("{reason} (last event {})", self.last_event),
        )
    }

    fn require_no_array(&self, operation: &'static str) -> Result<()> {
        if self.array.is_some() {
            return Err(self.reject(operation, "an array is open"));
        }
        Ok(())
    }

    fn require_document(&self, operation: &'static str) -> Result<()> {
        self.check_open(operation)?;
        match self.last_event {
            EventType::None => Err(self.reject(operation, "document not started")),
            EventType::EndDocument => Err(self.reject(operation, "document already ended")),
            _ => Ok(()),
        }
    }

    // =========================================================================
    // STRUCTURE
    // =========================================================================

    fn flush_strings(&mut self) -> Result<()> {
        if let Some(info) = self.strings.write_pending(&mut self.io)? {
            self.fragments.push(info);
        }
        Ok(())
    }

    fn qualify(&self, namespace_uri: &str, local_name: &str, is_attribute: bool) -> Result<String> {
        if namespace_uri.is_empty() {
            return Ok(local_name.to_string());
        }
        let prefix = if is_attribute {
            self.scope
                .prefix_for(namespace_uri)
                .filter(|prefix| !prefix.is_empty())
        } else {
            self.scope.prefix_for(namespace_uri)
        };
        match prefix {
            Some("") => Ok(local_name.to_string()),
            Some(prefix) => Ok(format!("{prefix}:{local_name}")),
            None => Err(EncodeError::UnboundNamespace {
                uri: namespace_uri.to_string(),
            }
            .into()),
        }
    }

    fn patch_start(&mut self, start: u64, token: TokenType) -> Result<()> {
        let end = self.io.position();
        self.io.set_position(start)?;
        self.io.write_token_type(token)?;
        self.io.set_position(end)?;
        self.io.set_auto_flush(true);
        Ok(())
    }

    fn close_attribute_list(&mut self) -> Result<()> {
        if !self.in_attribute_list {
            return Ok(());
        }
        self.in_attribute_list = false;
        self.in_attribute = false;
        if self.stack.last().is_some_and(|e| e.has_attributes) {
            self.io.write_token_type(TokenType::AttributeListEnd)?;
        }
        Ok(())
    }

    /// Marks the current element as having content, patching its start token.
    fn begin_content(&mut self) -> Result<()> {
        self.close_attribute_list()?;
        let patch = match self.stack.last_mut() {
            Some(element) if !element.has_content => {
                element.has_content = true;
                Some((element.start, TokenType::element_start(element.has_attributes, true)))
            }
            _ => None,
        };
        if let Some((start, token)) = patch {
            self.patch_start(start, token)?;
        }
        Ok(())
    }

    fn record_index_hits(&mut self, start: u64) {
        if !self.indexing {
            return;
        }
        let path: Vec<&str> = self.stack.iter().map(|e| e.local_name.as_str()).collect();
        for (pattern, hits) in self.options.index_paths.iter().zip(self.index_hits.iter_mut()) {
            if path_matches(pattern, &path) {
                hits.push(start);
            }
        }
    }

    fn end_element_inner(&mut self) -> Result<()> {
        self.close_attribute_list()?;
        let element = self
            .stack
            .pop()
            .ok_or_else(|| self.reject("write_end_element", "no open element"))?;
        if element.has_content {
            self.io.write_token_type(TokenType::ElementEnd)?;
        } else {
            let token = TokenType::element_start(element.has_attributes, false);
            self.patch_start(element.start, token)?;
        }
        self.scope.pop_scope();
        self.last_event = EventType::EndElement;
        Ok(())
    }

    fn write_index_tables(&mut self) -> Result<Option<Vec<IndexTableIndexEntry>>> {
        if !self.indexing || self.options.index_paths.is_empty() {
            return Ok(None);
        }
        let mut entries = Vec::new();
        for (pattern, hits) in self.options.index_paths.iter().zip(&self.index_hits) {
            let offset = self.io.position();
            self.io.write_token_type(TokenType::IndexTable)?;
            self.io.write_string(pattern)?;
            self.io.write_count(hits.len() as u64)?;
            let hits: Vec<i64> = hits.iter().map(|&h| h as i64).collect();
            self.io.write_i64_slice(&hits)?;
            entries.push(IndexTableIndexEntry {
                path: pattern.clone(),
                offset,
            });
        }
        Ok(Some(entries))
    }

    // =========================================================================
    // VALUES
    // =========================================================================

    /// Positions the stream for a value: attribute value or element content.
    fn prepare_value(&mut self, operation: &'static str) -> Result<()> {
        self.require_document(operation)?;
        if self.stack.is_empty() {
            return Err(self.reject(operation, "values must be inside an element"));
        }
        if !value_may_follow(self.last_event) {
            return Err(self.reject(operation, "a value cannot follow this event"));
        }
        if !self.in_attribute {
            self.begin_content()?;
        }
        Ok(())
    }

    /// Element type of the open array, if any, checked against `accepted`
    /// and against room for `n` more values.
    fn array_element(
        &self,
        operation: &'static str,
        accepted: &[ValueType],
        n: usize,
    ) -> Result<Option<ValueType>> {
        let Some(state) = self.array else {
            return Ok(None);
        };
        if !accepted.contains(&state.element) {
            return Err(self.reject(
                operation,
                &format!("open array holds {} values", state.element.name()),
            ));
        }
        if state.written + n > state.len {
            return Err(self.reject(
                operation,
                &format!(
                    "array declared {} values, {} written",
                    state.len, state.written
                ),
            ));
        }
        Ok(Some(state.element))
    }

    fn fill_array(&mut self, n: usize) {
        if let Some(state) = self.array.as_mut() {
            state.written += n;
        }
    }

    fn write_single(&mut self, operation: &'static str, value_type: ValueType) -> Result<()> {
        self.prepare_value(operation)?;
        self.io.write_token_type(TokenType::CharContent)?;
        if let Some(code) = value_type.code() {
            self.io.write_u8(code)?;
        }
        Ok(())
    }

    fn write_array_header(
        &mut self,
        operation: &'static str,
        element: ValueType,
        len: usize,
    ) -> Result<()> {
        if !element.is_array_element() {
            return Err(EncodeError::InvalidArrayElementType {
                value_type: element.name(),
            }
            .into());
        }
        if len > MAX_ARRAY_LEN {
            return Err(EncodeError::LengthExceedsLimit {
                field: "array",
                len,
                max: MAX_ARRAY_LEN,
            }
            .into());
        }
        self.prepare_value(operation)?;
        self.io.write_token_type(TokenType::CharContent)?;
        self.io.write_u8(ValueType::Array.code().unwrap_or_default())?;
        self.io.write_u8(element.code().unwrap_or_default())?;
        self.io.write_count(len as u64)
    }

    fn finish_value(&mut self, value_type: ValueType) {
        self.last_event = EventType::for_value_type(value_type);
    }

    fn in_array(&self, operation: &'static str) -> Result<bool> {
        self.check_open(operation)?;
        Ok(self.array.is_some())
    }

    fn int_element_bytes(&mut self, element: ValueType, values: &[i32]) -> Result<()> {
        match element {
            ValueType::Int => self.io.write_i32_slice(values),
            ValueType::Short => {
                let narrowed = values
                    .iter()
                    .map(|&v| i16::try_from(v))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|_| self.reject("write_value_int", "value out of range for short"))?;
                self.io.write_i16_slice(&narrowed)
            }
            ValueType::UShort => {
                let narrowed = values
                    .iter()
                    .map(|&v| u16::try_from(v))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|_| self.reject("write_value_int", "value out of range for ushort"))?;
                self.io.write_u16_slice(&narrowed)
            }
            other => Err(self.reject(
                "write_value_int",
                &format!("open array holds {} values", other.name()),
            )),
        }
    }
}

const INT_ELEMENTS: &[ValueType] = &[ValueType::Int, ValueType::Short, ValueType::UShort];

impl<W: Write> BxmlWriter for StreamWriter<W> {
    fn last_event(&self) -> EventType {
        self.last_event
    }

    fn depth(&self) -> usize {
        self.stack.len()
    }

    fn write_start_document(&mut self) -> Result<()> {
        self.check_open("write_start_document")?;
        if self.last_event != EventType::None {
            return Err(self.reject("write_start_document", "document already started"));
        }
        self.io.write_token_type(TokenType::XmlDeclaration)?;
        self.io.write_string(&self.options.xml_version)?;
        self.io.write_u8(self.options.standalone.code())?;
        self.last_event = EventType::StartDocument;
        Ok(())
    }

    fn write_end_document(&mut self) -> Result<()> {
        self.require_document("write_end_document")?;
        self.require_no_array("write_end_document")?;
        while !self.stack.is_empty() {
            self.end_element_inner()?;
        }
        let index_tables = self.write_index_tables()?;
        let string_tables = (self.indexing && self.options.string_table_index).then(|| {
            self.fragments
                .iter()
                .map(|f| StringTableIndexEntry {
                    offset: f.offset,
                    count: f.count,
                })
                .collect()
        });
        let trailer = Trailer {
            position: self.io.position(),
            string_tables,
            index_tables,
        };
        trailer.write(&mut self.io)?;
        self.io.flush()?;
        self.last_event = EventType::EndDocument;
        log::debug!(
            "[bxml::writer] end of document: {} bytes, {} strings in {} fragments",
            self.io.position(),
            self.strings.len(),
            self.fragments.len()
        );
        Ok(())
    }

    fn write_start_element(&mut self, namespace_uri: &str, local_name: &str) -> Result<()> {
        self.require_document("write_start_element")?;
        self.require_no_array("write_start_element")?;
        if self.stack.is_empty() && self.root_written {
            return Err(self.reject("write_start_element", "document already has a root element"));
        }
        let name = self.qualify(namespace_uri, local_name, false)?;
        self.begin_content()?;

        let index = self.strings.intern(&name);
        self.flush_strings()?;
        let start = self.io.position();
        self.io.set_auto_flush(false);
        self.io
            .write_token_type(TokenType::element_start(true, true))?;
        self.io.write_count(index as u64)?;

        self.scope.push_scope();
        self.stack.push(OpenElement {
            local_name: local_name.to_string(),
            start,
            has_attributes: false,
            has_content: false,
        });
        self.root_written = true;
        self.in_attribute_list = true;
        self.in_attribute = false;
        self.record_index_hits(start);
        self.last_event = EventType::StartElement;
        Ok(())
    }

    fn write_end_element(&mut self) -> Result<()> {
        self.require_document("write_end_element")?;
        self.require_no_array("write_end_element")?;
        self.end_element_inner()
    }

    fn write_start_attribute(&mut self, namespace_uri: &str, local_name: &str) -> Result<()> {
        self.require_document("write_start_attribute")?;
        self.require_no_array("write_start_attribute")?;
        if !self.in_attribute_list {
            return Err(self.reject("write_start_attribute", "attribute list is closed"));
        }
        let name = self.qualify(namespace_uri, local_name, true)?;
        let index = self.strings.intern(&name);
        self.flush_strings()?;
        self.io.write_token_type(TokenType::AttributeStart)?;
        self.io.write_count(index as u64)?;
        if let Some(element) = self.stack.last_mut() {
            element.has_attributes = true;
        }
        self.in_attribute = true;
        self.last_event = EventType::Attribute;
        Ok(())
    }

    fn write_attribute(&mut self, namespace_uri: &str, local_name: &str, value: &str) -> Result<()> {
        self.write_start_attribute(namespace_uri, local_name)?;
        self.write_value_str(value)?;
        self.in_attribute = false;
        Ok(())
    }

    fn write_end_attributes(&mut self) -> Result<()> {
        self.require_document("write_end_attributes")?;
        self.require_no_array("write_end_attributes")?;
        if !self.in_attribute_list {
            return Err(self.reject("write_end_attributes", "attribute list is closed"));
        }
        self.close_attribute_list()?;
        self.last_event = EventType::AttributesEnd;
        Ok(())
    }

    fn set_prefix(&mut self, prefix: &str, namespace_uri: &str) -> Result<()> {
        self.require_document("set_prefix")?;
        self.scope.declare(prefix, namespace_uri);
        Ok(())
    }

    fn write_namespace(&mut self, prefix: &str, namespace_uri: &str) -> Result<()> {
        self.require_document("write_namespace")?;
        self.require_no_array("write_namespace")?;
        if !self.in_attribute_list {
            return Err(self.reject("write_namespace", "attribute list is closed"));
        }
        let name = if prefix.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{prefix}")
        };
        self.scope.declare(prefix, namespace_uri);
        let index = self.strings.intern(&name);
        self.flush_strings()?;
        self.io.write_token_type(TokenType::AttributeStart)?;
        self.io.write_count(index as u64)?;
        self.io.write_token_type(TokenType::CharContent)?;
        self.io.write_u8(ValueType::String.code().unwrap_or_default())?;
        self.io.write_string(namespace_uri)?;
        if let Some(element) = self.stack.last_mut() {
            element.has_attributes = true;
        }
        self.in_attribute = false;
        self.last_event = EventType::NamespaceDecl;
        Ok(())
    }

    fn write_default_namespace(&mut self, namespace_uri: &str) -> Result<()> {
        self.write_namespace("", namespace_uri)
    }

    fn write_value_bool(&mut self, value: bool) -> Result<()> {
        if self.in_array("write_value_bool")? {
            self.array_element("write_value_bool", &[ValueType::Bool], 1)?;
            self.io.write_bool(value)?;
            self.fill_array(1);
            return Ok(());
        }
        self.write_single("write_value_bool", ValueType::Bool)?;
        self.io.write_bool(value)?;
        self.finish_value(ValueType::Bool);
        Ok(())
    }

    fn write_value_byte(&mut self, value: i8) -> Result<()> {
        if self.in_array("write_value_byte")? {
            self.array_element("write_value_byte", &[ValueType::Byte], 1)?;
            self.io.write_i8(value)?;
            self.fill_array(1);
            return Ok(());
        }
        self.write_single("write_value_byte", ValueType::Byte)?;
        self.io.write_i8(value)?;
        self.finish_value(ValueType::Byte);
        Ok(())
    }

    fn write_value_int(&mut self, value: i32) -> Result<()> {
        if self.in_array("write_value_int")? {
            if let Some(element) = self.array_element("write_value_int", INT_ELEMENTS, 1)? {
                self.int_element_bytes(element, &[value])?;
                self.fill_array(1);
            }
            return Ok(());
        }
        let value_type = narrowest_int_type(value);
        self.write_single("write_value_int", value_type)?;
        match value_type {
            ValueType::SmallNum => self.io.write_u8(value as u8)?,
            ValueType::Short => self.io.write_i16(value as i16)?,
            ValueType::UShort => self.io.write_u16(value as u16)?,
            _ => self.io.write_i32(value)?,
        }
        self.finish_value(ValueType::Int);
        Ok(())
    }

    fn write_value_long(&mut self, value: i64) -> Result<()> {
        if self.in_array("write_value_long")? {
            self.array_element("write_value_long", &[ValueType::Long], 1)?;
            self.io.write_i64(value)?;
            self.fill_array(1);
            return Ok(());
        }
        self.write_single("write_value_long", ValueType::Long)?;
        self.io.write_i64(value)?;
        self.finish_value(ValueType::Long);
        Ok(())
    }

    fn write_value_float(&mut self, value: f32) -> Result<()> {
        if self.in_array("write_value_float")? {
            self.array_element("write_value_float", &[ValueType::Float], 1)?;
            self.io.write_f32(value)?;
            self.fill_array(1);
            return Ok(());
        }
        self.write_single("write_value_float", ValueType::Float)?;
        self.io.write_f32(value)?;
        self.finish_value(ValueType::Float);
        Ok(())
    }

    fn write_value_double(&mut self, value: f64) -> Result<()> {
        if self.in_array("write_value_double")? {
            self.array_element("write_value_double", &[ValueType::Double], 1)?;
            self.io.write_f64(value)?;
            self.fill_array(1);
            return Ok(());
        }
        self.write_single("write_value_double", ValueType::Double)?;
        self.io.write_f64(value)?;
        self.finish_value(ValueType::Double);
        Ok(())
    }

    fn write_value_str(&mut self, value: &str) -> Result<()> {
        self.require_no_array("write_value_str")?;
        self.write_single("write_value_str", ValueType::String)?;
        self.io.write_string(value)?;
        self.finish_value(ValueType::String);
        Ok(())
    }

    fn write_values_bool(&mut self, values: &[bool]) -> Result<()> {
        if self.in_array("write_values_bool")? {
            self.array_element("write_values_bool", &[ValueType::Bool], values.len())?;
            self.io.write_bool_slice(values)?;
            self.fill_array(values.len());
            return Ok(());
        }
        self.write_array_header("write_values_bool", ValueType::Bool, values.len())?;
        self.io.write_bool_slice(values)?;
        self.finish_value(ValueType::Bool);
        Ok(())
    }

    fn write_values_byte(&mut self, values: &[i8]) -> Result<()> {
        if self.in_array("write_values_byte")? {
            self.array_element("write_values_byte", &[ValueType::Byte], values.len())?;
            self.io.write_i8_slice(values)?;
            self.fill_array(values.len());
            return Ok(());
        }
        self.write_array_header("write_values_byte", ValueType::Byte, values.len())?;
        self.io.write_i8_slice(values)?;
        self.finish_value(ValueType::Byte);
        Ok(())
    }

    fn write_values_int(&mut self, values: &[i32]) -> Result<()> {
        if self.in_array("write_values_int")? {
            if let Some(element) =
                self.array_element("write_values_int", INT_ELEMENTS, values.len())?
            {
                self.int_element_bytes(element, values)?;
                self.fill_array(values.len());
            }
            return Ok(());
        }
        self.write_array_header("write_values_int", ValueType::Int, values.len())?;
        self.io.write_i32_slice(values)?;
        self.finish_value(ValueType::Int);
        Ok(())
    }

    fn write_values_long(&mut self, values: &[i64]) -> Result<()> {
        if self.in_array("write_values_long")? {
            self.array_element("write_values_long", &[ValueType::Long], values.len())?;
            self.io.write_i64_slice(values)?;
            self.fill_array(values.len());
            return Ok(());
        }
        self.write_array_header("write_values_long", ValueType::Long, values.len())?;
        self.io.write_i64_slice(values)?;
        self.finish_value(ValueType::Long);
        Ok(())
    }

    fn write_values_float(&mut self, values: &[f32]) -> Result<()> {
        if self.in_array("write_values_float")? {
            self.array_element("write_values_float", &[ValueType::Float], values.len())?;
            self.io.write_f32_slice(values)?;
            self.fill_array(values.len());
            return Ok(());
        }
        self.write_array_header("write_values_float", ValueType::Float, values.len())?;
        self.io.write_f32_slice(values)?;
        self.finish_value(ValueType::Float);
        Ok(())
    }

    fn write_values_double(&mut self, values: &[f64]) -> Result<()> {
        if self.in_array("write_values_double")? {
            self.array_element("write_values_double", &[ValueType::Double], values.len())?;
            self.io.write_f64_slice(values)?;
            self.fill_array(values.len());
            return Ok(());
        }
        self.write_array_header("write_values_double", ValueType::Double, values.len())?;
        self.io.write_f64_slice(values)?;
        self.finish_value(ValueType::Double);
        Ok(())
    }

    fn start_array(&mut self, value_type: ValueType, len: usize) -> Result<()> {
        self.require_no_array("start_array")?;
        self.write_array_header("start_array", value_type, len)?;
        self.array = Some(ArrayState {
            element: value_type,
            len,
            written: 0,
        });
        self.finish_value(value_type);
        Ok(())
    }

    fn end_array(&mut self) -> Result<()> {
        self.check_open("end_array")?;
        let state = self
            .array
            .ok_or_else(|| self.reject("end_array", "no array is open"))?;
        if state.written != state.len {
            return Err(self.reject(
                "end_array",
                &format!("array declared {} values, {} written", state.len, state.written),
            ));
        }
        self.array = None;
        self.finish_value(state.element);
        Ok(())
    }

    fn write_cdata(&mut self, text: &str) -> Result<()> {
        self.require_document("write_cdata")?;
        self.require_no_array("write_cdata")?;
        if self.stack.is_empty() {
            return Err(self.reject("write_cdata", "CDATA must be inside an element"));
        }
        self.begin_content()?;
        self.io.write_token_type(TokenType::CDataSection)?;
        self.io.write_string(text)?;
        self.last_event = EventType::CData;
        Ok(())
    }

    fn write_whitespace(&mut self, text: &str) -> Result<()> {
        self.require_document("write_whitespace")?;
        self.require_no_array("write_whitespace")?;
        if self.stack.is_empty() {
            return Err(self.reject("write_whitespace", "whitespace must be inside an element"));
        }
        self.begin_content()?;
        self.io.write_token_type(TokenType::Whitespace)?;
        self.io.write_string(text)?;
        self.last_event = EventType::Space;
        Ok(())
    }

    fn write_comment(&mut self, text: &str) -> Result<()> {
        self.require_document("write_comment")?;
        self.require_no_array("write_comment")?;
        self.begin_content()?;
        self.io.write_token_type(TokenType::Comment)?;
        self.io.write_string(text)?;
        self.last_event = EventType::Comment;
        Ok(())
    }

    fn string_table_reference(&mut self, value: &str) -> Result<usize> {
        self.check_open("string_table_reference")?;
        Ok(self.strings.intern(value))
    }

    fn write_string_table_value(&mut self, index: usize) -> Result<()> {
        self.require_no_array("write_string_table_value")?;
        self.strings.check_defined(index)?;
        self.prepare_value("write_string_table_value")?;
        self.flush_strings()?;
        self.io.write_token_type(TokenType::CharContentRef)?;
        self.io.write_count(index as u64)?;
        self.finish_value(ValueType::String);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.check_open("flush")?;
        if self.stack.last().is_some_and(|e| !e.has_content) {
            // The element start token still needs patching.
            return Ok(());
        }
        self.io.flush()
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        if self.last_event != EventType::EndDocument {
            log::debug!("[bxml::writer] closed before END_DOCUMENT (last event {})", self.last_event);
        }
        self.open = false;
        self.io.close()
    }
}

impl<W: Write> std::fmt::Debug for StreamWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWriter")
            .field("last_event", &self.last_event)
            .field("depth", &self.stack.len())
            .field("position", &self.io.position())
            .field("open", &self.open)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Source;
    use crate::model::ReaderOptions;
    use crate::reader::{BxmlReader, StreamReader};

    /// Header (21 bytes) plus the XML declaration for "1.0" (6 bytes).
    const PREAMBLE_LEN: usize = 27;

    fn writer() -> StreamWriter<Vec<u8>> {
        let mut w = StreamWriter::new(Vec::new(), EncodingOptions::default()).unwrap();
        w.write_start_document().unwrap();
        w
    }

    fn body(w: StreamWriter<Vec<u8>>) -> Vec<u8> {
        let bytes = w.into_inner().unwrap();
        bytes[PREAMBLE_LEN..].to_vec()
    }

    #[test]
    fn test_empty_element_is_patched() {
        let mut w = writer();
        w.write_start_element("", "root").unwrap();
        w.write_end_attributes().unwrap();
        w.write_end_element().unwrap();
        w.write_end_document().unwrap();
        let body = body(w);
        assert_eq!(&body[..9], &[0x30, 1, 4, b'r', b'o', b'o', b't', 0x00, 0]);
        assert_eq!(body[9], TokenType::Trailer.code());
    }

    #[test]
    fn test_content_and_attributes_patch_start_token() {
        let mut w = writer();
        w.write_start_element("", "a").unwrap();
        w.write_attribute("", "id", "x").unwrap();
        w.write_end_attributes().unwrap();
        w.write_value_int(7).unwrap();
        w.write_end_element().unwrap();
        w.write_end_document().unwrap();
        let body = body(w);
        // Fragment [a], element start, fragment [id], attribute, list end, content.
        assert_eq!(&body[..4], &[0x30, 1, 1, b'a']);
        assert_eq!(body[4], TokenType::ContentAttrElement.code());
        assert_eq!(&body[6..10], &[0x30, 1, 2, b'i']);
        assert_eq!(&body[11..13], &[0x11, 1]);
        assert_eq!(&body[13..17], &[0x13, 0xFA, 1, b'x']);
        assert_eq!(&body[17..21], &[0x12, 0x13, 7, 0x10]);
    }

    #[test]
    fn test_narrowest_int_encoding() {
        let mut w = writer();
        w.write_start_element("", "v").unwrap();
        w.write_value_int(240).unwrap();
        w.write_value_int(-1).unwrap();
        w.write_value_int(40_000).unwrap();
        w.write_value_int(70_000).unwrap();
        w.write_end_element().unwrap();
        let body = body(w);
        let values = &body[6..];
        assert_eq!(&values[..4], &[0x13, 0xF2, 0x00, 0xF0]);
        assert_eq!(&values[4..8], &[0x13, 0xF2, 0xFF, 0xFF]);
        assert_eq!(&values[8..12], &[0x13, 0xF3, 0x9C, 0x40]);
        assert_eq!(&values[12..18], &[0x13, 0xF4, 0x00, 0x01, 0x11, 0x70]);
    }

    #[test]
    fn test_second_root_rejected() {
        let mut w = writer();
        w.write_start_element("", "a").unwrap();
        w.write_end_element().unwrap();
        let result = w.write_start_element("", "b");
        assert!(matches!(result, Err(Error::IllegalState { .. })));
    }

    #[test]
    fn test_array_length_checked() {
        let mut w = writer();
        w.write_start_element("", "a").unwrap();
        w.start_array(ValueType::Int, 3).unwrap();
        w.write_values_int(&[1, 2]).unwrap();
        assert!(matches!(w.end_array(), Err(Error::IllegalState { .. })));
        assert!(w.write_values_int(&[3, 4]).is_err());
        w.write_value_int(3).unwrap();
        w.end_array().unwrap();
        assert_eq!(w.last_event(), EventType::ValueInt);
        assert!(matches!(
            w.start_array(ValueType::String, 1),
            Err(Error::Encode(EncodeError::InvalidArrayElementType { .. }))
        ));
    }

    #[test]
    fn test_failed_ushort_fill_writes_nothing() {
        let mut w = writer();
        w.write_start_element("", "a").unwrap();
        w.start_array(ValueType::UShort, 3).unwrap();
        assert!(w.write_values_int(&[7, 8, -1]).is_err());
        w.write_values_int(&[1, 2, 3]).unwrap();
        w.end_array().unwrap();
        w.write_end_element().unwrap();
        w.write_end_document().unwrap();
        let bytes = w.into_inner().unwrap();

        let mut r = StreamReader::open(Source::from_bytes(bytes), ReaderOptions::default()).unwrap();
        r.next().unwrap();
        assert_eq!(r.next().unwrap(), EventType::ValueInt);
        assert_eq!(r.value_count().unwrap(), 3);
        let mut values = [0; 3];
        r.get_int_values(&mut values).unwrap();
        assert_eq!(values, [1, 2, 3]);
        assert_eq!(r.next().unwrap(), EventType::EndElement);
        assert_eq!(r.next().unwrap(), EventType::EndDocument);
    }

    #[test]
    fn test_value_after_write_attribute_is_content() {
        let mut w = writer();
        w.write_start_element("", "a").unwrap();
        w.write_attribute("", "id", "x").unwrap();
        w.write_value_int(7).unwrap();
        // The attribute list is closed by the content.
        assert!(w.write_start_attribute("", "late").is_err());
        w.write_end_element().unwrap();
        w.write_end_document().unwrap();
        let bytes = w.into_inner().unwrap();

        let mut r = StreamReader::open(Source::from_bytes(bytes), ReaderOptions::default()).unwrap();
        r.next().unwrap();
        assert_eq!(r.attribute_value("", "id").unwrap(), Some("x"));
        assert_eq!(r.next().unwrap(), EventType::ValueInt);
        assert_eq!(r.get_int_value().unwrap(), 7);
        assert_eq!(r.next().unwrap(), EventType::EndElement);
    }

    #[test]
    fn test_short_array_range_checked() {
        let mut w = writer();
        w.write_start_element("", "a").unwrap();
        w.start_array(ValueType::Short, 2).unwrap();
        w.write_value_int(-5).unwrap();
        assert!(w.write_value_int(100_000).is_err());
        assert!(w.write_value_long(1).is_err());
    }

    #[test]
    fn test_unbound_namespace_rejected() {
        let mut w = writer();
        let result = w.write_start_element("urn:x", "a");
        assert!(matches!(
            result,
            Err(Error::Encode(EncodeError::UnboundNamespace { .. }))
        ));
        w.set_prefix("x", "urn:x").unwrap();
        w.write_start_element("urn:x", "a").unwrap();
        w.write_namespace("x", "urn:x").unwrap();
        assert_eq!(w.last_event(), EventType::NamespaceDecl);
        // Attributes never take the default namespace.
        w.write_default_namespace("urn:d").unwrap();
        assert!(w.write_start_attribute("urn:d", "k").is_err());
    }

    #[test]
    fn test_value_predecessors() {
        let mut w = writer();
        assert!(w.write_value_int(1).is_err());
        w.write_start_element("", "a").unwrap();
        w.write_start_element("", "b").unwrap();
        w.write_end_element().unwrap();
        // END_ELEMENT is not a legal predecessor of a value.
        assert!(w.write_value_str("x").is_err());
        w.write_comment("c").unwrap();
        w.write_value_str("x").unwrap();
        assert_eq!(w.last_event(), EventType::ValueString);
    }

    #[test]
    fn test_string_table_value() {
        let mut w = writer();
        let crs = w.string_table_reference("EPSG:4326").unwrap();
        assert_eq!(w.string_table_reference("EPSG:4326").unwrap(), crs);
        assert!(w.write_string_table_value(crs + 1).is_err());
        w.write_start_element("", "a").unwrap();
        w.write_start_attribute("", "srs").unwrap();
        w.write_string_table_value(crs).unwrap();
        assert_eq!(w.last_event(), EventType::ValueString);
        w.write_end_document().unwrap();
        assert_eq!(w.last_event(), EventType::EndDocument);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut w = writer();
        w.close().unwrap();
        w.close().unwrap();
        assert!(!w.is_open());
        assert!(matches!(
            w.write_start_element("", "a"),
            Err(Error::Closed { .. })
        ));
    }
}
