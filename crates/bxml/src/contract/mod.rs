//! Contract-checking wrappers for readers and writers.
//!
//! [`CheckedReader`] and [`CheckedWriter`] keep their own shadow of the event
//! state machine and check every call against it before delegating, then
//! check the state the wrapped implementation left behind. Failures surface
//! as [`Error::Contract`], distinct from the core's own state errors.
//!
//! With the `contracts` feature disabled the checks compile away and both
//! wrappers delegate directly.

use crate::codec::ValueType;
use crate::error::{ContractViolation, Error, Phase, Result};
use crate::model::{Attribute, EventType, Header, NamespaceDecl, QName, Standalone};
use crate::reader::BxmlReader;
use crate::writer::BxmlWriter;

const ENABLED: bool = cfg!(feature = "contracts");

fn check(
    ok: bool,
    operation: &'static str,
    phase: Phase,
    detail: impl FnOnce() -> String,
) -> Result<()> {
    if !ENABLED || ok {
        return Ok(());
    }
    log::debug!("[bxml::contract] {operation}: {phase} failed");
    Err(Error::Contract(ContractViolation {
        operation,
        phase,
        detail: detail(),
    }))
}

fn pre(ok: bool, operation: &'static str, detail: impl FnOnce() -> String) -> Result<()> {
    check(ok, operation, Phase::Pre, detail)
}

fn post(ok: bool, operation: &'static str, detail: impl FnOnce() -> String) -> Result<()> {
    check(ok, operation, Phase::Post, detail)
}

// =============================================================================
// READER
// =============================================================================

const INT_EVENTS: &[EventType] = &[EventType::ValueByte, EventType::ValueInt];
const LONG_EVENTS: &[EventType] = &[EventType::ValueByte, EventType::ValueInt, EventType::ValueLong];
const DOUBLE_EVENTS: &[EventType] = &[EventType::ValueFloat, EventType::ValueDouble];

fn has_values(event: EventType) -> bool {
    event.is_value() || event == EventType::Comment
}

/// Contract-checking [`BxmlReader`].
#[derive(Debug)]
pub struct CheckedReader<R: BxmlReader> {
    inner: R,
    event: EventType,
    value_count: usize,
    values_read: usize,
}

impl<R: BxmlReader> CheckedReader<R> {
    pub fn new(inner: R) -> Self {
        let event = inner.event_type();
        let value_count = if has_values(event) {
            inner.value_count().unwrap_or_default()
        } else {
            0
        };
        Self {
            values_read: inner.values_read(),
            inner,
            event,
            value_count,
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn require_open(&self, operation: &'static str) -> Result<()> {
        pre(self.inner.is_open(), operation, || "reader is closed".into())
    }

    fn require_event(&self, operation: &'static str, accepted: &[EventType]) -> Result<()> {
        self.require_open(operation)?;
        pre(accepted.contains(&self.event), operation, || {
            format!("current event is {}", self.event)
        })
    }

    /// Records the event the inner reader moved to and checks it agrees.
    fn moved(&mut self, operation: &'static str, event: EventType) -> Result<EventType> {
        post(event == self.inner.event_type(), operation, || {
            format!("returned {event}, cursor is at {}", self.inner.event_type())
        })?;
        post(self.inner.values_read() == 0, operation, || {
            "new event starts with values already read".into()
        })?;
        self.event = event;
        self.values_read = 0;
        self.value_count = if has_values(event) {
            self.inner.value_count()?
        } else {
            0
        };
        Ok(event)
    }

    fn before_values(
        &self,
        operation: &'static str,
        accepted: &[EventType],
        n: usize,
    ) -> Result<()> {
        self.require_event(operation, accepted)?;
        pre(self.values_read + n <= self.value_count, operation, || {
            format!(
                "{n} values requested, {} of {} already read",
                self.values_read, self.value_count
            )
        })
    }

    fn after_values(&mut self, operation: &'static str, n: usize) -> Result<()> {
        self.values_read += n;
        post(self.inner.values_read() == self.values_read, operation, || {
            format!(
                "read count is {}, expected {}",
                self.inner.values_read(),
                self.values_read
            )
        })
    }
}

macro_rules! checked_value {
    ($name:ident, $ty:ty, $accepted:expr) => {
        fn $name(&mut self) -> Result<$ty> {
            self.before_values(stringify!($name), $accepted, 1)?;
            let value = self.inner.$name()?;
            self.after_values(stringify!($name), 1)?;
            Ok(value)
        }
    };
}

macro_rules! checked_values {
    ($name:ident, $ty:ty, $accepted:expr) => {
        fn $name(&mut self, dst: &mut [$ty]) -> Result<()> {
            self.before_values(stringify!($name), $accepted, dst.len())?;
            self.inner.$name(dst)?;
            self.after_values(stringify!($name), dst.len())
        }
    };
}

impl<R: BxmlReader> BxmlReader for CheckedReader<R> {
    fn header(&self) -> &Header {
        self.inner.header()
    }

    fn event_type(&self) -> EventType {
        self.inner.event_type()
    }

    fn next(&mut self) -> Result<EventType> {
        self.require_open("next")?;
        pre(self.event != EventType::EndDocument, "next", || {
            "already at END_DOCUMENT".into()
        })?;
        let event = self.inner.next()?;
        self.moved("next", event)
    }

    fn next_tag(&mut self) -> Result<EventType> {
        self.require_open("next_tag")?;
        pre(self.event != EventType::EndDocument, "next_tag", || {
            "already at END_DOCUMENT".into()
        })?;
        let event = self.inner.next_tag()?;
        post(
            event.is_tag() || event == EventType::EndDocument,
            "next_tag",
            || format!("stopped at {event}"),
        )?;
        self.moved("next_tag", event)
    }

    fn has_next(&self) -> bool {
        self.inner.has_next()
    }

    fn skip_element(&mut self) -> Result<()> {
        self.require_event("skip_element", &[EventType::StartElement])?;
        let depth = self.inner.depth();
        self.inner.skip_element()?;
        let event = self.inner.event_type();
        post(
            event == EventType::EndElement && self.inner.depth() + 1 == depth,
            "skip_element",
            || format!("stopped at {event}, depth {}", self.inner.depth()),
        )?;
        self.moved("skip_element", event).map(|_| ())
    }

    fn depth(&self) -> usize {
        self.inner.depth()
    }

    fn name(&self) -> Result<&QName> {
        self.require_event("name", &[EventType::StartElement, EventType::EndElement])?;
        self.inner.name()
    }

    fn attribute_count(&self) -> Result<usize> {
        self.require_event("attribute_count", &[EventType::StartElement])?;
        self.inner.attribute_count()
    }

    fn attribute(&self, index: usize) -> Result<&Attribute> {
        self.require_event("attribute", &[EventType::StartElement])?;
        let count = self.inner.attribute_count()?;
        pre(index < count, "attribute", || {
            format!("index {index} out of {count} attributes")
        })?;
        self.inner.attribute(index)
    }

    fn attribute_value(&self, namespace_uri: &str, local_name: &str) -> Result<Option<&str>> {
        self.require_event("attribute_value", &[EventType::StartElement])?;
        self.inner.attribute_value(namespace_uri, local_name)
    }

    fn namespace_count(&self) -> Result<usize> {
        self.require_event("namespace_count", &[EventType::StartElement])?;
        self.inner.namespace_count()
    }

    fn namespace_decl(&self, index: usize) -> Result<&NamespaceDecl> {
        self.require_event("namespace_decl", &[EventType::StartElement])?;
        let count = self.inner.namespace_count()?;
        pre(index < count, "namespace_decl", || {
            format!("index {index} out of {count} declarations")
        })?;
        self.inner.namespace_decl(index)
    }

    fn namespace_uri_for(&self, prefix: &str) -> Option<&str> {
        self.inner.namespace_uri_for(prefix)
    }

    fn is_namespace_aware(&self) -> bool {
        self.inner.is_namespace_aware()
    }

    fn value_count(&self) -> Result<usize> {
        self.require_open("value_count")?;
        pre(has_values(self.event), "value_count", || {
            format!("current event is {}", self.event)
        })?;
        let count = self.inner.value_count()?;
        post(count == self.value_count, "value_count", || {
            format!("count changed from {} to {count}", self.value_count)
        })?;
        Ok(count)
    }

    fn values_read(&self) -> usize {
        self.inner.values_read()
    }

    checked_value!(get_bool_value, bool, &[EventType::ValueBool]);
    checked_value!(get_byte_value, i8, &[EventType::ValueByte]);
    checked_value!(get_int_value, i32, INT_EVENTS);
    checked_value!(get_long_value, i64, LONG_EVENTS);
    checked_value!(get_float_value, f32, &[EventType::ValueFloat]);
    checked_value!(get_double_value, f64, DOUBLE_EVENTS);

    fn get_string_value(&mut self) -> Result<String> {
        self.require_open("get_string_value")?;
        pre(has_values(self.event), "get_string_value", || {
            format!("current event is {}", self.event)
        })?;
        pre(
            self.value_count == 0 || self.values_read < self.value_count,
            "get_string_value",
            || "event already consumed".into(),
        )?;
        let text = self.inner.get_string_value()?;
        self.values_read = self.value_count;
        post(
            self.inner.values_read() == self.value_count,
            "get_string_value",
            || "event not fully consumed".into(),
        )?;
        Ok(text)
    }

    checked_values!(get_bool_values, bool, &[EventType::ValueBool]);
    checked_values!(get_byte_values, i8, &[EventType::ValueByte]);
    checked_values!(get_int_values, i32, INT_EVENTS);
    checked_values!(get_long_values, i64, LONG_EVENTS);
    checked_values!(get_float_values, f32, &[EventType::ValueFloat]);
    checked_values!(get_double_values, f64, DOUBLE_EVENTS);

    fn xml_version(&self) -> Option<&str> {
        self.inner.xml_version()
    }

    fn standalone(&self) -> Standalone {
        self.inner.standalone()
    }

    fn supports_random_access(&self) -> bool {
        self.inner.supports_random_access()
    }

    fn element_position(&self) -> Result<u64> {
        self.require_event("element_position", &[EventType::StartElement])?;
        pre(self.inner.supports_random_access(), "element_position", || {
            "medium does not support random access".into()
        })?;
        self.inner.element_position()
    }

    fn set_position(&mut self, position: u64) -> Result<EventType> {
        self.require_event(
            "set_position",
            &[
                EventType::StartDocument,
                EventType::StartElement,
                EventType::EndDocument,
            ],
        )?;
        pre(self.inner.supports_random_access(), "set_position", || {
            "medium does not support random access".into()
        })?;
        let event = self.inner.set_position(position)?;
        post(event == EventType::StartElement, "set_position", || {
            format!("landed on {event}")
        })?;
        self.moved("set_position", event)
    }

    fn indexed_paths(&self) -> Vec<&str> {
        self.inner.indexed_paths()
    }

    fn index_positions(&self, path: &str) -> Option<&[u64]> {
        self.inner.index_positions(path)
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()?;
        post(!self.inner.is_open(), "close", || "reader still open".into())
    }
}

// =============================================================================
// WRITER
// =============================================================================

/// Shadow of the writer state machine.
#[derive(Debug, Clone, Copy)]
struct ArrayShadow {
    len: usize,
    written: usize,
}

/// Contract-checking [`BxmlWriter`].
#[derive(Debug)]
pub struct CheckedWriter<W: BxmlWriter> {
    inner: W,
    last: EventType,
    depth: usize,
    attributes_open: bool,
    in_attribute: bool,
    array: Option<ArrayShadow>,
    root_written: bool,
}

impl<W: BxmlWriter> CheckedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            last: inner.last_event(),
            depth: inner.depth(),
            inner,
            attributes_open: false,
            in_attribute: false,
            array: None,
            root_written: false,
        }
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn in_document(&self, operation: &'static str) -> Result<()> {
        pre(self.inner.is_open(), operation, || "writer is closed".into())?;
        pre(
            !matches!(self.last, EventType::None | EventType::EndDocument),
            operation,
            || format!("no document is open (last event {})", self.last),
        )
    }

    fn no_array(&self, operation: &'static str) -> Result<()> {
        pre(self.array.is_none(), operation, || "an array is open".into())
    }

    fn in_attribute_list(&self, operation: &'static str) -> Result<()> {
        self.in_document(operation)?;
        self.no_array(operation)?;
        pre(self.attributes_open, operation, || {
            format!("attribute list is closed (last event {})", self.last)
        })
    }

    /// Checks the resulting event and depth, then records them.
    fn wrote(&mut self, operation: &'static str, expected: EventType) -> Result<()> {
        let last = self.inner.last_event();
        post(last == expected, operation, || {
            format!("last event is {last}, expected {expected}")
        })?;
        let depth = self.inner.depth();
        post(depth == self.depth, operation, || {
            format!("depth is {depth}, expected {}", self.depth)
        })?;
        self.last = expected;
        Ok(())
    }

    fn content_starts(&mut self) {
        self.attributes_open = false;
        self.in_attribute = false;
    }

    fn before_value(&self, operation: &'static str) -> Result<()> {
        self.in_document(operation)?;
        self.no_array(operation)?;
        pre(self.depth > 0, operation, || "no open element".into())?;
        pre(
            self.last.is_value()
                || matches!(
                    self.last,
                    EventType::StartElement
                        | EventType::Attribute
                        | EventType::AttributesEnd
                        | EventType::Comment
                ),
            operation,
            || format!("a value cannot follow {}", self.last),
        )
    }

    fn after_value(&mut self, operation: &'static str, expected: EventType) -> Result<()> {
        if !self.in_attribute {
            self.content_starts();
        }
        self.wrote(operation, expected)
    }

    fn before_array_fill(&self, operation: &'static str, n: usize) -> Result<()> {
        pre(self.inner.is_open(), operation, || "writer is closed".into())?;
        if let Some(array) = self.array {
            pre(array.written + n <= array.len, operation, || {
                format!("array declared {} values, {} written", array.len, array.written)
            })?;
        }
        Ok(())
    }

    fn after_array_fill(&mut self, operation: &'static str, n: usize) -> Result<()> {
        if let Some(array) = self.array.as_mut() {
            array.written += n;
        }
        let last = self.inner.last_event();
        post(last == self.last, operation, || {
            format!("last event changed to {last} inside an array")
        })
    }
}

macro_rules! checked_write_value {
    ($name:ident, $ty:ty, $value_type:expr) => {
        fn $name(&mut self, value: $ty) -> Result<()> {
            if self.array.is_some() {
                self.before_array_fill(stringify!($name), 1)?;
                self.inner.$name(value)?;
                return self.after_array_fill(stringify!($name), 1);
            }
            self.before_value(stringify!($name))?;
            self.inner.$name(value)?;
            self.after_value(stringify!($name), EventType::for_value_type($value_type))
        }
    };
}

macro_rules! checked_write_values {
    ($name:ident, $ty:ty, $value_type:expr) => {
        fn $name(&mut self, values: &[$ty]) -> Result<()> {
            if self.array.is_some() {
                self.before_array_fill(stringify!($name), values.len())?;
                self.inner.$name(values)?;
                return self.after_array_fill(stringify!($name), values.len());
            }
            self.before_value(stringify!($name))?;
            self.inner.$name(values)?;
            self.after_value(stringify!($name), EventType::for_value_type($value_type))
        }
    };
}

impl<W: BxmlWriter> BxmlWriter for CheckedWriter<W> {
    fn last_event(&self) -> EventType {
        self.inner.last_event()
    }

    fn depth(&self) -> usize {
        self.inner.depth()
    }

    fn write_start_document(&mut self) -> Result<()> {
        pre(self.inner.is_open(), "write_start_document", || "writer is closed".into())?;
        pre(self.last == EventType::None, "write_start_document", || {
            format!("document already started (last event {})", self.last)
        })?;
        self.inner.write_start_document()?;
        self.wrote("write_start_document", EventType::StartDocument)
    }

    fn write_end_document(&mut self) -> Result<()> {
        self.in_document("write_end_document")?;
        self.no_array("write_end_document")?;
        self.inner.write_end_document()?;
        self.depth = 0;
        self.content_starts();
        self.wrote("write_end_document", EventType::EndDocument)
    }

    fn write_start_element(&mut self, namespace_uri: &str, local_name: &str) -> Result<()> {
        self.in_document("write_start_element")?;
        self.no_array("write_start_element")?;
        pre(
            self.depth > 0 || !self.root_written,
            "write_start_element",
            || "document already has a root element".into(),
        )?;
        self.inner.write_start_element(namespace_uri, local_name)?;
        self.depth += 1;
        self.root_written = true;
        self.attributes_open = true;
        self.in_attribute = false;
        self.wrote("write_start_element", EventType::StartElement)
    }

    fn write_end_element(&mut self) -> Result<()> {
        self.in_document("write_end_element")?;
        self.no_array("write_end_element")?;
        pre(self.depth > 0, "write_end_element", || "no open element".into())?;
        self.inner.write_end_element()?;
        self.depth -= 1;
        self.content_starts();
        self.wrote("write_end_element", EventType::EndElement)
    }

    fn write_start_attribute(&mut self, namespace_uri: &str, local_name: &str) -> Result<()> {
        self.in_attribute_list("write_start_attribute")?;
        self.inner.write_start_attribute(namespace_uri, local_name)?;
        self.in_attribute = true;
        self.wrote("write_start_attribute", EventType::Attribute)
    }

    fn write_attribute(&mut self, namespace_uri: &str, local_name: &str, value: &str) -> Result<()> {
        self.in_attribute_list("write_attribute")?;
        self.inner.write_attribute(namespace_uri, local_name, value)?;
        self.in_attribute = false;
        self.wrote("write_attribute", EventType::ValueString)
    }

    fn write_end_attributes(&mut self) -> Result<()> {
        self.in_attribute_list("write_end_attributes")?;
        self.inner.write_end_attributes()?;
        self.content_starts();
        self.wrote("write_end_attributes", EventType::AttributesEnd)
    }

    fn set_prefix(&mut self, prefix: &str, namespace_uri: &str) -> Result<()> {
        self.in_document("set_prefix")?;
        self.inner.set_prefix(prefix, namespace_uri)?;
        let last = self.last;
        self.wrote("set_prefix", last)
    }

    fn write_namespace(&mut self, prefix: &str, namespace_uri: &str) -> Result<()> {
        self.in_attribute_list("write_namespace")?;
        self.inner.write_namespace(prefix, namespace_uri)?;
        self.in_attribute = false;
        self.wrote("write_namespace", EventType::NamespaceDecl)
    }

    fn write_default_namespace(&mut self, namespace_uri: &str) -> Result<()> {
        self.in_attribute_list("write_default_namespace")?;
        self.inner.write_default_namespace(namespace_uri)?;
        self.in_attribute = false;
        self.wrote("write_default_namespace", EventType::NamespaceDecl)
    }

    checked_write_value!(write_value_bool, bool, ValueType::Bool);
    checked_write_value!(write_value_byte, i8, ValueType::Byte);
    checked_write_value!(write_value_int, i32, ValueType::Int);
    checked_write_value!(write_value_long, i64, ValueType::Long);
    checked_write_value!(write_value_float, f32, ValueType::Float);
    checked_write_value!(write_value_double, f64, ValueType::Double);

    fn write_value_str(&mut self, value: &str) -> Result<()> {
        self.before_value("write_value_str")?;
        self.inner.write_value_str(value)?;
        self.after_value("write_value_str", EventType::ValueString)
    }

    checked_write_values!(write_values_bool, bool, ValueType::Bool);
    checked_write_values!(write_values_byte, i8, ValueType::Byte);
    checked_write_values!(write_values_int, i32, ValueType::Int);
    checked_write_values!(write_values_long, i64, ValueType::Long);
    checked_write_values!(write_values_float, f32, ValueType::Float);
    checked_write_values!(write_values_double, f64, ValueType::Double);

    fn start_array(&mut self, value_type: ValueType, len: usize) -> Result<()> {
        self.before_value("start_array")?;
        self.inner.start_array(value_type, len)?;
        self.array = Some(ArrayShadow { len, written: 0 });
        self.after_value("start_array", EventType::for_value_type(value_type))
    }

    fn end_array(&mut self) -> Result<()> {
        pre(self.inner.is_open(), "end_array", || "writer is closed".into())?;
        pre(self.array.is_some(), "end_array", || "no array is open".into())?;
        if let Some(array) = self.array {
            pre(array.written == array.len, "end_array", || {
                format!("array declared {} values, {} written", array.len, array.written)
            })?;
        }
        self.inner.end_array()?;
        self.array = None;
        let last = self.last;
        self.wrote("end_array", last)
    }

    fn write_cdata(&mut self, text: &str) -> Result<()> {
        self.in_document("write_cdata")?;
        self.no_array("write_cdata")?;
        pre(self.depth > 0, "write_cdata", || "no open element".into())?;
        self.inner.write_cdata(text)?;
        self.content_starts();
        self.wrote("write_cdata", EventType::CData)
    }

    fn write_whitespace(&mut self, text: &str) -> Result<()> {
        self.in_document("write_whitespace")?;
        self.no_array("write_whitespace")?;
        pre(self.depth > 0, "write_whitespace", || "no open element".into())?;
        self.inner.write_whitespace(text)?;
        self.content_starts();
        self.wrote("write_whitespace", EventType::Space)
    }

    fn write_comment(&mut self, text: &str) -> Result<()> {
        self.in_document("write_comment")?;
        self.no_array("write_comment")?;
        self.inner.write_comment(text)?;
        self.content_starts();
        self.wrote("write_comment", EventType::Comment)
    }

    fn string_table_reference(&mut self, value: &str) -> Result<usize> {
        pre(self.inner.is_open(), "string_table_reference", || "writer is closed".into())?;
        self.inner.string_table_reference(value)
    }

    fn write_string_table_value(&mut self, index: usize) -> Result<()> {
        self.before_value("write_string_table_value")?;
        self.inner.write_string_table_value(index)?;
        self.after_value("write_string_table_value", EventType::ValueString)
    }

    fn flush(&mut self) -> Result<()> {
        pre(self.inner.is_open(), "flush", || "writer is closed".into())?;
        self.inner.flush()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()?;
        post(!self.inner.is_open(), "close", || "writer still open".into())
    }
}

#[cfg(all(test, feature = "contracts"))]
mod tests {
    use super::*;
    use crate::io::Source;
    use crate::model::{EncodingOptions, ReaderOptions};
    use crate::reader::StreamReader;
    use crate::writer::StreamWriter;

    fn writer() -> CheckedWriter<StreamWriter<Vec<u8>>> {
        let inner = StreamWriter::new(Vec::new(), EncodingOptions::default()).unwrap();
        CheckedWriter::new(inner)
    }

    fn assert_violation<T: std::fmt::Debug>(result: Result<T>, phase: Phase) {
        match result {
            Err(Error::Contract(violation)) => assert_eq!(violation.phase, phase),
            other => panic!("expected contract violation, got {other:?}"),
        }
    }

    #[test]
    fn test_writer_rejects_out_of_order_calls() {
        let mut w = writer();
        assert_violation(w.write_start_element("", "a"), Phase::Pre);
        w.write_start_document().unwrap();
        assert_violation(w.write_start_document(), Phase::Pre);
        assert_violation(w.write_end_element(), Phase::Pre);
        w.write_start_element("", "a").unwrap();
        w.write_end_attributes().unwrap();
        assert_violation(w.write_end_attributes(), Phase::Pre);
        assert_violation(w.end_array(), Phase::Pre);
        w.start_array(ValueType::Double, 2).unwrap();
        assert_violation(w.write_values_double(&[1.0, 2.0, 3.0]), Phase::Pre);
        assert_violation(w.write_comment("x"), Phase::Pre);
        w.write_values_double(&[1.0, 2.0]).unwrap();
        w.end_array().unwrap();
        w.write_end_element().unwrap();
        assert_violation(w.write_start_element("", "b"), Phase::Pre);
        w.write_end_document().unwrap();
        assert_eq!(w.last_event(), EventType::EndDocument);
    }

    #[test]
    fn test_value_after_write_attribute_closes_list() {
        let mut w = writer();
        w.write_start_document().unwrap();
        w.write_start_element("", "a").unwrap();
        w.write_attribute("", "id", "x").unwrap();
        w.write_value_int(7).unwrap();
        assert_violation(w.write_start_attribute("", "late"), Phase::Pre);
        assert_violation(w.write_end_attributes(), Phase::Pre);
        w.write_end_document().unwrap();
    }

    #[test]
    fn test_reader_rejects_reads_beyond_value_count() {
        let mut w = StreamWriter::new(Vec::new(), EncodingOptions::default()).unwrap();
        w.write_start_document().unwrap();
        w.write_start_element("", "a").unwrap();
        w.write_values_int(&[1, 2]).unwrap();
        w.write_end_document().unwrap();
        let bytes = w.into_inner().unwrap();

        let inner = StreamReader::open(Source::from_bytes(bytes), ReaderOptions::default()).unwrap();
        let mut r = CheckedReader::new(inner);
        assert_violation(r.get_int_value(), Phase::Pre);
        assert_eq!(r.next().unwrap(), EventType::StartElement);
        assert_eq!(r.next().unwrap(), EventType::ValueInt);
        assert_eq!(r.value_count().unwrap(), 2);
        let mut three = [0i32; 3];
        assert_violation(r.get_int_values(&mut three), Phase::Pre);
        assert_violation(r.get_double_value(), Phase::Pre);
        assert_eq!(r.get_int_value().unwrap(), 1);
        assert_eq!(r.get_long_value().unwrap(), 2);
        assert_violation(r.get_int_value(), Phase::Pre);
        assert_eq!(r.next().unwrap(), EventType::EndElement);
        assert_violation(r.skip_element(), Phase::Pre);
        assert_eq!(r.next().unwrap(), EventType::EndDocument);
        assert_violation(r.next(), Phase::Pre);
        r.close().unwrap();
        r.close().unwrap();
        assert_violation(r.next(), Phase::Pre);
    }
}

#[cfg(all(test, not(feature = "contracts")))]
mod passthrough_tests {
    use super::*;
    use crate::io::Source;
    use crate::model::{EncodingOptions, ReaderOptions};
    use crate::reader::StreamReader;
    use crate::writer::StreamWriter;

    fn is_illegal_state<T>(result: Result<T>) -> bool {
        matches!(result, Err(Error::IllegalState { .. }))
    }

    #[test]
    fn test_writer_misuse_reaches_the_core() {
        let inner = StreamWriter::new(Vec::new(), EncodingOptions::default()).unwrap();
        let mut w = CheckedWriter::new(inner);
        assert!(is_illegal_state(w.write_start_element("", "a")));
        w.write_start_document().unwrap();
        assert!(is_illegal_state(w.write_start_document()));
        assert!(is_illegal_state(w.write_end_element()));
        w.write_start_element("", "a").unwrap();
        w.start_array(ValueType::Int, 2).unwrap();
        assert!(is_illegal_state(w.write_values_int(&[1, 2, 3])));
        assert!(is_illegal_state(w.end_array()));
        w.write_values_int(&[1, 2]).unwrap();
        w.end_array().unwrap();
        w.write_end_document().unwrap();
        assert_eq!(w.last_event(), EventType::EndDocument);
    }

    #[test]
    fn test_reader_misuse_reaches_the_core() {
        let mut w = StreamWriter::new(Vec::new(), EncodingOptions::default()).unwrap();
        w.write_start_document().unwrap();
        w.write_start_element("", "a").unwrap();
        w.write_values_int(&[1, 2]).unwrap();
        w.write_end_document().unwrap();
        let bytes = w.into_inner().unwrap();

        let inner = StreamReader::open(Source::from_bytes(bytes), ReaderOptions::default()).unwrap();
        let mut r = CheckedReader::new(inner);
        assert!(is_illegal_state(r.get_int_value()));
        r.next().unwrap();
        assert_eq!(r.next().unwrap(), EventType::ValueInt);
        let mut three = [0i32; 3];
        assert!(is_illegal_state(r.get_int_values(&mut three)));
        assert!(is_illegal_state(r.get_double_value()));
        let mut two = [0i32; 2];
        r.get_int_values(&mut two).unwrap();
        assert_eq!(two, [1, 2]);
        assert_eq!(r.next().unwrap(), EventType::EndElement);
        assert_eq!(r.next().unwrap(), EventType::EndDocument);
        assert!(is_illegal_state(r.next()));
        r.close().unwrap();
        assert!(matches!(r.next(), Err(Error::Closed { .. })));
    }
}
