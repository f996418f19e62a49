//! Buffered byte-level writer.
//!
//! Bytes accumulate in a pooled buffer that is flushed to the sink once it
//! grows past [`DEFAULT_BUFFER_SIZE`]. With auto-flush disabled the buffer is
//! kept whole, so the cursor can be moved back with
//! [`set_position`](ByteWriter::set_position) to patch bytes written earlier.

use std::io::{self, Write};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::codec::charset::first_illegal_xml_char;
use crate::codec::count::{self, MAX_ENCODED_LEN};
use crate::codec::{Charset, TokenType};
use crate::error::{EncodeError, Error, Result};
use crate::io::ByteOrder;
use crate::io::buffer::{BufferPool, PooledBuffer};
use crate::limits::{DEFAULT_BUFFER_SIZE, MAX_STRING_LEN};

enum Sink<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.write_all(buf),
            Sink::Gzip(w) => w.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
        }
    }
}

/// Endian-aware buffered writer.
pub struct ByteWriter<W: Write> {
    sink: Option<Sink<W>>,
    buf: PooledBuffer<'static>,
    /// Cursor within `buf`; below `buf.len()` only while patching.
    pos: usize,
    /// Bytes already handed to the sink.
    flushed: u64,
    auto_flush: bool,
    order: ByteOrder,
    charset: Charset,
    strict_strings: bool,
    scratch: Vec<u8>,
    closed: bool,
}

impl<W: Write> ByteWriter<W> {
    /// Creates a writer over `sink`.
    pub fn new(sink: W, order: ByteOrder) -> Self {
        Self {
            sink: Some(Sink::Plain(sink)),
            buf: BufferPool::global().acquire(DEFAULT_BUFFER_SIZE),
            pos: 0,
            flushed: 0,
            auto_flush: true,
            order,
            charset: Charset::Utf8,
            strict_strings: false,
            scratch: Vec::new(),
            closed: false,
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn set_charset(&mut self, charset: Charset) {
        self.charset = charset;
    }

    /// Rejects strings containing characters outside the XML 1.0 `Char` production.
    pub fn set_strict_strings(&mut self, strict: bool) {
        self.strict_strings = strict;
    }

    /// Enables or disables flushing when the buffer fills up.
    pub fn set_auto_flush(&mut self, auto_flush: bool) {
        self.auto_flush = auto_flush;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Absolute offset of the next byte to be written.
    pub fn position(&self) -> u64 {
        self.flushed + self.pos as u64
    }

    /// Number of bytes buffered but not yet handed to the sink.
    pub fn cached_size(&self) -> usize {
        self.buf.len()
    }

    /// Moves the cursor to an absolute offset still held in the buffer.
    pub fn set_position(&mut self, position: u64) -> Result<()> {
        self.check_open("set_position")?;
        let end = self.flushed + self.buf.len() as u64;
        if position < self.flushed || position > end {
            return Err(Error::illegal_state(
                "set_position",
                format!(
                    "position {position} is outside the buffered range {}..={end}",
                    self.flushed
                ),
            ));
        }
        self.pos = (position - self.flushed) as usize;
        Ok(())
    }

    fn check_open(&self, operation: &'static str) -> Result<()> {
        if self.closed {
            Err(Error::Closed { operation })
        } else {
            Ok(())
        }
    }

    fn sink(&mut self) -> Result<&mut Sink<W>> {
        self.sink.as_mut().ok_or(Error::Closed { operation: "write" })
    }

    /// Writes `bytes` at the cursor, overwriting buffered bytes first.
    pub fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_open("write")?;
        let overlap = (self.buf.len() - self.pos).min(bytes.len());
        self.buf[self.pos..self.pos + overlap].copy_from_slice(&bytes[..overlap]);
        self.buf.extend_from_slice(&bytes[overlap..]);
        self.pos += bytes.len();
        if self.auto_flush && self.pos == self.buf.len() && self.buf.len() >= DEFAULT_BUFFER_SIZE {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let len = self.buf.len();
        let sink = self.sink.as_mut().ok_or(Error::Closed { operation: "flush" })?;
        sink.write_all(&self.buf)?;
        self.flushed += len as u64;
        self.buf.clear();
        self.pos = 0;
        Ok(())
    }

    /// Hands all buffered bytes to the sink and flushes it.
    pub fn flush(&mut self) -> Result<()> {
        self.check_open("flush")?;
        self.flush_buffer()?;
        self.sink()?.flush()?;
        Ok(())
    }

    /// Compresses everything written from now on with gzip.
    pub fn switch_to_gzip(&mut self) -> Result<()> {
        self.check_open("switch_to_gzip")?;
        self.flush_buffer()?;
        self.sink = match self.sink.take() {
            Some(Sink::Plain(w)) => Some(Sink::Gzip(GzEncoder::new(w, Compression::default()))),
            other => other,
        };
        Ok(())
    }

    /// Flushes, finishes compression, and marks the writer closed.
    /// The sink stays owned until [`into_inner`](Self::into_inner). Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush_buffer()?;
        match self.sink()? {
            Sink::Gzip(encoder) => encoder
                .try_finish()
                .map_err(|err| EncodeError::CompressionFailed(err.to_string()))?,
            Sink::Plain(w) => w.flush()?,
        }
        self.closed = true;
        Ok(())
    }

    /// Closes the writer and returns the sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.close()?;
        match self.sink.take() {
            Some(Sink::Plain(w)) => Ok(w),
            Some(Sink::Gzip(encoder)) => Ok(encoder.finish()?),
            None => Err(Error::Closed { operation: "into_inner" }),
        }
    }

    // =========================================================================
    // PRIMITIVES
    // =========================================================================

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.put(&[value])
    }

    pub fn write_token_type(&mut self, token: TokenType) -> Result<()> {
        self.put(&[token.code()])
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.put(&[u8::from(value)])
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.put(&[value as u8])
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        let bytes = self.order.i16_to(value);
        self.put(&bytes)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        let bytes = self.order.u16_to(value);
        self.put(&bytes)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        let bytes = self.order.i32_to(value);
        self.put(&bytes)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        let bytes = self.order.i64_to(value);
        self.put(&bytes)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        let bytes = self.order.f32_to(value);
        self.put(&bytes)
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        let bytes = self.order.f64_to(value);
        self.put(&bytes)
    }

    /// Writes a `Count` in its narrowest form.
    pub fn write_count(&mut self, value: u64) -> Result<()> {
        let mut bytes = [0u8; MAX_ENCODED_LEN];
        let len = count::encode_count(value, self.order, &mut bytes)?;
        self.put(&bytes[..len])
    }

    /// Writes a length-prefixed string in the current charset.
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        if self.strict_strings {
            if let Some(c) = first_illegal_xml_char(s) {
                return Err(EncodeError::IllegalXmlChar { code: c as u32 }.into());
            }
        }
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        let result = self
            .charset
            .encode_into(s, &mut scratch)
            .map_err(Error::from)
            .and_then(|()| {
                if scratch.len() > MAX_STRING_LEN {
                    return Err(EncodeError::LengthExceedsLimit {
                        field: "string",
                        len: scratch.len(),
                        max: MAX_STRING_LEN,
                    }
                    .into());
                }
                self.write_count(scratch.len() as u64)?;
                self.put(&scratch)
            });
        self.scratch = scratch;
        result
    }

    // =========================================================================
    // BULK
    // =========================================================================

    fn write_bulk<T: Copy, const N: usize>(
        &mut self,
        values: &[T],
        encode: impl Fn(T) -> [u8; N],
    ) -> Result<()> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        scratch.reserve(values.len() * N);
        for &value in values {
            scratch.extend_from_slice(&encode(value));
        }
        let result = self.put(&scratch);
        self.scratch = scratch;
        result
    }

    pub fn write_bool_slice(&mut self, values: &[bool]) -> Result<()> {
        self.write_bulk(values, |v| [u8::from(v)])
    }

    pub fn write_i8_slice(&mut self, values: &[i8]) -> Result<()> {
        self.write_bulk(values, |v| [v as u8])
    }

    pub fn write_i16_slice(&mut self, values: &[i16]) -> Result<()> {
        let order = self.order;
        self.write_bulk(values, move |v| order.i16_to(v))
    }

    pub fn write_u16_slice(&mut self, values: &[u16]) -> Result<()> {
        let order = self.order;
        self.write_bulk(values, move |v| order.u16_to(v))
    }

    pub fn write_i32_slice(&mut self, values: &[i32]) -> Result<()> {
        let order = self.order;
        self.write_bulk(values, move |v| order.i32_to(v))
    }

    pub fn write_i64_slice(&mut self, values: &[i64]) -> Result<()> {
        let order = self.order;
        self.write_bulk(values, move |v| order.i64_to(v))
    }

    pub fn write_f32_slice(&mut self, values: &[f32]) -> Result<()> {
        let order = self.order;
        self.write_bulk(values, move |v| order.f32_to(v))
    }

    pub fn write_f64_slice(&mut self, values: &[f64]) -> Result<()> {
        let order = self.order;
        self.write_bulk(values, move |v| order.f64_to(v))
    }
}

impl<W: Write> std::fmt::Debug for ByteWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteWriter")
            .field("position", &self.position())
            .field("cached", &self.buf.len())
            .field("order", &self.order)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{ByteReader, Source};

    #[test]
    fn test_primitives_big_endian() {
        let mut writer = ByteWriter::new(Vec::new(), ByteOrder::BigEndian);
        writer.write_u8(0x2A).unwrap();
        writer.write_i16(-2).unwrap();
        writer.write_i32(1).unwrap();
        writer.write_count(256).unwrap();
        writer.write_string("hi").unwrap();
        let bytes = writer.into_inner().unwrap();
        assert_eq!(
            bytes,
            vec![0x2A, 0xFF, 0xFE, 0, 0, 0, 1, 0xF3, 0x01, 0x00, 2, b'h', b'i']
        );
    }

    #[test]
    fn test_little_endian() {
        let mut writer = ByteWriter::new(Vec::new(), ByteOrder::LittleEndian);
        writer.write_i32(1).unwrap();
        writer.write_f64_slice(&[1.0]).unwrap();
        let bytes = writer.into_inner().unwrap();
        assert_eq!(&bytes[..4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[4..], &1.0f64.to_le_bytes());
    }

    #[test]
    fn test_patch_in_place() {
        let mut writer = ByteWriter::new(Vec::new(), ByteOrder::BigEndian);
        writer.set_auto_flush(false);
        writer.write_u8(0x03).unwrap();
        let mark = writer.position() - 1;
        writer.write_i32(7).unwrap();
        let end = writer.position();

        writer.set_position(mark).unwrap();
        writer.write_u8(0x00).unwrap();
        writer.set_position(end).unwrap();
        writer.write_u8(0x10).unwrap();

        assert_eq!(writer.cached_size(), 6);
        let bytes = writer.into_inner().unwrap();
        assert_eq!(bytes, vec![0x00, 0, 0, 0, 7, 0x10]);
    }

    #[test]
    fn test_auto_flush_limits_rewind() {
        let mut writer = ByteWriter::new(Vec::new(), ByteOrder::BigEndian);
        writer.put(&vec![0u8; DEFAULT_BUFFER_SIZE]).unwrap();
        assert_eq!(writer.cached_size(), 0);
        assert_eq!(writer.position(), DEFAULT_BUFFER_SIZE as u64);
        assert!(matches!(
            writer.set_position(0),
            Err(Error::IllegalState { operation: "set_position", .. })
        ));
    }

    #[test]
    fn test_strict_strings() {
        let mut writer = ByteWriter::new(Vec::new(), ByteOrder::BigEndian);
        writer.write_string("a\u{1}").unwrap();
        writer.set_strict_strings(true);
        assert!(matches!(
            writer.write_string("a\u{1}"),
            Err(Error::Encode(EncodeError::IllegalXmlChar { code: 1 }))
        ));
    }

    #[test]
    fn test_unmappable_in_ascii() {
        let mut writer = ByteWriter::new(Vec::new(), ByteOrder::BigEndian);
        writer.set_charset(Charset::UsAscii);
        assert!(matches!(
            writer.write_string("\u{e9}"),
            Err(Error::Encode(EncodeError::Unmappable { .. }))
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut writer = ByteWriter::new(Vec::new(), ByteOrder::BigEndian);
        writer.write_u8(1).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert!(writer.is_closed());
        assert!(matches!(writer.write_u8(2), Err(Error::Closed { .. })));
        assert_eq!(writer.into_inner().unwrap(), vec![1]);
    }

    #[test]
    fn test_gzip_tail() {
        let mut writer = ByteWriter::new(Vec::new(), ByteOrder::BigEndian);
        writer.write_u8(0xAA).unwrap();
        writer.switch_to_gzip().unwrap();
        writer.write_i32_slice(&[1, 2, 3]).unwrap();
        let bytes = writer.into_inner().unwrap();

        let mut reader = ByteReader::open(Source::from_bytes(bytes), ByteOrder::BigEndian).unwrap();
        assert_eq!(reader.read_u8("head").unwrap(), 0xAA);
        reader.switch_to_gzip().unwrap();
        let mut values = [0i32; 3];
        reader.read_i32_into(&mut values, "body").unwrap();
        assert_eq!(values, [1, 2, 3]);
    }
}
