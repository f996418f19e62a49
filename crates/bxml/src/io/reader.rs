//! Buffered byte-level reader.
//!
//! The reader keeps a window over the underlying medium. When a read needs
//! more bytes than the window holds, a stream is compacted and refilled and a
//! mapped file is re-mapped at the current offset. If the medium runs dry
//! before the requested width is available, the read fails with
//! [`DecodeError::UnexpectedEof`].

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

use flate2::read::GzDecoder;
use memmap2::{Mmap, MmapOptions};

use crate::codec::count::{self, CountForm};
use crate::codec::charset::first_illegal_xml_char;
use crate::codec::{Charset, TokenType};
use crate::error::{DecodeError, Error, Result};
use crate::io::buffer::{BufferPool, PooledBuffer};
use crate::io::{ByteOrder, Source};
use crate::limits::{DEFAULT_BUFFER_SIZE, MAP_WINDOW_SIZE, MAX_STRING_LEN};

enum Medium {
    Stream {
        inner: Box<dyn Read + Send>,
        buf: PooledBuffer<'static>,
        eof: bool,
    },
    Memory(Vec<u8>),
    Mapped {
        file: File,
        size: u64,
        map: Option<Mmap>,
    },
}

/// Endian-aware buffered reader over a [`Source`].
pub struct ByteReader {
    medium: Medium,
    /// Absolute offset of the first byte of the current window.
    base: u64,
    /// Cursor within the current window.
    pos: usize,
    order: ByteOrder,
    charset: Charset,
    compressed: bool,
    strict_strings: bool,
    open: bool,
}

fn map_io_error(err: io::Error, compressed: bool, context: &'static str) -> Error {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => DecodeError::UnexpectedEof { context }.into(),
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput if compressed => {
            DecodeError::DecompressionFailed(err.to_string()).into()
        }
        _ => Error::Io(err),
    }
}

impl ByteReader {
    /// Opens a reader over `source` using `order` for multi-byte values.
    pub fn open(source: Source, order: ByteOrder) -> Result<Self> {
        let medium = match source {
            Source::Stream(inner) => Medium::Stream {
                inner,
                buf: BufferPool::global().acquire(DEFAULT_BUFFER_SIZE),
                eof: false,
            },
            Source::Memory(data) => Medium::Memory(data),
            Source::Mapped(file) => {
                let size = file.metadata()?.len();
                Medium::Mapped {
                    file,
                    size,
                    map: None,
                }
            }
        };
        Ok(Self {
            medium,
            base: 0,
            pos: 0,
            order,
            charset: Charset::Utf8,
            compressed: false,
            strict_strings: false,
            open: true,
        })
    }

    /// Current byte order.
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Changes the byte order for subsequent reads.
    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    /// Current character encoding.
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Changes the character encoding for subsequent string reads.
    pub fn set_charset(&mut self, charset: Charset) {
        self.charset = charset;
    }

    /// Rejects strings containing characters outside the XML 1.0 `Char` production.
    pub fn set_strict_strings(&mut self, strict: bool) {
        self.strict_strings = strict;
    }

    /// Whether the reader has not been closed.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether [`set_position`](Self::set_position) is available.
    pub fn supports_random_access(&self) -> bool {
        !matches!(self.medium, Medium::Stream { .. })
    }

    /// Absolute offset of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    /// Total size of the medium, if known.
    pub fn size(&self) -> Option<u64> {
        match &self.medium {
            Medium::Stream { .. } => None,
            Medium::Memory(data) => Some(data.len() as u64),
            Medium::Mapped { size, .. } => Some(*size),
        }
    }

    /// Moves the cursor to an absolute offset (random-access media only).
    pub fn set_position(&mut self, position: u64) -> Result<()> {
        self.check_open("set_position")?;
        match &mut self.medium {
            Medium::Stream { .. } => Err(Error::Unsupported {
                operation: "set_position",
            }),
            Medium::Memory(data) => {
                if position > data.len() as u64 {
                    return Err(DecodeError::UnexpectedEof {
                        context: "set_position",
                    }
                    .into());
                }
                self.base = 0;
                self.pos = position as usize;
                Ok(())
            }
            Medium::Mapped { size, map, .. } => {
                if position > *size {
                    return Err(DecodeError::UnexpectedEof {
                        context: "set_position",
                    }
                    .into());
                }
                let window_len = map.as_ref().map_or(0, |m| m.len()) as u64;
                if position >= self.base && position <= self.base + window_len {
                    self.pos = (position - self.base) as usize;
                } else {
                    // Re-mapped lazily by the next read.
                    *map = None;
                    self.base = position;
                    self.pos = 0;
                }
                Ok(())
            }
        }
    }

    /// Replaces the remainder of the medium with a gzip decoder over it.
    ///
    /// Called once, right after the header, for compressed streams. Random
    /// access is unavailable afterwards.
    pub fn switch_to_gzip(&mut self) -> Result<()> {
        self.check_open("switch_to_gzip")?;
        let start = self.position();
        let old = std::mem::replace(&mut self.medium, Medium::Memory(Vec::new()));
        let rest: Box<dyn Read + Send> = match old {
            Medium::Stream { inner, buf, .. } => {
                let leftover = buf[self.pos..].to_vec();
                Box::new(Cursor::new(leftover).chain(inner))
            }
            Medium::Memory(data) => {
                let mut cursor = Cursor::new(data);
                cursor.set_position(self.pos as u64);
                Box::new(cursor)
            }
            Medium::Mapped { mut file, .. } => {
                file.seek(SeekFrom::Start(start))?;
                Box::new(file)
            }
        };
        self.medium = Medium::Stream {
            inner: Box::new(GzDecoder::new(rest)),
            buf: BufferPool::global().acquire(DEFAULT_BUFFER_SIZE),
            eof: false,
        };
        self.base = start;
        self.pos = 0;
        self.compressed = true;
        Ok(())
    }

    /// Releases the medium and the window buffer. Idempotent.
    pub fn close(&mut self) {
        if self.open {
            self.medium = Medium::Memory(Vec::new());
            self.base = 0;
            self.pos = 0;
            self.open = false;
        }
    }

    fn check_open(&self, operation: &'static str) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::Closed { operation })
        }
    }

    fn window(&self) -> &[u8] {
        match &self.medium {
            Medium::Stream { buf, .. } => &buf[..],
            Medium::Memory(data) => &data[..],
            Medium::Mapped { map, .. } => map.as_deref().unwrap_or(&[]),
        }
    }

    fn available(&self) -> usize {
        self.window().len() - self.pos
    }

    /// Makes sure at least `n` bytes are readable from the cursor.
    fn ensure(&mut self, n: usize, context: &'static str) -> Result<()> {
        self.check_open(context)?;
        if self.available() >= n {
            return Ok(());
        }
        self.fill(n, context)?;
        if self.available() < n {
            return Err(DecodeError::UnexpectedEof { context }.into());
        }
        Ok(())
    }

    fn fill(&mut self, n: usize, context: &'static str) -> Result<()> {
        let compressed = self.compressed;
        match &mut self.medium {
            Medium::Stream { inner, buf, eof } => {
                if self.pos > 0 {
                    buf.drain(..self.pos);
                    self.base += self.pos as u64;
                    self.pos = 0;
                }
                let target = n.max(DEFAULT_BUFFER_SIZE);
                while buf.len() < n && !*eof {
                    let filled = buf.len();
                    if buf.capacity() < target {
                        buf.reserve(target - filled);
                    }
                    let capacity = buf.capacity();
                    buf.resize(capacity, 0);
                    let read = loop {
                        match inner.read(&mut buf[filled..]) {
                            Ok(read) => break read,
                            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                            Err(err) => {
                                buf.truncate(filled);
                                return Err(map_io_error(err, compressed, context));
                            }
                        }
                    };
                    buf.truncate(filled + read);
                    if read == 0 {
                        *eof = true;
                    }
                }
                Ok(())
            }
            Medium::Memory(_) => Ok(()),
            Medium::Mapped { file, size, map } => {
                let start = self.base + self.pos as u64;
                let remaining = size.saturating_sub(start);
                let len = (n.max(MAP_WINDOW_SIZE) as u64).min(remaining) as usize;
                self.base = start;
                self.pos = 0;
                if len == 0 {
                    *map = None;
                    return Ok(());
                }
                // SAFETY: the mapping is read-only and owned by this reader; the
                // file is not modified through this process while it is mapped.
                let mapped = unsafe { MmapOptions::new().offset(start).len(len).map(&*file)? };
                log::trace!("[bxml::io] mapped window {}..{}", start, start + len as u64);
                *map = Some(mapped);
                Ok(())
            }
        }
    }

    /// Returns the next `n` bytes and advances past them.
    pub fn take(&mut self, n: usize, context: &'static str) -> Result<&[u8]> {
        self.ensure(n, context)?;
        let start = self.pos;
        self.pos += n;
        Ok(&self.window()[start..start + n])
    }

    fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N]> {
        let bytes = self.take(N, context)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Skips `n` bytes without decoding them.
    pub fn skip(&mut self, n: u64, context: &'static str) -> Result<()> {
        self.check_open(context)?;
        let available = self.available() as u64;
        if n <= available {
            self.pos += n as usize;
            return Ok(());
        }
        let compressed = self.compressed;
        if let Medium::Stream { inner, buf, eof } = &mut self.medium {
            let rest = n - available;
            self.base += buf.len() as u64;
            self.pos = 0;
            buf.clear();
            let copied = io::copy(&mut inner.by_ref().take(rest), &mut io::sink())
                .map_err(|err| map_io_error(err, compressed, context))?;
            self.base += copied;
            if copied < rest {
                *eof = true;
                return Err(DecodeError::UnexpectedEof { context }.into());
            }
            return Ok(());
        }
        let target = self
            .position()
            .checked_add(n)
            .ok_or(DecodeError::UnexpectedEof { context })?;
        let size = self.size().unwrap_or(0);
        if target > size {
            self.set_position(size)?;
            return Err(DecodeError::UnexpectedEof { context }.into());
        }
        self.set_position(target)
    }

    // =========================================================================
    // PRIMITIVES
    // =========================================================================

    /// Reads a single byte.
    #[inline]
    pub fn read_u8(&mut self, context: &'static str) -> Result<u8> {
        self.ensure(1, context)?;
        let byte = self.window()[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Returns the next byte without consuming it.
    pub fn peek_u8(&mut self, context: &'static str) -> Result<u8> {
        self.ensure(1, context)?;
        Ok(self.window()[self.pos])
    }

    /// Reads a token type code.
    pub fn read_token_type(&mut self) -> Result<TokenType> {
        let code = self.read_u8("token type")?;
        TokenType::from_u8(code).ok_or_else(|| DecodeError::InvalidTokenType { code }.into())
    }

    /// Reads a bool byte (0x00 or 0x01).
    pub fn read_bool(&mut self, context: &'static str) -> Result<bool> {
        match self.read_u8(context)? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(DecodeError::InvalidBool { value }.into()),
        }
    }

    /// Reads a signed byte.
    pub fn read_i8(&mut self, context: &'static str) -> Result<i8> {
        Ok(self.read_u8(context)? as i8)
    }

    /// Reads a signed 16-bit integer.
    pub fn read_i16(&mut self, context: &'static str) -> Result<i16> {
        let bytes = self.read_array(context)?;
        Ok(self.order.i16_from(bytes))
    }

    /// Reads an unsigned 16-bit integer.
    pub fn read_u16(&mut self, context: &'static str) -> Result<u16> {
        let bytes = self.read_array(context)?;
        Ok(self.order.u16_from(bytes))
    }

    /// Reads a signed 32-bit integer.
    pub fn read_i32(&mut self, context: &'static str) -> Result<i32> {
        let bytes = self.read_array(context)?;
        Ok(self.order.i32_from(bytes))
    }

    /// Reads a signed 64-bit integer.
    pub fn read_i64(&mut self, context: &'static str) -> Result<i64> {
        let bytes = self.read_array(context)?;
        Ok(self.order.i64_from(bytes))
    }

    /// Reads a 32-bit float.
    pub fn read_f32(&mut self, context: &'static str) -> Result<f32> {
        let bytes = self.read_array(context)?;
        Ok(self.order.f32_from(bytes))
    }

    /// Reads a 64-bit float.
    pub fn read_f64(&mut self, context: &'static str) -> Result<f64> {
        let bytes = self.read_array(context)?;
        Ok(self.order.f64_from(bytes))
    }

    /// Reads a `Count`.
    pub fn read_count(&mut self, context: &'static str) -> Result<u64> {
        let first = self.read_u8(context)?;
        let form = CountForm::from_first_byte(first)?;
        if form == CountForm::Small {
            return Ok(u64::from(first));
        }
        let order = self.order;
        let payload = self.take(form.payload_len(), context)?;
        Ok(count::decode_payload(first, form, payload, order)?)
    }

    /// Reads a `Count` used as a length, bounded by `max`.
    pub fn read_len(&mut self, field: &'static str, max: usize) -> Result<usize> {
        let len = self.read_count(field)?;
        if len > max as u64 {
            return Err(DecodeError::LengthExceedsLimit { field, len, max }.into());
        }
        Ok(len as usize)
    }

    /// Reads a length-prefixed string in the current charset.
    pub fn read_string(&mut self, field: &'static str) -> Result<String> {
        let len = self.read_len(field, MAX_STRING_LEN)?;
        let charset = self.charset;
        let strict = self.strict_strings;
        let bytes = self.take(len, field)?;
        let text = charset.decode(bytes, field)?;
        if strict {
            if let Some(c) = first_illegal_xml_char(&text) {
                return Err(DecodeError::IllegalXmlChar { code: c as u32 }.into());
            }
        }
        Ok(text)
    }

    /// Skips a length-prefixed string.
    pub fn skip_string(&mut self) -> Result<()> {
        let len = self.read_count("string length")?;
        self.skip(len, "string")
    }

    // =========================================================================
    // BULK
    // =========================================================================

    fn read_bulk<T, const N: usize>(
        &mut self,
        dst: &mut [T],
        context: &'static str,
        decode: impl Fn([u8; N]) -> T,
    ) -> Result<()> {
        let mut done = 0;
        while done < dst.len() {
            self.ensure(N, context)?;
            let batch = (self.available() / N).min(dst.len() - done);
            let start = self.pos;
            let window = self.window();
            for (slot, chunk) in dst[done..done + batch]
                .iter_mut()
                .zip(window[start..start + batch * N].chunks_exact(N))
            {
                let mut bytes = [0u8; N];
                bytes.copy_from_slice(chunk);
                *slot = decode(bytes);
            }
            self.pos += batch * N;
            done += batch;
        }
        Ok(())
    }

    /// Fills `dst` with bool values.
    pub fn read_bool_into(&mut self, dst: &mut [bool], context: &'static str) -> Result<()> {
        for slot in dst.iter_mut() {
            *slot = self.read_bool(context)?;
        }
        Ok(())
    }

    /// Fills `dst` with signed bytes.
    pub fn read_i8_into(&mut self, dst: &mut [i8], context: &'static str) -> Result<()> {
        self.read_bulk(dst, context, |b: [u8; 1]| b[0] as i8)
    }

    /// Fills `dst` with 16-bit integers.
    pub fn read_i16_into(&mut self, dst: &mut [i16], context: &'static str) -> Result<()> {
        let order = self.order;
        self.read_bulk(dst, context, move |b| order.i16_from(b))
    }

    /// Fills `dst` with unsigned 16-bit integers.
    pub fn read_u16_into(&mut self, dst: &mut [u16], context: &'static str) -> Result<()> {
        let order = self.order;
        self.read_bulk(dst, context, move |b| order.u16_from(b))
    }

    /// Fills `dst` with 32-bit integers.
    pub fn read_i32_into(&mut self, dst: &mut [i32], context: &'static str) -> Result<()> {
        let order = self.order;
        self.read_bulk(dst, context, move |b| order.i32_from(b))
    }

    /// Fills `dst` with 64-bit integers.
    pub fn read_i64_into(&mut self, dst: &mut [i64], context: &'static str) -> Result<()> {
        let order = self.order;
        self.read_bulk(dst, context, move |b| order.i64_from(b))
    }

    /// Fills `dst` with 32-bit floats.
    pub fn read_f32_into(&mut self, dst: &mut [f32], context: &'static str) -> Result<()> {
        let order = self.order;
        self.read_bulk(dst, context, move |b| order.f32_from(b))
    }

    /// Fills `dst` with 64-bit floats.
    pub fn read_f64_into(&mut self, dst: &mut [f64], context: &'static str) -> Result<()> {
        let order = self.order;
        self.read_bulk(dst, context, move |b| order.f64_from(b))
    }
}

impl std::fmt::Debug for ByteReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let medium = match self.medium {
            Medium::Stream { .. } => "stream",
            Medium::Memory(_) => "memory",
            Medium::Mapped { .. } => "mapped",
        };
        f.debug_struct("ByteReader")
            .field("medium", &medium)
            .field("position", &self.position())
            .field("order", &self.order)
            .field("open", &self.open)
            .finish()
    }
}
