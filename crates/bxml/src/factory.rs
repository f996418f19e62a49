//! Reader and writer construction.
//!
//! A factory is an ordinary value chosen by the caller. [`BxmlFactory`] can
//! be shared between threads; the readers and writers it creates cannot.

use std::io::Write;

use parking_lot::RwLock;

use crate::contract::{CheckedReader, CheckedWriter};
use crate::error::Result;
use crate::io::Source;
use crate::model::{EncodingOptions, ReaderOptions};
use crate::reader::{BxmlReader, StreamReader};
use crate::writer::{BxmlWriter, StreamWriter};

/// Creates readers and writers behind trait objects.
pub trait StreamFactory: Send + Sync {
    fn open_reader(&self, source: Source) -> Result<Box<dyn BxmlReader + Send>>;

    fn open_writer(&self, sink: Box<dyn Write + Send>) -> Result<Box<dyn BxmlWriter + Send>>;
}

/// Factory for contract-checked stream readers and writers.
///
/// Default options are copied into every writer when it is created, so later
/// changes never affect writers that already exist.
#[derive(Debug, Default)]
pub struct BxmlFactory {
    encoding: RwLock<EncodingOptions>,
    reading: RwLock<ReaderOptions>,
}

impl BxmlFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(encoding: EncodingOptions) -> Self {
        Self {
            encoding: RwLock::new(encoding),
            reading: RwLock::default(),
        }
    }

    /// A copy of the default encoding options.
    pub fn encoding_options(&self) -> EncodingOptions {
        self.encoding.read().clone()
    }

    pub fn set_encoding_options(&self, options: EncodingOptions) {
        *self.encoding.write() = options;
    }

    pub fn reader_options(&self) -> ReaderOptions {
        *self.reading.read()
    }

    pub fn set_reader_options(&self, options: ReaderOptions) {
        *self.reading.write() = options;
    }

    pub fn create_reader(&self, source: Source) -> Result<CheckedReader<StreamReader>> {
        let reader = StreamReader::open(source, self.reader_options())?;
        Ok(CheckedReader::new(reader))
    }

    /// Creates a writer with a copy of the default options.
    pub fn create_writer<W: Write>(&self, sink: W) -> Result<CheckedWriter<StreamWriter<W>>> {
        self.create_writer_with(sink, self.encoding_options())
    }

    pub fn create_writer_with<W: Write>(
        &self,
        sink: W,
        options: EncodingOptions,
    ) -> Result<CheckedWriter<StreamWriter<W>>> {
        let writer = StreamWriter::new(sink, options)?;
        Ok(CheckedWriter::new(writer))
    }
}

impl StreamFactory for BxmlFactory {
    fn open_reader(&self, source: Source) -> Result<Box<dyn BxmlReader + Send>> {
        Ok(Box::new(self.create_reader(source)?))
    }

    fn open_writer(&self, sink: Box<dyn Write + Send>) -> Result<Box<dyn BxmlWriter + Send>> {
        Ok(Box::new(self.create_writer(sink)?))
    }
}
