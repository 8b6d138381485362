//! Format-independent facades over binary and delimited-text signal files.
//!
//! [`SignalReader`] and [`SignalWriter`] pick a backend once, at construction,
//! and forward every call to it through the [`SignalSource`] / [`SignalSink`]
//! traits:
//!
//! | hint                | path                                   | stream              |
//! |---------------------|----------------------------------------|---------------------|
//! | [`FormatHint::Auto`]   | by extension ([`BINARY_EXTENSIONS`](crate::io::detect::BINARY_EXTENSIONS)) | by magic bytes (reader), binary (writer) |
//! | [`FormatHint::Binary`] | binary                               | binary              |
//! | [`FormatHint::Text`]   | text                                 | text                |
//!
//! Errors from the backend are passed through unchanged unless an
//! [`ErrorMap`] is configured.

use crate::error::{ErrorMap, Result, remap};
use crate::io::bsig::{BsigReader, BsigReaderOptions, BsigWriter, BsigWriterOptions};
#[cfg(feature = "io-csv")]
use crate::io::csv::{ColumnKind, CsvReader, CsvReaderOptions, CsvWriter, CsvWriterOptions};
use crate::io::detect::{ContainerFormat, FormatHint, detect_from_extension, detect_from_magic};
use crate::types::{SignalArray, TypeCode};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, Write};
use std::path::Path;

/// Selects a signal by name or by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalId<'a> {
    Name(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for SignalId<'a> {
    fn from(name: &'a str) -> Self {
        SignalId::Name(name)
    }
}

impl<'a> From<&'a String> for SignalId<'a> {
    fn from(name: &'a String) -> Self {
        SignalId::Name(name)
    }
}

impl From<usize> for SignalId<'_> {
    fn from(index: usize) -> Self {
        SignalId::Index(index)
    }
}

/// Metadata of one stored signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalInfo {
    pub name: String,
    /// Storage type; `None` for text columns and columns not yet scanned.
    pub type_code: Option<TypeCode>,
    pub array_length: usize,
    pub sample_count: usize,
    /// Number of stored blocks (0 for text columns).
    pub block_count: usize,
}

/// Read side of a signal file.
pub trait SignalSource {
    fn signal_names(&self) -> Vec<String>;

    /// Number of signals.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn name_at(&self, index: usize) -> Option<String>;

    fn info(&self, id: SignalId<'_>) -> Result<SignalInfo>;

    /// Sample count of `id`, or the container-level length for `None`.
    fn signal_length(&self, id: Option<SignalId<'_>>) -> Result<usize>;

    fn signal_window(
        &mut self,
        id: SignalId<'_>,
        offset: i64,
        count: Option<usize>,
    ) -> Result<SignalArray>;

    fn close(self: Box<Self>) -> Result<()>;
}

/// Write side of a signal file.
pub trait SignalSink {
    fn append(&mut self, name: &str, values: &SignalArray) -> Result<()>;

    fn signal_names(&self) -> Vec<String>;

    fn close(self: Box<Self>) -> Result<()>;
}

/// One pass over every signal of a source, yielding `(name, values)`.
pub struct SignalIter<'s, S: SignalSource + ?Sized> {
    source: &'s mut S,
    next: usize,
}

impl<'s, S: SignalSource + ?Sized> SignalIter<'s, S> {
    pub fn new(source: &'s mut S) -> Self {
        Self { source, next: 0 }
    }
}

impl<S: SignalSource + ?Sized> Iterator for SignalIter<'_, S> {
    type Item = Result<(String, SignalArray)>;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.next;
        let name = self.source.name_at(i)?;
        self.next += 1;
        Some(
            self.source
                .signal_window(SignalId::Index(i), 0, None)
                .map(|values| (name, values)),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.source.len().saturating_sub(self.next);
        (n, Some(n))
    }
}

impl<R: Read + Seek> SignalSource for BsigReader<R> {
    fn signal_names(&self) -> Vec<String> {
        BsigReader::signal_names(self)
    }

    fn len(&self) -> usize {
        BsigReader::len(self)
    }

    fn name_at(&self, index: usize) -> Option<String> {
        BsigReader::info(self, index).ok().map(|i| i.name)
    }

    fn info(&self, id: SignalId<'_>) -> Result<SignalInfo> {
        BsigReader::info(self, id)
    }

    fn signal_length(&self, id: Option<SignalId<'_>>) -> Result<usize> {
        BsigReader::signal_length(self, id)
    }

    fn signal_window(
        &mut self,
        id: SignalId<'_>,
        offset: i64,
        count: Option<usize>,
    ) -> Result<SignalArray> {
        BsigReader::signal_window(self, id, offset, count)
    }

    fn close(self: Box<Self>) -> Result<()> {
        BsigReader::close(*self)
    }
}

#[cfg(feature = "io-csv")]
impl SignalSource for CsvReader {
    fn signal_names(&self) -> Vec<String> {
        CsvReader::signal_names(self)
    }

    fn len(&self) -> usize {
        CsvReader::len(self)
    }

    fn name_at(&self, index: usize) -> Option<String> {
        CsvReader::name_at(self, index).map(str::to_string)
    }

    fn info(&self, id: SignalId<'_>) -> Result<SignalInfo> {
        let kind = self.column_kind(id)?;
        let name = match id {
            SignalId::Name(n) => n.to_string(),
            SignalId::Index(i) => self.name_at(i).unwrap_or_default().to_string(),
        };
        Ok(SignalInfo {
            name,
            type_code: kind.and_then(|k| match k {
                ColumnKind::Integer => Some(TypeCode::I64),
                ColumnKind::Real => Some(TypeCode::F64),
                ColumnKind::Text => None,
            }),
            array_length: 1,
            sample_count: CsvReader::signal_length(self, Some(id))?,
            block_count: 0,
        })
    }

    fn signal_length(&self, id: Option<SignalId<'_>>) -> Result<usize> {
        CsvReader::signal_length(self, id)
    }

    fn signal_window(
        &mut self,
        id: SignalId<'_>,
        offset: i64,
        count: Option<usize>,
    ) -> Result<SignalArray> {
        CsvReader::signal_window(self, id, offset, count)
    }

    fn close(self: Box<Self>) -> Result<()> {
        CsvReader::close(*self)
    }
}

impl<W: Write + Seek> SignalSink for BsigWriter<W> {
    fn append(&mut self, name: &str, values: &SignalArray) -> Result<()> {
        BsigWriter::append(self, name, values)
    }

    fn signal_names(&self) -> Vec<String> {
        BsigWriter::signal_names(self)
    }

    fn close(self: Box<Self>) -> Result<()> {
        BsigWriter::close(*self)
    }
}

#[cfg(feature = "io-csv")]
impl<W: Write> SignalSink for CsvWriter<W> {
    fn append(&mut self, name: &str, values: &SignalArray) -> Result<()> {
        CsvWriter::append(self, name, values)
    }

    fn signal_names(&self) -> Vec<String> {
        CsvWriter::signal_names(self)
    }

    fn close(self: Box<Self>) -> Result<()> {
        CsvWriter::close(*self)
    }
}

#[cfg(not(feature = "io-csv"))]
fn text_unavailable() -> crate::error::SignalError {
    crate::error::SignalError::InvalidArgument("delimited text support requires the `io-csv` feature".into())
}

/// Options for [`SignalReader`].
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalReaderOptions {
    pub format: FormatHint,
    pub bsig: BsigReaderOptions,
    #[cfg(feature = "io-csv")]
    pub csv: CsvReaderOptions,
    /// Applied to every error leaving the reader.
    #[serde(skip)]
    pub error_map: Option<ErrorMap>,
}

impl SignalReaderOptions {
    #[must_use]
    pub fn with_format(mut self, format: FormatHint) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_bsig(mut self, bsig: BsigReaderOptions) -> Self {
        self.bsig = bsig;
        self
    }

    #[cfg(feature = "io-csv")]
    #[must_use]
    pub fn with_csv(mut self, csv: CsvReaderOptions) -> Self {
        self.csv = csv;
        self
    }

    #[must_use]
    pub fn with_error_map(mut self, map: ErrorMap) -> Self {
        self.error_map = Some(map);
        self
    }
}

/// Reader over either file format.
pub struct SignalReader<'a> {
    backend: Box<dyn SignalSource + 'a>,
    format: ContainerFormat,
    error_map: Option<ErrorMap>,
}

impl SignalReader<'static> {
    /// Open a file, choosing the format from the hint or the extension.
    pub fn open(path: impl AsRef<Path>, options: SignalReaderOptions) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let format = options.format.forced().unwrap_or_else(|| detect_from_extension(path));
        let backend: Result<Box<dyn SignalSource>> = match format {
            ContainerFormat::Binary => BsigReader::open(path, options.bsig.clone())
                .map(|r| Box::new(r) as Box<dyn SignalSource>),
            #[cfg(feature = "io-csv")]
            ContainerFormat::Text => CsvReader::open(path, options.csv.clone())
                .map(|r| Box::new(r) as Box<dyn SignalSource>),
            #[cfg(not(feature = "io-csv"))]
            ContainerFormat::Text => Err(text_unavailable()),
        };
        let backend = remap(&options.error_map, backend)
            .with_context(|| format!("open signal file {}", path.display()))?;
        Ok(Self { backend, format, error_map: options.error_map })
    }
}

impl<'a> SignalReader<'a> {
    /// Read from a caller-supplied stream. With [`FormatHint::Auto`] the format
    /// is sniffed from the first bytes.
    ///
    /// Pass `&mut stream` to keep ownership of the stream.
    pub fn from_reader<R: Read + Seek + 'a>(
        mut inner: R,
        options: SignalReaderOptions,
    ) -> anyhow::Result<Self> {
        let format = match options.format.forced() {
            Some(f) => f,
            None => remap(&options.error_map, detect_from_magic(&mut inner))?,
        };
        let backend: Result<Box<dyn SignalSource + 'a>> = match format {
            ContainerFormat::Binary => BsigReader::from_reader(inner, options.bsig.clone())
                .map(|r| Box::new(r) as Box<dyn SignalSource + 'a>),
            #[cfg(feature = "io-csv")]
            ContainerFormat::Text => CsvReader::from_reader(inner, options.csv.clone())
                .map(|r| Box::new(r) as Box<dyn SignalSource + 'a>),
            #[cfg(not(feature = "io-csv"))]
            ContainerFormat::Text => Err(text_unavailable()),
        };
        let backend = remap(&options.error_map, backend)?;
        Ok(Self { backend, format, error_map: options.error_map })
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    pub fn signal_names(&self) -> Vec<String> {
        self.backend.signal_names()
    }

    /// Number of signals.
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }

    pub fn signal_info<'b>(&self, id: impl Into<SignalId<'b>>) -> anyhow::Result<SignalInfo> {
        remap(&self.error_map, self.backend.info(id.into()))
    }

    /// Sample count of `name`, or of the first signal for `None`.
    pub fn signal_length(&self, name: Option<&str>) -> anyhow::Result<usize> {
        remap(&self.error_map, self.backend.signal_length(name.map(SignalId::Name)))
    }

    pub fn signal<'b>(&mut self, id: impl Into<SignalId<'b>>) -> anyhow::Result<SignalArray> {
        self.signal_window(id, 0, None)
    }

    pub fn signal_window<'b>(
        &mut self,
        id: impl Into<SignalId<'b>>,
        offset: i64,
        count: Option<usize>,
    ) -> anyhow::Result<SignalArray> {
        remap(&self.error_map, self.backend.signal_window(id.into(), offset, count))
    }

    /// Read several signals, in request order.
    pub fn signals(&mut self, ids: &[SignalId<'_>]) -> anyhow::Result<Vec<SignalArray>> {
        ids.iter().map(|&id| self.signal(id)).collect()
    }

    /// A fresh pass over all signals, reading each in full.
    pub fn iter(&mut self) -> impl Iterator<Item = anyhow::Result<(String, SignalArray)>> + '_ {
        let map = self.error_map.clone();
        SignalIter::new(self.backend.as_mut()).map(move |r| remap(&map, r))
    }

    pub fn close(self) -> anyhow::Result<()> {
        remap(&self.error_map, self.backend.close())
    }
}

/// Options for [`SignalWriter`].
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWriterOptions {
    pub format: FormatHint,
    pub bsig: BsigWriterOptions,
    #[cfg(feature = "io-csv")]
    pub csv: CsvWriterOptions,
    #[serde(skip)]
    pub error_map: Option<ErrorMap>,
}

impl SignalWriterOptions {
    #[must_use]
    pub fn with_format(mut self, format: FormatHint) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_bsig(mut self, bsig: BsigWriterOptions) -> Self {
        self.bsig = bsig;
        self
    }

    #[cfg(feature = "io-csv")]
    #[must_use]
    pub fn with_csv(mut self, csv: CsvWriterOptions) -> Self {
        self.csv = csv;
        self
    }

    #[must_use]
    pub fn with_error_map(mut self, map: ErrorMap) -> Self {
        self.error_map = Some(map);
        self
    }
}

/// Writer for either file format.
pub struct SignalWriter<'a> {
    backend: Box<dyn SignalSink + 'a>,
    format: ContainerFormat,
    error_map: Option<ErrorMap>,
}

impl SignalWriter<'static> {
    /// Create a file, choosing the format from the hint or the extension.
    pub fn create(path: impl AsRef<Path>, options: SignalWriterOptions) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let format = options.format.forced().unwrap_or_else(|| detect_from_extension(path));
        let backend: Result<Box<dyn SignalSink>> = match format {
            ContainerFormat::Binary => BsigWriter::create(path, options.bsig.clone())
                .map(|w| Box::new(w) as Box<dyn SignalSink>),
            #[cfg(feature = "io-csv")]
            ContainerFormat::Text => CsvWriter::create(path, options.csv.clone())
                .map(|w| Box::new(w) as Box<dyn SignalSink>),
            #[cfg(not(feature = "io-csv"))]
            ContainerFormat::Text => Err(text_unavailable()),
        };
        let backend = remap(&options.error_map, backend)
            .with_context(|| format!("create signal file {}", path.display()))?;
        Ok(Self { backend, format, error_map: options.error_map })
    }
}

impl<'a> SignalWriter<'a> {
    /// Write to a caller-supplied stream. [`FormatHint::Auto`] selects binary.
    pub fn from_writer<W: Write + Seek + 'a>(
        inner: W,
        options: SignalWriterOptions,
    ) -> anyhow::Result<Self> {
        let format = options.format.forced().unwrap_or(ContainerFormat::Binary);
        let backend: Result<Box<dyn SignalSink + 'a>> = match format {
            ContainerFormat::Binary => BsigWriter::from_writer(inner, options.bsig.clone())
                .map(|w| Box::new(w) as Box<dyn SignalSink + 'a>),
            #[cfg(feature = "io-csv")]
            ContainerFormat::Text => Ok(Box::new(CsvWriter::from_writer(inner, options.csv.clone()))
                as Box<dyn SignalSink + 'a>),
            #[cfg(not(feature = "io-csv"))]
            ContainerFormat::Text => Err(text_unavailable()),
        };
        let backend = remap(&options.error_map, backend)?;
        Ok(Self { backend, format, error_map: options.error_map })
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    pub fn signal_names(&self) -> Vec<String> {
        self.backend.signal_names()
    }

    pub fn append(&mut self, name: &str, values: impl Into<SignalArray>) -> anyhow::Result<()> {
        let values = values.into();
        remap(&self.error_map, self.backend.append(name, &values))
    }

    /// Finalize the file. Nothing is readable before this returns.
    pub fn close(self) -> anyhow::Result<()> {
        remap(&self.error_map, self.backend.close())
    }
}

/// Open a reader with default options.
pub fn open_signals(path: impl AsRef<Path>) -> anyhow::Result<SignalReader<'static>> {
    SignalReader::open(path, SignalReaderOptions::default())
}
