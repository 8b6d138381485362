//! Column-oriented reader for delimited-text signal files.
//!
//! Columns are typed at open or on first access, depending on the
//! [`ScanStrategy`].

use super::resolve_delimiter;
use super::scan::{ColumnKind, ScanPolicy, ScannedColumn, scan_column};
use crate::error::{Result, SignalError};
use crate::io::bsig::normalize_window;
use crate::io::signal::{SignalId, SignalIter};
use crate::types::{SignalArray, SignalData};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::debug;

/// When columns are converted from text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    /// Convert every column while opening.
    #[default]
    Prefetch,
    /// Convert a column on first access and cache it.
    NoPrefetch,
}

/// Reader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvReaderOptions {
    /// One of `;` `,` `\t` `|` or space. Anything else falls back to `;`.
    pub delimiter: char,
    /// Lines to discard before the header row.
    pub skip_lines: usize,
    /// Data rows to discard after the header row.
    pub skip_data_lines: usize,
    pub scan: ScanStrategy,
    pub policy: ScanPolicy,
}

impl Default for CsvReaderOptions {
    fn default() -> Self {
        Self {
            delimiter: ';',
            skip_lines: 0,
            skip_data_lines: 0,
            scan: ScanStrategy::Prefetch,
            policy: ScanPolicy::Auto,
        }
    }
}

impl CsvReaderOptions {
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn with_skip_lines(mut self, skip_lines: usize) -> Self {
        self.skip_lines = skip_lines;
        self
    }

    #[must_use]
    pub fn with_skip_data_lines(mut self, skip_data_lines: usize) -> Self {
        self.skip_data_lines = skip_data_lines;
        self
    }

    #[must_use]
    pub fn with_scan(mut self, scan: ScanStrategy) -> Self {
        self.scan = scan;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ScanPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Column-oriented reader over delimited text.
///
/// The first non-skipped line names the columns. The whole input is consumed
/// at open; with [`ScanStrategy::NoPrefetch`] the raw cells are kept and each
/// column is typed the first time it is requested.
#[derive(Debug)]
pub struct CsvReader {
    names: Vec<String>,
    rows: Vec<csv::StringRecord>,
    row_count: usize,
    columns: Vec<Option<ScannedColumn>>,
    policy: ScanPolicy,
}

fn csv_err(e: csv::Error) -> SignalError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => SignalError::Io(io),
        other => SignalError::Format(format!("delimited text: {other:?}")),
    }
}

impl CsvReader {
    pub fn open(path: impl AsRef<Path>, options: CsvReaderOptions) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file, options)
    }

    /// Read a whole delimited-text stream. The stream is consumed, not closed.
    pub fn from_reader<R: Read>(inner: R, options: CsvReaderOptions) -> Result<Self> {
        let delimiter = resolve_delimiter(options.delimiter);
        let mut buffered = BufReader::new(inner);
        let mut line = String::new();
        for _ in 0..options.skip_lines {
            line.clear();
            if buffered.read_line(&mut line)? == 0 {
                break;
            }
        }

        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(buffered);
        let mut records = rdr.records();

        let mut names: Vec<String> = match records.next() {
            Some(header) => header.map_err(csv_err)?.iter().map(str::to_string).collect(),
            None => Vec::new(),
        };
        // A trailing delimiter on the header row yields one empty name.
        if names.last().is_some_and(String::is_empty) {
            names.pop();
        }
        for (i, n) in names.iter().enumerate() {
            if names[..i].contains(n) {
                return Err(SignalError::Format(format!("duplicate column name {n:?}")));
            }
        }

        let mut rows = Vec::new();
        for (i, rec) in records.enumerate() {
            let rec = rec.map_err(csv_err)?;
            if i < options.skip_data_lines {
                continue;
            }
            rows.push(rec);
        }

        let mut reader = CsvReader {
            columns: vec![None; names.len()],
            row_count: rows.len(),
            names,
            rows,
            policy: options.policy,
        };
        if options.scan == ScanStrategy::Prefetch {
            for i in 0..reader.names.len() {
                reader.column(i);
            }
            reader.rows = Vec::new();
        }
        debug!(
            columns = reader.names.len(),
            rows = reader.row_count,
            scan = ?options.scan,
            "opened delimited text"
        );
        Ok(reader)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn signal_names(&self) -> Vec<String> {
        self.names.clone()
    }

    pub(crate) fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    fn resolve(&self, id: SignalId<'_>) -> Result<usize> {
        match id {
            SignalId::Index(i) if i < self.names.len() => Ok(i),
            SignalId::Index(i) => Err(SignalError::NotFound(format!(
                "index {i} (file has {} columns)",
                self.names.len()
            ))),
            SignalId::Name(name) => self
                .names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| SignalError::NotFound(name.to_string())),
        }
    }

    /// Kind recorded for a column, or `None` if it has not been scanned yet
    /// or holds no cells.
    pub fn column_kind<'a>(&self, id: impl Into<SignalId<'a>>) -> Result<Option<ColumnKind>> {
        let i = self.resolve(id.into())?;
        Ok(self.columns[i].as_ref().and_then(|c| c.kind))
    }

    /// Whether the column has already been converted.
    pub fn is_cached<'a>(&self, id: impl Into<SignalId<'a>>) -> Result<bool> {
        Ok(self.columns[self.resolve(id.into())?].is_some())
    }

    fn column(&mut self, i: usize) -> &ScannedColumn {
        let (names, rows, policy) = (&self.names, &self.rows, &self.policy);
        self.columns[i].get_or_insert_with(|| {
            // Short rows read as empty cells.
            let cells = rows.iter().map(|r| r.get(i).unwrap_or(""));
            scan_column(&names[i], cells, policy)
        })
    }

    /// Number of data rows; every column has this length.
    pub fn signal_length(&self, id: Option<SignalId<'_>>) -> Result<usize> {
        if let Some(id) = id {
            self.resolve(id)?;
        }
        Ok(self.row_count)
    }

    pub fn signal<'a>(&mut self, id: impl Into<SignalId<'a>>) -> Result<SignalArray> {
        self.signal_window(id, 0, None)
    }

    /// Rows `[offset, offset + count)` of a column, typed by its recorded kind:
    /// integers as `i64`, reals as `f64`, text as strings.
    pub fn signal_window<'a>(
        &mut self,
        id: impl Into<SignalId<'a>>,
        offset: i64,
        count: Option<usize>,
    ) -> Result<SignalArray> {
        let i = self.resolve(id.into())?;
        let (offset, count) = normalize_window(self.row_count, offset, count)?;
        let col = self.column(i);
        let data = match col.kind {
            Some(_) => col.data.slice(offset, offset + count),
            None => SignalData::F64(Vec::new()),
        };
        Ok(SignalArray::from(data))
    }

    pub fn iter(&mut self) -> SignalIter<'_, Self> {
        SignalIter::new(self)
    }

    pub fn close(self) -> Result<()> {
        debug!(columns = self.names.len(), "closing delimited text reader");
        Ok(())
    }
}
