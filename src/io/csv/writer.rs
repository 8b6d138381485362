//! Row-oriented writer for delimited-text signal files.

use super::resolve_delimiter;
use crate::error::{Result, SignalError};
use crate::types::{SignalArray, SignalData};
use serde::{Deserialize, Serialize};
use std::fs::{File, create_dir_all};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Writer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvWriterOptions {
    pub delimiter: char,
}

impl Default for CsvWriterOptions {
    fn default() -> Self {
        Self { delimiter: ';' }
    }
}

impl CsvWriterOptions {
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// Row-oriented writer for equally long scalar columns.
///
/// Columns are buffered by [`append`](Self::append) and emitted on
/// [`close`](Self::close): one header row in append order, then one row per
/// sample index.
pub struct CsvWriter<W: Write> {
    inner: Option<W>,
    delimiter: u8,
    columns: Vec<(String, SignalData)>,
}

impl CsvWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>, options: CsvWriterOptions) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self::from_writer(BufWriter::new(file), options))
    }
}

impl<W: Write> CsvWriter<W> {
    pub fn from_writer(inner: W, options: CsvWriterOptions) -> Self {
        Self {
            inner: Some(inner),
            delimiter: resolve_delimiter(options.delimiter),
            columns: Vec::new(),
        }
    }

    pub fn signal_names(&self) -> Vec<String> {
        self.columns.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Buffer one column.
    ///
    /// Every column must have the length of the first one, and rows must be
    /// scalar (array length 1).
    pub fn append(&mut self, name: &str, values: &SignalArray) -> Result<()> {
        if self.inner.is_none() {
            return Err(SignalError::InvalidArgument("writer is already closed".into()));
        }
        if values.width() != 1 {
            return Err(SignalError::Format(format!(
                "column {name:?} has {} values per row; delimited text holds scalars only",
                values.width()
            )));
        }
        if let Some((first, data)) = self.columns.first()
            && data.len() != values.len()
        {
            return Err(SignalError::Format(format!(
                "column {name:?} has {} rows but {first:?} has {}",
                values.len(),
                data.len()
            )));
        }
        if self.columns.iter().any(|(n, _)| n == name) {
            return Err(SignalError::InvalidArgument(format!("column {name:?} already written")));
        }
        self.columns.push((name.to_string(), values.data().clone()));
        Ok(())
    }

    fn finish(&mut self) -> Result<W> {
        let mut inner = self
            .inner
            .take()
            .ok_or_else(|| SignalError::InvalidArgument("writer is already closed".into()))?;
        let rows = self.columns.first().map_or(0, |(_, d)| d.len());
        {
            let mut wtr = csv::WriterBuilder::new()
                .delimiter(self.delimiter)
                .has_headers(false)
                .from_writer(&mut inner);
            if !self.columns.is_empty() {
                wtr.write_record(self.columns.iter().map(|(n, _)| n.as_str()))
                    .map_err(io::Error::from)?;
            }
            let mut record = Vec::with_capacity(self.columns.len());
            for i in 0..rows {
                record.clear();
                record.extend(self.columns.iter().map(|(_, d)| d.cell(i)));
                wtr.write_record(&record).map_err(io::Error::from)?;
            }
            wtr.flush()?;
        }
        inner.flush()?;
        debug!(columns = self.columns.len(), rows, "closed delimited text writer");
        Ok(inner)
    }

    /// Write the buffered columns and hand back the stream.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()
    }

    pub fn close(mut self) -> Result<()> {
        self.finish().map(drop)
    }
}

impl<W: Write> Drop for CsvWriter<W> {
    fn drop(&mut self) {
        if self.inner.is_some() && !self.columns.is_empty() {
            warn!(columns = self.columns.len(), "delimited text writer dropped without close; nothing written");
        }
    }
}
