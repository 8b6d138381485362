//! Delimited-text signal files.
//!
//! This module provides:
//! - [`CsvReader`]: header-driven column model with eager ([`ScanStrategy::Prefetch`])
//!   or on-demand cached ([`ScanStrategy::NoPrefetch`]) column conversion.
//! - [`CsvWriter`]: buffers equally long scalar columns and writes them row by row.
//! - [`scan`]: the cell classifier behind [`ScanPolicy::Auto`].
//!
//! # Design notes
//! - Unlike binary containers, every column of one file has the same length.
//! - The delimiter is restricted to [`DELIMITERS`]; an unsupported one is
//!   replaced by `;` with a warning.

mod reader;
pub mod scan;
mod writer;

pub use reader::{CsvReader, CsvReaderOptions, ScanStrategy};
pub use scan::{Caster, ColumnKind, ScanPolicy};
pub use writer::{CsvWriter, CsvWriterOptions};

use tracing::warn;

/// Accepted field delimiters.
pub const DELIMITERS: [char; 5] = [';', ',', '\t', '|', ' '];

pub(crate) fn resolve_delimiter(requested: char) -> u8 {
    if DELIMITERS.contains(&requested) {
        requested as u8
    } else {
        warn!(?requested, "unsupported delimiter, using ';'");
        b';'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_allow_list() {
        assert_eq!(resolve_delimiter(','), b',');
        assert_eq!(resolve_delimiter('\t'), b'\t');
        assert_eq!(resolve_delimiter(':'), b';');
        assert_eq!(resolve_delimiter('é'), b';');
    }
}
