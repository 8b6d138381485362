//! # sigcodec
//!
//! Readers and writers for **named signal containers**: collections of sampled
//! channels (time bases, sensor readings, vector-valued positions) stored either
//! in the block-indexed BSIG binary format or as delimited text.
//!
//! ## Key Features
//!
//! - **BSIG v2 and v3** - read and write both offset widths, with optional
//!   per-block zlib compression
//! - **Random access** - decode any sample window without reading whole signals
//! - **Ten storage types** - unsigned/signed integers from 8 to 64 bits, `f32`, `f64`
//! - **Array signals** - several scalar columns per sample row
//! - **Delimited text** - column type inference, lazy or prefetched scanning,
//!   header skipping (feature `io-csv`)
//! - **Format-agnostic facades** - [`SignalReader`] and [`SignalWriter`] pick the
//!   backend from the file extension or the stream's first bytes
//!
//! ## Quick Start
//!
//! ```no_run
//! use sigcodec::*;
//! # fn main() -> anyhow::Result<()> {
//! let mut w = SignalWriter::create("drive.bsig", SignalWriterOptions::default())?;
//! w.append("Time", vec![0u64, 20_000, 40_000, 60_000])?;
//! w.append("Value", vec![0.0f64, 0.5, 1.0, 1.5])?;
//! w.close()?;
//!
//! let mut r = SignalReader::open("drive.bsig", SignalReaderOptions::default())?;
//! assert_eq!(r.signal_names(), ["Time", "Value"]);
//! let value = r.signal_window("Value", 1, Some(2))?;
//! assert_eq!(value.data().as_f64(), Some(&[0.5, 1.0][..]));
//! # Ok(())
//! # }
//! ```
//!
//! Signal names match exactly unless
//! [`BsigReaderOptions::ignore_case`] is set. Windows take a negative offset to
//! count back from the end of the signal.
//!
//! ## Errors
//!
//! Backends return [`SignalError`], whose [`kind`](SignalError::kind) tells a
//! malformed file apart from a missing signal or a bad window. The facades
//! return [`anyhow::Error`] with the path attached; install an [`ErrorMap`] to
//! translate backend errors into your own types.
//!
//! ## Feature Flags
//!
//! - `io-csv` (default) - delimited text backend
//!
//! ## Module Overview
//!
//! - [`types`] - storage type table, [`SignalData`], [`SignalArray`]
//! - [`io::bsig`] - binary container reader, writer, and layout
//! - `io::csv` - delimited text reader, writer, and column scanning
//! - [`io::signal`] - backend traits and the format-agnostic facades
//! - [`io::convert`] - copying signals between containers
//! - [`testing`] - fixtures and assertions for tests

pub mod error;
pub mod io;
pub mod testing;
pub mod types;

// General re-exports
pub use error::{ErrorKind, ErrorMap, Result, SignalError};
pub use io::bsig::{BsigReader, BsigReaderOptions, BsigWriter, BsigWriterOptions, FormatVersion};
pub use io::convert::{convert_file, copy_signals};
pub use io::detect::{ContainerFormat, FormatHint};
pub use io::signal::{
    SignalId, SignalInfo, SignalReader, SignalReaderOptions, SignalSink, SignalSource,
    SignalWriter, SignalWriterOptions, open_signals,
};
pub use types::{Element, SignalArray, SignalData, TypeCode};

// Gated re-exports
#[cfg(feature = "io-csv")]
pub use io::csv::{CsvReader, CsvReaderOptions, CsvWriter, CsvWriterOptions, ScanPolicy, ScanStrategy};
