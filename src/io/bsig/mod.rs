//! BSIG binary signal containers.
//!
//! A container holds any number of named, typed signals. Each signal is split
//! into fixed-size blocks (optionally deflate-compressed) whose file offsets
//! are kept in a per-signal index, so a reader can decode an arbitrary window
//! of samples without touching the rest of the file.
//!
//! ```no_run
//! use sigcodec::io::bsig::{BsigReader, BsigReaderOptions, BsigWriter, BsigWriterOptions};
//! use sigcodec::SignalArray;
//! # fn main() -> sigcodec::Result<()> {
//! let mut w = BsigWriter::create("run.bsig", BsigWriterOptions::default())?;
//! w.append("Time", &SignalArray::from(vec![0u32, 10, 20, 30]))?;
//! w.close()?;
//!
//! let mut r = BsigReader::open("run.bsig", BsigReaderOptions::default())?;
//! let tail = r.signal_window("Time", -2, None)?;
//! assert_eq!(tail.data().as_u32(), Some(&[20u32, 30][..]));
//! # Ok(())
//! # }
//! ```

pub mod layout;
mod reader;
mod writer;

pub use layout::{FormatVersion, SignalDescriptor};
pub use reader::{BsigReader, BsigReaderOptions};
pub(crate) use reader::normalize_window;
pub use writer::{BsigWriter, BsigWriterOptions};
