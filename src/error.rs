//! Error taxonomy shared by every reader and writer in the crate.
//!
//! Codec-level APIs return [`Result<T>`] with a [`SignalError`]. The facades in
//! [`crate::io::signal`] return `anyhow::Result` and route every codec error
//! through an [`ErrorMap`], so an embedding application can convert errors into
//! its own hierarchy in one place.

use std::io;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignalError {
    /// Bad magic bytes, malformed tables, or values a format cannot store.
    #[error("format error: {0}")]
    Format(String),

    #[error("unsupported format version {0} (expected 2 or 3)")]
    Version(u8),

    #[error("signal not found: {0}")]
    NotFound(String),

    #[error("range error: {0}")]
    Range(String),

    /// Truncated data, failed decompression, or a block that unpacks to the wrong size.
    #[error("corrupted container: {0}")]
    Corruption(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Fieldless mirror of [`SignalError`] for matching without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Format,
    Version,
    NotFound,
    Range,
    Corruption,
    InvalidArgument,
    Io,
}

impl SignalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SignalError::Format(_) => ErrorKind::Format,
            SignalError::Version(_) => ErrorKind::Version,
            SignalError::NotFound(_) => ErrorKind::NotFound,
            SignalError::Range(_) => ErrorKind::Range,
            SignalError::Corruption(_) => ErrorKind::Corruption,
            SignalError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SignalError::Io(_) => ErrorKind::Io,
        }
    }

    /// Map an I/O error raised while decoding container structures.
    ///
    /// A short read in the middle of a table or block means the file was
    /// truncated, which is reported as corruption rather than plain I/O.
    pub(crate) fn from_read(err: io::Error, what: &str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            SignalError::Corruption(format!("unexpected end of file while reading {what}"))
        } else {
            SignalError::Io(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, SignalError>;

/// Conversion applied to every codec error leaving a facade.
pub type ErrorMap = Arc<dyn Fn(SignalError) -> anyhow::Error + Send + Sync>;

/// Push a codec result through an optional [`ErrorMap`].
///
/// Without a map the [`SignalError`] stays the root cause, so callers can
/// `downcast_ref::<SignalError>()` the returned error.
pub(crate) fn remap<T>(map: &Option<ErrorMap>, res: Result<T>) -> anyhow::Result<T> {
    res.map_err(|e| match map {
        Some(f) => f(e),
        None => anyhow::Error::new(e),
    })
}
