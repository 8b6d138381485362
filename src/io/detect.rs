//! Container format detection.
//!
//! Paths are classified by extension only. Streams have no name, so they are
//! classified by peeking at their first bytes for the BSIG signature.

use crate::error::Result;
use crate::io::bsig::layout::MAGIC;
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Extensions (lowercase, without the dot) that select the binary format.
pub const BINARY_EXTENSIONS: [&str; 3] = ["bsig", "bin", "tstp"];

/// Concrete on-disk format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Binary,
    Text,
}

/// Caller's choice of format; `Auto` detects it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatHint {
    #[default]
    Auto,
    Binary,
    Text,
}

impl FormatHint {
    /// The forced format, if any.
    pub fn forced(self) -> Option<ContainerFormat> {
        match self {
            FormatHint::Auto => None,
            FormatHint::Binary => Some(ContainerFormat::Binary),
            FormatHint::Text => Some(ContainerFormat::Text),
        }
    }
}

/// Binary when the extension is one of [`BINARY_EXTENSIONS`] (any case),
/// text otherwise.
pub fn detect_from_extension(path: impl AsRef<Path>) -> ContainerFormat {
    let ext = path
        .as_ref()
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());
    match ext {
        Some(e) if BINARY_EXTENSIONS.contains(&e.as_str()) => ContainerFormat::Binary,
        _ => ContainerFormat::Text,
    }
}

/// Peek at the stream for the BSIG signature. The position is restored.
pub fn detect_from_magic<R: Read + Seek>(r: &mut R) -> Result<ContainerFormat> {
    let pos = r.stream_position()?;
    let mut buf = [0u8; MAGIC.len()];
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    r.seek(SeekFrom::Start(pos))?;
    Ok(if filled == buf.len() && buf == MAGIC {
        ContainerFormat::Binary
    } else {
        ContainerFormat::Text
    })
}
