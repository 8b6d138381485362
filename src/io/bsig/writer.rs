//! Append-only writer for BSIG containers.
//!
//! Blocks are written as soon as a signal is appended; only the per-signal
//! descriptors and block offsets stay in memory. [`BsigWriter::close`] emits the
//! offset table, the descriptor table and the footer, in that order.

use super::layout::{
    FOOTER_SIZE, Footer, FormatVersion, HEADER_SIZE, Header, SignalDescriptor, encode_descriptors,
    encode_offsets, validate_block_size,
};
use crate::error::{Result, SignalError};
use crate::io::compression::{BlockCodec, write_block};
use crate::types::SignalArray;
use serde::{Deserialize, Serialize};
use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Writer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BsigWriterOptions {
    pub version: FormatVersion,
    /// Uncompressed block size in bytes: a power of two in `[256, 65536]`.
    pub block_size: u32,
    /// Deflate-compress every block.
    pub compress: bool,
}

impl Default for BsigWriterOptions {
    fn default() -> Self {
        Self { version: FormatVersion::V3, block_size: 4096, compress: true }
    }
}

impl BsigWriterOptions {
    #[must_use]
    pub fn with_version(mut self, version: FormatVersion) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

/// Writer producing a BSIG container.
///
/// Dropping a writer without calling [`close`](Self::close) leaves an
/// unreadable container (there is no footer).
pub struct BsigWriter<W: Write + Seek> {
    inner: Option<W>,
    pos: u64,
    options: BsigWriterOptions,
    codec: BlockCodec,
    signals: Vec<SignalDescriptor>,
}

impl BsigWriter<BufWriter<File>> {
    /// Create (or truncate) a container file, creating parent directories.
    pub fn create(path: impl AsRef<Path>, options: BsigWriterOptions) -> Result<Self> {
        validate_block_size(options.block_size)?;
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Self::from_writer(BufWriter::new(file), options)
    }
}

impl<W: Write + Seek> BsigWriter<W> {
    /// Start a container at the current position of `inner`.
    ///
    /// Block offsets are absolute stream positions, so `inner` should be
    /// positioned at the start of an empty stream.
    pub fn from_writer(mut inner: W, options: BsigWriterOptions) -> Result<Self> {
        validate_block_size(options.block_size)?;
        let start = inner.stream_position()?;
        inner.write_all(&Header { version: options.version }.encode())?;
        Ok(Self {
            inner: Some(inner),
            pos: start + HEADER_SIZE,
            options,
            codec: BlockCodec::default(),
            signals: Vec::new(),
        })
    }

    pub fn options(&self) -> &BsigWriterOptions {
        &self.options
    }

    /// Names appended so far, in order.
    pub fn signal_names(&self) -> Vec<String> {
        self.signals.iter().map(|s| s.name.clone()).collect()
    }

    /// Pack `values` into blocks and write them immediately.
    ///
    /// Signals may have different sample counts. Text values and duplicate
    /// names are rejected.
    pub fn append(&mut self, name: &str, values: &SignalArray) -> Result<()> {
        if self.signals.iter().any(|s| s.name == name) {
            return Err(SignalError::InvalidArgument(format!("signal {name:?} already written")));
        }
        if name.len() > usize::from(u16::MAX) {
            return Err(SignalError::InvalidArgument(format!(
                "signal name of {} bytes is too long",
                name.len()
            )));
        }
        let ty = values.type_code().ok_or_else(|| {
            SignalError::Format(format!("signal {name:?} holds text, which bsig cannot store"))
        })?;
        let sample_count = values.len();
        if u32::try_from(sample_count).is_err() {
            return Err(SignalError::InvalidArgument(format!(
                "signal {name:?} has {sample_count} samples, more than a container can index"
            )));
        }

        let inner = self.inner.as_mut().ok_or_else(closed)?;
        let data = values.data();
        let block_len = self.options.block_size as usize / ty.width();
        let mut offsets = Vec::with_capacity(data.len().div_ceil(block_len));
        let mut raw = Vec::with_capacity(self.options.block_size as usize);
        let mut start = 0;
        while start < data.len() {
            let end = (start + block_len).min(data.len());
            raw.clear();
            data.pack_le(start, end, &mut raw)?;
            offsets.push(self.pos);
            self.pos += write_block(inner, &self.codec, &raw, self.options.compress)?;
            start = end;
        }

        debug!(signal = name, samples = sample_count, blocks = offsets.len(), %ty, "appended signal");
        self.signals.push(SignalDescriptor {
            name: name.to_string(),
            ty,
            array_length: values.width(),
            sample_count,
            offsets,
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<W> {
        let mut inner = self.inner.take().ok_or_else(closed)?;
        let offsets = encode_offsets(self.options.version, &self.signals)?;
        let descriptors = encode_descriptors(&self.signals)?;
        let footer = Footer {
            signal_count: u32::try_from(self.signals.len())
                .map_err(|_| SignalError::InvalidArgument("too many signals".into()))?,
            block_size: self.options.block_size,
            descriptor_size: table_size(&descriptors)?,
            offset_size: table_size(&offsets)?,
            compressed: self.options.compress,
        };
        inner.write_all(&offsets)?;
        inner.write_all(&descriptors)?;
        inner.write_all(&footer.encode())?;
        inner.flush()?;
        self.pos += (offsets.len() + descriptors.len()) as u64 + FOOTER_SIZE;
        debug!(signals = self.signals.len(), bytes = self.pos, "closed bsig container");
        Ok(inner)
    }

    /// Finalize the container and hand back the stream, positioned at the end
    /// of the container.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()
    }

    /// Finalize the container. A self-opened file is flushed and released.
    pub fn close(mut self) -> Result<()> {
        self.finish().map(drop)
    }
}

impl<W: Write + Seek> Drop for BsigWriter<W> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            warn!(signals = self.signals.len(), "bsig writer dropped without close; container has no footer");
        }
    }
}

fn closed() -> SignalError {
    SignalError::InvalidArgument("writer is already closed".into())
}

fn table_size(table: &[u8]) -> Result<u32> {
    u32::try_from(table.len())
        .map_err(|_| SignalError::InvalidArgument(format!("table of {} bytes", table.len())))
}
