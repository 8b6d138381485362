//! Random-access reader for BSIG containers.
//!
//! The header, footer and both tables are parsed once at open. After that,
//! every [`BsigReader::signal_window`] call seeks to and decodes only the
//! blocks overlapping the requested window; nothing is cached between calls.

use super::layout::{
    FOOTER_SIZE, Footer, FormatVersion, HEADER_SIZE, Header, SignalDescriptor, decode_tables,
    validate_block_size,
};
use crate::error::{Result, SignalError};
use crate::io::compression::{BlockCodec, read_block};
use crate::io::signal::{SignalId, SignalInfo, SignalIter};
use crate::types::{SignalArray, SignalData};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, trace};

/// Reader configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BsigReaderOptions {
    /// Match signal names without regard to ASCII case.
    pub ignore_case: bool,
}

impl BsigReaderOptions {
    #[must_use]
    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }
}

/// Resolve a possibly negative `offset` and optional `count` against a
/// signal of `len` samples.
///
/// A negative offset counts from the end. A missing count means "to the end".
pub(crate) fn normalize_window(len: usize, offset: i64, count: Option<usize>) -> Result<(usize, usize)> {
    let start = if offset < 0 {
        let back = offset.unsigned_abs();
        usize::try_from(back)
            .ok()
            .and_then(|b| len.checked_sub(b))
            .ok_or_else(|| SignalError::Range(format!("offset {offset} before start of {len} samples")))?
    } else {
        let fwd = usize::try_from(offset)
            .map_err(|_| SignalError::Range(format!("offset {offset} out of range")))?;
        if fwd > len {
            return Err(SignalError::Range(format!("offset {fwd} beyond {len} samples")));
        }
        fwd
    };
    let remaining = len - start;
    let count = match count {
        None => remaining,
        Some(c) if c <= remaining => c,
        Some(c) => {
            return Err(SignalError::Range(format!(
                "offset {start} + count {c} exceeds {len} samples"
            )));
        }
    };
    Ok((start, count))
}

/// Reader over a BSIG container.
///
/// `R` is either a file the reader opened itself ([`BsigReader::open`]) or a
/// caller-supplied stream ([`BsigReader::from_reader`]). Pass `&mut stream` to
/// keep ownership: the reader never outlives the borrow and [`close`](Self::close)
/// puts the stream back where it was found.
pub struct BsigReader<R: Read + Seek> {
    inner: R,
    start_pos: u64,
    version: FormatVersion,
    block_size: u32,
    compressed: bool,
    signals: Vec<SignalDescriptor>,
    options: BsigReaderOptions,
    codec: BlockCodec,
}

impl BsigReader<BufReader<File>> {
    /// Open a container file. The file handle is released when the reader is
    /// closed or dropped, and also when parsing fails.
    pub fn open(path: impl AsRef<Path>, options: BsigReaderOptions) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file), options)
    }
}

impl<R: Read + Seek> BsigReader<R> {
    /// Parse the container structures from an already-open stream.
    ///
    /// On failure the stream is repositioned to where it was on entry.
    pub fn from_reader(mut inner: R, options: BsigReaderOptions) -> Result<Self> {
        let start_pos = inner.stream_position()?;
        match parse_container(&mut inner) {
            Ok((header, footer, signals)) => {
                debug!(
                    version = header.version.major(),
                    signals = signals.len(),
                    block_size = footer.block_size,
                    compressed = footer.compressed,
                    "opened bsig container"
                );
                Ok(Self {
                    inner,
                    start_pos,
                    version: header.version,
                    block_size: footer.block_size,
                    compressed: footer.compressed,
                    signals,
                    options,
                    codec: BlockCodec::default(),
                })
            }
            Err(e) => {
                let _ = inner.seek(SeekFrom::Start(start_pos));
                Err(e)
            }
        }
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Number of signals in the container.
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Signal names in storage order.
    pub fn signal_names(&self) -> Vec<String> {
        self.signals.iter().map(|s| s.name.clone()).collect()
    }

    fn resolve(&self, id: SignalId<'_>) -> Result<usize> {
        match id {
            SignalId::Index(i) if i < self.signals.len() => Ok(i),
            SignalId::Index(i) => Err(SignalError::NotFound(format!(
                "index {i} (container holds {} signals)",
                self.signals.len()
            ))),
            SignalId::Name(name) => {
                let found = if self.options.ignore_case {
                    self.signals.iter().position(|s| s.name.eq_ignore_ascii_case(name))
                } else {
                    self.signals.iter().position(|s| s.name == name)
                };
                found.ok_or_else(|| SignalError::NotFound(name.to_string()))
            }
        }
    }

    pub fn info<'a>(&self, id: impl Into<SignalId<'a>>) -> Result<SignalInfo> {
        let s = &self.signals[self.resolve(id.into())?];
        Ok(SignalInfo {
            name: s.name.clone(),
            type_code: Some(s.ty),
            array_length: s.array_length,
            sample_count: s.sample_count,
            block_count: s.offsets.len(),
        })
    }

    /// Sample count of `id`, or of the first signal when `id` is `None`
    /// (0 for an empty container).
    pub fn signal_length(&self, id: Option<SignalId<'_>>) -> Result<usize> {
        match id {
            Some(id) => Ok(self.signals[self.resolve(id)?].sample_count),
            None => Ok(self.signals.first().map_or(0, |s| s.sample_count)),
        }
    }

    /// Read a whole signal.
    pub fn signal<'a>(&mut self, id: impl Into<SignalId<'a>>) -> Result<SignalArray> {
        self.signal_window(id, 0, None)
    }

    /// Read several signals, in request order.
    pub fn signals(&mut self, ids: &[SignalId<'_>]) -> Result<Vec<SignalArray>> {
        ids.iter().map(|&id| self.signal(id)).collect()
    }

    /// Read `count` samples starting at `offset`.
    ///
    /// A negative `offset` counts back from the last sample; `count = None`
    /// reads to the end. Windows extending past the signal are a
    /// [`SignalError::Range`].
    pub fn signal_window<'a>(
        &mut self,
        id: impl Into<SignalId<'a>>,
        offset: i64,
        count: Option<usize>,
    ) -> Result<SignalArray> {
        let idx = self.resolve(id.into())?;
        let desc = &self.signals[idx];
        let (offset, count) = normalize_window(desc.sample_count, offset, count)?;

        let width = desc.array_length;
        let ty = desc.ty;
        let elem = ty.width();
        let block_len = self.block_size as usize / elem;
        if count == 0 {
            return SignalArray::new(SignalData::empty(ty), width);
        }

        // Flat element window, then drop every block that lies entirely
        // before or after it.
        let flat_start = offset * width;
        let flat_end = flat_start + count * width;
        let flat_total = desc.sample_count * width;
        let total_blocks = desc.offsets.len();
        if total_blocks != flat_total.div_ceil(block_len) {
            return Err(SignalError::Corruption(format!(
                "signal {:?} has {total_blocks} blocks but {flat_total} elements of {block_len} per block",
                desc.name
            )));
        }
        let first = flat_start / block_len;
        let last = (flat_end - 1) / block_len;
        let blocks = desc.offsets[first..=last].to_vec();
        let name = desc.name.clone();
        let skip = flat_start - first * block_len;

        let mut raw = Vec::with_capacity(blocks.len() * block_len * elem);
        for (i, &pos) in blocks.iter().enumerate() {
            let k = first + i;
            // Every block is full except possibly the last one.
            let expected = block_len.min(flat_total - k * block_len) * elem;
            self.inner.seek(SeekFrom::Start(pos))?;
            let mut block =
                read_block(&mut self.inner, &self.codec, self.block_size as usize, self.compressed)?;
            // Uncompressed reads run up to block_size and may pick up the bytes
            // that follow a short final block.
            let size_ok = if self.compressed {
                block.len() == expected
            } else {
                block.len() >= expected
            };
            if !size_ok {
                return Err(SignalError::Corruption(format!(
                    "block {k} of {name:?} decoded to {} bytes, expected {expected}",
                    block.len()
                )));
            }
            block.truncate(expected);
            trace!(signal = %name, block = k, bytes = block.len(), "decoded block");
            raw.extend_from_slice(&block);
        }

        let start_byte = skip * elem;
        let end_byte = start_byte + count * width * elem;
        if raw.len() < end_byte {
            return Err(SignalError::Corruption(format!(
                "signal {name:?} unpacked to {} bytes, expected at least {end_byte}",
                raw.len()
            )));
        }
        SignalArray::new(SignalData::unpack_le(ty, &raw[start_byte..end_byte]), width)
    }

    /// Iterate `(name, values)` over all signals. Each call starts a fresh pass.
    pub fn iter(&mut self) -> SignalIter<'_, Self> {
        SignalIter::new(self)
    }

    /// Release the reader, handing back the stream positioned where it was
    /// when the reader was created.
    pub fn into_inner(mut self) -> Result<R> {
        self.inner.seek(SeekFrom::Start(self.start_pos))?;
        Ok(self.inner)
    }

    /// Close the reader. A self-opened file is released here.
    pub fn close(self) -> Result<()> {
        debug!(signals = self.signals.len(), "closing bsig reader");
        self.into_inner().map(drop)
    }
}

fn read_exact_at<R: Read + Seek>(r: &mut R, from: SeekFrom, buf: &mut [u8], what: &str) -> Result<()> {
    r.seek(from)?;
    r.read_exact(buf).map_err(|e| SignalError::from_read(e, what))
}

fn parse_container<R: Read + Seek>(
    r: &mut R,
) -> Result<(Header, Footer, Vec<SignalDescriptor>)> {
    let file_len = r.seek(SeekFrom::End(0))?;
    if file_len < HEADER_SIZE + FOOTER_SIZE {
        return Err(SignalError::Format(format!(
            "{file_len} bytes is too small for a bsig container"
        )));
    }

    let mut hbuf = [0u8; HEADER_SIZE as usize];
    read_exact_at(r, SeekFrom::Start(0), &mut hbuf, "header")?;
    let header = Header::decode(&hbuf)?;

    let mut fbuf = [0u8; FOOTER_SIZE as usize];
    read_exact_at(r, SeekFrom::Start(file_len - FOOTER_SIZE), &mut fbuf, "footer")?;
    let footer = Footer::decode(&fbuf)?;

    validate_block_size(footer.block_size)
        .map_err(|_| SignalError::Corruption(format!("invalid block size {} in footer", footer.block_size)))?;

    let tables = u64::from(footer.descriptor_size) + u64::from(footer.offset_size);
    if HEADER_SIZE + tables + FOOTER_SIZE > file_len {
        return Err(SignalError::Corruption(format!(
            "tables of {tables} bytes do not fit a {file_len}-byte file"
        )));
    }
    let desc_pos = file_len - FOOTER_SIZE - u64::from(footer.descriptor_size);
    let offs_pos = desc_pos - u64::from(footer.offset_size);

    let mut dbuf = vec![0u8; footer.descriptor_size as usize];
    read_exact_at(r, SeekFrom::Start(desc_pos), &mut dbuf, "descriptor table")?;
    let mut obuf = vec![0u8; footer.offset_size as usize];
    read_exact_at(r, SeekFrom::Start(offs_pos), &mut obuf, "offset table")?;

    let signals = decode_tables(header.version, footer.signal_count as usize, &dbuf, &obuf)?;
    Ok((header, footer, signals))
}
