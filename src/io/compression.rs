//! Block compression for binary signal containers.
//!
//! A compressed container stores every block as a 4-byte little-endian length
//! prefix followed by that many bytes of zlib-framed deflate data. Blocks are
//! compressed independently, so a windowed read only inflates the blocks it
//! touches.
//!
//! ## Usage
//! ```
//! use sigcodec::io::compression::{BlockCodec, read_block, write_block};
//! use std::io::Cursor;
//! # fn main() -> sigcodec::Result<()> {
//! let codec = BlockCodec::default();
//! let mut out = Vec::new();
//! let written = write_block(&mut out, &codec, &[7u8; 256], true)?;
//! assert_eq!(written as usize, out.len());
//!
//! let raw = read_block(&mut Cursor::new(out), &codec, 256, true)?;
//! assert_eq!(raw, vec![7u8; 256]);
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, SignalError};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// Size of the length prefix in front of each compressed block.
pub const LENGTH_PREFIX: usize = 4;

/// Largest compressed payload accepted for a block of `block_size` raw bytes.
///
/// Deflate adds a few bytes per stored run on incompressible input, far less
/// than this bound.
pub fn max_compressed_len(block_size: usize) -> usize {
    block_size + block_size / 2 + 64
}

/// The container's single compression scheme: zlib-framed deflate.
#[derive(Debug, Clone, Copy)]
pub struct BlockCodec {
    level: Compression,
}

impl Default for BlockCodec {
    fn default() -> Self {
        Self { level: Compression::default() }
    }
}

impl BlockCodec {
    /// Codec with an explicit deflate level (0-9).
    pub fn with_level(level: u32) -> Self {
        Self { level: Compression::new(level.min(9)) }
    }

    pub fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let mut enc = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2 + 16), self.level);
        enc.write_all(raw)?;
        Ok(enc.finish()?)
    }

    /// Inflate one block of at most `block_size` bytes. Decoder failures and
    /// output beyond `block_size` are reported as corruption.
    pub fn decompress(&self, packed: &[u8], block_size: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(block_size);
        ZlibDecoder::new(packed)
            .take(block_size as u64 + 1)
            .read_to_end(&mut out)
            .map_err(|e| SignalError::Corruption(format!("block decompression failed: {e}")))?;
        if out.len() > block_size {
            return Err(SignalError::Corruption(format!(
                "block inflates past the {block_size}-byte block size"
            )));
        }
        Ok(out)
    }
}

/// Write one block payload, returning the number of bytes emitted.
///
/// Uncompressed blocks are written verbatim. Compressed blocks get the
/// length prefix.
pub fn write_block<W: Write>(
    w: &mut W,
    codec: &BlockCodec,
    raw: &[u8],
    compressed: bool,
) -> Result<u64> {
    if !compressed {
        w.write_all(raw)?;
        return Ok(raw.len() as u64);
    }
    let packed = codec.compress(raw)?;
    let len = u32::try_from(packed.len()).map_err(|_| {
        SignalError::InvalidArgument(format!("compressed block of {} bytes", packed.len()))
    })?;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(&packed)?;
    Ok((LENGTH_PREFIX + packed.len()) as u64)
}

/// Read one block payload from the current position.
///
/// Uncompressed blocks read up to `block_size` bytes; fewer are returned when
/// the stream ends first, since the last block of a signal may be short.
pub fn read_block<R: Read>(
    r: &mut R,
    codec: &BlockCodec,
    block_size: usize,
    compressed: bool,
) -> Result<Vec<u8>> {
    if !compressed {
        let mut raw = Vec::with_capacity(block_size);
        r.by_ref()
            .take(block_size as u64)
            .read_to_end(&mut raw)
            .map_err(|e| SignalError::from_read(e, "block"))?;
        return Ok(raw);
    }
    let mut len = [0u8; LENGTH_PREFIX];
    r.read_exact(&mut len)
        .map_err(|e| SignalError::from_read(e, "block length prefix"))?;
    let len = u32::from_le_bytes(len) as usize;
    if len > max_compressed_len(block_size) {
        return Err(SignalError::Corruption(format!(
            "compressed block claims {len} bytes for a {block_size}-byte block size"
        )));
    }
    let mut packed = vec![0u8; len];
    r.read_exact(&mut packed)
        .map_err(|e| SignalError::from_read(e, "compressed block"))?;
    codec.decompress(&packed, block_size)
}
