//! On-disk structures of a BSIG container.
//!
//! ```text
//! +--------------------+  offset 0
//! | header (8 B)       |  "BSIG", version[3], reserved
//! +--------------------+
//! | blocks ...         |  per signal, in sample order
//! +--------------------+
//! | offset table       |  per signal: block_count u32, sample_count u32,
//! |                    |  block_count offsets (u32 in v2, u64 in v3)
//! +--------------------+
//! | descriptor table   |  per signal: name_len u16, name, array_length u32,
//! |                    |  type_code u32
//! +--------------------+
//! | footer (24 B)      |  signal_count u32, block_size u32,
//! |                    |  descriptor_size u32, offset_size u32,
//! |                    |  reserved[3], compression u8, "BSIG"
//! +--------------------+  end of file
//! ```
//!
//! All integers are little-endian. Signals appear in the same order in both
//! tables.

use crate::error::{Result, SignalError};
use crate::types::TypeCode;
use serde::{Deserialize, Serialize};

pub const MAGIC: [u8; 4] = *b"BSIG";
pub const HEADER_SIZE: u64 = 8;
pub const FOOTER_SIZE: u64 = 24;
pub const MIN_BLOCK_SIZE: u32 = 1 << 8;
pub const MAX_BLOCK_SIZE: u32 = 1 << 16;

/// Binary format revision. The only structural difference is the width of
/// block offsets in the offset table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FormatVersion {
    V2,
    #[default]
    V3,
}

impl FormatVersion {
    pub fn major(self) -> u8 {
        match self {
            FormatVersion::V2 => 2,
            FormatVersion::V3 => 3,
        }
    }

    pub fn from_major(major: u8) -> Result<Self> {
        match major {
            2 => Ok(FormatVersion::V2),
            3 => Ok(FormatVersion::V3),
            other => Err(SignalError::Version(other)),
        }
    }

    /// Bytes per block offset.
    pub fn offset_width(self) -> usize {
        match self {
            FormatVersion::V2 => 4,
            FormatVersion::V3 => 8,
        }
    }

    pub fn put_offset(self, offset: u64, out: &mut Vec<u8>) -> Result<()> {
        match self {
            FormatVersion::V2 => {
                let narrow = u32::try_from(offset).map_err(|_| {
                    SignalError::Format(format!(
                        "block offset {offset} does not fit a version 2 container"
                    ))
                })?;
                out.extend_from_slice(&narrow.to_le_bytes());
            }
            FormatVersion::V3 => out.extend_from_slice(&offset.to_le_bytes()),
        }
        Ok(())
    }

    pub fn get_offset(self, cur: &mut ByteCursor<'_>) -> Result<u64> {
        match self {
            FormatVersion::V2 => cur.u32().map(u64::from),
            FormatVersion::V3 => cur.u64(),
        }
    }
}

/// Check a block size: a power of two in `[MIN_BLOCK_SIZE, MAX_BLOCK_SIZE]`.
pub fn validate_block_size(block_size: u32) -> Result<()> {
    if !block_size.is_power_of_two() || !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
        return Err(SignalError::InvalidArgument(format!(
            "block size {block_size} must be a power of two between {MIN_BLOCK_SIZE} and {MAX_BLOCK_SIZE}"
        )));
    }
    Ok(())
}

/// Bounds-checked little-endian reader over a table buffer.
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8], what: &'static str) -> Self {
        Self { buf, pos: 0, what }
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.buf.len()).ok_or_else(|| {
            SignalError::Corruption(format!("{} truncated at byte {}", self.what, self.pos))
        })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_le_bytes(a))
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

/// Decoded 8-byte file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: FormatVersion,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_SIZE as usize] {
        let mut out = [0u8; HEADER_SIZE as usize];
        out[..4].copy_from_slice(&MAGIC);
        out[4] = self.version.major();
        out
    }

    pub fn decode(buf: &[u8; HEADER_SIZE as usize]) -> Result<Self> {
        if buf[..4] != MAGIC {
            return Err(SignalError::Format(format!(
                "bad header signature {:?}",
                String::from_utf8_lossy(&buf[..4])
            )));
        }
        Ok(Header { version: FormatVersion::from_major(buf[4])? })
    }
}

/// Decoded 24-byte footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub signal_count: u32,
    pub block_size: u32,
    pub descriptor_size: u32,
    pub offset_size: u32,
    pub compressed: bool,
}

impl Footer {
    pub fn encode(&self) -> [u8; FOOTER_SIZE as usize] {
        let mut out = [0u8; FOOTER_SIZE as usize];
        out[0..4].copy_from_slice(&self.signal_count.to_le_bytes());
        out[4..8].copy_from_slice(&self.block_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.descriptor_size.to_le_bytes());
        out[12..16].copy_from_slice(&self.offset_size.to_le_bytes());
        // 16..19 reserved
        out[19] = u8::from(self.compressed);
        out[20..24].copy_from_slice(&MAGIC);
        out
    }

    pub fn decode(buf: &[u8; FOOTER_SIZE as usize]) -> Result<Self> {
        if buf[20..24] != MAGIC {
            return Err(SignalError::Format(format!(
                "bad footer signature {:?}",
                String::from_utf8_lossy(&buf[20..24])
            )));
        }
        let mut cur = ByteCursor::new(&buf[..16], "footer");
        Ok(Footer {
            signal_count: cur.u32()?,
            block_size: cur.u32()?,
            descriptor_size: cur.u32()?,
            offset_size: cur.u32()?,
            compressed: buf[19] == 1,
        })
    }
}

/// Everything the container records about one signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalDescriptor {
    pub name: String,
    pub ty: TypeCode,
    /// Scalar columns per sample row.
    pub array_length: usize,
    pub sample_count: usize,
    /// File offsets of this signal's blocks, in sample order.
    pub offsets: Vec<u64>,
}

fn to_u32(v: usize, what: &str) -> Result<u32> {
    u32::try_from(v).map_err(|_| SignalError::InvalidArgument(format!("{what} {v} exceeds 32 bits")))
}

pub fn encode_descriptors(signals: &[SignalDescriptor]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for s in signals {
        let name = s.name.as_bytes();
        let len = u16::try_from(name.len()).map_err(|_| {
            SignalError::InvalidArgument(format!("signal name of {} bytes is too long", name.len()))
        })?;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(name);
        out.extend_from_slice(&to_u32(s.array_length, "array length")?.to_le_bytes());
        out.extend_from_slice(&s.ty.code().to_le_bytes());
    }
    Ok(out)
}

pub fn encode_offsets(version: FormatVersion, signals: &[SignalDescriptor]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for s in signals {
        out.extend_from_slice(&to_u32(s.offsets.len(), "block count")?.to_le_bytes());
        out.extend_from_slice(&to_u32(s.sample_count, "sample count")?.to_le_bytes());
        for &off in &s.offsets {
            version.put_offset(off, &mut out)?;
        }
    }
    Ok(out)
}

/// Parse both tables into descriptors.
pub fn decode_tables(
    version: FormatVersion,
    signal_count: usize,
    descriptors: &[u8],
    offsets: &[u8],
) -> Result<Vec<SignalDescriptor>> {
    let mut dcur = ByteCursor::new(descriptors, "descriptor table");
    let mut ocur = ByteCursor::new(offsets, "offset table");
    let mut out = Vec::with_capacity(signal_count.min(1 << 16));
    for _ in 0..signal_count {
        let name_len = dcur.u16()? as usize;
        let name = String::from_utf8_lossy(dcur.take(name_len)?).into_owned();
        let array_length = dcur.u32()? as usize;
        let code = dcur.u32()?;
        let ty = TypeCode::from_code(code).ok_or_else(|| {
            SignalError::Corruption(format!("signal {name:?} has unknown type code {code:#06x}"))
        })?;
        if array_length == 0 {
            return Err(SignalError::Corruption(format!("signal {name:?} has array length 0")));
        }

        let block_count = ocur.u32()? as usize;
        let sample_count = ocur.u32()? as usize;
        if ocur.remaining() < block_count.saturating_mul(version.offset_width()) {
            return Err(SignalError::Corruption(format!(
                "offset table too short for {block_count} blocks of {name:?}"
            )));
        }
        let mut offs = Vec::with_capacity(block_count);
        for _ in 0..block_count {
            offs.push(version.get_offset(&mut ocur)?);
        }
        if offs.windows(2).any(|w| w[1] < w[0]) {
            return Err(SignalError::Corruption(format!(
                "block offsets of {name:?} are not ascending"
            )));
        }
        out.push(SignalDescriptor { name, ty, array_length, sample_count, offsets: offs });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sample() -> Vec<SignalDescriptor> {
        vec![
            SignalDescriptor {
                name: "Time".into(),
                ty: TypeCode::U64,
                array_length: 1,
                sample_count: 8,
                offsets: vec![8],
            },
            SignalDescriptor {
                name: "Pos".into(),
                ty: TypeCode::F32,
                array_length: 3,
                sample_count: 100,
                offsets: vec![72, 328],
            },
        ]
    }

    #[test]
    fn tables_decode_what_was_encoded() -> Result<()> {
        for version in [FormatVersion::V2, FormatVersion::V3] {
            let d = encode_descriptors(&sample())?;
            let o = encode_offsets(version, &sample())?;
            assert_eq!(decode_tables(version, 2, &d, &o)?, sample());
        }
        Ok(())
    }

    #[test]
    fn offset_width_follows_version() -> Result<()> {
        let v2 = encode_offsets(FormatVersion::V2, &sample())?;
        let v3 = encode_offsets(FormatVersion::V3, &sample())?;
        assert_eq!(v2.len(), 8 + 4 + 8 + 2 * 4);
        assert_eq!(v3.len(), 8 + 8 + 8 + 2 * 8);
        Ok(())
    }

    #[test]
    fn v2_rejects_wide_offsets() {
        let mut out = Vec::new();
        let err = FormatVersion::V2.put_offset(u64::from(u32::MAX) + 1, &mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn header_checks() {
        let mut h = Header { version: FormatVersion::V2 }.encode();
        assert_eq!(&h[..5], b"BSIG\x02");
        assert_eq!(Header::decode(&h).unwrap().version, FormatVersion::V2);
        h[4] = 4;
        assert_eq!(Header::decode(&h).unwrap_err().kind(), ErrorKind::Version);
        h[0] = b'X';
        assert_eq!(Header::decode(&h).unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn footer_layout() {
        let f = Footer {
            signal_count: 2,
            block_size: 4096,
            descriptor_size: 31,
            offset_size: 40,
            compressed: true,
        };
        let buf = f.encode();
        assert_eq!(buf[19], 1);
        assert_eq!(&buf[20..], b"BSIG");
        assert_eq!(Footer::decode(&buf).unwrap(), f);
    }

    #[test]
    fn descending_offsets_are_corruption() {
        let mut s = sample();
        s[1].offsets = vec![328, 72];
        let d = encode_descriptors(&s).unwrap();
        let o = encode_offsets(FormatVersion::V3, &s).unwrap();
        let err = decode_tables(FormatVersion::V3, 2, &d, &o).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[test]
    fn block_size_bounds() {
        assert!(validate_block_size(256).is_ok());
        assert!(validate_block_size(65536).is_ok());
        assert!(validate_block_size(128).is_err());
        assert!(validate_block_size(300).is_err());
        assert!(validate_block_size(1 << 17).is_err());
    }
}
