//! Fixtures and assertions for tests that exercise signal files.
//!
//! # Quick Start
//!
//! ```
//! use sigcodec::io::bsig::{BsigReader, BsigReaderOptions, BsigWriterOptions};
//! use sigcodec::testing::*;
//! use std::io::Cursor;
//! # fn main() -> anyhow::Result<()> {
//! let signals = sample_signals();
//! let bytes = bsig_bytes(&signals, BsigWriterOptions::default())?;
//!
//! let mut r = BsigReader::from_reader(Cursor::new(bytes), BsigReaderOptions::default())?;
//! for (name, expected) in &signals {
//!     assert_bit_exact(&r.signal(name.as_str())?, expected);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::io::bsig::{BsigWriter, BsigWriterOptions};
use crate::types::{Element, SignalArray, SignalData, TypeCode};
use std::io::Cursor;
use std::path::Path;

/// `0, 1, 2, ...` converted to `T`, wrapping for narrow integer types.
#[must_use]
pub fn ramp<T: Element>(n: usize) -> Vec<T> {
    (0..n).map(|i| T::from_i128(i as i128)).collect()
}

/// One scalar signal of `n` samples for every storage type, named after the
/// type (`"u8"`, `"f64"`, ...). Float ramps carry a fractional part.
#[must_use]
pub fn typed_signals(n: usize) -> Vec<(String, SignalArray)> {
    TypeCode::ALL
        .iter()
        .map(|&ty| {
            let base = SignalData::F64((0..n).map(|i| i as f64 * 1.25 - 3.0).collect());
            let data = if ty.is_float() {
                base.cast(ty)
            } else {
                SignalData::U64(ramp(n)).cast(ty)
            };
            (ty.to_string(), SignalArray::from(data.expect("numeric casts never fail")))
        })
        .collect()
}

/// A small mixed set: a time base, a real-valued channel of different length,
/// and a three-column position signal.
#[must_use]
pub fn sample_signals() -> Vec<(String, SignalArray)> {
    let pos: Vec<f32> = (0..30).map(|i| i as f32 * 0.5).collect();
    vec![
        ("Time".to_string(), SignalArray::from(ramp::<u64>(1000))),
        (
            "Speed".to_string(),
            SignalArray::from((0..700).map(|i| (i as f64).sin()).collect::<Vec<f64>>()),
        ),
        (
            "Position".to_string(),
            SignalArray::new(SignalData::F32(pos), 3).expect("30 values split into rows of 3"),
        ),
    ]
}

/// Write `signals` to an in-memory container.
pub fn bsig_bytes(signals: &[(String, SignalArray)], options: BsigWriterOptions) -> Result<Vec<u8>> {
    let mut w = BsigWriter::from_writer(Cursor::new(Vec::new()), options)?;
    for (name, values) in signals {
        w.append(name, values)?;
    }
    Ok(w.into_inner()?.into_inner())
}

/// Write `signals` to a container file.
pub fn write_fixture_bsig(
    path: impl AsRef<Path>,
    signals: &[(String, SignalArray)],
    options: BsigWriterOptions,
) -> Result<()> {
    let mut w = BsigWriter::create(path, options)?;
    for (name, values) in signals {
        w.append(name, values)?;
    }
    w.close()
}

/// Assert two arrays hold the same rows, comparing floats by bit pattern.
///
/// # Panics
/// Panics with a description of the first difference.
pub fn assert_bit_exact(actual: &SignalArray, expected: &SignalArray) {
    assert_eq!(actual.width(), expected.width(), "array length differs");
    assert_eq!(actual.type_code(), expected.type_code(), "element type differs");
    assert_eq!(actual.len(), expected.len(), "sample count differs");
    if let (Some(a), Some(e)) = (actual.data().as_text(), expected.data().as_text()) {
        assert_eq!(a, e);
        return;
    }
    let (mut a, mut e) = (Vec::new(), Vec::new());
    let n = actual.data().len();
    actual.data().pack_le(0, n, &mut a).expect("numeric data packs");
    expected.data().pack_le(0, n, &mut e).expect("numeric data packs");
    if let Some(i) = a.iter().zip(&e).position(|(x, y)| x != y) {
        let w = actual.type_code().map_or(1, TypeCode::width);
        panic!(
            "values differ at element {}: {} vs {}",
            i / w,
            actual.data().cell(i / w),
            expected.data().cell(i / w)
        );
    }
}
