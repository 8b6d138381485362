//! Element type codes and typed signal values.
//!
//! This module provides:
//! - [`TypeCode`] and the static [`TYPE_TABLE`]: the ten storage type codes of
//!   the BSIG format with their element widths.
//! - [`Element`]: the sealed trait implemented by every storable scalar type,
//!   carrying the little-endian packing for that type.
//! - [`SignalData`]: a flat, typed run of values (one variant per scalar type,
//!   plus `Text` for delimited-text columns).
//! - [`SignalArray`]: `SignalData` plus its array length, i.e. the number of
//!   scalar columns per sample row.
//!
//! # Type codes
//!
//! The low byte of a code is the bit width. The high nibble is `0x0` for
//! unsigned integers, `0x8` for signed integers and `0x9` for IEEE floats.
//!
//! | code     | type  | width |
//! |----------|-------|-------|
//! | `0x0008` | `u8`  | 1     |
//! | `0x8008` | `i8`  | 1     |
//! | `0x0010` | `u16` | 2     |
//! | `0x8010` | `i16` | 2     |
//! | `0x0020` | `u32` | 4     |
//! | `0x8020` | `i32` | 4     |
//! | `0x0040` | `u64` | 8     |
//! | `0x8040` | `i64` | 8     |
//! | `0x9020` | `f32` | 4     |
//! | `0x9040` | `f64` | 8     |

use crate::error::{Result, SignalError};
use paste::paste;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage type of a binary signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCode {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

/// One row of the static type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeEntry {
    pub code: u32,
    pub ty: TypeCode,
    pub width: usize,
}

/// On-disk type code → element type and width.
pub static TYPE_TABLE: [TypeEntry; 10] = [
    TypeEntry { code: 0x0008, ty: TypeCode::U8, width: 1 },
    TypeEntry { code: 0x8008, ty: TypeCode::I8, width: 1 },
    TypeEntry { code: 0x0010, ty: TypeCode::U16, width: 2 },
    TypeEntry { code: 0x8010, ty: TypeCode::I16, width: 2 },
    TypeEntry { code: 0x0020, ty: TypeCode::U32, width: 4 },
    TypeEntry { code: 0x8020, ty: TypeCode::I32, width: 4 },
    TypeEntry { code: 0x0040, ty: TypeCode::U64, width: 8 },
    TypeEntry { code: 0x8040, ty: TypeCode::I64, width: 8 },
    TypeEntry { code: 0x9020, ty: TypeCode::F32, width: 4 },
    TypeEntry { code: 0x9040, ty: TypeCode::F64, width: 8 },
];

impl TypeCode {
    pub const ALL: [TypeCode; 10] = [
        TypeCode::U8,
        TypeCode::I8,
        TypeCode::U16,
        TypeCode::I16,
        TypeCode::U32,
        TypeCode::I32,
        TypeCode::U64,
        TypeCode::I64,
        TypeCode::F32,
        TypeCode::F64,
    ];

    fn entry(self) -> &'static TypeEntry {
        // TYPE_TABLE is indexed in the same order as the enum declaration.
        &TYPE_TABLE[self as usize]
    }

    /// Numeric code written to the descriptor table.
    pub fn code(self) -> u32 {
        self.entry().code
    }

    /// Element width in bytes.
    pub fn width(self) -> usize {
        self.entry().width
    }

    /// Look up a descriptor-table code. Returns `None` for unknown codes.
    pub fn from_code(code: u32) -> Option<TypeCode> {
        TYPE_TABLE.iter().find(|e| e.code == code).map(|e| e.ty)
    }

    pub fn is_float(self) -> bool {
        matches!(self, TypeCode::F32 | TypeCode::F64)
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeCode::U8 => "u8",
            TypeCode::I8 => "i8",
            TypeCode::U16 => "u16",
            TypeCode::I16 => "i16",
            TypeCode::U32 => "u32",
            TypeCode::I32 => "i32",
            TypeCode::U64 => "u64",
            TypeCode::I64 => "i64",
            TypeCode::F32 => "f32",
            TypeCode::F64 => "f64",
        };
        f.write_str(name)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A scalar type that can be stored in a binary container.
pub trait Element: Copy + PartialEq + fmt::Debug + Send + Sync + 'static + sealed::Sealed {
    const TYPE: TypeCode;

    /// Append the little-endian encoding of `self` to `out`.
    fn put_le(self, out: &mut Vec<u8>);

    /// Decode one element. `bytes.len()` must equal the element width.
    fn get_le(bytes: &[u8]) -> Self;

    fn into_data(values: Vec<Self>) -> SignalData;

    fn slice_of(data: &SignalData) -> Option<&[Self]>;

    fn to_f64(self) -> f64;

    fn from_f64(v: f64) -> Self;

    fn to_i128(self) -> i128;

    fn from_i128(v: i128) -> Self;
}

macro_rules! impl_element {
    ($($var:ident $ty:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Element for $ty {
                const TYPE: TypeCode = TypeCode::$var;

                fn put_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn get_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    $ty::from_le_bytes(buf)
                }

                fn into_data(values: Vec<Self>) -> SignalData {
                    SignalData::$var(values)
                }

                fn slice_of(data: &SignalData) -> Option<&[Self]> {
                    match data {
                        SignalData::$var(v) => Some(v),
                        _ => None,
                    }
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(v: f64) -> Self {
                    v as $ty
                }

                fn to_i128(self) -> i128 {
                    self as i128
                }

                fn from_i128(v: i128) -> Self {
                    v as $ty
                }
            }

            impl From<Vec<$ty>> for SignalData {
                fn from(values: Vec<$ty>) -> Self {
                    SignalData::$var(values)
                }
            }

            impl From<Vec<$ty>> for SignalArray {
                fn from(values: Vec<$ty>) -> Self {
                    SignalArray { data: SignalData::$var(values), width: 1 }
                }
            }

            impl From<&[$ty]> for SignalArray {
                fn from(values: &[$ty]) -> Self {
                    SignalArray { data: SignalData::$var(values.to_vec()), width: 1 }
                }
            }

            paste! {
                impl SignalData {
                    #[doc = "Borrow the values if this is a `" $ty "` run."]
                    pub fn [<as_ $ty>](&self) -> Option<&[$ty]> {
                        <$ty as Element>::slice_of(self)
                    }
                }
            }
        )*
    };
}

/// Match on a [`SignalData`], binding the inner vector for numeric variants and
/// for `Text` separately.
macro_rules! each_variant {
    ($data:expr, $v:ident => $num:expr, $t:ident => $text:expr) => {
        match $data {
            SignalData::U8($v) => $num,
            SignalData::I8($v) => $num,
            SignalData::U16($v) => $num,
            SignalData::I16($v) => $num,
            SignalData::U32($v) => $num,
            SignalData::I32($v) => $num,
            SignalData::U64($v) => $num,
            SignalData::I64($v) => $num,
            SignalData::F32($v) => $num,
            SignalData::F64($v) => $num,
            SignalData::Text($t) => $text,
        }
    };
}

/// Apply an expression to the inner vector and rewrap it in the same variant.
macro_rules! map_variant {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            SignalData::U8($v) => SignalData::U8($body),
            SignalData::I8($v) => SignalData::I8($body),
            SignalData::U16($v) => SignalData::U16($body),
            SignalData::I16($v) => SignalData::I16($body),
            SignalData::U32($v) => SignalData::U32($body),
            SignalData::I32($v) => SignalData::I32($body),
            SignalData::U64($v) => SignalData::U64($body),
            SignalData::I64($v) => SignalData::I64($body),
            SignalData::F32($v) => SignalData::F32($body),
            SignalData::F64($v) => SignalData::F64($body),
            SignalData::Text($v) => SignalData::Text($body),
        }
    };
}

/// Call a generic function with the element type selected by a [`TypeCode`].
macro_rules! with_type {
    ($code:expr, $t:ident => $body:expr) => {
        match $code {
            TypeCode::U8 => { type $t = u8; $body }
            TypeCode::I8 => { type $t = i8; $body }
            TypeCode::U16 => { type $t = u16; $body }
            TypeCode::I16 => { type $t = i16; $body }
            TypeCode::U32 => { type $t = u32; $body }
            TypeCode::I32 => { type $t = i32; $body }
            TypeCode::U64 => { type $t = u64; $body }
            TypeCode::I64 => { type $t = i64; $body }
            TypeCode::F32 => { type $t = f32; $body }
            TypeCode::F64 => { type $t = f64; $body }
        }
    };
}

/// A flat run of typed values.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalData {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    U64(Vec<u64>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    /// Uninterpreted cells of a delimited-text column.
    Text(Vec<String>),
}

impl_element! {
    U8 u8, I8 i8, U16 u16, I16 i16, U32 u32, I32 i32, U64 u64, I64 i64, F32 f32, F64 f64,
}

impl From<Vec<String>> for SignalData {
    fn from(values: Vec<String>) -> Self {
        SignalData::Text(values)
    }
}

impl SignalData {
    /// An empty run of the given type.
    pub fn empty(ty: TypeCode) -> SignalData {
        with_type!(ty, T => T::into_data(Vec::new()))
    }

    pub fn len(&self) -> usize {
        each_variant!(self, v => v.len(), t => t.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Storage type, or `None` for text.
    pub fn type_code(&self) -> Option<TypeCode> {
        match self {
            SignalData::Text(_) => None,
            SignalData::U8(_) => Some(TypeCode::U8),
            SignalData::I8(_) => Some(TypeCode::I8),
            SignalData::U16(_) => Some(TypeCode::U16),
            SignalData::I16(_) => Some(TypeCode::I16),
            SignalData::U32(_) => Some(TypeCode::U32),
            SignalData::I32(_) => Some(TypeCode::I32),
            SignalData::U64(_) => Some(TypeCode::U64),
            SignalData::I64(_) => Some(TypeCode::I64),
            SignalData::F32(_) => Some(TypeCode::F32),
            SignalData::F64(_) => Some(TypeCode::F64),
        }
    }

    pub fn as_text(&self) -> Option<&[String]> {
        match self {
            SignalData::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Copy out `[start, end)`. Panics if the range is out of bounds.
    pub fn slice(&self, start: usize, end: usize) -> SignalData {
        map_variant!(self, v => v[start..end].to_vec())
    }

    /// Render element `i` the way the delimited-text writer emits it.
    ///
    /// Floats keep a fractional part (`1.0`, not `1`) so they scan back as reals.
    pub fn cell(&self, i: usize) -> String {
        each_variant!(self, v => format!("{:?}", v[i]), t => t[i].clone())
    }

    /// Numeric values widened to `f64`, or `None` for text.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        each_variant!(
            self,
            v => Some(v.iter().map(|x| Element::to_f64(*x)).collect()),
            _t => None
        )
    }

    /// Append the little-endian encoding of `[start, end)` to `out`.
    pub fn pack_le(&self, start: usize, end: usize, out: &mut Vec<u8>) -> Result<()> {
        each_variant!(
            self,
            v => {
                for x in &v[start..end] {
                    x.put_le(out);
                }
                Ok(())
            },
            _t => Err(SignalError::Format(
                "text values cannot be packed into a binary block".into()
            ))
        )
    }

    /// Decode `bytes` as packed little-endian elements of `ty`.
    ///
    /// Trailing bytes that do not form a whole element are ignored.
    pub fn unpack_le(ty: TypeCode, bytes: &[u8]) -> SignalData {
        with_type!(ty, T => unpack::<T>(bytes))
    }

    /// Convert every value to `to` with `as`-cast semantics.
    ///
    /// Text cells are parsed as real numbers first; an unparsable cell is an
    /// [`SignalError::InvalidArgument`].
    pub fn cast(&self, to: TypeCode) -> Result<SignalData> {
        if self.type_code() == Some(to) {
            return Ok(self.clone());
        }
        if let SignalData::Text(cells) = self {
            let mut reals = Vec::with_capacity(cells.len());
            for c in cells {
                let x: f64 = c.trim().parse().map_err(|_| {
                    SignalError::InvalidArgument(format!("cannot cast {c:?} to {to}"))
                })?;
                reals.push(x);
            }
            return SignalData::F64(reals).cast(to);
        }
        Ok(with_type!(to, T => cast_into::<T>(self)))
    }
}

fn unpack<T: Element>(bytes: &[u8]) -> SignalData {
    let width = T::TYPE.width();
    T::into_data(bytes.chunks_exact(width).map(T::get_le).collect())
}

fn cast_into<T: Element>(data: &SignalData) -> SignalData {
    let out: Vec<T> = if T::TYPE.is_float() {
        each_variant!(data, v => v.iter().map(|x| T::from_f64(x.to_f64())).collect(), _t => Vec::new())
    } else {
        each_variant!(
            data,
            v => v
                .iter()
                .map(|x| {
                    let f = x.to_f64();
                    if f.fract() != 0.0 || f.abs() >= 2f64.powi(53) {
                        T::from_f64(f)
                    } else {
                        T::from_i128(x.to_i128())
                    }
                })
                .collect(),
            _t => Vec::new()
        )
    };
    T::into_data(out)
}

/// Typed values plus the number of scalar columns per sample row.
///
/// `data.len()` is always a multiple of `width`, and `width >= 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalArray {
    data: SignalData,
    width: usize,
}

impl From<SignalData> for SignalArray {
    fn from(data: SignalData) -> Self {
        SignalArray { data, width: 1 }
    }
}

impl From<Vec<String>> for SignalArray {
    fn from(values: Vec<String>) -> Self {
        SignalArray { data: SignalData::Text(values), width: 1 }
    }
}

impl SignalArray {
    /// Wrap flat row-major `data` with `width` columns per row.
    pub fn new(data: SignalData, width: usize) -> Result<Self> {
        if width == 0 {
            return Err(SignalError::InvalidArgument("array length must be at least 1".into()));
        }
        if data.len() % width != 0 {
            return Err(SignalError::InvalidArgument(format!(
                "{} values do not split into rows of {width}",
                data.len()
            )));
        }
        Ok(SignalArray { data, width })
    }

    /// Build a multi-column array from equally wide rows.
    pub fn from_rows<T: Element>(rows: &[Vec<T>]) -> Result<Self> {
        let width = rows.first().map_or(1, Vec::len);
        let mut flat = Vec::with_capacity(rows.len() * width);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(SignalError::InvalidArgument(format!(
                    "row {i} has {} columns, expected {width}",
                    row.len()
                )));
            }
            flat.extend_from_slice(row);
        }
        SignalArray::new(T::into_data(flat), width)
    }

    pub fn data(&self) -> &SignalData {
        &self.data
    }

    pub fn into_data(self) -> SignalData {
        self.data
    }

    /// Scalar columns per sample row (the array length).
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of sample rows.
    pub fn len(&self) -> usize {
        self.data.len() / self.width
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn type_code(&self) -> Option<TypeCode> {
        self.data.type_code()
    }

    /// Row `i` as its own run of `width` values.
    pub fn row(&self, i: usize) -> SignalData {
        self.data.slice(i * self.width, (i + 1) * self.width)
    }

    pub fn rows(&self) -> impl Iterator<Item = SignalData> + '_ {
        (0..self.len()).map(|i| self.row(i))
    }

    /// Rows `[offset, offset + count)`. Panics if out of bounds.
    pub fn window(&self, offset: usize, count: usize) -> SignalArray {
        SignalArray {
            data: self.data.slice(offset * self.width, (offset + count) * self.width),
            width: self.width,
        }
    }

    pub fn to_f64(&self) -> Option<Vec<f64>> {
        self.data.to_f64()
    }

    pub fn cast(&self, to: TypeCode) -> Result<SignalArray> {
        Ok(SignalArray { data: self.data.cast(to)?, width: self.width })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_order_matches_enum() {
        for ty in TypeCode::ALL {
            assert_eq!(TypeCode::from_code(ty.code()), Some(ty));
        }
        assert_eq!(TypeCode::from_code(0x1234), None);
    }

    #[test]
    fn widths() {
        assert_eq!(TypeCode::U8.width(), 1);
        assert_eq!(TypeCode::I16.width(), 2);
        assert_eq!(TypeCode::F32.width(), 4);
        assert_eq!(TypeCode::I64.width(), 8);
        assert_eq!(TypeCode::F64.code(), 0x9040);
    }

    #[test]
    fn pack_then_unpack_f32_bits() {
        let data = SignalData::from(vec![1.5f32, -0.0, f32::MIN_POSITIVE]);
        let mut buf = Vec::new();
        data.pack_le(0, 3, &mut buf).unwrap();
        assert_eq!(buf.len(), 12);
        let back = SignalData::unpack_le(TypeCode::F32, &buf);
        let bits: Vec<u32> = back.as_f32().unwrap().iter().map(|x| x.to_bits()).collect();
        assert_eq!(bits, vec![1.5f32.to_bits(), (-0.0f32).to_bits(), f32::MIN_POSITIVE.to_bits()]);
    }

    #[test]
    fn unpack_ignores_partial_tail() {
        let back = SignalData::unpack_le(TypeCode::U16, &[1, 0, 2, 0, 9]);
        assert_eq!(back, SignalData::U16(vec![1, 2]));
    }

    #[test]
    fn text_cannot_pack() {
        let data = SignalData::from(vec!["a".to_string()]);
        let err = data.pack_le(0, 1, &mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Format);
    }

    #[test]
    fn rows_and_window() {
        let arr = SignalArray::from_rows(&[vec![1i32, 2], vec![3, 4], vec![5, 6]]).unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.width(), 2);
        assert_eq!(arr.row(1), SignalData::I32(vec![3, 4]));
        assert_eq!(arr.window(1, 2).into_data(), SignalData::I32(vec![3, 4, 5, 6]));
    }

    #[test]
    fn ragged_rows_rejected() {
        assert!(SignalArray::from_rows(&[vec![1u8, 2], vec![3]]).is_err());
        assert!(SignalArray::new(SignalData::U8(vec![1, 2, 3]), 2).is_err());
    }

    #[test]
    fn cast_keeps_large_integers_exact() {
        let data = SignalData::I64(vec![i64::MAX, -3]);
        assert_eq!(data.cast(TypeCode::I64).unwrap(), data);
        let wide = SignalData::U32(vec![u32::MAX]).cast(TypeCode::U64).unwrap();
        assert_eq!(wide, SignalData::U64(vec![u32::MAX as u64]));
        let reals = SignalData::Text(vec!["1.5".into(), " 2".into()]).cast(TypeCode::F32).unwrap();
        assert_eq!(reals, SignalData::F32(vec![1.5, 2.0]));
    }

    #[test]
    fn rows_iterate_and_widen() {
        let arr = SignalArray::new(SignalData::U8(vec![1, 2, 3, 4]), 2).unwrap();
        let rows: Vec<SignalData> = arr.rows().collect();
        assert_eq!(rows, vec![SignalData::U8(vec![1, 2]), SignalData::U8(vec![3, 4])]);
        assert_eq!(arr.to_f64(), Some(vec![1.0, 2.0, 3.0, 4.0]));
        assert_eq!(SignalArray::from(vec!["x".to_string()]).to_f64(), None);
    }

    #[test]
    fn cells_keep_float_fraction() {
        let data = SignalData::F64(vec![1.0, 0.25, f64::INFINITY]);
        assert_eq!(data.cell(0), "1.0");
        assert_eq!(data.cell(1), "0.25");
        assert_eq!(data.cell(2), "inf");
        assert_eq!(SignalData::I8(vec![-4]).cell(0), "-4");
    }
}
