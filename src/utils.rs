//! Low-level primitives shared by the framer and the field decoders.
//!
//! Each reader function reads exactly the bytes it promises or returns an
//! error - there is no partial-read ambiguity. Slice decoders never read
//! from a stream; they reinterpret payload bytes that were already framed.

use std::io::Read;

use num_complex::Complex64;

use crate::Result;

/// Byte order of record markers and payload primitives.
///
/// CASTEP builds default to big-endian unformatted output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Big,
    Little,
}

impl Endian {
    /// The other byte order.
    pub fn flip(self) -> Self {
        match self {
            Endian::Big => Endian::Little,
            Endian::Little => Endian::Big,
        }
    }

    pub fn is_little(self) -> bool {
        self == Endian::Little
    }
}

/// Read exactly `N` bytes into a fixed-size array.
#[inline]
pub(crate) fn bytesa<const N: usize>(r: &mut impl Read) -> Result<[u8; N]> {
    let mut b = [0u8; N];
    r.read_exact(&mut b)?;
    Ok(b)
}

/// Decode a `u32` with caller-supplied endianness.
#[inline]
pub(crate) fn end_u32(b: [u8; 4], e: Endian) -> u32 {
    match e {
        Endian::Big => u32::from_be_bytes(b),
        Endian::Little => u32::from_le_bytes(b),
    }
}

/// Decode a `u64` with caller-supplied endianness.
#[inline]
pub(crate) fn end_u64(b: [u8; 8], e: Endian) -> u64 {
    match e {
        Endian::Big => u64::from_be_bytes(b),
        Endian::Little => u64::from_le_bytes(b),
    }
}

/// A fixed-size primitive that can be decoded from payload bytes.
pub(crate) trait Element: Copy {
    const SIZE: usize;

    /// `b` is exactly `SIZE` bytes long.
    fn decode(b: &[u8], e: Endian) -> Self;
}

impl Element for i32 {
    const SIZE: usize = 4;

    #[inline]
    fn decode(b: &[u8], e: Endian) -> Self {
        let mut a = [0u8; 4];
        a.copy_from_slice(b);
        end_u32(a, e) as i32
    }
}

impl Element for f64 {
    const SIZE: usize = 8;

    #[inline]
    fn decode(b: &[u8], e: Endian) -> Self {
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        f64::from_bits(end_u64(a, e))
    }
}

impl Element for Complex64 {
    const SIZE: usize = 16;

    #[inline]
    fn decode(b: &[u8], e: Endian) -> Self {
        Complex64::new(f64::decode(&b[..8], e), f64::decode(&b[8..], e))
    }
}

/// Decode every whole element in `buf`. Trailing bytes that do not fill an
/// element are ignored; callers check divisibility where it matters.
pub(crate) fn elements<T: Element>(buf: &[u8], e: Endian) -> Vec<T> {
    buf.chunks_exact(T::SIZE).map(|c| T::decode(c, e)).collect()
}

/// Decode exactly `count` elements starting at byte `offset`.
///
/// Returns [`None`] if `buf` is too short.
pub(crate) fn elements_at<T: Element>(
    buf: &[u8],
    offset: usize,
    count: usize,
    e: Endian,
) -> Option<Vec<T>> {
    let end = offset.checked_add(count.checked_mul(T::SIZE)?)?;
    buf.get(offset..end).map(|s| elements(s, e))
}

/// Fixed-length Fortran text: lossy UTF-8, trailing padding removed.
pub(crate) fn trim_text(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_owned()
}
