//! Optical matrix element files (`.ome_bin`, `.dome_bin`, `.cst_ome`).
//!
//! These files carry no section headers and no sizes, so the caller supplies
//! the band, k-point and spin counts (usually from the checkpoint file).
//!
//! ## Layout
//! ```text
//! ome_bin / dome_bin:
//!     [version]                      f64
//!     [header]                       80 characters
//!     for each k-point, spin:
//!         [block]                    (3, bands, bands) c128   ome_bin
//!                                    (3, bands) f64           dome_bin
//!
//! cst_ome:
//!     for each k-point, spin, direction, band, band:
//!         [element]                  c128
//!     nothing else
//! ```
//! Blocks are stored with the last index fastest. Results are row-major
//! arrays indexed `[spin, kpoint, direction, band(, band)]`.

use std::io::{Read, Seek};

use ndarray::{Array4, Array5, s};
use num_complex::Complex64;

use crate::record::{Framing, RecordReader};
use crate::utils::{Element, Endian, elements, trim_text};
use crate::{Error, Result};

/// Sizes needed to read a matrix element file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OmeDims {
    pub bands: usize,
    pub kpoints: usize,
    pub spins: usize,
}

impl OmeDims {
    pub fn new(bands: usize, kpoints: usize, spins: usize) -> Self {
        Self {
            bands,
            kpoints,
            spins,
        }
    }
}

/// Contents of an `.ome_bin` file.
#[derive(Debug, Clone)]
pub struct OmeBin {
    pub version: f64,
    pub header: String,
    /// `[spin, kpoint, direction, band, band]`
    pub matrix: Array5<Complex64>,
}

/// Contents of a `.dome_bin` file.
#[derive(Debug, Clone)]
pub struct DomeBin {
    pub version: f64,
    pub header: String,
    /// `[spin, kpoint, direction, band]`
    pub matrix: Array4<f64>,
}

/// Read an `.ome_bin` stream.
pub fn read_ome_bin<R: Read + Seek>(stream: R, dims: OmeDims, endian: Endian) -> Result<OmeBin> {
    let mut r = RecordReader::new(stream, framing(endian))?;
    let (version, header) = preamble(&mut r)?;
    let nb = dims.bands;
    let mut matrix = Array5::<Complex64>::zeros((dims.spins, dims.kpoints, 3, nb, nb));
    for ik in 0..dims.kpoints {
        for is in 0..dims.spins {
            let vals: Vec<Complex64> = block(&r.read_payload()?, 3 * nb * nb, endian)?;
            for (dst, v) in matrix.slice_mut(s![is, ik, .., .., ..]).iter_mut().zip(vals) {
                *dst = v;
            }
        }
    }
    Ok(OmeBin {
        version,
        header,
        matrix,
    })
}

/// Read a `.dome_bin` stream.
pub fn read_dome_bin<R: Read + Seek>(stream: R, dims: OmeDims, endian: Endian) -> Result<DomeBin> {
    let mut r = RecordReader::new(stream, framing(endian))?;
    let (version, header) = preamble(&mut r)?;
    let nb = dims.bands;
    let mut matrix = Array4::<f64>::zeros((dims.spins, dims.kpoints, 3, nb));
    for ik in 0..dims.kpoints {
        for is in 0..dims.spins {
            let vals: Vec<f64> = block(&r.read_payload()?, 3 * nb, endian)?;
            for (dst, v) in matrix.slice_mut(s![is, ik, .., ..]).iter_mut().zip(vals) {
                *dst = v;
            }
        }
    }
    Ok(DomeBin {
        version,
        header,
        matrix,
    })
}

/// Read a `.cst_ome` stream, one element per record.
///
/// Data left after the last expected element is an error: it means the
/// dimensions do not match the file.
pub fn read_cst_ome<R: Read + Seek>(
    stream: R,
    dims: OmeDims,
    endian: Endian,
) -> Result<Array5<Complex64>> {
    let mut r = RecordReader::new(stream, framing(endian))?;
    let nb = dims.bands;
    let mut matrix = Array5::<Complex64>::zeros((dims.spins, dims.kpoints, 3, nb, nb));
    for ik in 0..dims.kpoints {
        for is in 0..dims.spins {
            for dir in 0..3 {
                for b1 in 0..nb {
                    for b2 in 0..nb {
                        let v: Vec<Complex64> = block(&r.read_payload()?, 1, endian)?;
                        matrix[[is, ik, dir, b1, b2]] = v[0];
                    }
                }
            }
        }
    }
    if r.position() != r.stream_len() {
        log::debug!(
            "cst_ome: {} bytes left after {dims:?}",
            r.remaining()
        );
        return Err(Error::Parse("more data in cst_ome file than the dimensions allow"));
    }
    Ok(matrix)
}

fn framing(endian: Endian) -> Framing {
    Framing {
        endian,
        ..Framing::default()
    }
}

fn preamble<R: Read + Seek>(r: &mut RecordReader<R>) -> Result<(f64, String)> {
    let version: Vec<f64> = block(&r.read_payload()?, 1, r.endian())?;
    let header = trim_text(&r.read_payload()?);
    log::debug!("optical matrix file version {} '{header}'", version[0]);
    Ok((version[0], header))
}

fn block<T: Element>(buf: &[u8], n: usize, e: Endian) -> Result<Vec<T>> {
    if buf.len() != n * T::SIZE {
        return Err(Error::Parse("matrix element record does not match the dimensions"));
    }
    Ok(elements(buf, e))
}
