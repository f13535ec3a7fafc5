//! Multi-record fields whose record count depends on earlier values.
//!
//! ## Eigenvalues and occupancies
//! ```text
//! for each k-point:
//!     [k-point]                  3 × f64
//!     for each spin:
//!         [occupancies]          ≤ nbands × f64
//!         [eigenvalues]          ≤ nbands × f64
//! ```
//!
//! ## Charge density
//! ```text
//! ngx_fine × ngy_fine records, in any order:
//!     [nx: i32][ny: i32][ngz_fine × c128 charge]
//!     [ngz_fine × c128 spin]          when nspins == 2 (collinear)
//!     [ngz_fine × 3 × c128 spin]      when spin_treatment == VECTOR,
//!                                     components fastest
//! ```
//! `nx` and `ny` are 1-based grid columns.
//!
//! ## Wavefunction
//! ```text
//! [ngx, ngy, ngz]                     3 × i32
//! [nwave_max, nspinors]               2 × i32
//! [nwaves_at_kp]                      nkpts × i32
//! for each k-point:
//!     [k-point]                       3 × f64
//!     [G-vector grid coordinates]     3 × nwaves_at_kp[k] × i32
//! for each spin, k-point, band, spinor:
//!     [coefficients]                  nwaves_at_kp[k] × c128
//! ```
//! Coefficient arrays are zero-padded to `nwave_max` plane waves.

use std::io::{Read, Seek};

use ndarray::{Array1, Array2, Array3, Array4, Array5, ShapeBuilder, s};
use num_complex::Complex64;

use crate::decoded::Decoded;
use crate::field::Value;
use crate::record::RecordReader;
use crate::utils::{Element, Endian, elements, elements_at};
use crate::{Error, Result};

/// Fields decoded by a dedicated routine rather than a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structured {
    /// Per k-point eigenvalue and occupancy blocks.
    EigenvaluesAndOccupancies,
    /// Charge (and spin) density on the fine real-space grid.
    ChargeDensity,
    /// Plane-wave coefficients. With `store == false` the coefficient
    /// records are skipped and only the plane-wave bookkeeping is kept.
    Wavefunction { store: bool },
}

impl Structured {
    pub fn label(&self) -> &'static str {
        match self {
            Structured::EigenvaluesAndOccupancies => "eigenvalues",
            Structured::ChargeDensity => "charge_density",
            Structured::Wavefunction { .. } => "wavefunction",
        }
    }

    /// Values that must be decoded before this field.
    pub fn references(&self) -> &'static [&'static str] {
        match self {
            Structured::EigenvaluesAndOccupancies => &["nbands", "nspins", "nkpts"],
            Structured::ChargeDensity => {
                &["ngx_fine", "ngy_fine", "ngz_fine", "nspins", "spin_treatment"]
            }
            Structured::Wavefunction { .. } => &["nbands", "nspins", "nkpts"],
        }
    }

    /// Values this field may write. Optional outputs (`spin_density`,
    /// `coeffs`) are listed even when a given file does not produce them.
    pub fn provides(&self) -> &'static [&'static str] {
        match self {
            Structured::EigenvaluesAndOccupancies => {
                &["occupancies", "eigenvalues", "kpoints_of_eigenvalues"]
            }
            Structured::ChargeDensity => &["charge_density", "spin_density"],
            Structured::Wavefunction { .. } => &[
                "wavefunction_grid",
                "nwave_max",
                "nspinors",
                "nwaves_at_kp",
                "wavefunction_kpoints",
                "pw_grid_coords",
                "coeffs",
            ],
        }
    }

    pub(crate) fn decode<R: Read + Seek>(
        &self,
        r: &mut RecordReader<R>,
        ctx: &mut Decoded,
    ) -> Result<()> {
        match self {
            Structured::EigenvaluesAndOccupancies => eigenvalues(r, ctx),
            Structured::ChargeDensity => charge_density(r, ctx),
            Structured::Wavefunction { store } => wavefunction(r, ctx, *store),
        }
    }
}

/// Element count of a dense array of shape `dims`.
///
/// ndarray rejects shapes whose non-zero axes multiply past `isize::MAX`
/// bytes, so those are reported here as shape errors instead.
fn dense_len(label: &str, dims: &[usize], elem: usize) -> Result<usize> {
    dims.iter()
        .try_fold(elem, |acc, &d| acc.checked_mul(d.max(1)))
        .filter(|&bytes| isize::try_from(bytes).is_ok())
        .map(|_| dims.iter().product())
        .ok_or_else(|| Error::shape(label, format!("shape {dims:?} overflows")))
}

/// Check that `records` more records carrying at least `payload` bytes fit
/// in what is left of the stream.
fn ensure_room<R: Read + Seek>(r: &RecordReader<R>, records: usize, payload: u64) -> Result<()> {
    let overhead = 2 * r.framing().marker.bytes();
    let needed = (records as u64)
        .saturating_mul(overhead)
        .saturating_add(payload);
    let available = r.remaining();
    if needed > available {
        return Err(Error::Truncated {
            offset: r.position(),
            needed,
            available,
        });
    }
    Ok(())
}

/// Decode exactly `n` elements from a record payload.
fn exact<T: Element>(label: &str, buf: &[u8], n: usize, e: Endian) -> Result<Vec<T>> {
    if n.checked_mul(T::SIZE) != Some(buf.len()) {
        return Err(Error::shape(
            label,
            format!(
                "expected {n} elements of {} bytes, record has {} bytes",
                T::SIZE,
                buf.len()
            ),
        ));
    }
    Ok(elements(buf, e))
}

/// Decode at most `max` elements from a record payload.
fn at_most<T: Element>(label: &str, buf: &[u8], max: usize, e: Endian) -> Result<Vec<T>> {
    if buf.len() % T::SIZE != 0 || buf.len() / T::SIZE > max {
        return Err(Error::shape(
            label,
            format!("record of {} bytes exceeds {max} elements", buf.len()),
        ));
    }
    Ok(elements(buf, e))
}

fn eigenvalues<R: Read + Seek>(r: &mut RecordReader<R>, ctx: &mut Decoded) -> Result<()> {
    const LABEL: &str = "eigenvalues";
    let nbands = ctx.require_dim(LABEL, "nbands")?;
    let nspins = ctx.require_dim(LABEL, "nspins")?;
    let nkpts = ctx.require_dim(LABEL, "nkpts")?;
    let e = r.endian();

    let n = dense_len(LABEL, &[nbands, nkpts, nspins], 8)?;
    let records = nkpts.saturating_mul(nspins.saturating_mul(2).saturating_add(1));
    ensure_room(r, records, (nkpts as u64).saturating_mul(24))?;
    // Short blocks are zero-filled, so the record sizes do not bound the
    // arrays. Their size is capped by what is left of the stream instead.
    if (n as u64).saturating_mul(8) > r.remaining() {
        return Err(Error::shape(
            LABEL,
            format!(
                "{nbands} bands, {nkpts} k-points and {nspins} spins exceed the {} bytes left",
                r.remaining()
            ),
        ));
    }

    let mut kpoints = Array2::<f64>::zeros((3, nkpts).f());
    let mut occ = Array3::<f64>::zeros((nbands, nkpts, nspins).f());
    let mut eig = Array3::<f64>::zeros((nbands, nkpts, nspins).f());

    for ik in 0..nkpts {
        let k: Vec<f64> = exact(LABEL, &r.read_payload()?, 3, e)?;
        kpoints.column_mut(ik).assign(&Array1::from(k));
        for is in 0..nspins {
            let o: Vec<f64> = at_most("occupancies", &r.read_payload()?, nbands, e)?;
            for (ib, v) in o.into_iter().enumerate() {
                occ[[ib, ik, is]] = v;
            }
            let v: Vec<f64> = at_most(LABEL, &r.read_payload()?, nbands, e)?;
            for (ib, v) in v.into_iter().enumerate() {
                eig[[ib, ik, is]] = v;
            }
        }
    }

    ctx.insert("occupancies", Value::RealArray(occ.into_dyn()))?;
    ctx.insert("eigenvalues", Value::RealArray(eig.into_dyn()))?;
    // The k-point order here follows the eigenvalue blocks, which need not
    // match the order of the cell's k-point list.
    ctx.insert("kpoints_of_eigenvalues", Value::RealArray(kpoints.into_dyn()))
}

enum SpinDensity {
    None,
    Collinear(Array3<Complex64>),
    Vector(Array4<Complex64>),
}

fn charge_density<R: Read + Seek>(r: &mut RecordReader<R>, ctx: &mut Decoded) -> Result<()> {
    const LABEL: &str = "charge_density";
    let ngx = ctx.require_dim(LABEL, "ngx_fine")?;
    let ngy = ctx.require_dim(LABEL, "ngy_fine")?;
    let ngz = ctx.require_dim(LABEL, "ngz_fine")?;
    let nspins = ctx.require_dim(LABEL, "nspins")?;
    let treatment = ctx
        .get("spin_treatment")
        .ok_or_else(|| Error::UnknownFieldReference {
            field: LABEL.to_owned(),
            reference: "spin_treatment".to_owned(),
        })?;
    let vector = treatment
        .as_str()
        .is_some_and(|t| t.eq_ignore_ascii_case("VECTOR"));
    let e = r.endian();

    let components: usize = if vector {
        3
    } else if nspins == 2 {
        1
    } else {
        0
    };
    dense_len(LABEL, &[ngx, ngy, ngz, 1 + components], 16)?;
    let columns = ngx.saturating_mul(ngy);
    let per_column = (ngz as u64)
        .saturating_mul(16 * (1 + components as u64))
        .saturating_add(8);
    ensure_room(r, columns, (columns as u64).saturating_mul(per_column))?;

    let mut charge = Array3::<Complex64>::zeros((ngx, ngy, ngz).f());
    let mut spin = if vector {
        SpinDensity::Vector(Array4::zeros((ngx, ngy, ngz, 3).f()))
    } else if nspins == 2 {
        SpinDensity::Collinear(Array3::zeros((ngx, ngy, ngz).f()))
    } else {
        SpinDensity::None
    };

    let spin_start = 8 + 16 * ngz;
    for _ in 0..columns {
        let buf = r.read_payload()?;
        let idx = elements_at::<i32>(&buf, 0, 2, e)
            .ok_or_else(|| Error::shape(LABEL, "record too short for grid column index"))?;
        let (ix, iy) = match (usize::try_from(idx[0]), usize::try_from(idx[1])) {
            (Ok(x), Ok(y)) if (1..=ngx).contains(&x) && (1..=ngy).contains(&y) => (x - 1, y - 1),
            _ => return Err(Error::Parse("charge density column index out of range")),
        };

        let col = elements_at::<Complex64>(&buf, 8, ngz, e)
            .ok_or_else(|| Error::shape(LABEL, "record too short for density column"))?;
        charge.slice_mut(s![ix, iy, ..]).assign(&Array1::from(col));

        match &mut spin {
            SpinDensity::None => {}
            SpinDensity::Collinear(a) => {
                let col = elements_at::<Complex64>(&buf, spin_start, ngz, e)
                    .ok_or_else(|| Error::shape("spin_density", "record too short"))?;
                a.slice_mut(s![ix, iy, ..]).assign(&Array1::from(col));
            }
            SpinDensity::Vector(a) => {
                let col = elements_at::<Complex64>(&buf, spin_start, 3 * ngz, e)
                    .ok_or_else(|| Error::shape("spin_density", "record too short"))?;
                for (i, v) in col.into_iter().enumerate() {
                    a[[ix, iy, i / 3, i % 3]] = v;
                }
            }
        }
    }

    ctx.insert(LABEL, Value::ComplexArray(charge.into_dyn()))?;
    match spin {
        SpinDensity::None => Ok(()),
        SpinDensity::Collinear(a) => ctx.insert("spin_density", Value::ComplexArray(a.into_dyn())),
        SpinDensity::Vector(a) => ctx.insert("spin_density", Value::ComplexArray(a.into_dyn())),
    }
}

fn wavefunction<R: Read + Seek>(
    r: &mut RecordReader<R>,
    ctx: &mut Decoded,
    store: bool,
) -> Result<()> {
    const LABEL: &str = "wavefunction";
    let nbands = ctx.require_dim(LABEL, "nbands")?;
    let nspins = ctx.require_dim(LABEL, "nspins")?;
    let nkpts = ctx.require_dim(LABEL, "nkpts")?;
    let e = r.endian();

    let grid: Vec<i32> = exact(LABEL, &r.read_payload()?, 3, e)?;
    let sizes: Vec<i32> = exact(LABEL, &r.read_payload()?, 2, e)?;
    let (nwave_max, nspinors) = match (usize::try_from(sizes[0]), usize::try_from(sizes[1])) {
        (Ok(w), Ok(s)) => (w, s),
        _ => return Err(Error::shape(LABEL, "negative plane-wave or spinor count")),
    };
    let nwaves: Vec<i32> = exact("nwaves_at_kp", &r.read_payload()?, nkpts, e)?;
    let counts = nwaves
        .iter()
        .map(|&n| usize::try_from(n).ok().filter(|&n| n <= nwave_max))
        .collect::<Option<Vec<usize>>>()
        .ok_or_else(|| Error::shape("nwaves_at_kp", "plane-wave count outside 0..=nwave_max"))?;
    if counts.iter().max().is_some_and(|&m| m < nwave_max) {
        return Err(Error::shape(
            LABEL,
            format!("nwave_max {nwave_max} exceeds every per-k-point plane-wave count"),
        ));
    }

    dense_len("pw_grid_coords", &[3, nwave_max, nkpts], 4)?;
    if store {
        dense_len("coeffs", &[nwave_max, nspinors, nbands, nkpts, nspins], 16)?;
    }
    let total_waves = counts.iter().map(|&n| n as u64).sum::<u64>();
    let states = nspins.saturating_mul(nbands).saturating_mul(nspinors);
    let records = nkpts.saturating_mul(2).saturating_add(states.saturating_mul(nkpts));
    let payload = (nkpts as u64)
        .saturating_mul(24)
        .saturating_add(total_waves.saturating_mul(12))
        .saturating_add(total_waves.saturating_mul(16).saturating_mul(states as u64));
    ensure_room(r, records, payload)?;

    let mut kpoints = Array2::<f64>::zeros((3, nkpts).f());
    let mut coords = Array3::<i32>::zeros((3, nwave_max, nkpts).f());
    for (ik, &nw) in counts.iter().enumerate() {
        let k: Vec<f64> = exact(LABEL, &r.read_payload()?, 3, e)?;
        kpoints.column_mut(ik).assign(&Array1::from(k));
        let g: Vec<i32> = exact("pw_grid_coords", &r.read_payload()?, 3 * nw, e)?;
        for (i, v) in g.into_iter().enumerate() {
            coords[[i % 3, i / 3, ik]] = v;
        }
    }

    let mut coeffs = if store {
        Some(Array5::<Complex64>::zeros(
            (nwave_max, nspinors, nbands, nkpts, nspins).f(),
        ))
    } else {
        None
    };
    for is in 0..nspins {
        for (ik, &nw) in counts.iter().enumerate() {
            for ib in 0..nbands {
                for isp in 0..nspinors {
                    match coeffs.as_mut() {
                        Some(c) => {
                            let v: Vec<Complex64> = exact("coeffs", &r.read_payload()?, nw, e)?;
                            c.slice_mut(s![..nw, isp, ib, ik, is])
                                .assign(&Array1::from(v));
                        }
                        None => {
                            r.skip_record()?;
                        }
                    }
                }
            }
        }
    }

    ctx.insert("wavefunction_grid", Value::IntArray(Array1::from(grid).into_dyn()))?;
    ctx.insert("nwave_max", Value::Int(sizes[0]))?;
    ctx.insert("nspinors", Value::Int(sizes[1]))?;
    ctx.insert("nwaves_at_kp", Value::IntArray(Array1::from(nwaves).into_dyn()))?;
    ctx.insert("wavefunction_kpoints", Value::RealArray(kpoints.into_dyn()))?;
    ctx.insert("pw_grid_coords", Value::IntArray(coords.into_dyn()))?;
    if let Some(c) = coeffs {
        ctx.insert("coeffs", Value::ComplexArray(c.into_dyn()))?;
    }
    Ok(())
}
