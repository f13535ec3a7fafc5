//! Typed view of a decoded wavefunction.
//!
//! [`WaveFunction`] gathers the plane-wave data of a checkpoint file together
//! with the lattice, band energies and occupancies needed to use it.
//! Reciprocal-space quantities are in CASTEP's internal atomic units.

use std::path::Path;

use ndarray::{
    Array, Array2, Array3, Array5, ArrayD, ArrayView1, ArrayView2, Dimension, IxDyn, ShapeBuilder,
    Zip, s,
};
use num_complex::Complex64;

use crate::decoded::Decoded;
use crate::engine::Decoder;
use crate::field::Value;
use crate::formats::castep_bin;
use crate::{Error, Result};

/// Sections a wavefunction needs; the rest come in as dependencies.
const SECTIONS: &[&str] = &["WAVEFUNCTION", "CELL%REAL_LATTICE_01", "CELL%RECIP_LATTICE_01"];

#[derive(Debug, Clone)]
pub struct WaveFunction {
    /// `[plane wave, spinor, band, k-point, spin]`, zero past each
    /// k-point's plane-wave count.
    pub coeffs: Array5<Complex64>,
    /// G-vectors in reciprocal lattice units, `[axis, plane wave, k-point]`.
    pub pw_grid_coords: Array3<i32>,
    /// `pw_grid_coords` wrapped onto the FFT mesh.
    pub pw_grid_indices: Array3<usize>,
    pub mesh_size: [usize; 3],
    pub nwaves_at_kp: Vec<usize>,
    /// Fractional k-points as columns.
    pub kpoints: Array2<f64>,
    /// Lattice vectors as rows.
    pub real_lattice: Array2<f64>,
    pub recip_lattice: Array2<f64>,
    /// `[band, k-point, spin]`
    pub eigenvalues: Array3<f64>,
    /// `[band, k-point, spin]`
    pub occupancies: Array3<f64>,
    pub fermi_energy: f64,
}

impl WaveFunction {
    /// Decode the wavefunction and what it depends on from `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let spec = castep_bin::spec().clone().with_wavefunction_coefficients(true);
        let d = Decoder::new(&spec)?.decode_path(path, Some(SECTIONS))?;
        Self::from_decoded(&d)
    }

    /// Build from values decoded with coefficients kept.
    ///
    /// Orbital files from band-structure runs carry no occupancies. When
    /// every occupancy is zero, states below the Fermi energy are marked as
    /// occupied.
    pub fn from_decoded(d: &Decoded) -> Result<Self> {
        let coeffs: Array5<Complex64> = array(d, "coeffs", Value::as_complex_array)?;
        let pw_grid_coords: Array3<i32> = array(d, "pw_grid_coords", Value::as_int_array)?;
        let grid = d
            .int_array("wavefunction_grid")
            .ok_or_else(|| missing("wavefunction_grid"))?;
        let mesh_size = match grid.as_slice_memory_order() {
            Some(&[x, y, z]) if x > 0 && y > 0 && z > 0 => [x as usize, y as usize, z as usize],
            _ => return Err(Error::shape("wavefunction_grid", "not three positive sizes")),
        };
        let nwaves_at_kp = d
            .int_array("nwaves_at_kp")
            .ok_or_else(|| missing("nwaves_at_kp"))?
            .iter()
            .map(|&n| n.max(0) as usize)
            .collect();
        let eigenvalues: Array3<f64> = array(d, "eigenvalues", Value::as_real_array)?;
        let mut occupancies: Array3<f64> = array(d, "occupancies", Value::as_real_array)?;
        let fermi_energy = d.real("fermi_energy").ok_or_else(|| missing("fermi_energy"))?;

        if occupancies.iter().all(|&o| o == 0.0) {
            log::debug!("no occupancies stored, filling states below the Fermi energy");
            Zip::from(&mut occupancies)
                .and(&eigenvalues)
                .for_each(|o, &e| {
                    if e < fermi_energy {
                        *o = 1.0;
                    }
                });
        }

        Ok(Self {
            pw_grid_indices: mesh_indices(&pw_grid_coords, mesh_size)?,
            coeffs,
            pw_grid_coords,
            mesh_size,
            nwaves_at_kp,
            kpoints: array(d, "wavefunction_kpoints", Value::as_real_array)?,
            real_lattice: array(d, "real_lattice", Value::as_real_array)?,
            recip_lattice: array(d, "recip_lattice", Value::as_real_array)?,
            eigenvalues,
            occupancies,
            fermi_energy,
        })
    }

    pub fn nspins(&self) -> usize {
        self.coeffs.dim().4
    }

    pub fn nkpts(&self) -> usize {
        self.coeffs.dim().3
    }

    pub fn nbands(&self) -> usize {
        self.coeffs.dim().2
    }

    pub fn nspinors(&self) -> usize {
        self.coeffs.dim().1
    }

    /// Coefficients of one state, without the zero padding.
    ///
    /// # Panics
    /// Panics if an index is out of range.
    pub fn plane_wave_coeffs(
        &self,
        ispin: usize,
        ik: usize,
        ib: usize,
        ispinor: usize,
    ) -> ArrayView1<'_, Complex64> {
        let n = self.nwaves_at_kp[ik];
        self.coeffs.slice(s![..n, ispinor, ib, ik, ispin])
    }

    /// G-vectors at k-point `ik`, `[axis, plane wave]`.
    pub fn gvectors(&self, ik: usize) -> ArrayView2<'_, i32> {
        let n = self.nwaves_at_kp[ik];
        self.pw_grid_coords.slice(s![.., ..n, ik])
    }

    /// FFT mesh index of each plane wave at k-point `ik`, `[axis, plane wave]`.
    pub fn gmesh_index(&self, ik: usize) -> ArrayView2<'_, usize> {
        let n = self.nwaves_at_kp[ik];
        self.pw_grid_indices.slice(s![.., ..n, ik])
    }

    /// Cartesian k-points as columns.
    pub fn kpoints_cart(&self) -> Array2<f64> {
        self.recip_lattice.t().dot(&self.kpoints)
    }

    /// Coefficients scattered onto the full FFT mesh, ready for an inverse
    /// transform.
    ///
    /// Shape is `[ngx, ngy, ngz, spinor, band, k-point, spin]`, column-major.
    pub fn reciprocal_grid(&self) -> ArrayD<Complex64> {
        let [ngx, ngy, ngz] = self.mesh_size;
        let (_, nspinor, nb, nk, ns) = self.coeffs.dim();
        let shape = IxDyn(&[ngx, ngy, ngz, nspinor, nb, nk, ns]);
        let mut grid = ArrayD::<Complex64>::zeros(shape.f());
        for is in 0..ns {
            for ik in 0..nk {
                let idx = self.gmesh_index(ik);
                for ib in 0..nb {
                    for isp in 0..nspinor {
                        let coeffs = self.plane_wave_coeffs(is, ik, ib, isp);
                        for (ipw, c) in coeffs.iter().enumerate() {
                            let at = [idx[[0, ipw]], idx[[1, ipw]], idx[[2, ipw]], isp, ib, ik, is];
                            grid[at.as_slice()] = *c;
                        }
                    }
                }
            }
        }
        grid
    }
}

/// Wrap reciprocal lattice coordinates onto a mesh of `size` points.
///
/// Every mesh size must be positive.
pub fn mesh_indices(coords: &Array3<i32>, size: [usize; 3]) -> Result<Array3<usize>> {
    if size.contains(&0) {
        return Err(Error::shape("wavefunction_grid", format!("empty mesh {size:?}")));
    }
    let mut out = Array3::<usize>::zeros(coords.raw_dim().f());
    Zip::indexed(&mut out).and(coords).for_each(|(axis, _, _), o, &c| {
        *o = i64::from(c).rem_euclid(size[axis] as i64) as usize;
    });
    Ok(out)
}

fn missing(name: &str) -> Error {
    Error::UnknownFieldReference {
        field: "wavefunction".to_owned(),
        reference: name.to_owned(),
    }
}

fn array<T: Clone, D: Dimension>(
    d: &Decoded,
    name: &str,
    get: fn(&Value) -> Option<&ArrayD<T>>,
) -> Result<Array<T, D>> {
    let a = d.get(name).and_then(get).ok_or_else(|| missing(name))?;
    a.clone()
        .into_dimensionality::<D>()
        .map_err(|e| Error::shape(name, e.to_string()))
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn negative_coordinates_wrap() {
        let coords = Array3::from_shape_vec((3, 2, 1).f(), vec![0, 1, -1, -2, 3, 5]).unwrap();
        let idx = mesh_indices(&coords, [4, 4, 4]).unwrap();
        assert_eq!(idx.slice(s![.., 0, 0]).to_vec(), vec![0, 1, 3]);
        assert_eq!(idx.slice(s![.., 1, 0]).to_vec(), vec![2, 3, 1]);
    }

    #[test]
    fn empty_mesh_is_rejected() {
        let coords = Array3::<i32>::zeros((3, 2, 1));
        assert!(matches!(
            mesh_indices(&coords, [4, 0, 4]),
            Err(Error::ShapeResolution { .. })
        ));
    }

    #[test]
    fn kpoints_to_cartesian() {
        let w = WaveFunction {
            coeffs: Array5::zeros((1, 1, 1, 1, 1)),
            pw_grid_coords: Array3::zeros((3, 1, 1)),
            pw_grid_indices: Array3::zeros((3, 1, 1)),
            mesh_size: [1, 1, 1],
            nwaves_at_kp: vec![1],
            kpoints: array![[0.5], [0.0], [0.25]],
            real_lattice: Array2::eye(3),
            recip_lattice: array![[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [1.0, 0.0, 4.0]],
            eigenvalues: Array3::zeros((1, 1, 1)),
            occupancies: Array3::zeros((1, 1, 1)),
            fermi_energy: 0.0,
        };
        // rows are reciprocal vectors: k = 0.5 b1 + 0.25 b3
        assert_eq!(w.kpoints_cart(), array![[1.25], [0.0], [1.0]]);
    }
}
