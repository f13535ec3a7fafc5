#![allow(dead_code)]

use castepbin::Endian;
use castepbin::record::MarkerWidth;
use num_complex::Complex64;

/// Builds framed record streams.
pub struct Writer {
    endian: Endian,
    marker: MarkerWidth,
    buf: Vec<u8>,
}

impl Writer {
    pub fn new(endian: Endian) -> Self {
        Self::with_marker(endian, MarkerWidth::Four)
    }

    pub fn with_marker(endian: Endian, marker: MarkerWidth) -> Self {
        Self {
            endian,
            marker,
            buf: Vec::new(),
        }
    }

    fn marker_bytes(&self, len: usize) -> Vec<u8> {
        match (self.marker, self.endian) {
            (MarkerWidth::Four, Endian::Big) => (len as u32).to_be_bytes().to_vec(),
            (MarkerWidth::Four, Endian::Little) => (len as u32).to_le_bytes().to_vec(),
            (MarkerWidth::Eight, Endian::Big) => (len as u64).to_be_bytes().to_vec(),
            (MarkerWidth::Eight, Endian::Little) => (len as u64).to_le_bytes().to_vec(),
        }
    }

    pub fn record(&mut self, payload: &[u8]) -> &mut Self {
        let m = self.marker_bytes(payload.len());
        self.buf.extend_from_slice(&m);
        self.buf.extend_from_slice(payload);
        self.buf.extend_from_slice(&m);
        self
    }

    pub fn header(&mut self, token: &str) -> &mut Self {
        self.record(token.as_bytes())
    }

    pub fn text(&mut self, s: &str, len: usize) -> &mut Self {
        self.record(format!("{s:<len$}").as_bytes())
    }

    pub fn ints(&mut self, v: &[i32]) -> &mut Self {
        let b: Vec<u8> = v.iter().flat_map(|x| self.i32_bytes(*x)).collect();
        self.record(&b)
    }

    pub fn reals(&mut self, v: &[f64]) -> &mut Self {
        let b: Vec<u8> = v.iter().flat_map(|x| self.f64_bytes(*x)).collect();
        self.record(&b)
    }

    pub fn complex(&mut self, v: &[Complex64]) -> &mut Self {
        let b: Vec<u8> = v.iter().flat_map(|z| self.c16_bytes(*z)).collect();
        self.record(&b)
    }

    pub fn i32_bytes(&self, x: i32) -> Vec<u8> {
        match self.endian {
            Endian::Big => x.to_be_bytes().to_vec(),
            Endian::Little => x.to_le_bytes().to_vec(),
        }
    }

    pub fn f64_bytes(&self, x: f64) -> Vec<u8> {
        match self.endian {
            Endian::Big => x.to_be_bytes().to_vec(),
            Endian::Little => x.to_le_bytes().to_vec(),
        }
    }

    pub fn c16_bytes(&self, z: Complex64) -> Vec<u8> {
        let mut b = self.f64_bytes(z.re);
        b.extend(self.f64_bytes(z.im));
        b
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

pub const NUM_IONS: usize = 2;
pub const NKPTS: usize = 2;
pub const NBANDS: usize = 3;
pub const GRID: [usize; 3] = [2, 2, 3];
pub const NWAVE_MAX: usize = 40;
pub const NWAVES: [usize; NKPTS] = [40, 37];

pub fn lattice(shift: f64) -> Vec<f64> {
    (0..9).map(|i| i as f64 + shift).collect()
}

pub fn positions(shift: f64) -> Vec<f64> {
    (0..3 * NUM_IONS).map(|i| 0.1 * i as f64 + shift).collect()
}

pub fn kpoint(ik: usize) -> [f64; 3] {
    let k = 0.5 * ik as f64;
    [k, k, k]
}

pub fn eigenvalue(ib: usize, ik: usize, is: usize) -> f64 {
    ib as f64 - 1.0 + ik as f64 + 0.01 * is as f64
}

pub fn density(nx: usize, ny: usize, z: usize) -> f64 {
    (nx * 100 + ny * 10 + z) as f64
}

/// Non-collinear spin density component `c` of a grid point.
pub fn spin_component(nx: usize, ny: usize, z: usize, c: usize) -> Complex64 {
    Complex64::new(density(nx, ny, z), c as f64 + 1.0)
}

pub fn gvector(i: usize) -> [i32; 3] {
    [(i % 4) as i32 - 2, ((i / 4) % 4) as i32 - 2, (i / 16) as i32 - 1]
}

pub fn coefficient(i: usize, ib: usize, ik: usize, is: usize) -> Complex64 {
    Complex64::new((ik * 1000 + ib * 100 + i) as f64, is as f64)
}

pub fn spinor_coefficient(i: usize, ib: usize, ik: usize, is: usize, isp: usize) -> Complex64 {
    coefficient(i, ib, ik, is) + Complex64::new(0.0, 10.0 * isp as f64)
}

/// Payload bytes of all coefficient records.
pub fn coefficient_bytes(nspins: usize) -> usize {
    nspins * NBANDS * NWAVES.iter().sum::<usize>() * 16
}

/// Options for a synthetic checkpoint file.
#[derive(Clone, Copy)]
pub struct Checkpoint {
    pub endian: Endian,
    pub marker: MarkerWidth,
    pub nspins: usize,
    pub wavefunction: bool,
    pub unknown_section: bool,
    pub occupied: bool,
    /// Write a non-collinear (`VECTOR`) spin density.
    pub vector_spin: bool,
    pub nspinors: usize,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            endian: Endian::Big,
            marker: MarkerWidth::Four,
            nspins: 1,
            wavefunction: true,
            unknown_section: true,
            occupied: true,
            vector_spin: false,
            nspinors: 1,
        }
    }
}

impl Checkpoint {
    pub fn build(&self) -> Vec<u8> {
        let mut w = Writer::with_marker(self.endian, self.marker);
        let nspins = self.nspins;
        let treatment = match (self.vector_spin, nspins) {
            (true, _) => "VECTOR",
            (false, 2) => "SCALAR",
            _ => "NONE",
        };

        w.header("CASTEP_BIN");

        w.header("BEGIN_ELECTRONIC");
        w.ints(&[1]).ints(&[2]).ints(&[3]);
        w.ints(&[nspins as i32]).ints(&[NBANDS as i32]);
        w.reals(&[300.0]);
        w.ints(&[0]).ints(&[0]).ints(&[0]);
        w.text("EDFT", 10);
        w.reals(&[8.0]).reals(&[4.0]).reals(&[4.0]).reals(&[0.0]).reals(&[0.0]);
        w.text(treatment, 20);
        w.header("END_ELECTRONIC");

        // The cell is written twice: the starting cell, then the current one.
        let kpts: Vec<f64> = (0..NKPTS).flat_map(kpoint).collect();
        for (copy, (pos_shift, lat_shift)) in [(0.0, 0.5), (0.05, 1.5)].into_iter().enumerate() {
            w.header("CELL%NUM_IONS").ints(&[NUM_IONS as i32]);
            w.header("CELL%MAX_IONS_IN_SPECIES").ints(&[NUM_IONS as i32]);
            w.header("CELL%REAL_LATTICE").reals(&lattice(lat_shift));
            w.header("CELL%RECIP_LATTICE").reals(&lattice(lat_shift * 0.1));
            w.header("CELL%NUM_SPECIES").ints(&[1]);
            w.header("CELL%NUM_IONS_IN_SPECIES").ints(&[NUM_IONS as i32]);
            w.header("CELL%IONIC_POSITIONS").reals(&positions(pos_shift));
            w.header("CELL%SPECIES_SYMBOL").text("Si", 8);
            w.header("NKPTS").ints(&[NKPTS as i32]);
            w.header("KPOINTS").reals(&kpts);
            w.header("KPOINT_WEIGHTS").reals(&[0.25, 0.75]);
            if copy == 0 && self.unknown_section {
                w.header("UNKNOWN_BLOCK").ints(&[9, 9, 9]).reals(&[1.0; 80]);
            }
            w.header("END_CELL_GLOBAL");
        }

        // global data follows the second END_CELL_GLOBAL directly
        w.ints(&[1]).ints(&[1]);
        w.reals(&[-100.5]).reals(&[0.25]);
        w.ints(&[NBANDS as i32, nspins as i32]);
        // eigenvalue blocks in reverse k-point order
        for ik in (0..NKPTS).rev() {
            w.reals(&kpoint(ik));
            for is in 0..nspins {
                let occ = if self.occupied { 2.0 / nspins as f64 } else { 0.0 };
                let occs: Vec<f64> = (0..NBANDS)
                    .map(|ib| if ib < 2 { occ } else { 0.0 })
                    .collect();
                w.reals(&occs);
                let eig: Vec<f64> = (0..NBANDS).map(|ib| eigenvalue(ib, ik, is)).collect();
                w.reals(&eig);
            }
        }
        w.ints(&[1]);
        w.ints(&[GRID[0] as i32, GRID[1] as i32, GRID[2] as i32]);
        for nx in (1..=GRID[0]).rev() {
            for ny in 1..=GRID[1] {
                let mut b = w.i32_bytes(nx as i32);
                b.extend(w.i32_bytes(ny as i32));
                for z in 0..GRID[2] {
                    b.extend(w.c16_bytes(Complex64::new(density(nx, ny, z), 0.0)));
                }
                if self.vector_spin {
                    // components fastest
                    for z in 0..GRID[2] {
                        for c in 0..3 {
                            b.extend(w.c16_bytes(spin_component(nx, ny, z, c)));
                        }
                    }
                } else if nspins == 2 {
                    for z in 0..GRID[2] {
                        b.extend(w.c16_bytes(Complex64::new(0.0, density(nx, ny, z))));
                    }
                }
                w.record(&b);
            }
        }

        if self.wavefunction {
            w.header("WAVEFUNCTION");
            w.ints(&[4, 4, 4]);
            w.ints(&[NWAVE_MAX as i32, self.nspinors as i32]);
            w.ints(&NWAVES.map(|n| n as i32));
            for (ik, &nw) in NWAVES.iter().enumerate() {
                w.reals(&kpoint(ik));
                let g: Vec<i32> = (0..nw).flat_map(gvector).collect();
                w.ints(&g);
            }
            for is in 0..nspins {
                for (ik, &nw) in NWAVES.iter().enumerate() {
                    for ib in 0..NBANDS {
                        for isp in 0..self.nspinors {
                            let c: Vec<Complex64> = (0..nw)
                                .map(|i| spinor_coefficient(i, ib, ik, is, isp))
                                .collect();
                            w.complex(&c);
                        }
                    }
                }
            }
        }

        let forces: Vec<f64> = (0..3 * NUM_IONS).map(|i| 0.01 * i as f64).collect();
        let born: Vec<f64> = (0..9 * NUM_IONS).map(|i| i as f64).collect();
        let fc: Vec<f64> = (0..9 * NUM_IONS * NUM_IONS * 2).map(|i| 0.001 * i as f64).collect();
        w.header("FORCES").reals(&forces);
        w.header("BORN_CHGS").reals(&born);
        w.header("FORCE_CON");
        w.ints(&[2, 0, 0, 0, 1, 0, 0, 0, 1]);
        w.reals(&fc);
        w.ints(&[0, 0, 0, 1, 0, 0]);
        w.ints(&[7]);

        w.header("END");
        w.finish()
    }
}
