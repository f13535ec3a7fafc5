//! CASTEP checkpoint files (`.castep_bin`, `.check`).
//!
//! The file opens with a `CASTEP_BIN` record and is split into sections by
//! header records. The unit cell is written twice: first the cell the run
//! started from, then the current one. The scanner registers the second copy
//! under `_01` names, so this table decodes the first copy into `*_orig`
//! values and the second into the plain names.
//!
//! ## Sections
//! | Header | Values |
//! |--------|--------|
//! | `BEGIN_ELECTRONIC` | `elec_temp`, `electronic_minimizer`, `nelectrons`, `nup`, `ndown`, `spin`, `charge`, `spin_treatment` |
//! | `CELL%...` | original cell, `*_orig` |
//! | `CELL%..._01` | current cell |
//! | `NKPTS_01`, `KPOINTS_01`, `KPOINT_WEIGHTS_01` | `nkpts`, `kpoints`, `kpoint_weights` |
//! | `END_CELL_GLOBAL_01` | ground-state flags, `total_energy`, `fermi_energy`, `nbands`, `nspins`, eigenvalues, fine grid, charge density |
//! | `WAVEFUNCTION` | plane-wave bookkeeping and `coeffs` |
//! | `E_FERMI` | `fermi_energy_second_spin` |
//! | `FORCES` | `forces` |
//! | `FORCE_CON` | phonon supercell and force constants, `num_cells` |
//! | `BORN_CHGS` | `born_charges` |

use std::io::{Read, Seek};
use std::path::Path;
use std::sync::LazyLock;

use crate::decoded::Decoded;
use crate::engine::Decoder;
use crate::field::{Dim, Field, Kind, Structured};
use crate::spec::{Section, Spec};
use crate::Result;

/// First record of every checkpoint file.
pub const MAGIC: &str = "CASTEP_BIN";

/// Length of a species symbol.
const SYMBOL_LEN: usize = 8;

static SPEC: LazyLock<Spec> = LazyLock::new(build);

/// The built-in checkpoint table.
///
/// Coefficients are kept by default. Clone and call
/// [`Spec::with_wavefunction_coefficients`] to skip them.
pub fn spec() -> &'static Spec {
    &SPEC
}

/// Decode a checkpoint stream with the built-in table.
///
/// `sections` limits decoding to those headers and whatever they depend on.
pub fn decode<R: Read + Seek>(stream: R, sections: Option<&[&str]>) -> Result<Decoded> {
    Decoder::new(spec())?.decode(stream, sections)
}

/// Open and decode a checkpoint file with the built-in table.
pub fn decode_path(path: impl AsRef<Path>, sections: Option<&[&str]>) -> Result<Decoded> {
    Decoder::new(spec())?.decode_path(path, sections)
}

fn fixed(n: usize) -> Dim {
    Dim::Fixed(n)
}

fn of(name: &'static str) -> Dim {
    Dim::field(name)
}

fn one(header: &'static str, field: Field) -> Section {
    Section::new(header, [field])
}

/// One copy of the unit cell. `suffix` goes on headers, `tag` on names.
fn cell(suffix: &str, tag: &str) -> Vec<Section> {
    let h = |s: &str| format!("CELL%{s}{suffix}");
    let n = |s: &str| format!("{s}{tag}");
    let dim = |s: &str| Dim::field(n(s));
    vec![
        Section::new(h("NUM_IONS"), [Field::scalar(n("num_ions"), Kind::Int)]),
        Section::new(
            h("MAX_IONS_IN_SPECIES"),
            [Field::scalar(n("max_ions_in_species"), Kind::Int)],
        ),
        Section::new(
            h("REAL_LATTICE"),
            [Field::array(n("real_lattice"), Kind::Real, [fixed(3), fixed(3)])],
        ),
        Section::new(
            h("RECIP_LATTICE"),
            [Field::array(n("recip_lattice"), Kind::Real, [fixed(3), fixed(3)])],
        ),
        Section::new(h("NUM_SPECIES"), [Field::scalar(n("num_species"), Kind::Int)]),
        Section::new(
            h("NUM_IONS_IN_SPECIES"),
            [Field::array(n("num_ions_in_species"), Kind::Int, [dim("num_species")])],
        ),
        Section::new(
            h("IONIC_POSITIONS"),
            [Field::array(
                n("ionic_positions"),
                Kind::Real,
                [fixed(3), dim("max_ions_in_species"), dim("num_species")],
            )],
        ),
        Section::new(
            h("SPECIES_SYMBOL"),
            [Field::array(
                n("species_symbol"),
                Kind::Char(SYMBOL_LEN),
                [dim("num_species")],
            )],
        ),
    ]
}

fn build() -> Spec {
    let electronic = Section::new(
        "BEGIN_ELECTRONIC",
        [
            Field::Skip,
            Field::Skip,
            Field::Skip,
            Field::Skip, // nspins, read again later
            Field::Skip, // nbands, read again later
            Field::scalar("elec_temp", Kind::Real),
            Field::Skip,
            Field::Skip,
            Field::Skip,
            Field::string("electronic_minimizer", 10),
            Field::scalar("nelectrons", Kind::Real),
            Field::scalar("nup", Kind::Real),
            Field::scalar("ndown", Kind::Real),
            Field::scalar("spin", Kind::Real),
            Field::scalar("charge", Kind::Real),
            Field::string("spin_treatment", 20),
        ],
    );

    let global = Section::new(
        "END_CELL_GLOBAL_01",
        [
            Field::boolean("found_ground_state_wavefunction"),
            Field::boolean("found_ground_state_density"),
            Field::scalar("total_energy", Kind::Real),
            Field::scalar("fermi_energy", Kind::Real),
            Field::packed([
                Field::scalar("nbands", Kind::Int),
                Field::scalar("nspins", Kind::Int),
            ]),
            Field::Structured(Structured::EigenvaluesAndOccupancies),
            Field::boolean("found_density_grid"),
            Field::packed([
                Field::scalar("ngx_fine", Kind::Int),
                Field::scalar("ngy_fine", Kind::Int),
                Field::scalar("ngz_fine", Kind::Int),
            ]),
            Field::Structured(Structured::ChargeDensity),
        ],
    );

    let force_con = Section::new(
        "FORCE_CON",
        [
            Field::array("phonon_supercell_matrix", Kind::Int, [fixed(3), fixed(3)]),
            Field::array(
                "phonon_force_constant_matrix",
                Kind::Real,
                [
                    fixed(3),
                    of("num_ions"),
                    fixed(3),
                    of("num_ions"),
                    Dim::infer("num_cells"),
                ],
            ),
            Field::array("phonon_supercell_origins", Kind::Int, [fixed(3), of("num_cells")]),
            Field::scalar("phonon_force_constant_row", Kind::Int),
        ],
    );

    let mut spec = Spec::new().with_magic(MAGIC).with_section(electronic);
    for s in cell("", "_orig").into_iter().chain(cell("_01", "")) {
        spec = spec.with_section(s);
    }
    spec.with_section(one("NKPTS_01", Field::scalar("nkpts", Kind::Int)))
        .with_section(one(
            "KPOINTS_01",
            Field::array("kpoints", Kind::Real, [fixed(3), of("nkpts")]),
        ))
        .with_section(one(
            "KPOINT_WEIGHTS_01",
            Field::array("kpoint_weights", Kind::Real, [of("nkpts")]),
        ))
        .with_section(global)
        .with_section(one(
            "WAVEFUNCTION",
            Field::Structured(Structured::Wavefunction { store: true }),
        ))
        .with_section(one(
            "E_FERMI",
            Field::scalar("fermi_energy_second_spin", Kind::Real),
        ))
        .with_section(one(
            "FORCES",
            Field::array(
                "forces",
                Kind::Real,
                [fixed(3), of("max_ions_in_species"), of("num_species")],
            ),
        ))
        .with_section(force_con)
        .with_section(one(
            "BORN_CHGS",
            Field::array("born_charges", Kind::Real, [fixed(3), fixed(3), of("num_ions")]),
        ))
}
