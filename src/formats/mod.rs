//! File formats written by CASTEP.
//!
//! | Module | Files | Reader |
//! |--------|-------|--------|
//! | [`castep_bin`] | `.castep_bin`, `.check` | built-in [`Spec`](crate::Spec) for the decode engine |
//! | [`wave`]       | `.castep_bin`, `.check`, `.orbitals` | typed view over decoded wavefunction values |
//! | [`ome`]        | `.ome_bin`, `.dome_bin`, `.cst_ome` | fixed layouts, dimensions supplied by the caller |
//!
//! All readers are generic over [`std::io::Read`] + [`std::io::Seek`] and
//! share the record framer in [`crate::record`].

pub mod castep_bin;
pub mod ome;
pub mod wave;
