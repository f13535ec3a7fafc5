//! **castepbin** - a reader for CASTEP Fortran unformatted binary files.
//!
//! CASTEP writes its checkpoint (`.castep_bin`, `.check`) files as a
//! sequence of Fortran records grouped into sections by short header
//! records. This crate decodes them from a declarative [`Spec`]: each
//! section lists its [`Field`]s, and array shapes may refer to values
//! decoded earlier in the same file.
//!
//! Decoding takes two passes. The first maps every section header to a byte
//! offset without reading large records; the second seeks straight to the
//! sections that were asked for. Sections nobody asked for, such as
//! wavefunction coefficients, are never read into memory.
//!
//! ```no_run
//! let d = castepbin::decode_path("si.check", Some(&["FORCES"]))?;
//! let forces = d.real_array("forces").expect("decoded");
//! println!("{:?}", forces.shape());
//! # Ok::<(), castepbin::Error>(())
//! ```
//!
//! # Modules
//! | Module | Purpose |
//! |--------|---------|
//! | [`record`]  | Fortran record framing |
//! | [`field`]   | Field kinds and their decoders |
//! | [`spec`]    | Section tables and validation |
//! | [`scan`]    | Byte order detection and header offsets |
//! | [`engine`]  | The decoder |
//! | [`formats`] | Built-in CASTEP table, wavefunction view, optical matrix files |
//! | [`source`]  | Opening (and optionally decompressing) files |
//!
//! # Logging
//! Progress and skipped data are reported through the [`log`] facade at
//! `debug` level; missing requested sections at `warn`. No logger is
//! installed by the library.

pub mod compression;
pub mod decoded;
pub mod engine;
pub mod error;
pub mod field;
pub mod formats;
pub mod record;
pub mod scan;
pub mod source;
pub mod spec;
pub mod utils;

pub use decoded::Decoded;
pub use engine::{Decoder, ReadOptions};
pub use error::{Error, Result, Warning};
pub use field::{Dim, Field, Kind, Structured, Value};
pub use formats::castep_bin::{decode, decode_path};
pub use spec::{Section, Spec};
pub use utils::Endian;
