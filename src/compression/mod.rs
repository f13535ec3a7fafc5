//! Decompression of whole checkpoint files (requires the `compression`
//! feature).
//!
//! Checkpoint files compress well and are often archived as `.zst` or
//! `.lz4`. Both decoders here take a stream and return the decompressed
//! bytes, which [`crate::source::open`] then serves from memory so the
//! decoder can seek freely.
//!
//! | Module | Format | Magic |
//! |--------|--------|-------|
//! | [`zstd`] | Zstandard frame | `28 B5 2F FD` |
//! | [`lz4`]  | LZ4 frame       | `04 22 4D 18` |

#[cfg(feature = "compression")]
pub mod lz4;

#[cfg(feature = "compression")]
pub mod zstd;
