//! Zstandard decompression (requires the `compression` feature).

#![cfg(feature = "compression")]

use std::io::Read;

use crate::{Error, Result};

/// First four bytes of a Zstandard frame.
pub const MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Decompress a complete Zstandard stream, all frames included.
///
/// Returns [`Error::Zstd`] on any decompression failure.
pub fn decompress_zstd<R: Read>(src: R) -> Result<Vec<u8>> {
    zstd::stream::decode_all(src).map_err(|e| {
        log::debug!("zstd: {e}");
        Error::Zstd
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let data = b"CASTEP_BIN".repeat(100);
        let packed = zstd::stream::encode_all(&data[..], 3).unwrap();
        assert_eq!(packed[..4], MAGIC);
        assert_eq!(decompress_zstd(&packed[..]).unwrap(), data);
        assert!(matches!(decompress_zstd(&b"junk"[..]), Err(Error::Zstd)));
    }
}
