//! LZ4 frame decompression (requires the `compression` feature).
//!
//! Only the frame format (what the `lz4` command line tool writes) is
//! handled. Raw LZ4 blocks carry no magic and cannot be recognised.

#![cfg(feature = "compression")]

use std::io::Read;

use lz4_flex::frame::FrameDecoder;

use crate::{Error, Result};

/// First four bytes of an LZ4 frame.
pub const MAGIC: [u8; 4] = [0x04, 0x22, 0x4D, 0x18];

/// Decompress an LZ4 frame stream.
///
/// Returns [`Error::Lz4`] when the frame is malformed and [`Error::Io`] when
/// reading `src` fails.
pub fn decompress_lz4_frame<R: Read>(src: R) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    FrameDecoder::new(src)
        .read_to_end(&mut out)
        .map_err(|e| {
            if e.get_ref().is_some_and(|inner| inner.is::<lz4_flex::frame::Error>()) {
                log::debug!("lz4: {e}");
                Error::Lz4
            } else {
                Error::Io(e)
            }
        })?;
    Ok(out)
}
