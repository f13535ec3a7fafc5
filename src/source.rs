//! Opening files for decoding.
//!
//! [`open`] returns a buffered, seekable [`Source`]. With the `compression`
//! feature a file that starts with a Zstandard or LZ4 frame magic is
//! decompressed into memory first; otherwise the file is read in place.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use crate::Result;

/// A seekable byte source: a buffered file or an in-memory buffer.
#[derive(Debug)]
pub enum Source {
    File(BufReader<File>),
    Memory(Cursor<Vec<u8>>),
}

impl Source {
    /// Serve `bytes` from memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Source::Memory(Cursor::new(bytes))
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Source::Memory(_))
    }
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::File(f) => f.read(buf),
            Source::Memory(c) => c.read(buf),
        }
    }
}

impl Seek for Source {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Source::File(f) => f.seek(pos),
            Source::Memory(c) => c.seek(pos),
        }
    }
}

/// Open `path` for decoding.
pub fn open(path: impl AsRef<Path>) -> Result<Source> {
    let path = path.as_ref();
    let mut file = BufReader::new(File::open(path)?);

    #[cfg(feature = "compression")]
    {
        use crate::compression::{lz4, zstd};

        let mut magic = [0u8; 4];
        let n = read_up_to(&mut file, &mut magic)?;
        file.seek(SeekFrom::Start(0))?;
        if n == magic.len() {
            if magic == zstd::MAGIC {
                log::debug!("{}: zstd compressed", path.display());
                return Ok(Source::from_bytes(zstd::decompress_zstd(file)?));
            }
            if magic == lz4::MAGIC {
                log::debug!("{}: lz4 compressed", path.display());
                return Ok(Source::from_bytes(lz4::decompress_lz4_frame(file)?));
            }
        }
    }

    file.seek(SeekFrom::Start(0))?;
    Ok(Source::File(file))
}

/// Fill as much of `buf` as the stream allows.
#[cfg(feature = "compression")]
fn read_up_to<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match r.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(k) => n += k,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}
