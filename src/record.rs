//! Record framing for Fortran unformatted sequential files.
//!
//! ## Layout
//! ```text
//! [marker]   payload length in bytes (u32 or u64, file byte order)
//! [payload]  `length` bytes
//! [marker]   same value again
//! ```
//!
//! The two markers must be bit-identical. A mismatch almost always means the
//! byte order or marker width was guessed wrong, less often a corrupt file.
//!
//! ## Notes
//! * [`RecordReader`] keeps its own copy of the stream position and the total
//!   stream length, so skipping a record is a single absolute seek and
//!   truncation is detected before any payload is read.
//! * The reader counts every payload byte it materialises. Callers use
//!   [`RecordReader::payload_bytes_read`] to check that skipped data was
//!   really skipped.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use crate::utils::{Endian, bytesa, end_u32, end_u64};
use crate::{Error, Result};

/// Seek-only reads still materialise records up to this size.
///
/// Section headers are short strings, so reading them eagerly lets the
/// header scanner look at them without a second seek. It changes the I/O
/// pattern only.
pub const EAGER_READ_LIMIT: u64 = 512;

/// Width of a record length marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerWidth {
    /// 4-byte markers (gfortran and ifort default).
    #[default]
    Four,
    /// 8-byte markers (older 64-bit compilers).
    Eight,
}

impl MarkerWidth {
    /// Marker size in bytes.
    pub fn bytes(self) -> u64 {
        match self {
            MarkerWidth::Four => 4,
            MarkerWidth::Eight => 8,
        }
    }
}

/// Byte order and marker width of a record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Framing {
    pub endian: Endian,
    pub marker: MarkerWidth,
}

/// One framed record.
#[derive(Debug, Clone)]
pub struct Record {
    /// Payload bytes; [`None`] when the record was skipped.
    pub payload: Option<Vec<u8>>,
    /// Payload length declared by the markers.
    pub len: u64,
}

/// Framed-record reader over any seekable stream.
pub struct RecordReader<R> {
    inner: R,
    framing: Framing,
    pos: u64,
    len: u64,
    payload_bytes: u64,
}

impl<R: Read + Seek> RecordReader<R> {
    /// Wrap `inner`, starting at its current position.
    pub fn new(mut inner: R, framing: Framing) -> Result<Self> {
        let pos = inner.stream_position()?;
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(pos))?;
        Ok(Self {
            inner,
            framing,
            pos,
            len,
            payload_bytes: 0,
        })
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn endian(&self) -> Endian {
        self.framing.endian
    }

    /// Current stream offset.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Total stream length in bytes.
    pub fn stream_len(&self) -> u64 {
        self.len
    }

    /// Number of payload bytes read into memory so far.
    pub fn payload_bytes_read(&self) -> u64 {
        self.payload_bytes
    }

    /// Move to an absolute offset, normally one recorded by the header
    /// scanner.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.pos = offset;
        Ok(())
    }

    /// Read the next record, or [`None`] at a clean end of stream.
    ///
    /// With `seek_only` the payload is skipped unless it is no larger than
    /// [`EAGER_READ_LIMIT`].
    pub fn next_record(&mut self, seek_only: bool) -> Result<Option<Record>> {
        if self.pos == self.len {
            return Ok(None);
        }
        self.read_record(seek_only).map(Some)
    }

    /// Read the next record. Hitting the end of the stream is an error.
    pub fn read_record(&mut self, seek_only: bool) -> Result<Record> {
        self.take_record(|len| !seek_only || len <= EAGER_READ_LIMIT)
    }

    /// Read the next record and return its payload.
    pub fn read_payload(&mut self) -> Result<Vec<u8>> {
        let rec = self.read_record(false)?;
        Ok(rec.payload.unwrap_or_default())
    }

    /// Skip the next record without reading its payload, however small.
    /// Returns the payload length.
    pub fn skip_record(&mut self) -> Result<u64> {
        self.take_record(|_| false).map(|rec| rec.len)
    }

    /// Bytes between the current position and the end of the stream.
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    /// Frame one record; `keep(len)` decides whether the payload is read.
    fn take_record(&mut self, keep: impl FnOnce(u64) -> bool) -> Result<Record> {
        let start = self.pos;
        let len = self.read_marker()?;
        let w = self.framing.marker.bytes();

        let available = self.remaining();
        if len.checked_add(w).is_none_or(|n| n > available) {
            return Err(Error::Truncated {
                offset: self.pos,
                needed: len.saturating_add(w),
                available,
            });
        }

        let payload = if keep(len) {
            Some(self.read_exact_vec(len)?)
        } else {
            self.pos += len;
            self.inner.seek(SeekFrom::Start(self.pos))?;
            None
        };

        let trailing = self.read_marker()?;
        if trailing != len {
            return Err(Error::Framing {
                offset: start,
                leading: len,
                trailing,
            });
        }
        Ok(Record { payload, len })
    }

    /// Consume the reader, returning the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_marker(&mut self) -> Result<u64> {
        let w = self.framing.marker.bytes();
        let available = self.remaining();
        if available < w {
            return Err(Error::Truncated {
                offset: self.pos,
                needed: w,
                available,
            });
        }
        let e = self.framing.endian;
        let v = match self.framing.marker {
            MarkerWidth::Four => end_u32(bytesa::<4>(&mut self.inner)?, e) as u64,
            MarkerWidth::Eight => end_u64(bytesa::<8>(&mut self.inner)?, e),
        };
        self.pos += w;
        Ok(v)
    }

    fn read_exact_vec(&mut self, len: u64) -> Result<Vec<u8>> {
        let n = usize::try_from(len).map_err(|_| Error::Parse("record too large for memory"))?;
        let mut b = vec![0u8; n];
        self.inner.read_exact(&mut b).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                Error::Truncated {
                    offset: self.pos,
                    needed: len,
                    available: self.remaining(),
                }
            } else {
                Error::Io(e)
            }
        })?;
        self.pos += len;
        self.payload_bytes += len;
        Ok(b)
    }
}
