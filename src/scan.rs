//! Header offset scanning - the first of the two decode passes.
//!
//! The scanner walks the file once, looking only at records short enough to
//! be headers and seeking past everything else. Each header token is mapped
//! to the offset of the record that follows it.
//!
//! ## Header tokens
//! A record is a header when its payload, with surrounding quotes and
//! padding stripped, is a non-empty run of printable ASCII that starts with
//! a letter and has no lower-case characters (`CELL%NUM_IONS`,
//! `END_CELL_GLOBAL`). The token `END` terminates the scan.
//!
//! A token seen a second time is stored as `<token>_01`, the third time as
//! `<token>_02`, and so on. CASTEP writes the unit cell twice (original and
//! current), which is where the `_01` sections of the built-in table come
//! from.
//!
//! ## Byte order
//! [`detect_endian`] is a best-effort heuristic: the first marker must be
//! non-zero, fit inside the stream, and match its trailing marker. A file
//! whose first record is long enough to look plausible in both byte orders
//! could be mis-detected. When the byte order is known, pass it in
//! [`ReadOptions`] and no guessing happens.

use std::io::{Read, Seek, SeekFrom};

use crate::engine::ReadOptions;
use crate::record::{Framing, MarkerWidth, RecordReader};
use crate::utils::{Endian, bytesa, end_u32, end_u64};
use crate::{Error, Result};

/// Section name → offset of the first record after its header, in file
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderOffsets {
    entries: Vec<(String, u64)>,
}

impl HeaderOffsets {
    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, o)| *o)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(n, o)| (n.as_str(), *o))
    }

    fn push(&mut self, token: String, offset: u64) {
        let key = if self.contains(&token) {
            self.next_suffixed(&token)
        } else {
            token
        };
        self.entries.push((key, offset));
    }

    /// `<token>_NN` with NN one past the highest suffix in use.
    fn next_suffixed(&self, token: &str) -> String {
        let prefix = format!("{token}_");
        let next = self
            .entries
            .iter()
            .filter_map(|(n, _)| n.strip_prefix(&prefix))
            .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
            .filter_map(|s| s.parse::<u32>().ok())
            .map(|n| n + 1)
            .max()
            .unwrap_or(1);
        format!("{token}_{next:02}")
    }
}

/// Result of a full scan.
#[derive(Debug, Clone)]
pub struct Scan {
    pub endian: Endian,
    pub offsets: HeaderOffsets,
}

/// Determine the byte order and map all section headers.
///
/// The stream is left where it was found.
pub fn scan<R: Read + Seek>(r: &mut R, options: &ReadOptions, magic: Option<&str>) -> Result<Scan> {
    let endian = match options.endian {
        Some(e) => e,
        None => detect_endian(r, options.marker, Endian::Big)?,
    };
    let framing = Framing {
        endian,
        marker: options.marker,
    };
    let mut rr = RecordReader::new(r, framing)?;
    let offsets = scan_headers(&mut rr, magic)?;
    Ok(Scan { endian, offsets })
}

/// Guess the byte order from the first record marker, trying `preferred`
/// first.
///
/// Returns [`Error::EndiannessUndetected`] when neither order gives a
/// consistent first record.
pub fn detect_endian<R: Read + Seek>(
    r: &mut R,
    marker: MarkerWidth,
    preferred: Endian,
) -> Result<Endian> {
    let start = r.stream_position()?;
    let end = r.seek(SeekFrom::End(0))?;
    let mut found = None;
    for e in [preferred, preferred.flip()] {
        if plausible(r, start, end, marker, e)? {
            found = Some(e);
            break;
        }
    }
    r.seek(SeekFrom::Start(start))?;
    match found {
        Some(e) => {
            if e != preferred {
                log::debug!("first record marker implies {e:?}-endian data");
            }
            Ok(e)
        }
        None => Err(Error::EndiannessUndetected),
    }
}

fn plausible<R: Read + Seek>(
    r: &mut R,
    start: u64,
    end: u64,
    marker: MarkerWidth,
    e: Endian,
) -> Result<bool> {
    let w = marker.bytes();
    let room = end.saturating_sub(start);
    if room < 2 * w {
        return Ok(false);
    }
    r.seek(SeekFrom::Start(start))?;
    let leading = read_raw_marker(r, marker, e)?;
    if leading == 0 || leading > room - 2 * w {
        return Ok(false);
    }
    r.seek(SeekFrom::Start(start + w + leading))?;
    Ok(read_raw_marker(r, marker, e)? == leading)
}

fn read_raw_marker<R: Read>(r: &mut R, marker: MarkerWidth, e: Endian) -> Result<u64> {
    Ok(match marker {
        MarkerWidth::Four => end_u32(bytesa::<4>(r)?, e) as u64,
        MarkerWidth::Eight => end_u64(bytesa::<8>(r)?, e),
    })
}

/// Map every header in the stream, starting at the reader's position.
///
/// If `magic` is given, the first record must hold exactly that token. The
/// reader is returned to its starting position.
pub fn scan_headers<R: Read + Seek>(
    r: &mut RecordReader<R>,
    magic: Option<&str>,
) -> Result<HeaderOffsets> {
    let start = r.position();
    let mut offsets = HeaderOffsets::default();

    if let Some(magic) = magic {
        let rec = r.read_record(true)?;
        let found = rec.payload.as_deref().and_then(header_token).unwrap_or_default();
        if found != magic {
            return Err(Error::BadMagic {
                expected: magic.to_owned(),
                found,
            });
        }
    }

    while let Some(rec) = r.next_record(true)? {
        let Some(token) = rec.payload.as_deref().and_then(header_token) else {
            continue;
        };
        if token == "END" {
            break;
        }
        offsets.push(token, r.position());
    }

    log::debug!("scanned {} headers", offsets.len());
    r.seek_to(start)?;
    Ok(offsets)
}

/// The header token held by `payload`, if it looks like one.
fn header_token(payload: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(payload).ok()?;
    let token = text.trim().trim_matches('\'').trim();
    let first = token.chars().next()?;
    let ok = first.is_ascii_alphabetic()
        && token.bytes().all(|b| b.is_ascii_graphic())
        && !token.bytes().any(|b| b.is_ascii_lowercase());
    ok.then(|| token.to_owned())
}
