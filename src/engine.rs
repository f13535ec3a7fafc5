//! The decode engine - the second pass.
//!
//! A [`Decoder`] pairs a validated [`Spec`] with [`ReadOptions`]. Each call
//! to [`Decoder::decode`] runs the whole pipeline against one stream:
//!
//! 1. Byte order is taken from the options or guessed from the first marker.
//! 2. The header scan builds the [`HeaderOffsets`](crate::scan::HeaderOffsets).
//! 3. Sections are visited in specification order. A selected section is
//!    decoded by seeking straight to its offset; any other section is never
//!    touched, so its payload is never read.
//! 4. Fields are decoded in declared order into a fresh [`Decoded`].
//!
//! Sections the file has but the spec does not know are ignored. Sections
//! the spec knows but the file lacks are left out of the result; when the
//! caller asked for them by name a [`Warning::MissingSection`] is recorded.

use std::collections::HashSet;
use std::io::{Read, Seek};
use std::path::Path;

use crate::decoded::Decoded;
use crate::error::Warning;
use crate::record::{Framing, MarkerWidth, RecordReader};
use crate::scan::{detect_endian, scan_headers};
use crate::source;
use crate::spec::Spec;
use crate::utils::Endian;
use crate::Result;

/// How a stream is framed.
///
/// The default guesses the byte order (big-endian first) and assumes 4-byte
/// markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOptions {
    /// Byte order; [`None`] means detect from the first record.
    pub endian: Option<Endian>,
    pub marker: MarkerWidth,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the byte order instead of guessing it.
    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = Some(endian);
        self
    }

    pub fn marker(mut self, marker: MarkerWidth) -> Self {
        self.marker = marker;
        self
    }
}

/// Specification-driven decoder.
#[derive(Debug, Clone)]
pub struct Decoder<'s> {
    spec: &'s Spec,
    options: ReadOptions,
}

impl<'s> Decoder<'s> {
    /// Validate `spec` and build a decoder with default options.
    pub fn new(spec: &'s Spec) -> Result<Self> {
        spec.validate()?;
        Ok(Self {
            spec,
            options: ReadOptions::default(),
        })
    }

    pub fn with_options(mut self, options: ReadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn spec(&self) -> &Spec {
        self.spec
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    /// Open `path` and decode it. The file is closed before this returns.
    pub fn decode_path(
        &self,
        path: impl AsRef<Path>,
        requested: Option<&[&str]>,
    ) -> Result<Decoded> {
        let src = source::open(path)?;
        self.decode(src, requested)
    }

    /// Decode `stream` from its current position.
    ///
    /// `requested` limits decoding to the named sections plus the sections
    /// they depend on; [`None`] decodes everything the spec describes.
    pub fn decode<R: Read + Seek>(
        &self,
        mut stream: R,
        requested: Option<&[&str]>,
    ) -> Result<Decoded> {
        let endian = match self.options.endian {
            Some(e) => e,
            None => detect_endian(&mut stream, self.options.marker, Endian::Big)?,
        };
        let framing = Framing {
            endian,
            marker: self.options.marker,
        };
        let mut r = RecordReader::new(stream, framing)?;
        let offsets = scan_headers(&mut r, self.spec.magic())?;

        let selected: Option<HashSet<&str>> = requested.map(|req| {
            for name in req {
                if self.spec.section(name).is_none() {
                    log::warn!("requested section '{name}' is not in the specification");
                }
            }
            let sel = self.spec.closure(req);
            log::debug!("decoding {} sections for {} requested", sel.len(), req.len());
            sel
        });

        let mut out = Decoded::new(endian);
        let mut visited = 0;
        for section in self.spec.sections() {
            let name = section.name.as_ref();
            if let Some(sel) = &selected {
                if visited == sel.len() {
                    break;
                }
                if !sel.contains(name) {
                    continue;
                }
                visited += 1;
            }

            let Some(offset) = offsets.get(name) else {
                if requested.is_some_and(|req| req.contains(&name)) {
                    out.warn(Warning::MissingSection(name.to_owned()));
                } else {
                    log::debug!("section {name} not present");
                }
                continue;
            };

            log::debug!("decoding section {name} at offset {offset}");
            r.seek_to(offset)?;
            for field in &section.fields {
                let at = r.position();
                field
                    .decode(&mut r, &mut out)
                    .map_err(|e| e.within(name, Some(field.label()), at))?;
            }
        }

        out.finish(offsets, r.payload_bytes_read());
        Ok(out)
    }
}
