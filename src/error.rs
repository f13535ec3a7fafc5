//! Library-wide error, warning and result types.

use std::fmt;
use std::io;

/// Result alias used throughout castepbin.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the library can produce.
///
/// Every variant except [`Error::Context`] describes one failure kind. The
/// decode engine wraps field-level failures in [`Error::Context`] so the
/// section, field and byte offset travel with them; use [`Error::root`] to
/// get at the underlying kind.
#[derive(Debug)]
pub enum Error {
    /// Leading and trailing record markers disagree. The file is corrupt or
    /// the wrong endianness / marker width was assumed.
    Framing {
        /// Offset of the leading marker.
        offset: u64,
        leading: u64,
        trailing: u64,
    },
    /// A marker declares more bytes than the stream holds.
    Truncated {
        /// Offset where the short read started.
        offset: u64,
        needed: u64,
        available: u64,
    },
    /// A symbolic dimension names a value that has not been decoded.
    UnknownFieldReference { field: String, reference: String },
    /// A record length is inconsistent with the declared or inferred shape.
    ShapeResolution { field: String, detail: String },
    /// Byte order could not be guessed from the first record marker.
    EndiannessUndetected,
    /// A field refers to a name that is only defined later in the
    /// specification (or never).
    ForwardReference {
        section: String,
        field: String,
        reference: String,
    },
    /// Two fields of a specification write the same name.
    DuplicateField(String),
    /// A value name was written twice during one decode.
    DuplicateValue(String),
    /// The first record is not the expected magic token.
    BadMagic { expected: String, found: String },
    /// A structural constraint was violated (message describes which one).
    Parse(&'static str),
    /// An underlying I/O operation failed.
    Io(io::Error),
    /// LZ4 decompression failed.
    #[cfg(feature = "compression")]
    Lz4,
    /// Zstandard decompression failed.
    #[cfg(feature = "compression")]
    Zstd,
    /// Location information wrapped around another error.
    Context {
        section: String,
        field: Option<String>,
        /// Stream offset at which the failing field started.
        offset: u64,
        source: Box<Error>,
    },
}

impl Error {
    /// The innermost error, with all [`Error::Context`] layers peeled off.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            e => e,
        }
    }

    pub(crate) fn shape(field: &str, detail: impl Into<String>) -> Self {
        Error::ShapeResolution {
            field: field.to_owned(),
            detail: detail.into(),
        }
    }

    pub(crate) fn within(self, section: &str, field: Option<&str>, offset: u64) -> Self {
        Error::Context {
            section: section.to_owned(),
            field: field.map(str::to_owned),
            offset,
            source: Box::new(self),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Framing {
                offset,
                leading,
                trailing,
            } => write!(
                f,
                "record markers disagree at offset {offset}: leading {leading}, trailing {trailing}"
            ),
            Error::Truncated {
                offset,
                needed,
                available,
            } => write!(
                f,
                "truncated file at offset {offset}: need {needed} bytes, {available} available"
            ),
            Error::UnknownFieldReference { field, reference } => {
                write!(f, "field '{field}' refers to undecoded value '{reference}'")
            }
            Error::ShapeResolution { field, detail } => {
                write!(f, "cannot resolve shape of '{field}': {detail}")
            }
            Error::EndiannessUndetected => write!(f, "unable to detect byte order"),
            Error::ForwardReference {
                section,
                field,
                reference,
            } => write!(
                f,
                "field '{field}' in section '{section}' refers to '{reference}' before it is defined"
            ),
            Error::DuplicateField(n) => write!(f, "field '{n}' is defined more than once"),
            Error::DuplicateValue(n) => write!(f, "value '{n}' decoded more than once"),
            Error::BadMagic { expected, found } => {
                write!(f, "expected '{expected}' header, found '{found}'")
            }
            Error::Parse(s) => write!(f, "parse error: {s}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "compression")]
            Error::Lz4 => write!(f, "lz4 decompression failed"),
            #[cfg(feature = "compression")]
            Error::Zstd => write!(f, "zstd decompression failed"),
            Error::Context {
                section,
                field,
                offset,
                source,
            } => match field {
                Some(field) => write!(f, "{section}/{field} at offset {offset}: {source}"),
                None => write!(f, "{section} at offset {offset}: {source}"),
            },
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Context { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Non-fatal conditions collected while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A requested section does not occur in the file; its values are absent.
    MissingSection(String),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingSection(s) => write!(f, "section '{s}' not present in file"),
        }
    }
}
