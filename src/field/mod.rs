//! Field descriptors and their decoders.
//!
//! A [`Field`] describes how one or more records turn into named values.
//! The set of kinds is closed:
//!
//! | Variant | Records | Produces |
//! |---------|---------|----------|
//! | [`Field::Scalar`]     | 1 | one primitive |
//! | [`Field::Array`]      | 1 | a column-major array, shape resolved from earlier values |
//! | [`Field::Str`]        | 1 | trimmed fixed-length text |
//! | [`Field::Bool`]       | 1 | Fortran logical, non-zero is true |
//! | [`Field::Skip`]       | 1 | nothing, the record is skipped |
//! | [`Field::Packed`]     | 1 | several scalars/arrays stored back to back |
//! | [`Field::Structured`] | many | see [`Structured`] |
//!
//! ## Shapes
//! Each array dimension is a [`Dim`]: a literal, a reference to a value
//! decoded earlier, or an inferred dimension. At most one dimension per
//! array may be inferred; its size is back-computed from the record length
//! and stored under its name so later fields can refer to it.

mod structured;
mod value;

pub use structured::Structured;
pub use value::Value;

use std::borrow::Cow;
use std::io::{Read, Seek};

use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use num_complex::Complex64;

use crate::decoded::Decoded;
use crate::record::RecordReader;
use crate::utils::{Element, Endian, elements, trim_text};
use crate::{Error, Result};

/// Owned or static field name.
pub type Name = Cow<'static, str>;

/// Element type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// 4-byte integer.
    Int,
    /// 8-byte real.
    Real,
    /// Two 8-byte reals.
    Complex,
    /// 4-byte logical.
    Logical,
    /// Fixed-length, space-padded character string.
    Char(usize),
}

impl Kind {
    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            Kind::Int | Kind::Logical => 4,
            Kind::Real => 8,
            Kind::Complex => 16,
            Kind::Char(n) => n,
        }
    }
}

/// One array dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dim {
    Fixed(usize),
    /// Equal to the integer value decoded earlier under this name.
    Field(Name),
    /// Computed from the record length, then stored under this name.
    Infer(Name),
}

impl Dim {
    pub fn field(name: impl Into<Name>) -> Self {
        Dim::Field(name.into())
    }

    pub fn infer(name: impl Into<Name>) -> Self {
        Dim::Infer(name.into())
    }
}

impl From<usize> for Dim {
    fn from(n: usize) -> Self {
        Dim::Fixed(n)
    }
}

impl From<&'static str> for Dim {
    fn from(name: &'static str) -> Self {
        Dim::Field(Cow::Borrowed(name))
    }
}

/// Field descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Scalar { name: Name, kind: Kind },
    Array { name: Name, kind: Kind, shape: Vec<Dim> },
    Str { name: Name, len: usize },
    Bool { name: Name },
    Skip,
    Packed(Vec<Field>),
    Structured(Structured),
}

impl Field {
    pub fn scalar(name: impl Into<Name>, kind: Kind) -> Self {
        Field::Scalar {
            name: name.into(),
            kind,
        }
    }

    pub fn array(name: impl Into<Name>, kind: Kind, shape: impl IntoIterator<Item = Dim>) -> Self {
        Field::Array {
            name: name.into(),
            kind,
            shape: shape.into_iter().collect(),
        }
    }

    pub fn string(name: impl Into<Name>, len: usize) -> Self {
        Field::Str {
            name: name.into(),
            len,
        }
    }

    pub fn boolean(name: impl Into<Name>) -> Self {
        Field::Bool { name: name.into() }
    }

    pub fn packed(fields: impl IntoIterator<Item = Field>) -> Self {
        Field::Packed(fields.into_iter().collect())
    }

    /// Name used in diagnostics.
    pub fn label(&self) -> &str {
        match self {
            Field::Scalar { name, .. }
            | Field::Array { name, .. }
            | Field::Str { name, .. }
            | Field::Bool { name } => name,
            Field::Skip => "<skipped>",
            Field::Packed(_) => "<packed>",
            Field::Structured(s) => s.label(),
        }
    }

    /// Declared shape. Scalars, strings and logicals report `[1]`;
    /// skipped, packed and structured fields have no single shape.
    pub fn shape(&self) -> Option<Vec<Dim>> {
        match self {
            Field::Array { shape, .. } => Some(shape.clone()),
            Field::Scalar { .. } | Field::Str { .. } | Field::Bool { .. } => {
                Some(vec![Dim::Fixed(1)])
            }
            _ => None,
        }
    }

    /// Names of earlier values this field needs.
    pub fn references(&self) -> Vec<&str> {
        match self {
            Field::Array { shape, .. } => shape
                .iter()
                .filter_map(|d| match d {
                    Dim::Field(n) => Some(n.as_ref()),
                    _ => None,
                })
                .collect(),
            Field::Packed(fields) => fields.iter().flat_map(Field::references).collect(),
            Field::Structured(s) => s.references().to_vec(),
            _ => Vec::new(),
        }
    }

    /// Names this field writes into the context.
    pub fn provides(&self) -> Vec<&str> {
        match self {
            Field::Scalar { name, .. } | Field::Str { name, .. } | Field::Bool { name } => {
                vec![name.as_ref()]
            }
            Field::Array { name, shape, .. } => {
                let mut out = vec![name.as_ref()];
                out.extend(shape.iter().filter_map(|d| match d {
                    Dim::Infer(n) => Some(n.as_ref()),
                    _ => None,
                }));
                out
            }
            Field::Skip => Vec::new(),
            Field::Packed(fields) => fields.iter().flat_map(Field::provides).collect(),
            Field::Structured(s) => s.provides().to_vec(),
        }
    }

    /// Decode this field from the next record(s) of `r` into `ctx`.
    pub(crate) fn decode<R: Read + Seek>(
        &self,
        r: &mut RecordReader<R>,
        ctx: &mut Decoded,
    ) -> Result<()> {
        match self {
            Field::Skip => {
                r.skip_record()?;
                Ok(())
            }
            Field::Structured(s) => s.decode(r, ctx),
            Field::Packed(fields) => {
                let buf = r.read_payload()?;
                let mut rest = &buf[..];
                for f in fields {
                    let n = f.packed_len(ctx)?;
                    if rest.len() < n {
                        return Err(Error::shape(
                            f.label(),
                            format!("packed record has {} bytes left, need {n}", rest.len()),
                        ));
                    }
                    let (head, tail) = rest.split_at(n);
                    f.decode_into(head, r.endian(), ctx)?;
                    rest = tail;
                }
                if !rest.is_empty() {
                    log::debug!("{} trailing bytes in packed record ignored", rest.len());
                }
                Ok(())
            }
            _ => {
                let buf = r.read_payload()?;
                self.decode_into(&buf, r.endian(), ctx)
            }
        }
    }

    /// Bytes this field occupies inside a packed record.
    fn packed_len(&self, ctx: &Decoded) -> Result<usize> {
        match self {
            Field::Scalar { kind, .. } => Ok(kind.size()),
            Field::Bool { .. } => Ok(Kind::Logical.size()),
            Field::Str { len, .. } => Ok(*len),
            Field::Array { name, kind, shape } => {
                let (dims, missing) = resolve_shape(name, shape, ctx)?;
                if missing.is_some() {
                    return Err(Error::shape(
                        name,
                        "inferred dimensions are not allowed inside packed records",
                    ));
                }
                element_count(name, dims.iter().flatten().copied())?
                    .checked_mul(kind.size())
                    .ok_or_else(|| Error::shape(name, "shape overflows"))
            }
            _ => Err(Error::Parse("only single-record fields can be packed")),
        }
    }

    /// Decode one record payload for a single-record field.
    fn decode_into(&self, buf: &[u8], e: Endian, ctx: &mut Decoded) -> Result<()> {
        match self {
            Field::Scalar { name, kind } => {
                let v = decode_scalar(name, *kind, buf, e)?;
                ctx.insert(name.as_ref(), v)
            }
            Field::Str { name, len } => {
                let v = trim_text(&buf[..(*len).min(buf.len())]);
                ctx.insert(name.as_ref(), Value::Str(v))
            }
            Field::Bool { name } => {
                ctx.insert(name.as_ref(), Value::Bool(buf.iter().any(|&b| b != 0)))
            }
            Field::Array { name, kind, shape } => decode_array(name, *kind, shape, buf, e, ctx),
            _ => Err(Error::Parse("field does not map to a single record")),
        }
    }
}

fn decode_scalar(name: &str, kind: Kind, buf: &[u8], e: Endian) -> Result<Value> {
    let size = kind.size();
    if buf.len() < size {
        return Err(Error::shape(
            name,
            format!("record of {} bytes cannot hold a {size}-byte scalar", buf.len()),
        ));
    }
    if buf.len() > size {
        log::debug!("scalar '{name}' read from a {}-byte record", buf.len());
    }
    let b = &buf[..size];
    Ok(match kind {
        Kind::Int => Value::Int(i32::decode(b, e)),
        Kind::Real => Value::Real(f64::decode(b, e)),
        Kind::Complex => Value::Complex(Complex64::decode(b, e)),
        Kind::Logical => Value::Bool(b.iter().any(|&x| x != 0)),
        Kind::Char(_) => Value::Str(trim_text(b)),
    })
}

/// Resolve what can be resolved of `shape`.
///
/// Returns one entry per dimension ([`None`] for the inferred one) and the
/// position and name of the inferred dimension, if any.
fn resolve_shape<'a>(
    field: &str,
    shape: &'a [Dim],
    ctx: &Decoded,
) -> Result<(Vec<Option<usize>>, Option<(usize, &'a str)>)> {
    let mut dims = Vec::with_capacity(shape.len());
    let mut missing = None;
    for (i, d) in shape.iter().enumerate() {
        match d {
            Dim::Fixed(n) => dims.push(Some(*n)),
            Dim::Field(name) => dims.push(Some(ctx.require_dim(field, name)?)),
            Dim::Infer(name) if ctx.contains(name) => {
                dims.push(Some(ctx.require_dim(field, name)?))
            }
            Dim::Infer(name) => {
                if missing.is_some() {
                    return Err(Error::shape(field, "more than one unresolved dimension"));
                }
                missing = Some((i, name.as_ref()));
                dims.push(None);
            }
        }
    }
    Ok((dims, missing))
}

/// Product of `dims`, or a shape error when it does not fit in `usize`.
fn element_count(name: &str, dims: impl IntoIterator<Item = usize>) -> Result<usize> {
    dims.into_iter()
        .try_fold(1usize, usize::checked_mul)
        .ok_or_else(|| Error::shape(name, "shape overflows"))
}

fn decode_array(
    name: &str,
    kind: Kind,
    shape: &[Dim],
    buf: &[u8],
    e: Endian,
    ctx: &mut Decoded,
) -> Result<()> {
    let size = kind.size();
    if size == 0 || buf.len() % size != 0 {
        return Err(Error::shape(
            name,
            format!("{} bytes is not a whole number of {size}-byte elements", buf.len()),
        ));
    }
    let total = buf.len() / size;

    let (dims, missing) = resolve_shape(name, shape, ctx)?;
    let known = element_count(name, dims.iter().flatten().copied())?;
    let dims: Vec<usize> = match missing {
        None => {
            if known != total {
                return Err(Error::shape(
                    name,
                    format!("shape {dims:?} needs {known} elements, record holds {total}"),
                ));
            }
            dims.into_iter().flatten().collect()
        }
        Some((pos, dim_name)) => {
            if known == 0 || total % known != 0 {
                return Err(Error::shape(
                    name,
                    format!("{total} elements do not divide evenly by {known}"),
                ));
            }
            let n = total / known;
            let v = i32::try_from(n)
                .map_err(|_| Error::shape(name, "inferred dimension overflows"))?;
            ctx.insert(dim_name, Value::Int(v))?;
            let mut dims: Vec<usize> = dims.into_iter().map(|d| d.unwrap_or(0)).collect();
            dims[pos] = n;
            dims
        }
    };

    let shape_f = IxDyn(&dims).f();
    let bad = |_| Error::shape(name, "array construction failed");
    let value = match kind {
        Kind::Int | Kind::Logical => {
            Value::IntArray(ArrayD::from_shape_vec(shape_f, elements::<i32>(buf, e)).map_err(bad)?)
        }
        Kind::Real => {
            Value::RealArray(ArrayD::from_shape_vec(shape_f, elements::<f64>(buf, e)).map_err(bad)?)
        }
        Kind::Complex => Value::ComplexArray(
            ArrayD::from_shape_vec(shape_f, elements::<Complex64>(buf, e)).map_err(bad)?,
        ),
        Kind::Char(n) => Value::StrArray(buf.chunks_exact(n).map(trim_text).collect()),
    };
    ctx.insert(name, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reals(v: &[f64]) -> Vec<u8> {
        v.iter().flat_map(|x| x.to_be_bytes()).collect()
    }

    fn ctx_with(name: &str, v: i32) -> Decoded {
        let mut d = Decoded::default();
        d.insert(name, Value::Int(v)).unwrap();
        d
    }

    #[test]
    fn symbolic_dimension_resolves() {
        let f = Field::array("arr", Kind::Real, [Dim::Fixed(3), "n".into()]);
        let mut ctx = ctx_with("n", 5);
        let data: Vec<f64> = (0..15).map(f64::from).collect();
        f.decode_into(&reals(&data), Endian::Big, &mut ctx).unwrap();

        let a = ctx.real_array("arr").unwrap();
        assert_eq!(a.shape(), &[3, 5]);
        // column-major: second column starts at element 3
        assert_eq!(a[[0, 1]], 3.0);
        assert_eq!(a[[2, 4]], 14.0);
    }

    #[test]
    fn wrong_length_is_shape_error() {
        let f = Field::array("arr", Kind::Real, [Dim::Fixed(3), "n".into()]);
        for len in [14usize, 16] {
            let mut ctx = ctx_with("n", 5);
            let data = vec![0.0; len];
            let err = f.decode_into(&reals(&data), Endian::Big, &mut ctx).unwrap_err();
            assert!(matches!(err, Error::ShapeResolution { .. }));
        }
    }

    #[test]
    fn huge_dimensions_are_shape_errors() {
        let f = Field::array("arr", Kind::Real, ["n".into(), "n".into(), "n".into()]);
        let mut ctx = ctx_with("n", i32::MAX);
        let err = f.packed_len(&ctx).unwrap_err();
        assert!(matches!(err, Error::ShapeResolution { .. }));

        let err = f.decode_into(&reals(&[0.0; 4]), Endian::Big, &mut ctx).unwrap_err();
        assert!(matches!(
            err,
            Error::ShapeResolution { ref detail, .. } if detail.contains("overflows")
        ));
        assert!(!ctx.contains("arr"));
    }

    #[test]
    fn missing_reference_is_reported() {
        let f = Field::array("arr", Kind::Int, [Dim::field("n")]);
        let mut ctx = Decoded::default();
        let err = f.decode_into(&[0u8; 8], Endian::Big, &mut ctx).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownFieldReference { ref reference, .. } if reference == "n"
        ));
    }

    #[test]
    fn inferred_dimension_is_published() {
        let f = Field::array("m", Kind::Int, [Dim::Fixed(2), Dim::infer("cells")]);
        let mut ctx = Decoded::default();
        let buf: Vec<u8> = (0..6i32).flat_map(|i| i.to_le_bytes()).collect();
        f.decode_into(&buf, Endian::Little, &mut ctx).unwrap();
        assert_eq!(ctx.int("cells"), Some(3));
        assert_eq!(ctx.int_array("m").unwrap().shape(), &[2, 3]);

        let g = Field::array("odd", Kind::Int, [Dim::Fixed(4), Dim::infer("k")]);
        let err = g.decode_into(&buf, Endian::Little, &mut ctx).unwrap_err();
        assert!(matches!(err, Error::ShapeResolution { .. }));
    }

    #[test]
    fn two_inferred_dimensions_fail() {
        let f = Field::array("m", Kind::Int, [Dim::infer("a"), Dim::infer("b")]);
        let mut ctx = Decoded::default();
        let err = f.decode_into(&[0u8; 16], Endian::Big, &mut ctx).unwrap_err();
        assert!(matches!(err, Error::ShapeResolution { .. }));
    }

    #[test]
    fn strings_and_logicals() {
        let mut ctx = Decoded::default();
        Field::string("treat", 20)
            .decode_into(b"VECTOR              ", Endian::Big, &mut ctx)
            .unwrap();
        Field::boolean("yes")
            .decode_into(&[0, 0, 0, 1], Endian::Big, &mut ctx)
            .unwrap();
        Field::boolean("no")
            .decode_into(&[0, 0, 0, 0], Endian::Big, &mut ctx)
            .unwrap();
        Field::array("sym", Kind::Char(8), [Dim::Fixed(2)])
            .decode_into(b"Si      O       ", Endian::Big, &mut ctx)
            .unwrap();

        assert_eq!(ctx.str("treat"), Some("VECTOR"));
        assert_eq!(ctx.bool("yes"), Some(true));
        assert_eq!(ctx.bool("no"), Some(false));
        assert_eq!(ctx.str_array("sym").unwrap(), ["Si", "O"]);
    }

    #[test]
    fn references_and_provides() {
        let f = Field::array(
            "fc",
            Kind::Real,
            [Dim::Fixed(3), "num_ions".into(), Dim::infer("num_cells")],
        );
        assert_eq!(f.references(), vec!["num_ions"]);
        assert_eq!(f.provides(), vec!["fc", "num_cells"]);
        assert!(Field::Skip.provides().is_empty());
    }
}
