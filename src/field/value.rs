//! Decoded values.

use ndarray::ArrayD;
use num_complex::Complex64;

/// A decoded field value.
///
/// Arrays keep the file's column-major (Fortran) layout: element
/// `a[[i, j]]` is the Fortran element `a(i+1, j+1)`. Call
/// `.as_standard_layout()` on the array when a row-major buffer is needed.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Real(f64),
    Complex(Complex64),
    Bool(bool),
    Str(String),
    IntArray(ArrayD<i32>),
    RealArray(ArrayD<f64>),
    ComplexArray(ArrayD<Complex64>),
    /// Character arrays, one trimmed string per element.
    StrArray(Vec<String>),
}

impl Value {
    /// Short name of the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Real(_) => "real",
            Value::Complex(_) => "complex",
            Value::Bool(_) => "logical",
            Value::Str(_) => "string",
            Value::IntArray(_) => "integer array",
            Value::RealArray(_) => "real array",
            Value::ComplexArray(_) => "complex array",
            Value::StrArray(_) => "string array",
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<Complex64> {
        match self {
            Value::Complex(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&ArrayD<i32>> {
        match self {
            Value::IntArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_real_array(&self) -> Option<&ArrayD<f64>> {
        match self {
            Value::RealArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_complex_array(&self) -> Option<&ArrayD<Complex64>> {
        match self {
            Value::ComplexArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str_array(&self) -> Option<&[String]> {
        match self {
            Value::StrArray(v) => Some(v),
            _ => None,
        }
    }

    /// Interpret the value as an array dimension.
    ///
    /// Only non-negative integers qualify.
    pub fn as_dim(&self) -> Option<usize> {
        self.as_int().and_then(|v| usize::try_from(v).ok())
    }

    /// Array shape, or `[]` for scalars.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Value::IntArray(a) => a.shape().to_vec(),
            Value::RealArray(a) => a.shape().to_vec(),
            Value::ComplexArray(a) => a.shape().to_vec(),
            Value::StrArray(v) => vec![v.len()],
            _ => Vec::new(),
        }
    }
}
