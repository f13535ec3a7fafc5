//! The decoded context: everything one decode call produced.

use std::collections::BTreeMap;
use std::ops::Index;

use ndarray::ArrayD;
use num_complex::Complex64;

use crate::error::Warning;
use crate::field::Value;
use crate::scan::HeaderOffsets;
use crate::utils::Endian;
use crate::{Error, Result};

/// Name → value mapping built by one decode call.
///
/// Values are written once and never replaced. During decoding this is the
/// only place symbolic array dimensions are looked up.
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    values: BTreeMap<String, Value>,
    warnings: Vec<Warning>,
    endian: Endian,
    offsets: HeaderOffsets,
    payload_bytes: u64,
}

impl Decoded {
    pub(crate) fn new(endian: Endian) -> Self {
        Self {
            endian,
            ..Self::default()
        }
    }

    pub(crate) fn finish(&mut self, offsets: HeaderOffsets, payload_bytes: u64) {
        self.offsets = offsets;
        self.payload_bytes = payload_bytes;
    }

    /// Store a value. Fails if the name is already taken.
    pub(crate) fn insert(&mut self, name: impl Into<String>, value: Value) -> Result<()> {
        let name = name.into();
        if self.values.contains_key(&name) {
            return Err(Error::DuplicateValue(name));
        }
        self.values.insert(name, value);
        Ok(())
    }

    pub(crate) fn warn(&mut self, w: Warning) {
        log::warn!("{w}");
        self.warnings.push(w);
    }

    /// Look up a value that a field needs as an array dimension.
    ///
    /// `field` is the name of the field asking, used in error messages.
    pub(crate) fn require_dim(&self, field: &str, name: &str) -> Result<usize> {
        let v = self
            .values
            .get(name)
            .ok_or_else(|| Error::UnknownFieldReference {
                field: field.to_owned(),
                reference: name.to_owned(),
            })?;
        v.as_dim().ok_or_else(|| {
            Error::shape(
                field,
                format!("'{name}' is a {} and not a valid dimension", v.type_name()),
            )
        })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all values in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(Value::as_int)
    }

    pub fn real(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_real)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn int_array(&self, name: &str) -> Option<&ArrayD<i32>> {
        self.get(name).and_then(Value::as_int_array)
    }

    pub fn real_array(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.get(name).and_then(Value::as_real_array)
    }

    pub fn complex_array(&self, name: &str) -> Option<&ArrayD<Complex64>> {
        self.get(name).and_then(Value::as_complex_array)
    }

    pub fn str_array(&self, name: &str) -> Option<&[String]> {
        self.get(name).and_then(Value::as_str_array)
    }

    /// Non-fatal problems met while decoding.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Byte order the file was read with.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Header offsets found by the scan pass.
    pub fn offsets(&self) -> &HeaderOffsets {
        &self.offsets
    }

    /// Record payload bytes read from the stream, over both passes.
    /// Payloads of skipped records are not counted.
    pub fn payload_bytes_read(&self) -> u64 {
        self.payload_bytes
    }

    /// Consume the result, keeping only the values.
    pub fn into_values(self) -> BTreeMap<String, Value> {
        self.values
    }
}

impl Index<&str> for Decoded {
    type Output = Value;

    /// Index by value name.
    ///
    /// # Panics
    /// Panics if the name was not decoded.
    fn index(&self, index: &str) -> &Self::Output {
        self.get(index)
            .unwrap_or_else(|| panic!("no value '{index}' decoded"))
    }
}
