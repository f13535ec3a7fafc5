//! Declarative field specifications.
//!
//! A [`Spec`] is an ordered list of [`Section`]s, each an ordered list of
//! [`Field`]s. It is a plain immutable value: callers that need extra
//! sections build a derived spec with the `with_*` methods instead of
//! mutating a shared table.
//!
//! ## Ordering rule
//! A field may only refer to names defined by a field that comes earlier in
//! specification order, in the same section or an earlier one.
//! [`Spec::validate`] enforces this before any byte is read.

use std::collections::{HashMap, HashSet};

use crate::field::{Dim, Field, Name, Structured};
use crate::{Error, Result};

/// A named section and the fields that follow its header record.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub name: Name,
    pub fields: Vec<Field>,
}

impl Section {
    pub fn new(name: impl Into<Name>, fields: impl IntoIterator<Item = Field>) -> Self {
        Self {
            name: name.into(),
            fields: fields.into_iter().collect(),
        }
    }
}

/// Ordered, immutable description of a file's sections.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Spec {
    magic: Option<Name>,
    sections: Vec<Section>,
}

impl Spec {
    /// An empty spec with no magic header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the first record of the file to hold `magic`.
    pub fn with_magic(mut self, magic: impl Into<Name>) -> Self {
        self.magic = Some(magic.into());
        self
    }

    /// Add a section at the end, or replace the section of the same name in
    /// place.
    pub fn with_section(mut self, section: Section) -> Self {
        match self.sections.iter_mut().find(|s| s.name == section.name) {
            Some(s) => *s = section,
            None => self.sections.push(section),
        }
        self
    }

    /// Drop a section by name.
    pub fn without_section(mut self, name: &str) -> Self {
        self.sections.retain(|s| s.name != name);
        self
    }

    /// Set whether wavefunction coefficients are kept or skipped.
    pub fn with_wavefunction_coefficients(mut self, store: bool) -> Self {
        for f in self.sections.iter_mut().flat_map(|s| s.fields.iter_mut()) {
            if let Field::Structured(Structured::Wavefunction { store: s }) = f {
                *s = store;
            }
        }
        self
    }

    pub fn magic(&self) -> Option<&str> {
        self.magic.as_deref()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Check the ordering rule, name uniqueness and inferred dimensions.
    pub fn validate(&self) -> Result<()> {
        let mut sections = HashSet::new();
        let mut defined = HashSet::new();
        for s in &self.sections {
            if !sections.insert(s.name.as_ref()) {
                return Err(Error::Parse("section listed twice in specification"));
            }
            for f in &s.fields {
                check_field(&s.name, f, false, &mut defined)?;
            }
        }
        Ok(())
    }

    /// Sections needed to decode `requested`: the requested sections plus,
    /// transitively, every section defining a name they refer to.
    ///
    /// Names unknown to the spec are ignored.
    pub(crate) fn closure<'a>(&'a self, requested: &[&str]) -> HashSet<&'a str> {
        let mut definer: HashMap<&str, &str> = HashMap::new();
        for s in &self.sections {
            for f in &s.fields {
                for p in f.provides() {
                    definer.entry(p).or_insert(s.name.as_ref());
                }
            }
        }

        let mut selected = HashSet::new();
        let mut stack: Vec<&str> = requested
            .iter()
            .filter_map(|r| self.section(r).map(|s| s.name.as_ref()))
            .collect();
        while let Some(name) = stack.pop() {
            if !selected.insert(name) {
                continue;
            }
            let Some(section) = self.section(name) else {
                continue;
            };
            for f in &section.fields {
                stack.extend(f.references().into_iter().filter_map(|r| definer.get(r).copied()));
            }
        }
        selected
    }
}

fn check_field<'a>(
    section: &str,
    f: &'a Field,
    packed: bool,
    defined: &mut HashSet<&'a str>,
) -> Result<()> {
    if let Field::Packed(inner) = f {
        for g in inner {
            if matches!(g, Field::Packed(_) | Field::Structured(_) | Field::Skip) {
                return Err(Error::Parse("packed records hold only single-record fields"));
            }
            check_field(section, g, true, defined)?;
        }
        return Ok(());
    }

    if let Field::Array { name, shape, .. } = f {
        let inferred = shape.iter().filter(|d| matches!(d, Dim::Infer(_))).count();
        if inferred > 1 {
            return Err(Error::shape(name, "more than one inferred dimension"));
        }
        if packed && inferred > 0 {
            return Err(Error::shape(
                name,
                "inferred dimensions are not allowed inside packed records",
            ));
        }
    }

    for r in f.references() {
        if !defined.contains(r) {
            return Err(Error::ForwardReference {
                section: section.to_owned(),
                field: f.label().to_owned(),
                reference: r.to_owned(),
            });
        }
    }
    for p in f.provides() {
        if !defined.insert(p) {
            return Err(Error::DuplicateField(p.to_owned()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Kind;

    fn simple() -> Spec {
        Spec::new()
            .with_section(Section::new("DIMS", [Field::scalar("n", Kind::Int)]))
            .with_section(Section::new(
                "DATA",
                [Field::array("arr", Kind::Real, [Dim::Fixed(3), "n".into()])],
            ))
            .with_section(Section::new("OTHER", [Field::scalar("x", Kind::Real)]))
    }

    #[test]
    fn valid_spec_passes() {
        simple().validate().unwrap();
    }

    #[test]
    fn forward_reference_fails_fast() {
        let spec = Spec::new()
            .with_section(Section::new(
                "DATA",
                [Field::array("arr", Kind::Real, [Dim::field("n")])],
            ))
            .with_section(Section::new("DIMS", [Field::scalar("n", Kind::Int)]));
        assert!(matches!(
            spec.validate(),
            Err(Error::ForwardReference { ref reference, .. }) if reference == "n"
        ));
    }

    #[test]
    fn duplicate_names_fail() {
        let spec = simple().with_section(Section::new("AGAIN", [Field::scalar("n", Kind::Int)]));
        assert!(matches!(spec.validate(), Err(Error::DuplicateField(n)) if n == "n"));
    }

    #[test]
    fn packed_fields_see_earlier_siblings() {
        let spec = Spec::new().with_section(Section::new(
            "P",
            [Field::packed([
                Field::scalar("n", Kind::Int),
                Field::array("v", Kind::Int, [Dim::field("n")]),
            ])],
        ));
        spec.validate().unwrap();

        let bad = Spec::new().with_section(Section::new(
            "P",
            [Field::packed([Field::array("v", Kind::Int, [Dim::infer("n")])])],
        ));
        assert!(matches!(bad.validate(), Err(Error::ShapeResolution { .. })));
    }

    #[test]
    fn closure_pulls_in_definers() {
        let spec = simple();
        let sel = spec.closure(&["DATA"]);
        assert!(sel.contains("DATA"));
        assert!(sel.contains("DIMS"));
        assert!(!sel.contains("OTHER"));

        let sel = spec.closure(&["OTHER", "UNKNOWN"]);
        assert_eq!(sel.len(), 1);
    }

    #[test]
    fn with_section_replaces_in_place() {
        let spec = simple().with_section(Section::new(
            "DIMS",
            [Field::scalar("n", Kind::Int), Field::Skip],
        ));
        assert_eq!(spec.sections()[0].name, "DIMS");
        assert_eq!(spec.sections()[0].fields.len(), 2);
        assert_eq!(spec.without_section("OTHER").sections().len(), 2);
    }
}
