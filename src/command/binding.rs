//! Declared parameter tables and override merging.
//!
//! Every command template declares its accepted parameters once, in a static
//! table. Construction starts from the declared defaults and merges caller
//! overrides on top; an override naming an undeclared parameter or carrying
//! the wrong serialization kind is rejected at merge time, long before
//! anything is spawned.

use std::collections::HashMap;
use std::path::PathBuf;

use super::{CommandError, ParamKind, ParamValue};

/// One declared parameter slot of a command template.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: Option<ParamValue>,
}

impl ParamSpec {
    /// Declare a parameter with no default. The slot stays unbound until
    /// the caller supplies a value; whether that is mandatory is decided by
    /// the template layout reading it back.
    pub const fn new(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            default: None,
        }
    }

    /// Declare a parameter whose kind and default come from `default`.
    pub fn with_default(name: &'static str, default: ParamValue) -> Self {
        Self {
            name,
            kind: default.kind(),
            default: Some(default),
        }
    }
}

/// Parameter store for one command under construction.
#[derive(Debug, Clone)]
pub struct Bindings {
    command: &'static str,
    specs: &'static [ParamSpec],
    values: HashMap<&'static str, ParamValue>,
}

impl Bindings {
    /// Seed a store with the declared defaults of `specs`.
    pub fn new(command: &'static str, specs: &'static [ParamSpec]) -> Self {
        let values = specs
            .iter()
            .filter_map(|spec| spec.default.clone().map(|value| (spec.name, value)))
            .collect();
        Self {
            command,
            specs,
            values,
        }
    }

    /// Merge one override into the table. Unknown names and kind mismatches
    /// are rejected here.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<&mut Self, CommandError> {
        let spec = self
            .specs
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| CommandError::UnknownParameter {
                command: self.command,
                name: name.to_string(),
            })?;
        if value.kind() != spec.kind {
            return Err(CommandError::TypeMismatch {
                command: self.command,
                name: spec.name,
                expected: spec.kind,
                supplied: value.kind(),
            });
        }
        self.values.insert(spec.name, value);
        Ok(self)
    }

    /// Currently bound value, if any.
    pub fn get(&self, name: &'static str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Bound value of a slot that must be filled before the command can be
    /// built.
    pub fn require(&self, name: &'static str) -> Result<&ParamValue, CommandError> {
        self.get(name).ok_or(CommandError::MissingParameter {
            command: self.command,
            name,
        })
    }

    /// Rendered text of a bound slot, if any.
    pub fn render(&self, name: &'static str) -> Option<String> {
        self.get(name).map(ParamValue::render)
    }

    /// Rendered text of a required slot.
    pub fn require_render(&self, name: &'static str) -> Result<String, CommandError> {
        self.require(name).map(ParamValue::render)
    }

    /// Bound integer vector of a slot, empty when unbound.
    pub fn int_vector(&self, name: &'static str) -> &[i64] {
        match self.get(name) {
            Some(ParamValue::IntVector(values)) => values,
            _ => &[],
        }
    }

    /// Bound float vector of a slot, empty when unbound.
    pub fn float_vector(&self, name: &'static str) -> &[f64] {
        match self.get(name) {
            Some(ParamValue::FloatVector(values)) => values,
            _ => &[],
        }
    }

    /// Bound filename list of a slot, empty when unbound.
    pub fn filenames(&self, name: &'static str) -> &[PathBuf] {
        match self.get(name) {
            Some(ParamValue::FilenameList(paths)) => paths,
            _ => &[],
        }
    }

    /// Whether a switch slot is bound and on.
    pub fn switch_on(&self, name: &'static str) -> bool {
        matches!(self.get(name), Some(ParamValue::Switch(true)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;

    static SPECS: Lazy<Vec<ParamSpec>> = Lazy::new(|| {
        vec![
            ParamSpec::new("output", ParamKind::Filename),
            ParamSpec::with_default("dimension", ParamValue::scalar(2)),
            ParamSpec::with_default("iterations", ParamValue::IntVector(vec![5000; 4])),
            ParamSpec::with_default("rigid", ParamValue::Switch(false)),
        ]
    });

    fn bindings() -> Bindings {
        Bindings::new("test-command", SPECS.as_slice())
    }

    #[test]
    fn defaults_are_seeded_and_required_slots_stay_unbound() {
        let b = bindings();
        assert_eq!(b.render("dimension").as_deref(), Some("2"));
        assert_eq!(b.render("iterations").as_deref(), Some("5000x5000x5000x5000"));
        assert!(b.get("output").is_none());
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut b = bindings();
        b.set("iterations", ParamValue::IntVector(vec![0])).unwrap();
        assert_eq!(b.render("iterations").as_deref(), Some("0"));
    }

    #[test]
    fn unknown_parameter_is_rejected_eagerly() {
        let mut b = bindings();
        let err = b.set("itreations", ParamValue::IntVector(vec![0])).unwrap_err();
        assert!(matches!(
            err,
            CommandError::UnknownParameter { ref name, .. } if name == "itreations"
        ));
    }

    #[test]
    fn kind_mismatch_is_rejected_eagerly() {
        let mut b = bindings();
        let err = b.set("iterations", ParamValue::scalar(5000)).unwrap_err();
        match err {
            CommandError::TypeMismatch {
                name,
                expected,
                supplied,
                ..
            } => {
                assert_eq!(name, "iterations");
                assert_eq!(expected, ParamKind::IntVector);
                assert_eq!(supplied, ParamKind::Scalar);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_required_slot_is_reported_on_read() {
        let b = bindings();
        let err = b.require("output").unwrap_err();
        assert!(matches!(
            err,
            CommandError::MissingParameter { name: "output", .. }
        ));
    }
}
