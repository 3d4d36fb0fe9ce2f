//! External command construction.
//!
//! Every external tool invocation is described by a template: a static table
//! of declared parameters plus a fixed argument layout. Construction merges
//! caller overrides into the declared defaults, rejecting unknown names and
//! mismatched kinds eagerly, and emits the final argument vector once, in
//! layout order. Nothing in this module touches the filesystem or spawns a
//! process; a built [`ExternalCommand`] is pure data.

pub mod binding;
pub mod compose;
pub mod params;
pub mod preprocess;
pub mod registration;
pub mod reslice;
pub mod stack;

pub use binding::{Bindings, ParamSpec};
pub use params::{ParamKind, ParamValue};

use std::fmt;

use thiserror::Error;

/// Parameter rejection during command construction. All variants are
/// configuration-class failures: they surface before anything executes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("{command}: unknown parameter `{name}`")]
    UnknownParameter { command: &'static str, name: String },

    #[error("{command}: parameter `{name}` expects a {expected}, got a {supplied}")]
    TypeMismatch {
        command: &'static str,
        name: &'static str,
        expected: ParamKind,
        supplied: ParamKind,
    },

    #[error("{command}: parameter `{name}` is required")]
    MissingParameter {
        command: &'static str,
        name: &'static str,
    },

    #[error("vector element `{token}` is not a number")]
    NotANumber { token: String },
}

/// A fully bound external tool invocation.
///
/// Immutable once built; the argument vector is already in its final order
/// and [`shell_line`](Self::shell_line) reproduces the exact command text
/// deterministically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    label: String,
    program: String,
    args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(label: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args,
        }
    }

    /// Identity used in logs and failure reports. Names the operation and
    /// the slice or pair it acts on.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Exact invocation text, shell-quoted.
    pub fn shell_line(&self) -> String {
        let tokens = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        shell_words::join(tokens)
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shell_line())
    }
}
