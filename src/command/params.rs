//! Parameter values and their serialization rules.
//!
//! Each external tool parameter carries one of a small set of serialization
//! kinds. The kind decides both how a value renders into command-line text
//! and which overrides a template accepts for that slot.

use std::fmt;
use std::path::PathBuf;

use super::CommandError;

/// Serialization rule a declared parameter follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Single textual token, emitted verbatim.
    Scalar,
    /// Ordered integers joined with `x`, e.g. `10x-20x30`.
    IntVector,
    /// Ordered floats, one token per element.
    FloatVector,
    /// Boolean switch. How it reaches the command line (flag presence or an
    /// explicit `true`/`false` value) is decided by the template layout.
    Switch,
    /// Path-valued token. Never checked for existence at construction time,
    /// so commands can name outputs that do not exist yet.
    Filename,
    /// Ordered list of path-valued tokens.
    FilenameList,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Scalar => "scalar",
            ParamKind::IntVector => "integer vector",
            ParamKind::FloatVector => "float vector",
            ParamKind::Switch => "switch",
            ParamKind::Filename => "filename",
            ParamKind::FilenameList => "filename list",
        };
        f.write_str(name)
    }
}

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(String),
    IntVector(Vec<i64>),
    FloatVector(Vec<f64>),
    Switch(bool),
    Filename(PathBuf),
    FilenameList(Vec<PathBuf>),
}

impl ParamValue {
    /// Serialization kind this value satisfies.
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Scalar(_) => ParamKind::Scalar,
            ParamValue::IntVector(_) => ParamKind::IntVector,
            ParamValue::FloatVector(_) => ParamKind::FloatVector,
            ParamValue::Switch(_) => ParamKind::Switch,
            ParamValue::Filename(_) => ParamKind::Filename,
            ParamValue::FilenameList(_) => ParamKind::FilenameList,
        }
    }

    /// Scalar from anything displayable.
    pub fn scalar(value: impl fmt::Display) -> Self {
        ParamValue::Scalar(value.to_string())
    }

    /// Filename from anything path-like.
    pub fn filename(path: impl Into<PathBuf>) -> Self {
        ParamValue::Filename(path.into())
    }

    /// Textual form under this value's serialization rule.
    pub fn render(&self) -> String {
        match self {
            ParamValue::Scalar(text) => text.clone(),
            ParamValue::IntVector(values) => join_int_vector(values),
            ParamValue::FloatVector(values) => join_float_vector(values),
            ParamValue::Switch(on) => if *on { "true" } else { "false" }.to_string(),
            ParamValue::Filename(path) => path.display().to_string(),
            ParamValue::FilenameList(paths) => paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Join an ordered integer vector with the `x` delimiter the registration
/// engine expects: `[10, -20, 30]` becomes `10x-20x30`.
pub fn join_int_vector(values: &[i64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("x")
}

/// Space-joined float vector used for volume geometry.
pub fn join_float_vector(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse whitespace- or comma-separated integers from user text. Every
/// element must coerce to an integer; anything else is rejected.
pub fn parse_int_vector(text: &str) -> Result<Vec<i64>, CommandError> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<i64>().map_err(|_| CommandError::NotANumber {
                token: token.to_string(),
            })
        })
        .collect()
}

/// Float counterpart of [`parse_int_vector`].
pub fn parse_float_vector(text: &str) -> Result<Vec<f64>, CommandError> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<f64>().map_err(|_| CommandError::NotANumber {
                token: token.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_vector_joins_with_x_preserving_sign_and_order() {
        assert_eq!(join_int_vector(&[10, -20, 30]), "10x-20x30");
        assert_eq!(join_int_vector(&[10000; 5]), "10000x10000x10000x10000x10000");
        assert_eq!(join_int_vector(&[0]), "0");
    }

    #[test]
    fn float_vector_joins_with_spaces() {
        assert_eq!(join_float_vector(&[0.1, 0.1, 0.06]), "0.1 0.1 0.06");
        assert_eq!(join_float_vector(&[1.0, 1.0, 1.0]), "1 1 1");
    }

    #[test]
    fn parse_int_vector_accepts_spaces_and_commas() {
        assert_eq!(parse_int_vector("10 -20 30").unwrap(), vec![10, -20, 30]);
        assert_eq!(parse_int_vector("10,-20,30").unwrap(), vec![10, -20, 30]);
    }

    #[test]
    fn parse_int_vector_rejects_non_numeric_elements() {
        let err = parse_int_vector("10 twenty 30").unwrap_err();
        assert!(matches!(err, CommandError::NotANumber { ref token } if token == "twenty"));
    }

    #[test]
    fn parse_int_vector_rejects_fractional_elements() {
        assert!(parse_int_vector("10.5").is_err());
    }

    #[test]
    fn switch_renders_lowercase() {
        assert_eq!(ParamValue::Switch(true).render(), "true");
        assert_eq!(ParamValue::Switch(false).render(), "false");
    }

    #[test]
    fn value_kinds_match_their_variants() {
        assert_eq!(ParamValue::scalar(2).kind(), ParamKind::Scalar);
        assert_eq!(ParamValue::filename("/tmp/a.nii.gz").kind(), ParamKind::Filename);
        assert_eq!(ParamValue::IntVector(vec![1]).kind(), ParamKind::IntVector);
    }
}
