//! Accumulated validation errors
//!
//! Validation never stops at the first problem. Every violation found in a
//! single pass is collected into [`ValidationErrors`] so an operator sees the
//! complete list at once. Errors from nested processors and configuration
//! components keep their position, which [`ValidationError::field_path`]
//! turns back into a dotted path.

use crate::parameter::ParameterType;
use crate::types::Kind;
use thiserror::Error;

/// A single violation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("unknown {kind} type: {name}")]
    TypeNotFound { kind: Kind, name: String },

    #[error("missing required parameter: {name}")]
    MissingRequiredParameter { name: String },

    #[error("parameter {name} must be {expected}, found {found}")]
    ParameterTypeMismatch {
        name: String,
        expected: ParameterType,
        found: &'static str,
    },

    #[error("parameter {name} has invalid value {value}, expected one of [{}]", .valid.join(", "))]
    InvalidEnumValue {
        name: String,
        value: String,
        valid: Vec<String>,
    },

    #[error("invalid parameter definition {name}: {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("processors[{index}]: {source}")]
    NestedProcessor {
        index: usize,
        source: Box<ValidationError>,
    },

    #[error("{field}[{index}]: {source}")]
    NestedComponent {
        field: &'static str,
        index: usize,
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    pub fn type_not_found(kind: Kind, name: impl Into<String>) -> Self {
        Self::TypeNotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingRequiredParameter { name: name.into() }
    }

    pub fn invalid_definition(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Dotted path of the offending field, e.g. `processors[1].parameters.port`.
    pub fn field_path(&self) -> String {
        match self {
            Self::TypeNotFound { .. } => "type".to_string(),
            Self::MissingRequiredParameter { name }
            | Self::ParameterTypeMismatch { name, .. }
            | Self::InvalidEnumValue { name, .. }
            | Self::InvalidDefinition { name, .. } => format!("parameters.{}", name),
            Self::NestedProcessor { index, source } => {
                format!("processors[{}].{}", index, source.field_path())
            }
            Self::NestedComponent {
                field,
                index,
                source,
            } => format!("{}[{}].{}", field, index, source.field_path()),
        }
    }

    /// The innermost error, with positional wrappers removed.
    pub fn root_cause(&self) -> &ValidationError {
        match self {
            Self::NestedProcessor { source, .. } | Self::NestedComponent { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

/// A violation flattened for presentation: field path plus message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub path: String,
    pub message: String,
}

/// Every violation found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    /// Append `other`, attributing each error to the processor at `index`.
    pub fn extend_processor(&mut self, index: usize, other: ValidationErrors) {
        self.errors
            .extend(other.errors.into_iter().map(|e| ValidationError::NestedProcessor {
                index,
                source: Box::new(e),
            }));
    }

    /// Append `other`, attributing each error to `field[index]`.
    pub fn extend_component(&mut self, field: &'static str, index: usize, other: ValidationErrors) {
        self.errors
            .extend(other.errors.into_iter().map(|e| ValidationError::NestedComponent {
                field,
                index,
                source: Box::new(e),
            }));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.errors.iter()
    }

    pub fn violations(&self) -> Vec<FieldViolation> {
        self.errors
            .iter()
            .map(|e| FieldViolation {
                path: e.field_path(),
                message: e.root_cause().to_string(),
            })
            .collect()
    }

    /// `Ok(())` when nothing was found.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.errors.len() {
            0 => write!(f, "no validation errors"),
            1 => write!(f, "{}", self.errors[0]),
            n => {
                write!(f, "{} validation errors: ", n)?;
                for (i, e) in self.errors.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_paths_compose() {
        let mut inner = ValidationErrors::new();
        inner.push(ValidationError::missing("port"));
        let mut middle = ValidationErrors::new();
        middle.extend_processor(2, inner);
        let mut outer = ValidationErrors::new();
        outer.extend_component("sources", 0, middle);

        let violations = outer.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "sources[0].processors[2].parameters.port");
        assert_eq!(violations[0].message, "missing required parameter: port");
    }

    #[test]
    fn display_joins_all_errors() {
        let mut errors = ValidationErrors::new();
        errors.push(ValidationError::missing("a"));
        errors.push(ValidationError::missing("b"));
        assert_eq!(
            errors.to_string(),
            "2 validation errors: missing required parameter: a; missing required parameter: b"
        );
    }

    #[test]
    fn into_result_empty_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
        let single: ValidationErrors = ValidationError::missing("x").into();
        assert!(single.into_result().is_err());
    }
}
