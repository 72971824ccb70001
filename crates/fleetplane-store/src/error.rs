//! Error types for the store

use fleetplane_core::{Kind, ValidationErrors};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} {name} is invalid: {errors}")]
    Invalid {
        kind: Kind,
        name: String,
        errors: ValidationErrors,
    },

    #[error("{kind} not found: {name}")]
    NotFound { kind: Kind, name: String },

    #[error("{kind} {name} is not a resource type")]
    NotAType { kind: Kind, name: String },

    #[error("{kind} {name} is in use by {dependents}")]
    InUse {
        kind: Kind,
        name: String,
        dependents: String,
    },

    #[error(transparent)]
    Core(#[from] fleetplane_core::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn invalid(kind: Kind, name: impl Into<String>, errors: ValidationErrors) -> Self {
        Self::Invalid {
            kind,
            name: name.into(),
            errors,
        }
    }

    pub fn not_found(kind: Kind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// The accumulated validation errors behind a rejected commit.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Invalid { errors, .. } => Some(errors),
            Self::Core(e) => e.validation_errors(),
            _ => None,
        }
    }
}
