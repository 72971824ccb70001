//! Error types for Fleetplane

use crate::validation::ValidationErrors;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("render failed for {type_name}: {message}")]
    Render { type_name: String, message: String },

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn render(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// The accumulated validation errors, if this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}
