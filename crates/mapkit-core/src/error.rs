//! Error types for the Mapkit core library
//!
//! Each subsystem owns its own error enum ([`PathError`], [`MappingError`],
//! [`TemplateError`]); this module wraps them into the crate-wide [`Error`]
//! returned by the top-level API.

use crate::mapping::MappingError;
use crate::path::PathError;
use crate::template::{FailureReason, TemplateError};
use thiserror::Error;

/// Main error type for Mapkit operations
#[derive(Error, Debug)]
pub enum Error {
    /// Authoring errors found while compiling a mapping
    #[error("Invalid mapping: {}", format_errors(errors))]
    InvalidMapping { errors: Vec<MappingError> },

    /// A directive failed while resolving
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Path expression errors
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    /// Template sandbox errors outside of a mapping
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// The event payload has the wrong shape
    #[error("Invalid payload: {message}")]
    Payload { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal error with context
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

fn format_errors(errors: &[MappingError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl Error {
    /// The template failure reason behind this error, if any
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Error::Template(error) => Some(error.reason()),
            Error::Mapping(error) => error.failure_reason(),
            Error::InvalidMapping { errors } => errors.iter().find_map(MappingError::failure_reason),
            _ => None,
        }
    }

    /// Authoring errors, if this is a compile failure
    pub fn mapping_errors(&self) -> &[MappingError] {
        match self {
            Error::InvalidMapping { errors } => errors,
            _ => &[],
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal {
            message: err.to_string(),
            source: err,
        }
    }
}
