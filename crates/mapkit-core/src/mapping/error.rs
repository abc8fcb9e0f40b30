//! Error types for mapping authoring mistakes
//!
//! Every error carries the `/`-separated location of the offending node,
//! directive names included (`/user/@if/exists`), so a validator can list
//! all problems in a mapping at once.
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

use crate::path::PathError;
use crate::template::{FailureReason, TemplateError};
use thiserror::Error;

/// Errors raised while compiling or resolving a mapping
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    /// More than one `@`-prefixed key on a single object
    #[error("{location} should only have one @-prefixed key but it has {} keys", keys.len())]
    AmbiguousDirective { location: String, keys: Vec<String> },

    /// An `@`-prefixed key that names no directive
    #[error("{location} has an invalid directive: {key}")]
    UnknownDirective { location: String, key: String },

    /// A plain key next to a directive key
    #[error("{location} has key \"{key}\" next to directive {directive}")]
    UnexpectedKey {
        location: String,
        directive: String,
        key: String,
    },

    /// A directive argument of the wrong JSON type
    #[error("{location} should be {expected} but it is {found}")]
    InvalidType {
        location: String,
        expected: String,
        found: String,
    },

    /// A required directive field is missing
    #[error("{location} should have field {field} but it doesn't")]
    MissingField { location: String, field: String },

    /// A directive field that is not understood
    #[error("{location} has unknown field {field}")]
    UnknownField { location: String, field: String },

    /// Malformed path expression
    #[error("{location} has an invalid path: {source}")]
    InvalidPath {
        location: String,
        #[source]
        source: PathError,
    },

    /// Template failure, at compile time or while rendering
    #[error("{location} template failed: {source}")]
    Template {
        location: String,
        #[source]
        source: TemplateError,
    },

    /// The mapping nests deeper than the configured limit
    #[error("{location} nests deeper than {limit} levels")]
    TooDeep { location: String, limit: usize },
}

impl MappingError {
    /// Where in the mapping the error was found
    pub fn location(&self) -> &str {
        match self {
            Self::AmbiguousDirective { location, .. }
            | Self::UnknownDirective { location, .. }
            | Self::UnexpectedKey { location, .. }
            | Self::InvalidType { location, .. }
            | Self::MissingField { location, .. }
            | Self::UnknownField { location, .. }
            | Self::InvalidPath { location, .. }
            | Self::Template { location, .. }
            | Self::TooDeep { location, .. } => location,
        }
    }

    /// The template failure reason, for template errors
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Template { source, .. } => Some(source.reason()),
            _ => None,
        }
    }
}

/// Render a location stack as `/a/b/c`
pub(crate) fn format_location(stack: &[String]) -> String {
    format!("/{}", stack.join("/"))
}
