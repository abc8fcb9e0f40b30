//! Error types for the template sandbox
//!
//! Every failure maps onto one [`FailureReason`] so callers can tell a
//! security-boundary violation apart from a resource ceiling or a plain
//! authoring mistake.
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse classification of a failed evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    /// A disabled tag or filter was used
    DisabledFeature,
    /// The template source exceeded the length ceiling
    ParseTooLong,
    /// Rendering exceeded the wall-clock ceiling
    Timeout,
    /// Rendering exceeded the allocation budget
    MemoryExceeded,
    /// The template value was not a string
    TypeMismatch,
    /// Any other parse or render failure
    GenericRenderError,
}

/// Which part of the vocabulary a name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    Tag,
    Filter,
}

/// Errors raised while compiling or rendering a template
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// Use of a tag or filter outside the allow-list
    #[error("{kind} \"{name}\" is disabled")]
    Disabled { kind: FeatureKind, name: String },

    /// Source longer than the configured ceiling
    #[error("Template too long: {length} characters exceeds the limit of {limit}")]
    TooLong { length: usize, limit: usize },

    /// Rendering ran past its deadline
    #[error("Template rendering timed out after {elapsed_ms}ms (limit {limit_ms}ms)")]
    Timeout { limit_ms: u64, elapsed_ms: u64 },

    /// Rendering asked for more bytes than the budget allows
    #[error("Template exceeded its memory budget: {requested} bytes requested, limit is {limit}")]
    MemoryExceeded { limit: usize, requested: usize },

    /// The template value was not literal template text
    #[error("Template must be a string but it is {found}")]
    TypeMismatch { found: String },

    /// Malformed template markup
    #[error("Template parse error at position {position}: {message}")]
    Parse { message: String, position: usize },

    /// Failure while rendering (bad filter input, division by zero, ...)
    #[error("Template render error: {message}")]
    Render { message: String },
}

impl TemplateError {
    /// Create a parse error at a byte position
    pub fn parse(message: impl Into<String>, position: usize) -> Self {
        Self::Parse {
            message: message.into(),
            position,
        }
    }

    /// Create a render error
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    /// Create a disabled-feature error
    pub fn disabled(kind: FeatureKind, name: impl Into<String>) -> Self {
        Self::Disabled {
            kind,
            name: name.into(),
        }
    }

    /// Classify the error
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Disabled { .. } => FailureReason::DisabledFeature,
            Self::TooLong { .. } => FailureReason::ParseTooLong,
            Self::Timeout { .. } => FailureReason::Timeout,
            Self::MemoryExceeded { .. } => FailureReason::MemoryExceeded,
            Self::TypeMismatch { .. } => FailureReason::TypeMismatch,
            Self::Parse { .. } | Self::Render { .. } => FailureReason::GenericRenderError,
        }
    }

    /// Failures that must never be downgraded, even in fail-soft mode
    pub fn is_sandbox_violation(&self) -> bool {
        !matches!(self.reason(), FailureReason::GenericRenderError)
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureKind::Tag => write!(f, "tag"),
            FeatureKind::Filter => write!(f, "filter"),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureReason::DisabledFeature => "disabled_feature",
            FailureReason::ParseTooLong => "parse_too_long",
            FailureReason::Timeout => "timeout",
            FailureReason::MemoryExceeded => "memory_exceeded",
            FailureReason::TypeMismatch => "type_mismatch",
            FailureReason::GenericRenderError => "render_error",
        };
        write!(f, "{}", name)
    }
}
