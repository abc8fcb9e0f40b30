//! Error types for path expressions
//!
//! Only parsing can fail. Evaluating a parsed path against data never
//! errors: a missing step simply yields nothing.
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

use thiserror::Error;

/// Errors raised while parsing a path expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    /// Structural parse errors (unterminated brackets or strings)
    #[error("Parse error at position {position} in '{input}': {message}")]
    Parse {
        message: String,
        position: usize,
        input: String,
    },

    /// Unexpected character with the set of tokens that would have been accepted
    #[error("Syntax error at position {position} in '{input}': {message} (expected {}, found '{found}')", expected.join(" or "))]
    Syntax {
        message: String,
        position: usize,
        input: String,
        expected: Vec<String>,
        found: String,
    },
}

impl PathError {
    /// Create a parse error with position and input
    pub fn parse(message: impl Into<String>, position: usize, input: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            position,
            input: input.into(),
        }
    }

    /// Create a syntax error with detailed information
    pub fn syntax(
        message: impl Into<String>,
        position: usize,
        input: impl Into<String>,
        expected: Vec<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::Syntax {
            message: message.into(),
            position,
            input: input.into(),
            expected,
            found: found.into(),
        }
    }

    /// Byte offset of the error in the source expression
    pub fn position(&self) -> usize {
        match self {
            Self::Parse { position, .. } | Self::Syntax { position, .. } => *position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = PathError::syntax(
            "Unexpected character after ']'",
            4,
            "$[0]x",
            vec!["'.'".to_string(), "'['".to_string()],
            "x",
        );
        let message = err.to_string();
        assert!(message.contains("position 4"));
        assert!(message.contains("'.' or '['"));
        assert!(message.contains("found 'x'"));
        assert_eq!(err.position(), 4);
    }
}
