//! Declarative payload mappings
//!
//! A mapping is a JSON tree of literals and directives. It is compiled once
//! into a typed [`Node`] tree, which can then be resolved against any number
//! of event documents.
//!
//! # Directives
//!
//! - `{"@path": "$.a.b[0]"}` looks a value up in the current context
//! - `{"@if": {"exists": <node>, "then": <node>, "else": <node>}}` branches on
//!   presence (`blank` instead of `exists` also rejects `null` and `""`)
//! - `{"@arrayPath": ["$.items", <node>]}` maps every element of an array,
//!   with the element as the context of `<node>`
//! - `{"@liquid": "{{ name | upcase }}"}` renders a sandboxed Liquid template
//! - `{"@template": "Hi {{name}}"}` interpolates fields, HTML-escaped
//! - `{"@literal": <node>}` resolves its argument as-is
//!
//! ```
//! use mapkit_core::mapping::Mapping;
//! use serde_json::json;
//!
//! let mapping = Mapping::compile(&json!({
//!     "id": {"@path": "$.user.id"},
//!     "email": {"@path": "$.user.email"}
//! }))
//! .unwrap();
//!
//! let output = mapping.resolve(&json!({"user": {"id": 7}})).unwrap();
//! assert_eq!(output, Some(json!({"id": 7})));
//! ```
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

pub mod ast;
pub mod compiler;
pub mod error;
pub mod resolver;

pub use ast::{Node, Test, DIRECTIVES};
pub use compiler::{Compiler, DEFAULT_MAX_DEPTH};
pub use error::MappingError;
pub use resolver::{ResolveOptions, Resolver, FAIL_SOFT_VALUE};

use crate::{Error, Result};
use serde_json::Value;
use tracing::debug;

/// A compiled mapping
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    root: Node,
}

impl Mapping {
    /// Compile with the process-wide sandbox and default depth limit
    pub fn compile(mapping: &Value) -> Result<Self> {
        Self::compile_with(mapping, &Compiler::new())
    }

    /// Compile with a configured compiler
    pub fn compile_with(mapping: &Value, compiler: &Compiler<'_>) -> Result<Self> {
        let root = compiler
            .compile(mapping)
            .map_err(|errors| Error::InvalidMapping { errors })?;
        debug!(directives = root.directive_count(), "compiled mapping");
        Ok(Self { root })
    }

    /// Resolve against `context` with default options
    pub fn resolve(&self, context: &Value) -> Result<Option<Value>> {
        self.resolve_with(context, &Resolver::new())
    }

    /// Resolve against `context` with a configured resolver
    pub fn resolve_with(&self, context: &Value, resolver: &Resolver<'_>) -> Result<Option<Value>> {
        Ok(resolver.resolve(&self.root, context)?)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Check if resolving can only ever reproduce the mapping itself
    pub fn is_literal(&self) -> bool {
        self.root.is_literal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_reports_every_error() {
        let err = Mapping::compile(&json!({"a": {"@nope": 1}, "b": {"@path": 1}})).unwrap_err();
        match err {
            Error::InvalidMapping { errors } => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].location(), "/a");
                assert_eq!(errors[1].location(), "/b/@path");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_compile_once_resolve_many() {
        let mapping = Mapping::compile(&json!({"n": {"@path": "$.n"}})).unwrap();
        for n in 0..3 {
            assert_eq!(mapping.resolve(&json!({"n": n})).unwrap(), Some(json!({"n": n})));
        }
        assert!(!mapping.is_literal());
    }

    #[test]
    fn test_compile_with_options() {
        let options = ResolveOptions {
            max_depth: 1,
            ..ResolveOptions::default()
        };
        let compiler = Compiler::new().with_max_depth(options.max_depth);
        assert!(Mapping::compile_with(&json!({"a": {"b": {"c": 1}}}), &compiler).is_err());
        assert!(Mapping::compile_with(&json!({"a": 1}), &compiler).is_ok());
    }

    #[test]
    fn test_resolve_errors_carry_location() {
        let mapping = Mapping::compile(&json!({"x": [{"@liquid": "{{ 1 | divided_by: 0 }}"}]})).unwrap();
        let err = mapping.resolve(&json!({})).unwrap_err();
        assert!(err.to_string().contains("/x/0/@liquid"), "{}", err);
    }
}
