//! Path expressions for selecting values out of event documents
//!
//! This module implements the `$.a.b[0].c` reference grammar used by the
//! `@path` and `@arrayPath` directives. Parsing is fallible; lookup is not.
//! A lookup that runs off the data (missing key, out-of-range index,
//! property access on a scalar) returns `None`, which callers treat as
//! "absent" rather than as an error.
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

pub mod ast;
pub mod error;
pub mod parser;

pub use ast::{PathExpression, Segment};
pub use error::PathError;
pub use parser::Parser;

use serde_json::Value;
use std::fmt;

/// A parsed path expression ready for lookups
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    source: String,
    expression: PathExpression,
}

impl Path {
    /// Parse a path expression
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let expression = Parser::new(path).parse()?;
        Ok(Self {
            source: path.to_string(),
            expression,
        })
    }

    /// Walk the path from `data`, returning `None` as soon as a step is missing
    pub fn lookup<'a>(&self, data: &'a Value) -> Option<&'a Value> {
        lookup_segments(data, &self.expression.segments)
    }

    /// Check if the path resolves to a value (an explicit `null` counts)
    pub fn exists(&self, data: &Value) -> bool {
        self.lookup(data).is_some()
    }

    /// The source text the path was parsed from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Accessor chain
    pub fn segments(&self) -> &[Segment] {
        &self.expression.segments
    }

    /// Get the raw expression for inspection
    pub fn expression(&self) -> &PathExpression {
        &self.expression
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Apply one accessor to a value
///
/// Objects are indexed by key (numeric segments become string keys), arrays
/// by numeric segments only. Everything else yields `None`.
pub fn lookup_segment<'a>(value: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Object(map), Segment::Property(name)) => map.get(name),
        (Value::Object(map), Segment::Index(index)) => map.get(&index.to_string()),
        (Value::Array(items), segment) => segment.as_index().and_then(|index| items.get(index)),
        _ => None,
    }
}

/// Apply an accessor chain to a value
pub fn lookup_segments<'a>(data: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    let mut current = data;
    for segment in segments {
        current = lookup_segment(current, segment)?;
    }
    Some(current)
}

/// Parse `path` and look it up in `data` in one step
pub fn select<'a>(path: &str, data: &'a Value) -> Result<Option<&'a Value>, PathError> {
    Ok(Path::parse(path)?.lookup(data))
}

/// Parse `path` and check whether it resolves in `data`
pub fn exists(path: &str, data: &Value) -> Result<bool, PathError> {
    Ok(Path::parse(path)?.exists(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_dot_notation() {
        let data = json!({"a": {"b": 5}});
        assert_eq!(select("$.a.b", &data).unwrap(), Some(&json!(5)));
        assert_eq!(select("$.a.c", &data).unwrap(), None);
    }

    #[test]
    fn test_array_index() {
        let data = json!({"a": [10, 20, 30]});
        assert_eq!(select("$.a[1]", &data).unwrap(), Some(&json!(20)));
        assert_eq!(select("$.a.1", &data).unwrap(), Some(&json!(20)));
        assert_eq!(select("$.a[3]", &data).unwrap(), None);
        assert_eq!(select("$.a[-1]", &data).unwrap(), None);
    }

    #[test]
    fn test_root_selects_whole_context() {
        let data = json!({"foo": "bar"});
        assert_eq!(select("", &data).unwrap(), Some(&data));
        assert_eq!(select("$", &data).unwrap(), Some(&data));
        assert_eq!(select("$.", &data).unwrap(), Some(&data));
    }

    #[test]
    fn test_missing_intermediate_steps() {
        let data = json!({"foo": "bar", "n": null});
        assert_eq!(select("$.foo.bar.baz", &data).unwrap(), None);
        assert_eq!(select("$.n.x", &data).unwrap(), None);
        assert_eq!(select("$.nope[0]", &data).unwrap(), None);
    }

    #[test]
    fn test_explicit_null_exists() {
        let data = json!({"n": null});
        assert_eq!(select("$.n", &data).unwrap(), Some(&Value::Null));
        assert!(exists("$.n", &data).unwrap());
        assert!(!exists("$.m", &data).unwrap());
    }

    #[test]
    fn test_index_on_object_uses_string_key() {
        let data = json!({"0": "zero"});
        assert_eq!(select("$[0]", &data).unwrap(), Some(&json!("zero")));
    }

    #[test]
    fn test_property_on_array_is_missing() {
        let data = json!({"a": [1, 2]});
        assert_eq!(select("$.a.length", &data).unwrap(), None);
    }

    #[test]
    fn test_bare_path_equivalent_to_rooted() {
        let data = json!({"a": {"b": true}});
        assert_eq!(select("a.b", &data).unwrap(), select("$.a.b", &data).unwrap());
    }

    #[test]
    fn test_display_uses_source_text() {
        let path = Path::parse("$.a[0]").unwrap();
        assert_eq!(path.to_string(), "$.a[0]");
        assert_eq!(path.as_str(), "$.a[0]");
        assert_eq!(path.segments().len(), 2);
    }
}
