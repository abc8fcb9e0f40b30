//! Compiled mapping tree
//!
//! A mapping is parsed once into these nodes. Directive objects become
//! their own variants; everything else is a literal that resolves by
//! structural recursion.

use crate::mustache::Interpolation;
use crate::path::Path;
use crate::template::Template;
use serde_json::Value;

/// Directive keys recognized by the compiler
pub const DIRECTIVES: &[&str] = &["@path", "@if", "@arrayPath", "@liquid", "@template", "@literal"];

/// Sibling key a directive object may carry and that is ignored
pub const METADATA_KEY: &str = "_metadata";

/// Check whether a key belongs to the directive namespace
pub fn is_directive_key(key: &str) -> bool {
    key.starts_with('@')
}

/// A node of a compiled mapping
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Scalar copied unchanged
    Value(Value),
    /// Literal object, keys in source order
    Object(Vec<(String, Node)>),
    /// Literal array
    Array(Vec<Node>),
    /// `@path`
    Path(PathSource),
    /// `@if`
    If(Box<Conditional>),
    /// `@arrayPath`
    ArrayPath {
        source: PathSource,
        template: Option<Box<Node>>,
    },
    /// `@liquid`
    Liquid { template: Template, location: String },
    /// `@template`
    Template { source: InterpolationSource, location: String },
    /// `@literal`
    Literal(Box<Node>),
}

/// Where a path expression comes from
#[derive(Debug, Clone, PartialEq)]
pub enum PathSource {
    /// Parsed when the mapping was compiled
    Static(Path),
    /// Computed by another directive at resolution time
    Dynamic { node: Box<Node>, location: String },
}

/// Where an interpolation source comes from
#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationSource {
    Static(Interpolation),
    Dynamic(Box<Node>),
}

/// Which test an `@if` applies to its subject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Test {
    /// Present, including an explicit `null`
    Exists,
    /// Present, not `null` and not `""`
    Blank,
}

/// A compiled `@if`
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub test: Test,
    pub subject: Node,
    pub then: Option<Node>,
    pub otherwise: Option<Node>,
}

impl Test {
    /// Field name of the test inside an `@if` object
    pub fn field(&self) -> &'static str {
        match self {
            Test::Exists => "exists",
            Test::Blank => "blank",
        }
    }

    /// Apply the test to a resolved subject
    pub fn passes(&self, subject: Option<&Value>) -> bool {
        match (self, subject) {
            (_, None) => false,
            (Test::Exists, Some(_)) => true,
            (Test::Blank, Some(Value::Null)) => false,
            (Test::Blank, Some(Value::String(s))) => !s.is_empty(),
            (Test::Blank, Some(_)) => true,
        }
    }
}

impl Node {
    /// Check whether the node contains no directives at any depth
    pub fn is_literal(&self) -> bool {
        match self {
            Node::Value(_) => true,
            Node::Object(entries) => entries.iter().all(|(_, node)| node.is_literal()),
            Node::Array(items) => items.iter().all(Node::is_literal),
            _ => false,
        }
    }

    /// Count directive nodes in the tree
    pub fn directive_count(&self) -> usize {
        match self {
            Node::Value(_) => 0,
            Node::Object(entries) => entries.iter().map(|(_, node)| node.directive_count()).sum(),
            Node::Array(items) => items.iter().map(Node::directive_count).sum(),
            Node::Path(source) => 1 + source.directive_count(),
            Node::If(conditional) => {
                1 + conditional.subject.directive_count()
                    + conditional.then.as_ref().map_or(0, Node::directive_count)
                    + conditional.otherwise.as_ref().map_or(0, Node::directive_count)
            }
            Node::ArrayPath { source, template } => {
                1 + source.directive_count() + template.as_ref().map_or(0, |node| node.directive_count())
            }
            Node::Liquid { .. } => 1,
            Node::Template { source, .. } => match source {
                InterpolationSource::Static(_) => 1,
                InterpolationSource::Dynamic(node) => 1 + node.directive_count(),
            },
            Node::Literal(inner) => 1 + inner.directive_count(),
        }
    }
}

impl PathSource {
    fn directive_count(&self) -> usize {
        match self {
            PathSource::Static(_) => 0,
            PathSource::Dynamic { node, .. } => node.directive_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exists_counts_every_present_value() {
        for value in [json!(null), json!(0), json!(false), json!("")] {
            assert!(Test::Exists.passes(Some(&value)), "{}", value);
        }
        assert!(!Test::Exists.passes(None));
    }

    #[test]
    fn test_blank_rejects_null_and_empty_string() {
        assert!(!Test::Blank.passes(None));
        assert!(!Test::Blank.passes(Some(&json!(null))));
        assert!(!Test::Blank.passes(Some(&json!(""))));
        assert!(Test::Blank.passes(Some(&json!(" "))));
        assert!(Test::Blank.passes(Some(&json!(0))));
        assert!(Test::Blank.passes(Some(&json!(false))));
    }

    #[test]
    fn test_is_literal() {
        let node = Node::Object(vec![("a".into(), Node::Array(vec![Node::Value(json!(1))]))]);
        assert!(node.is_literal());
        assert_eq!(node.directive_count(), 0);

        let node = Node::Array(vec![Node::Path(PathSource::Static(Path::parse("$.a").unwrap()))]);
        assert!(!node.is_literal());
        assert_eq!(node.directive_count(), 1);
    }

    #[test]
    fn test_directive_keys() {
        assert!(is_directive_key("@path"));
        assert!(is_directive_key("@whatever"));
        assert!(!is_directive_key("path"));
        assert!(DIRECTIVES.iter().all(|key| is_directive_key(key)));
    }
}
