//! Abstract syntax tree for path expressions
//!
//! A path is an optional `$` root marker followed by a chain of accessors.
//! Both rooted and bare paths are evaluated against the context currently
//! in scope; the marker only records how the author wrote the expression.
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

use std::fmt;

/// A parsed path expression
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathExpression {
    /// Whether the expression started with `$`
    pub rooted: bool,
    /// Chain of accessors applied left to right
    pub segments: Vec<Segment>,
}

/// Individual accessor in a path expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Property access (`.name`, `['name']` or a non-numeric `[name]`)
    Property(String),
    /// Array index access (`[0]`)
    Index(usize),
}

impl PathExpression {
    /// Create a new expression
    pub fn new(rooted: bool, segments: Vec<Segment>) -> Self {
        Self { rooted, segments }
    }

    /// True when the expression selects the context itself
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl Segment {
    /// Interpret the segment as an array index, if it looks like one
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(index) => Some(*index),
            Segment::Property(name) => parse_index(name),
        }
    }
}

/// Parse a non-empty run of ASCII digits as an index
pub(crate) fn parse_index(text: &str) -> Option<usize> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn needs_brackets(name: &str) -> bool {
    name.is_empty() || name.contains(&['.', '[', ']', '\'', '"'][..])
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.segments {
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Index(index) => write!(f, "[{}]", index),
            Segment::Property(name) if needs_brackets(name) => {
                write!(f, "['")?;
                for ch in name.chars() {
                    match ch {
                        '\'' => write!(f, "\\'")?,
                        '\\' => write!(f, "\\\\")?,
                        _ => write!(f, "{}", ch)?,
                    }
                }
                write!(f, "']")
            }
            Segment::Property(name) => write!(f, ".{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trips_simple_paths() {
        let expr = PathExpression::new(
            true,
            vec![
                Segment::Property("a".to_string()),
                Segment::Index(2),
                Segment::Property("b".to_string()),
            ],
        );
        assert_eq!(expr.to_string(), "$.a[2].b");
    }

    #[test]
    fn test_display_quotes_awkward_names() {
        let expr = PathExpression::new(true, vec![Segment::Property("a.b".to_string())]);
        assert_eq!(expr.to_string(), "$['a.b']");

        let expr = PathExpression::new(true, vec![Segment::Property("it's".to_string())]);
        assert_eq!(expr.to_string(), "$['it\\'s']");
    }

    #[test]
    fn test_numeric_property_acts_as_index() {
        assert_eq!(Segment::Property("12".to_string()).as_index(), Some(12));
        assert_eq!(Segment::Property("-1".to_string()).as_index(), None);
        assert_eq!(Segment::Property("1a".to_string()).as_index(), None);
        assert_eq!(Segment::Index(3).as_index(), Some(3));
    }
}
