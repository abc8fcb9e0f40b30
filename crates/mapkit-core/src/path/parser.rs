//! Path expression parser
//!
//! Grammar accepted:
//!
//! ```text
//! path     := "" | "$" accessor* | name accessor*
//! accessor := "." name? | "[" ws* (quoted | bare) ws* "]"
//! name     := any run of characters other than "." and "["
//! ```
//!
//! Empty dot segments are ignored, so `$.` selects the root. A bracket whose
//! content is all digits becomes an index; anything else is a property name.
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

use super::ast::{parse_index, PathExpression, Segment};
use super::error::PathError;
use std::iter::Peekable;
use std::str::Chars;

/// Path expression parser
pub struct Parser<'a> {
    /// Input string being parsed
    input: &'a str,
    /// Character iterator
    chars: Peekable<Chars<'a>>,
    /// Current byte position in input
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given input
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().peekable(),
            position: 0,
        }
    }

    /// Parse the input into a path expression
    pub fn parse(mut self) -> Result<PathExpression, PathError> {
        let mut segments = Vec::new();
        let rooted = self.current_char() == Some('$');

        if rooted {
            self.advance();
            match self.current_char() {
                None | Some('.') | Some('[') => {}
                Some(ch) => {
                    return Err(PathError::syntax(
                        "Unexpected character after '$'",
                        self.position,
                        self.input,
                        vec!["'.'".to_string(), "'['".to_string(), "end of path".to_string()],
                        ch.to_string(),
                    ));
                }
            }
        } else if !self.is_at_end() && self.current_char() != Some('[') {
            let name = self.parse_name();
            if !name.is_empty() {
                segments.push(Segment::Property(name));
            }
        }

        while let Some(ch) = self.current_char() {
            match ch {
                '.' => {
                    self.advance();
                    let name = self.parse_name();
                    if !name.is_empty() {
                        segments.push(Segment::Property(name));
                    }
                }
                '[' => {
                    segments.push(self.parse_bracket()?);
                    match self.current_char() {
                        None | Some('.') | Some('[') => {}
                        Some(ch) => {
                            return Err(PathError::syntax(
                                "Unexpected character after ']'",
                                self.position,
                                self.input,
                                vec!["'.'".to_string(), "'['".to_string(), "end of path".to_string()],
                                ch.to_string(),
                            ));
                        }
                    }
                }
                _ => {
                    let name = self.parse_name();
                    segments.push(Segment::Property(name));
                }
            }
        }

        Ok(PathExpression::new(rooted, segments))
    }

    /// Parse a bare property name up to the next '.' or '['
    fn parse_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(ch) = self.current_char() {
            if ch == '.' || ch == '[' {
                break;
            }
            name.push(ch);
            self.advance();
        }
        name
    }

    /// Parse bracket notation: `['quoted']`, `[0]` or `[bare]`
    fn parse_bracket(&mut self) -> Result<Segment, PathError> {
        let start = self.position;
        self.advance(); // consume '['
        self.skip_whitespace();

        if matches!(self.current_char(), Some('\'') | Some('"')) {
            let name = self.parse_quoted_string()?;
            self.skip_whitespace();
            self.expect_char(']')?;
            return Ok(Segment::Property(name));
        }

        let mut content = String::new();
        loop {
            match self.current_char() {
                Some(']') => {
                    self.advance();
                    break;
                }
                Some(ch) => {
                    content.push(ch);
                    self.advance();
                }
                None => {
                    return Err(PathError::parse("Unterminated bracket selector", start, self.input));
                }
            }
        }

        let content = content.trim();
        if content.is_empty() {
            return Err(PathError::parse("Empty bracket selector", start, self.input));
        }

        Ok(match parse_index(content) {
            Some(index) => Segment::Index(index),
            None => Segment::Property(content.to_string()),
        })
    }

    /// Parse a quoted string
    fn parse_quoted_string(&mut self) -> Result<String, PathError> {
        let start = self.position;
        let quote_char = match self.advance() {
            Some(ch) => ch,
            None => return Err(PathError::parse("Expected a quote", start, self.input)),
        };

        let mut string = String::new();
        let mut escaped = false;

        while let Some(ch) = self.current_char() {
            if escaped {
                match ch {
                    'n' => string.push('\n'),
                    'r' => string.push('\r'),
                    't' => string.push('\t'),
                    '\\' => string.push('\\'),
                    '\'' => string.push('\''),
                    '"' => string.push('"'),
                    _ => {
                        string.push('\\');
                        string.push(ch);
                    }
                }
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote_char {
                self.advance(); // consume closing quote
                return Ok(string);
            } else {
                string.push(ch);
            }
            self.advance();
        }

        Err(PathError::parse("Unterminated string literal", start, self.input))
    }

    /// Skip whitespace characters
    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Get current character without advancing
    fn current_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Advance to next character
    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        self.position += ch.len_utf8();
        Some(ch)
    }

    /// Check if at end of input
    fn is_at_end(&mut self) -> bool {
        self.current_char().is_none()
    }

    /// Expect a specific character
    fn expect_char(&mut self, expected: char) -> Result<(), PathError> {
        match self.current_char() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(PathError::syntax(
                format!("Expected '{}'", expected),
                self.position,
                self.input,
                vec![expected.to_string()],
                ch.to_string(),
            )),
            None => Err(PathError::parse(
                format!("Expected '{}' but reached end of input", expected),
                self.position,
                self.input,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> PathExpression {
        Parser::new(input).parse().unwrap()
    }

    fn prop(name: &str) -> Segment {
        Segment::Property(name.to_string())
    }

    #[test]
    fn test_parse_root_forms() {
        assert!(parse("").is_root());
        assert!(parse("$").is_root());
        assert!(parse("$.").is_root());
        assert!(parse("$").rooted);
        assert!(!parse("").rooted);
    }

    #[test]
    fn test_parse_dot_notation() {
        let expr = parse("$.a.b.c");
        assert_eq!(expr.segments, vec![prop("a"), prop("b"), prop("c")]);
    }

    #[test]
    fn test_parse_bare_path() {
        let expr = parse("properties.email");
        assert!(!expr.rooted);
        assert_eq!(expr.segments, vec![prop("properties"), prop("email")]);
    }

    #[test]
    fn test_parse_array_index() {
        let expr = parse("$.a[1].c");
        assert_eq!(expr.segments, vec![prop("a"), Segment::Index(1), prop("c")]);
    }

    #[test]
    fn test_parse_spaced_segment() {
        let expr = parse("$.integrations.Actions Amplitude.session_id");
        assert_eq!(
            expr.segments,
            vec![prop("integrations"), prop("Actions Amplitude"), prop("session_id")]
        );
    }

    #[test]
    fn test_parse_quoted_bracket() {
        let expr = parse("$.integrations['Actions Amplitude'].session_id");
        assert_eq!(
            expr.segments,
            vec![prop("integrations"), prop("Actions Amplitude"), prop("session_id")]
        );

        let expr = parse(r#"$["a.b"]"#);
        assert_eq!(expr.segments, vec![prop("a.b")]);
    }

    #[test]
    fn test_parse_bare_bracket_is_property() {
        let expr = parse("$[name][ 2 ]");
        assert_eq!(expr.segments, vec![prop("name"), Segment::Index(2)]);

        let expr = parse("$.a[-1]");
        assert_eq!(expr.segments, vec![prop("a"), prop("-1")]);
    }

    #[test]
    fn test_parse_skips_empty_dot_segments() {
        let expr = parse("$.a..b");
        assert_eq!(expr.segments, vec![prop("a"), prop("b")]);
    }

    #[test]
    fn test_parse_escaped_quote() {
        let expr = parse(r"$['it\'s']");
        assert_eq!(expr.segments, vec![prop("it's")]);
    }

    #[test]
    fn test_parse_error_unterminated_bracket() {
        let err = Parser::new("$.test[").parse().unwrap_err();
        assert!(matches!(err, PathError::Parse { .. }));
        assert_eq!(err.position(), 6);
    }

    #[test]
    fn test_parse_error_unterminated_string() {
        assert!(Parser::new("$['abc").parse().is_err());
    }

    #[test]
    fn test_parse_error_empty_bracket() {
        assert!(Parser::new("$.a[]").parse().is_err());
    }

    #[test]
    fn test_parse_error_garbage_after_bracket() {
        let err = Parser::new("$.a[0]b").parse().unwrap_err();
        assert!(matches!(err, PathError::Syntax { .. }));
    }

    #[test]
    fn test_parse_error_after_root() {
        assert!(Parser::new("$foo").parse().is_err());
    }
}
