//! Expressions, filter chains and conditions inside template markup
//!
//! The markup between `{{ }}` and the arguments of `if`, `unless`, `assign`
//! and `echo` are parsed here into small typed trees. Boolean operators are
//! right-associative with no precedence: `a and b or c` groups as
//! `a and (b or c)`.
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

use super::error::TemplateError;
use serde_json::{Number, Value};
use std::fmt;

/// A value-producing expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// String, number, boolean or nil literal
    Literal(Value),
    /// The `empty` keyword
    Empty,
    /// The `blank` keyword
    Blank,
    /// A variable reference with its accessors
    Variable(VariablePath),
}

/// `name.key["other"][0][index]`
#[derive(Debug, Clone, PartialEq)]
pub struct VariablePath {
    /// First element names the scope variable, the rest walk into it
    pub accessors: Vec<Accessor>,
}

/// One step of a variable reference
#[derive(Debug, Clone, PartialEq)]
pub enum Accessor {
    /// `.name` or a bare root name
    Key(String),
    /// `[expression]`, evaluated at render time
    Dynamic(Expression),
}

/// `| name: arg, key: value`
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<Expression>,
    pub keyword_args: Vec<(String, Expression)>,
    /// Byte offset of the filter name in the template
    pub position: usize,
}

/// An input expression followed by zero or more filters
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    pub input: Expression,
    pub filters: Vec<FilterCall>,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Contains,
}

/// Test expression of `if`, `elsif` and `unless`
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// A single expression, optionally compared against another
    Compare {
        left: Expression,
        comparison: Option<(Operator, Expression)>,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    Identifier(String),
    Str(String),
    Number(Value),
    Dot,
    Range,
    OpenBracket,
    CloseBracket,
    Pipe,
    Colon,
    Comma,
    Assign,
    Operator(Operator),
}

impl fmt::Display for Lexeme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lexeme::Identifier(name) => write!(f, "'{}'", name),
            Lexeme::Str(s) => write!(f, "string \"{}\"", s),
            Lexeme::Number(n) => write!(f, "number {}", n),
            Lexeme::Dot => write!(f, "'.'"),
            Lexeme::Range => write!(f, "'..'"),
            Lexeme::OpenBracket => write!(f, "'['"),
            Lexeme::CloseBracket => write!(f, "']'"),
            Lexeme::Pipe => write!(f, "'|'"),
            Lexeme::Colon => write!(f, "':'"),
            Lexeme::Comma => write!(f, "','"),
            Lexeme::Assign => write!(f, "'='"),
            Lexeme::Operator(op) => write!(f, "'{}'", op),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Less => "<",
            Operator::Greater => ">",
            Operator::LessOrEqual => "<=",
            Operator::GreaterOrEqual => ">=",
            Operator::Contains => "contains",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    lexeme: Lexeme,
    position: usize,
}

/// Scan markup into lexemes; `base` is the markup's offset in the template
fn scan(markup: &str, base: usize) -> Result<Vec<Spanned>, TemplateError> {
    let chars: Vec<(usize, char)> = markup.char_indices().collect();
    let mut lexemes = Vec::new();
    let mut i = 0;

    let peek = |i: usize| chars.get(i).map(|(_, ch)| *ch);

    while let Some(&(offset, ch)) = chars.get(i) {
        let position = base + offset;
        let mut push = |lexeme: Lexeme, width: usize, i: &mut usize| {
            lexemes.push(Spanned { lexeme, position });
            *i += width;
        };

        match ch {
            c if c.is_whitespace() => i += 1,
            '.' if peek(i + 1) == Some('.') => push(Lexeme::Range, 2, &mut i),
            '.' => push(Lexeme::Dot, 1, &mut i),
            '[' => push(Lexeme::OpenBracket, 1, &mut i),
            ']' => push(Lexeme::CloseBracket, 1, &mut i),
            '|' => push(Lexeme::Pipe, 1, &mut i),
            ':' => push(Lexeme::Colon, 1, &mut i),
            ',' => push(Lexeme::Comma, 1, &mut i),
            '=' if peek(i + 1) == Some('=') => push(Lexeme::Operator(Operator::Equal), 2, &mut i),
            '=' => push(Lexeme::Assign, 1, &mut i),
            '!' if peek(i + 1) == Some('=') => push(Lexeme::Operator(Operator::NotEqual), 2, &mut i),
            '<' if peek(i + 1) == Some('=') => push(Lexeme::Operator(Operator::LessOrEqual), 2, &mut i),
            '<' if peek(i + 1) == Some('>') => push(Lexeme::Operator(Operator::NotEqual), 2, &mut i),
            '<' => push(Lexeme::Operator(Operator::Less), 1, &mut i),
            '>' if peek(i + 1) == Some('=') => push(Lexeme::Operator(Operator::GreaterOrEqual), 2, &mut i),
            '>' => push(Lexeme::Operator(Operator::Greater), 1, &mut i),
            '\'' | '"' => {
                let start = i + 1;
                let mut end = start;
                while peek(end).is_some_and(|c| c != ch) {
                    end += 1;
                }
                if peek(end).is_none() {
                    return Err(TemplateError::parse("Unterminated string literal", position));
                }
                let text: String = chars[start..end].iter().map(|(_, c)| *c).collect();
                push(Lexeme::Str(text), end + 1 - i, &mut i);
            }
            c if c.is_ascii_digit() || (c == '-' && peek(i + 1).is_some_and(|n| n.is_ascii_digit())) => {
                let mut end = i + 1;
                while peek(end).is_some_and(|n| n.is_ascii_digit()) {
                    end += 1;
                }
                let is_float = peek(end) == Some('.') && peek(end + 1).is_some_and(|n| n.is_ascii_digit());
                if is_float {
                    end += 1;
                    while peek(end).is_some_and(|n| n.is_ascii_digit()) {
                        end += 1;
                    }
                }
                let text: String = chars[i..end].iter().map(|(_, c)| *c).collect();
                let number = parse_number(&text, is_float)
                    .ok_or_else(|| TemplateError::parse(format!("Invalid number '{}'", text), position))?;
                push(Lexeme::Number(number), end - i, &mut i);
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = i + 1;
                while peek(end).is_some_and(|n| n.is_alphanumeric() || n == '_' || n == '-' || n == '?') {
                    end += 1;
                }
                let text: String = chars[i..end].iter().map(|(_, c)| *c).collect();
                let lexeme = if text == "contains" {
                    Lexeme::Operator(Operator::Contains)
                } else {
                    Lexeme::Identifier(text)
                };
                push(lexeme, end - i, &mut i);
            }
            other => {
                return Err(TemplateError::parse(format!("Unexpected character '{}'", other), position));
            }
        }
    }

    Ok(lexemes)
}

fn parse_number(text: &str, is_float: bool) -> Option<Value> {
    if is_float {
        text.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
    } else {
        text.parse::<i64>().ok().map(Value::from)
    }
}

/// Parser for the markup of a single output or tag
pub struct MarkupParser {
    lexemes: Vec<Spanned>,
    index: usize,
    /// Offset just past the markup, used for end-of-input errors
    end: usize,
}

impl MarkupParser {
    /// Scan `markup`, which starts at byte `base` of the template
    pub fn new(markup: &str, base: usize) -> Result<Self, TemplateError> {
        Ok(Self {
            lexemes: scan(markup, base)?,
            index: 0,
            end: base + markup.len(),
        })
    }

    /// `expression | filter ...`
    pub fn parse_output(mut self) -> Result<FilterChain, TemplateError> {
        let chain = self.filter_chain()?;
        self.finish()?;
        Ok(chain)
    }

    /// `a == b and c`
    pub fn parse_condition(mut self) -> Result<Condition, TemplateError> {
        let condition = self.condition()?;
        self.finish()?;
        Ok(condition)
    }

    /// `name = expression | filter ...`
    pub fn parse_assign(mut self) -> Result<(String, FilterChain), TemplateError> {
        let name = self.identifier()?;
        match self.next() {
            Some(Spanned { lexeme: Lexeme::Assign, .. }) => {}
            other => return Err(self.unexpected(other, "'='")),
        }
        let chain = self.filter_chain()?;
        self.finish()?;
        Ok((name, chain))
    }

    /// A single variable name, bare or quoted
    pub fn parse_variable_name(mut self) -> Result<String, TemplateError> {
        let name = match self.next() {
            Some(Spanned { lexeme: Lexeme::Identifier(name), .. }) => name,
            Some(Spanned { lexeme: Lexeme::Str(name), .. }) => name,
            other => return Err(self.unexpected(other, "a variable name")),
        };
        self.finish()?;
        Ok(name)
    }

    fn filter_chain(&mut self) -> Result<FilterChain, TemplateError> {
        let input = self.expression()?;
        let mut filters = Vec::new();

        while self.peek_is(&Lexeme::Pipe) {
            self.index += 1;
            let position = self.position();
            let name = self.identifier()?;
            let mut args = Vec::new();
            let mut keyword_args = Vec::new();

            if self.peek_is(&Lexeme::Colon) {
                self.index += 1;
                loop {
                    let keyword = match (self.lexemes.get(self.index), self.lexemes.get(self.index + 1)) {
                        (
                            Some(Spanned { lexeme: Lexeme::Identifier(key), .. }),
                            Some(Spanned { lexeme: Lexeme::Colon, .. }),
                        ) => Some(key.clone()),
                        _ => None,
                    };
                    match keyword {
                        Some(key) => {
                            self.index += 2;
                            keyword_args.push((key, self.expression()?));
                        }
                        None => args.push(self.expression()?),
                    }
                    if !self.peek_is(&Lexeme::Comma) {
                        break;
                    }
                    self.index += 1;
                }
            }

            filters.push(FilterCall {
                name,
                args,
                keyword_args,
                position,
            });
        }

        Ok(FilterChain { input, filters })
    }

    fn condition(&mut self) -> Result<Condition, TemplateError> {
        let left = self.expression()?;
        let comparison = match self.lexemes.get(self.index) {
            Some(Spanned { lexeme: Lexeme::Operator(op), .. }) => {
                let op = *op;
                self.index += 1;
                Some((op, self.expression()?))
            }
            _ => None,
        };
        let single = Condition::Compare { left, comparison };

        match self.lexemes.get(self.index) {
            Some(Spanned { lexeme: Lexeme::Identifier(word), .. }) if word == "and" => {
                self.index += 1;
                Ok(Condition::And(Box::new(single), Box::new(self.condition()?)))
            }
            Some(Spanned { lexeme: Lexeme::Identifier(word), .. }) if word == "or" => {
                self.index += 1;
                Ok(Condition::Or(Box::new(single), Box::new(self.condition()?)))
            }
            _ => Ok(single),
        }
    }

    fn expression(&mut self) -> Result<Expression, TemplateError> {
        let first = match self.next() {
            Some(Spanned { lexeme: Lexeme::Str(s), .. }) => return Ok(Expression::Literal(Value::String(s))),
            Some(Spanned { lexeme: Lexeme::Number(n), .. }) => return Ok(Expression::Literal(n)),
            Some(Spanned { lexeme: Lexeme::Identifier(name), .. }) => {
                let followed = self.peek_is(&Lexeme::Dot) || self.peek_is(&Lexeme::OpenBracket);
                if !followed {
                    match name.as_str() {
                        "true" => return Ok(Expression::Literal(Value::Bool(true))),
                        "false" => return Ok(Expression::Literal(Value::Bool(false))),
                        "nil" | "null" => return Ok(Expression::Literal(Value::Null)),
                        "empty" => return Ok(Expression::Empty),
                        "blank" => return Ok(Expression::Blank),
                        _ => {}
                    }
                }
                Accessor::Key(name)
            }
            Some(Spanned { lexeme: Lexeme::OpenBracket, .. }) => {
                let inner = self.expression()?;
                self.expect(Lexeme::CloseBracket)?;
                Accessor::Dynamic(inner)
            }
            Some(Spanned { lexeme: Lexeme::Range, position }) => {
                return Err(TemplateError::parse("Ranges are not supported", position));
            }
            other => return Err(self.unexpected(other, "an expression")),
        };

        let mut accessors = vec![first];
        loop {
            if self.peek_is(&Lexeme::Dot) {
                self.index += 1;
                accessors.push(Accessor::Key(self.identifier()?));
            } else if self.peek_is(&Lexeme::OpenBracket) {
                self.index += 1;
                let inner = self.expression()?;
                self.expect(Lexeme::CloseBracket)?;
                accessors.push(Accessor::Dynamic(inner));
            } else {
                break;
            }
        }

        Ok(Expression::Variable(VariablePath { accessors }))
    }

    fn identifier(&mut self) -> Result<String, TemplateError> {
        match self.next() {
            Some(Spanned { lexeme: Lexeme::Identifier(name), .. }) => Ok(name),
            other => Err(self.unexpected(other, "a name")),
        }
    }

    fn expect(&mut self, expected: Lexeme) -> Result<(), TemplateError> {
        match self.next() {
            Some(spanned) if spanned.lexeme == expected => Ok(()),
            other => {
                let description = expected.to_string();
                Err(self.unexpected(other, &description))
            }
        }
    }

    fn finish(&mut self) -> Result<(), TemplateError> {
        match self.next() {
            None => Ok(()),
            other => Err(self.unexpected(other, "end of markup")),
        }
    }

    fn unexpected(&self, found: Option<Spanned>, expected: &str) -> TemplateError {
        match found {
            Some(spanned) => TemplateError::parse(
                format!("Expected {} but found {}", expected, spanned.lexeme),
                spanned.position,
            ),
            None => TemplateError::parse(format!("Expected {} but reached end of markup", expected), self.end),
        }
    }

    fn next(&mut self) -> Option<Spanned> {
        let spanned = self.lexemes.get(self.index).cloned();
        if spanned.is_some() {
            self.index += 1;
        }
        spanned
    }

    fn peek_is(&self, lexeme: &Lexeme) -> bool {
        self.lexemes.get(self.index).is_some_and(|s| &s.lexeme == lexeme)
    }

    fn position(&self) -> usize {
        self.lexemes.get(self.index).map_or(self.end, |s| s.position)
    }
}
