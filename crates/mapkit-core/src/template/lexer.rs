//! Template tokenizer
//!
//! Splits template source into literal text, `{{ output }}` markup and
//! `{% tag %}` markup, applying `-` whitespace control as it goes. The body
//! of a `{% raw %}` block is passed through untouched.
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

use super::error::TemplateError;

/// A lexical unit of a template
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// Literal text copied to the output
    Text { text: &'a str, position: usize },
    /// `{{ markup }}`
    Output {
        markup: &'a str,
        position: usize,
        /// Byte offset of `markup` in the source
        offset: usize,
    },
    /// `{% name markup %}`
    Tag {
        name: &'a str,
        markup: &'a str,
        position: usize,
        offset: usize,
    },
}

impl Token<'_> {
    /// Byte offset of the token in the source
    pub fn position(&self) -> usize {
        match self {
            Token::Text { position, .. }
            | Token::Output { position, .. }
            | Token::Tag { position, .. } => *position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Delimiter {
    Output,
    Tag,
}

impl Delimiter {
    fn close(self) -> &'static str {
        match self {
            Delimiter::Output => "}}",
            Delimiter::Tag => "%}",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Delimiter::Output => "output",
            Delimiter::Tag => "tag",
        }
    }
}

/// One `{{ }}` or `{% %}` occurrence located in the source
struct Markup<'a> {
    inner: &'a str,
    /// Byte offset of `inner` in the source
    offset: usize,
    trim_left: bool,
    trim_right: bool,
    /// Byte offset just past the closing delimiter
    end: usize,
}

/// Tokenize template source
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, TemplateError> {
    let mut tokens = Vec::new();
    let mut position = 0;
    let mut trim_next = false;

    while position < source.len() {
        let Some((start, delimiter)) = find_open(source, position) else {
            push_text(&mut tokens, &source[position..], position, trim_next, false);
            break;
        };

        let markup = read_markup(source, start, delimiter)?;
        push_text(&mut tokens, &source[position..start], position, trim_next, markup.trim_left);
        trim_next = markup.trim_right;
        position = markup.end;

        match delimiter {
            Delimiter::Output => {
                let trimmed = markup.inner.trim_start();
                tokens.push(Token::Output {
                    markup: trimmed.trim_end(),
                    position: start,
                    offset: markup.offset + markup.inner.len() - trimmed.len(),
                })
            }
            Delimiter::Tag => {
                let (name, rest, rest_offset) = split_tag(markup.inner);
                tokens.push(Token::Tag {
                    name,
                    markup: rest,
                    position: start,
                    offset: markup.offset + rest_offset,
                });

                if name == "raw" {
                    let (body_end, close) = find_endraw(source, position)?;
                    if body_end > position {
                        tokens.push(Token::Text {
                            text: &source[position..body_end],
                            position,
                        });
                    }
                    tokens.push(Token::Tag {
                        name: "endraw",
                        markup: "",
                        position: body_end,
                        offset: close.offset,
                    });
                    trim_next = close.trim_right;
                    position = close.end;
                }
            }
        }
    }

    Ok(tokens)
}

fn push_text<'a>(
    tokens: &mut Vec<Token<'a>>,
    text: &'a str,
    position: usize,
    trim_start: bool,
    trim_end: bool,
) {
    let mut text = text;
    let mut position = position;
    if trim_start {
        let trimmed = text.trim_start();
        position += text.len() - trimmed.len();
        text = trimmed;
    }
    if trim_end {
        text = text.trim_end();
    }
    if !text.is_empty() {
        tokens.push(Token::Text { text, position });
    }
}

/// Find the next `{{` or `{%` at or after `from`
fn find_open(source: &str, from: usize) -> Option<(usize, Delimiter)> {
    let bytes = source.as_bytes();
    let mut search = from;
    while let Some(offset) = source[search..].find('{') {
        let index = search + offset;
        match bytes.get(index + 1) {
            Some(b'{') => return Some((index, Delimiter::Output)),
            Some(b'%') => return Some((index, Delimiter::Tag)),
            _ => search = index + 1,
        }
    }
    None
}

fn read_markup(source: &str, start: usize, delimiter: Delimiter) -> Result<Markup<'_>, TemplateError> {
    let inner_start = start + 2;
    let close = source[inner_start..].find(delimiter.close()).ok_or_else(|| {
        TemplateError::parse(format!("Unterminated {}, expected '{}'", delimiter.describe(), delimiter.close()), start)
    })?;
    let close = inner_start + close;

    let mut inner = &source[inner_start..close];
    let mut offset = inner_start;
    let trim_left = inner.starts_with('-');
    if trim_left {
        inner = &inner[1..];
        offset += 1;
    }
    let trim_right = inner.ends_with('-');
    if trim_right {
        inner = &inner[..inner.len() - 1];
    }

    Ok(Markup {
        inner,
        offset,
        trim_left,
        trim_right,
        end: close + 2,
    })
}

/// Split tag markup into its name, the remaining arguments and their offset in `inner`
fn split_tag(inner: &str) -> (&str, &str, usize) {
    let trimmed = inner.trim();
    let lead = inner.len() - inner.trim_start().len();
    let (name, rest_start) = if trimmed.starts_with('#') {
        ("#", 1)
    } else {
        match trimmed.find(char::is_whitespace) {
            Some(index) => (&trimmed[..index], index),
            None => (trimmed, trimmed.len()),
        }
    };
    let rest = &trimmed[rest_start..];
    let rest_lead = rest.len() - rest.trim_start().len();
    (name, rest.trim(), lead + rest_start + rest_lead)
}

/// Locate the `{% endraw %}` closing a raw block; returns the body end and the closing markup
fn find_endraw(source: &str, from: usize) -> Result<(usize, Markup<'_>), TemplateError> {
    let mut search = from;
    while let Some((start, delimiter)) = find_open(source, search) {
        if delimiter == Delimiter::Tag {
            let markup = read_markup(source, start, delimiter)?;
            if markup.inner.trim() == "endraw" {
                return Ok((start, markup));
            }
        }
        search = start + 2;
    }
    Err(TemplateError::parse("Unterminated raw block, expected '{% endraw %}'", from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        let tokens = tokenize("hello").unwrap();
        assert_eq!(tokens, vec![Token::Text { text: "hello", position: 0 }]);
    }

    #[test]
    fn test_output_and_tag() {
        let tokens = tokenize("a{{ x }}b{% if y %}c{% endif %}").unwrap();
        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[1], Token::Output { markup: "x", position: 1, offset: 4 });
        assert_eq!(
            tokens[3],
            Token::Tag { name: "if", markup: "y", position: 9, offset: 15 }
        );
        assert!(matches!(tokens[5], Token::Tag { name: "endif", markup: "", position: 20, .. }));
    }

    #[test]
    fn test_lone_braces_are_text() {
        let tokens = tokenize("{ a } {b}").unwrap();
        assert_eq!(tokens, vec![Token::Text { text: "{ a } {b}", position: 0 }]);
    }

    #[test]
    fn test_whitespace_control() {
        let tokens = tokenize("a  {{- x -}}  b").unwrap();
        assert_eq!(tokens[0], Token::Text { text: "a", position: 0 });
        assert_eq!(tokens[1], Token::Output { markup: "x", position: 3, offset: 7 });
        assert_eq!(tokens[2], Token::Text { text: "b", position: 14 });
    }

    #[test]
    fn test_raw_block_is_verbatim() {
        let tokens = tokenize("{% raw %}{{ not parsed }}{% endraw %}!").unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[1], Token::Text { text: "{{ not parsed }}", position: 9 });
        assert!(matches!(tokens[2], Token::Tag { name: "endraw", .. }));
        assert!(matches!(tokens[3], Token::Text { text: "!", .. }));
    }

    #[test]
    fn test_inline_comment_name() {
        let tokens = tokenize("{% # note %}").unwrap();
        assert_eq!(tokens, vec![Token::Tag { name: "#", markup: "note", position: 0, offset: 5 }]);
    }

    #[test]
    fn test_unterminated_output() {
        let err = tokenize("abc {{ x").unwrap_err();
        assert!(matches!(err, TemplateError::Parse { position: 4, .. }));
    }

    #[test]
    fn test_unterminated_raw() {
        assert!(tokenize("{% raw %}abc").is_err());
    }
}
