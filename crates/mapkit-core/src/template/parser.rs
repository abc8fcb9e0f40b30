//! Template parser
//!
//! Turns the token stream into a [`Node`] tree. Every tag name is resolved
//! through the [`Vocabulary`] first, so a disabled tag fails here with a
//! `Disabled` error before anything is rendered. Filter names are checked the
//! same way.
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

use super::ast::{Branch, Node};
use super::error::TemplateError;
use super::expression::{FilterChain, MarkupParser};
use super::lexer::{tokenize, Token};
use super::vocabulary::{TagKind, Vocabulary};

/// Tags that only make sense as part of an enclosing block
const BLOCK_DELIMITERS: &[&str] = &["elsif", "else", "endif", "endunless", "endcapture", "endcomment", "endraw"];

/// Template parser
pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    index: usize,
    vocabulary: &'a Vocabulary,
}

/// A tag token with its markup
struct TagMarkup<'a> {
    name: &'a str,
    markup: &'a str,
    position: usize,
    offset: usize,
}

impl<'a> Parser<'a> {
    /// Tokenize `source` and prepare to parse it
    pub fn new(source: &'a str, vocabulary: &'a Vocabulary) -> Result<Self, TemplateError> {
        Ok(Self {
            tokens: tokenize(source)?,
            index: 0,
            vocabulary,
        })
    }

    /// Parse the whole template
    pub fn parse(mut self) -> Result<Vec<Node>, TemplateError> {
        let (nodes, terminator) = self.parse_block(&[])?;
        match terminator {
            None => Ok(nodes),
            Some(tag) => Err(unexpected_tag(&tag)),
        }
    }

    /// Parse nodes until end of input or one of `terminators`
    fn parse_block(&mut self, terminators: &[&str]) -> Result<(Vec<Node>, Option<TagMarkup<'a>>), TemplateError> {
        let mut nodes = Vec::new();

        while let Some(token) = self.next() {
            match token {
                Token::Text { text, .. } => nodes.push(Node::Text(text.to_string())),
                Token::Output { markup, position, offset } => {
                    let chain = self.parse_chain(markup, offset)?;
                    nodes.push(Node::Output { chain, position });
                }
                Token::Tag {
                    name,
                    markup,
                    position,
                    offset,
                } => {
                    let tag = TagMarkup {
                        name,
                        markup,
                        position,
                        offset,
                    };
                    if terminators.contains(&name) {
                        return Ok((nodes, Some(tag)));
                    }
                    if BLOCK_DELIMITERS.contains(&name) {
                        return Err(unexpected_tag(&tag));
                    }
                    if let Some(node) = self.parse_tag(&tag)? {
                        nodes.push(node);
                    }
                }
            }
        }

        Ok((nodes, None))
    }

    fn parse_tag(&mut self, tag: &TagMarkup<'a>) -> Result<Option<Node>, TemplateError> {
        let position = tag.position;
        match self.vocabulary.lookup_tag(tag.name, position)? {
            TagKind::If => self.parse_conditional(tag, false, "endif").map(Some),
            TagKind::Unless => self.parse_conditional(tag, true, "endunless").map(Some),
            TagKind::Assign => {
                let (name, chain) = MarkupParser::new(tag.markup, tag.offset)?.parse_assign()?;
                self.check_filters(&chain)?;
                Ok(Some(Node::Assign { name, chain }))
            }
            TagKind::Capture => {
                let variable = MarkupParser::new(tag.markup, tag.offset)?.parse_variable_name()?;
                let body = self.parse_closed_block(tag.name, position, "endcapture")?;
                Ok(Some(Node::Capture { name: variable, body }))
            }
            TagKind::Comment => {
                self.skip_comment(position)?;
                Ok(None)
            }
            TagKind::InlineComment => Ok(None),
            TagKind::Raw => {
                let mut text = String::new();
                while let Some(token) = self.next() {
                    match token {
                        Token::Text { text: body, .. } => text.push_str(body),
                        Token::Tag { name: "endraw", .. } => return Ok(Some(Node::Text(text))),
                        _ => break,
                    }
                }
                Err(TemplateError::parse("Unterminated raw block", position))
            }
            TagKind::Echo => {
                let chain = self.parse_chain(tag.markup, tag.offset)?;
                Ok(Some(Node::Output { chain, position }))
            }
        }
    }

    fn parse_conditional(&mut self, tag: &TagMarkup<'a>, negate: bool, end: &str) -> Result<Node, TemplateError> {
        let opener = tag.name;
        let position = tag.position;
        let terminators = ["elsif", "else", end];
        let mut branches = Vec::new();
        let mut condition = MarkupParser::new(tag.markup, tag.offset)?.parse_condition()?;
        let mut branch_negate = negate;

        loop {
            let (body, terminator) = self.parse_block(&terminators)?;
            branches.push(Branch {
                condition,
                negate: branch_negate,
                body,
            });

            let Some(next) = terminator else {
                return Err(unclosed(opener, end, position));
            };
            match next.name {
                "elsif" => {
                    condition = MarkupParser::new(next.markup, next.offset)?.parse_condition()?;
                    branch_negate = false;
                }
                "else" => {
                    let otherwise = self.parse_closed_block(opener, position, end)?;
                    return Ok(Node::Conditional {
                        branches,
                        otherwise: Some(otherwise),
                    });
                }
                _ => {
                    return Ok(Node::Conditional {
                        branches,
                        otherwise: None,
                    })
                }
            }
        }
    }

    /// Parse a body that must end with `end`
    fn parse_closed_block(&mut self, opener: &str, position: usize, end: &str) -> Result<Vec<Node>, TemplateError> {
        match self.parse_block(&[end])? {
            (body, Some(_)) => Ok(body),
            (_, None) => Err(unclosed(opener, end, position)),
        }
    }

    /// Skip to the matching `endcomment`, allowing nested comments
    fn skip_comment(&mut self, position: usize) -> Result<(), TemplateError> {
        let mut depth = 1;
        while let Some(token) = self.next() {
            match token {
                Token::Tag { name: "comment", .. } => depth += 1,
                Token::Tag { name: "endcomment", .. } => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
        Err(unclosed("comment", "endcomment", position))
    }

    fn parse_chain(&self, markup: &str, position: usize) -> Result<FilterChain, TemplateError> {
        let chain = MarkupParser::new(markup, position)?.parse_output()?;
        self.check_filters(&chain)?;
        Ok(chain)
    }

    /// Reject disabled filters at parse time
    fn check_filters(&self, chain: &FilterChain) -> Result<(), TemplateError> {
        for filter in &chain.filters {
            self.vocabulary.lookup_filter(&filter.name).map_err(|err| match err {
                TemplateError::Render { message } => TemplateError::parse(message, filter.position),
                other => other,
            })?;
        }
        Ok(())
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }
}

fn unexpected_tag(tag: &TagMarkup<'_>) -> TemplateError {
    TemplateError::parse(format!("Unexpected '{{% {} %}}'", tag.name), tag.position)
}

fn unclosed(opener: &str, end: &str, position: usize) -> TemplateError {
    TemplateError::parse(
        format!("'{{% {} %}}' was never closed, expected '{{% {} %}}'", opener, end),
        position,
    )
}

/// Parse `source` with `vocabulary`
pub fn parse(source: &str, vocabulary: &Vocabulary) -> Result<Vec<Node>, TemplateError> {
    Parser::new(source, vocabulary)?.parse()
}
