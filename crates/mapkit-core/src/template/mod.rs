//! Sandboxed Liquid templates
//!
//! A [`TemplateSandbox`] pairs a [`Vocabulary`] allow-list with fixed
//! [`SandboxLimits`]. Templates are parsed into a small node tree and
//! rendered by an interpreter that checks a wall-clock deadline before every
//! node and filter call and charges every produced string against a byte
//! budget. Tags and filters outside the allow-list never run: disabled names
//! fail at parse time with [`TemplateError::Disabled`] and the renderer looks
//! every filter up again before calling it.
//!
//! ```
//! use mapkit_core::template::TemplateSandbox;
//! use serde_json::json;
//!
//! let sandbox = TemplateSandbox::global();
//! let out = sandbox
//!     .evaluate_str("{{ user.name | upcase }}", &json!({"user": {"name": "ada"}}))
//!     .unwrap();
//! assert_eq!(out, "ADA");
//! ```
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

pub mod ast;
pub mod config;
pub mod error;
pub mod expression;
pub mod filters;
pub mod lexer;
pub mod parser;
pub mod render;
pub mod value;
pub mod vocabulary;

pub use config::SandboxLimits;
pub use error::{FailureReason, FeatureKind, TemplateError};
pub use vocabulary::{FilterArgs, FilterError, FilterFn, TagKind, Vocabulary, DISABLED_FILTERS, DISABLED_TAGS};

use ast::Node;
use render::Renderer;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::trace;

static GLOBAL_SANDBOX: OnceLock<TemplateSandbox> = OnceLock::new();

/// A parsed template, ready to render any number of times
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    /// The source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed nodes
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Check if the template renders nothing
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Where an evaluation is, or where it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EvaluationState {
    Idle,
    Parsing,
    Rendering,
    Done,
    Failed(FailureReason),
}

/// Outcome of [`TemplateSandbox::run`]
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub state: EvaluationState,
    pub output: Option<String>,
    pub error: Option<TemplateError>,
    pub elapsed: Duration,
}

impl Evaluation {
    fn done(output: String, started: Instant) -> Self {
        Self {
            state: EvaluationState::Done,
            output: Some(output),
            error: None,
            elapsed: started.elapsed(),
        }
    }

    fn failed(error: TemplateError, started: Instant) -> Self {
        Self {
            state: EvaluationState::Failed(error.reason()),
            output: None,
            error: Some(error),
            elapsed: started.elapsed(),
        }
    }

    /// The failure reason, if the evaluation failed
    pub fn failure(&self) -> Option<FailureReason> {
        match self.state {
            EvaluationState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Collapse into a plain result
    pub fn into_result(self) -> Result<String, TemplateError> {
        match (self.output, self.error) {
            (_, Some(error)) => Err(error),
            (Some(output), None) => Ok(output),
            (None, None) => Err(TemplateError::render("evaluation did not complete")),
        }
    }
}

/// A configured template engine: vocabulary plus resource ceilings
#[derive(Debug, Clone)]
pub struct TemplateSandbox {
    vocabulary: Vocabulary,
    limits: SandboxLimits,
}

impl Default for TemplateSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateSandbox {
    /// Standard vocabulary with default limits
    pub fn new() -> Self {
        Self::with_limits(SandboxLimits::default())
    }

    /// Standard vocabulary with custom limits
    pub fn with_limits(limits: SandboxLimits) -> Self {
        Self {
            vocabulary: Vocabulary::standard(),
            limits,
        }
    }

    /// Replace the vocabulary
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// The process-wide sandbox, created on first use with default limits
    pub fn global() -> &'static TemplateSandbox {
        GLOBAL_SANDBOX.get_or_init(TemplateSandbox::new)
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Reject sources longer than the length ceiling
    pub fn check_length(&self, source: &str) -> Result<(), TemplateError> {
        let length = source.chars().count();
        if length > self.limits.max_template_length {
            return Err(TemplateError::TooLong {
                length,
                limit: self.limits.max_template_length,
            });
        }
        Ok(())
    }

    /// Parse a template, enforcing the length ceiling and the allow-list
    pub fn compile(&self, source: &str) -> Result<Template, TemplateError> {
        self.check_length(source)?;
        let nodes = parser::parse(source, &self.vocabulary)?;
        Ok(Template {
            source: source.to_string(),
            nodes,
        })
    }

    /// Render a compiled template against `context`
    pub fn render(&self, template: &Template, context: &Value) -> Result<String, TemplateError> {
        Renderer::new(&self.vocabulary, &self.limits, context).render(&template.nodes)
    }

    /// Evaluate a template value against `context`
    ///
    /// The value must be a string; an empty string renders as `""`.
    pub fn evaluate(&self, template: &Value, context: &Value) -> Result<String, TemplateError> {
        self.run(template, context).into_result()
    }

    /// Evaluate template source against `context`
    pub fn evaluate_str(&self, source: &str, context: &Value) -> Result<String, TemplateError> {
        self.run_source(source, context, Instant::now())
    }

    /// Evaluate and report the final state of the evaluation
    pub fn run(&self, template: &Value, context: &Value) -> Evaluation {
        let started = Instant::now();
        trace!(state = ?EvaluationState::Idle, "template evaluation");

        let source = match template {
            Value::String(source) => source,
            other => {
                let error = TemplateError::TypeMismatch {
                    found: value::describe_type(other).to_string(),
                };
                return Evaluation::failed(error, started);
            }
        };

        match self.run_source(source, context, started) {
            Ok(output) => Evaluation::done(output, started),
            Err(error) => {
                trace!(state = ?EvaluationState::Failed(error.reason()), "template evaluation");
                Evaluation::failed(error, started)
            }
        }
    }

    fn run_source(&self, source: &str, context: &Value, started: Instant) -> Result<String, TemplateError> {
        if source.is_empty() {
            return Ok(String::new());
        }

        trace!(state = ?EvaluationState::Parsing, length = source.len(), "template evaluation");
        let template = self.compile(source)?;

        trace!(state = ?EvaluationState::Rendering, "template evaluation");
        let output = self.render(&template, context)?;

        trace!(
            state = ?EvaluationState::Done,
            elapsed_us = started.elapsed().as_micros() as u64,
            "template evaluation"
        );
        Ok(output)
    }
}
