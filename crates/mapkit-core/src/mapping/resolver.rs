//! Mapping resolver
//!
//! Evaluates a compiled [`Node`] tree against a context document. Missing
//! data is modelled as `None` all the way through: a lookup that finds
//! nothing yields `None`, objects drop keys that resolved to `None`, and
//! arrays keep their positions with `null` in place of absent elements.
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

use super::ast::{Conditional, InterpolationSource, Node, PathSource};
use super::compiler::DEFAULT_MAX_DEPTH;
use super::error::MappingError;
use crate::mustache::Interpolation;
use crate::path::Path;
use crate::template::{Template, TemplateError, TemplateSandbox};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{trace, warn};

/// Value substituted for a template that failed softly
pub const FAIL_SOFT_VALUE: &str = "error";

/// Options controlling mapping compilation and resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    /// HTML-escape `{{field}}` interpolations in `@template`
    pub escape_templates: bool,
    /// Render generic template failures as `"error"` instead of failing.
    /// Sandbox violations always fail.
    pub fail_soft_render: bool,
    /// Deepest mapping nesting accepted by the compiler
    pub max_depth: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            escape_templates: true,
            fail_soft_render: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Resolves compiled mappings against context documents
#[derive(Debug, Clone)]
pub struct Resolver<'s> {
    sandbox: &'s TemplateSandbox,
    options: ResolveOptions,
}

impl Default for Resolver<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver<'static> {
    /// Resolve with the process-wide sandbox and default options
    pub fn new() -> Self {
        Self {
            sandbox: TemplateSandbox::global(),
            options: ResolveOptions::default(),
        }
    }
}

impl<'s> Resolver<'s> {
    /// Render `@liquid` with a specific sandbox
    pub fn with_sandbox<'t>(self, sandbox: &'t TemplateSandbox) -> Resolver<'t> {
        Resolver {
            sandbox,
            options: self.options,
        }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    pub fn sandbox(&self) -> &TemplateSandbox {
        self.sandbox
    }

    /// Resolve `node` against `context`; `None` means the value is absent
    pub fn resolve(&self, node: &Node, context: &Value) -> Result<Option<Value>, MappingError> {
        match node {
            Node::Value(value) => Ok(Some(value.clone())),
            Node::Object(entries) => {
                let mut object = Map::new();
                for (key, child) in entries {
                    if let Some(value) = self.resolve(child, context)? {
                        object.insert(key.clone(), value);
                    }
                }
                Ok(Some(Value::Object(object)))
            }
            Node::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| Ok(self.resolve(item, context)?.unwrap_or(Value::Null)))
                    .collect::<Result<Vec<_>, MappingError>>()?;
                Ok(Some(Value::Array(values)))
            }
            Node::Path(source) => {
                let found = self.select(source, context)?;
                trace!(directive = "@path", found = found.is_some(), "resolved directive");
                Ok(found.cloned())
            }
            Node::If(conditional) => self.conditional(conditional, context),
            Node::ArrayPath { source, template } => self.array_path(source, template.as_deref(), context),
            Node::Liquid { template, location } => self.liquid(template, location, context),
            Node::Template { source, location } => self.interpolation(source, location, context),
            Node::Literal(inner) => self.resolve(inner, context),
        }
    }

    /// Look a path up in `context`, computing it first when it is dynamic
    fn select<'v>(&self, source: &PathSource, context: &'v Value) -> Result<Option<&'v Value>, MappingError> {
        match source {
            PathSource::Static(path) => Ok(path.lookup(context)),
            PathSource::Dynamic { node, location } => match self.resolve(node, context)? {
                Some(Value::String(text)) => {
                    let path = Path::parse(&text).map_err(|source| MappingError::InvalidPath {
                        location: location.clone(),
                        source,
                    })?;
                    Ok(path.lookup(context))
                }
                _ => Ok(None),
            },
        }
    }

    fn conditional(&self, conditional: &Conditional, context: &Value) -> Result<Option<Value>, MappingError> {
        let subject = self.resolve(&conditional.subject, context)?;
        let passed = conditional.test.passes(subject.as_ref());
        trace!(directive = "@if", test = conditional.test.field(), passed, "resolved directive");

        let branch = if passed {
            conditional.then.as_ref()
        } else {
            conditional.otherwise.as_ref()
        };
        match branch {
            Some(node) => self.resolve(node, context),
            None => Ok(None),
        }
    }

    fn array_path(
        &self,
        source: &PathSource,
        template: Option<&Node>,
        context: &Value,
    ) -> Result<Option<Value>, MappingError> {
        let Some(candidate) = self.select(source, context)? else {
            trace!(directive = "@arrayPath", found = false, "resolved directive");
            return Ok(None);
        };

        let elements = match candidate {
            Value::Array(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };
        trace!(directive = "@arrayPath", elements = elements.len(), "resolved directive");

        let mut output = Vec::with_capacity(elements.len());
        for element in elements {
            let value = match template {
                Some(template) => self.resolve(template, element)?.unwrap_or(Value::Null),
                None => element.clone(),
            };
            output.push(value);
        }
        Ok(Some(Value::Array(output)))
    }

    fn liquid(&self, template: &Template, location: &str, context: &Value) -> Result<Option<Value>, MappingError> {
        let rendered = self
            .sandbox
            .check_length(template.source())
            .and_then(|()| self.sandbox.render(template, context));
        trace!(directive = "@liquid", location, ok = rendered.is_ok(), "resolved directive");
        self.rendered(rendered, location)
    }

    fn interpolation(
        &self,
        source: &InterpolationSource,
        location: &str,
        context: &Value,
    ) -> Result<Option<Value>, MappingError> {
        let escape = self.options.escape_templates;
        let rendered = match source {
            InterpolationSource::Static(interpolation) => interpolation.render(context, escape),
            InterpolationSource::Dynamic(node) => match self.resolve(node, context)? {
                Some(Value::String(text)) => {
                    Interpolation::compile(&text).and_then(|template| template.render(context, escape))
                }
                _ => return Ok(None),
            },
        };
        trace!(directive = "@template", location, ok = rendered.is_ok(), "resolved directive");
        self.rendered(rendered, location)
    }

    fn rendered(&self, rendered: Result<String, TemplateError>, location: &str) -> Result<Option<Value>, MappingError> {
        match rendered {
            Ok(output) => Ok(Some(Value::String(output))),
            Err(error) if self.options.fail_soft_render && !error.is_sandbox_violation() => {
                warn!(location, reason = %error.reason(), error = %error, "template failed, using fallback value");
                Ok(Some(Value::String(FAIL_SOFT_VALUE.to_string())))
            }
            Err(source) => Err(MappingError::Template {
                location: location.to_string(),
                source,
            }),
        }
    }
}
