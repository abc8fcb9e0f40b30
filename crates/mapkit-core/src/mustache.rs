//! Logic-less `{{field}}` interpolation for the `@template` directive
//!
//! Backed by handlebars in non-strict mode, so a missing field renders as an
//! empty string. `{{a.b}}` is HTML-escaped with the mustache escape set
//! (which also escapes `/`, `` ` `` and `=`); `{{{a.b}}}` is inserted raw.
//! Escaping can be switched off entirely per render. Helpers, blocks,
//! partials and decorators are rejected at compile time, so a template can
//! never loop or branch.
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

use crate::template::{FeatureKind, TemplateError};
use handlebars::template::{HelperTemplate, Template, TemplateElement};
use handlebars::{Context, Handlebars, RenderContext, Renderable, StringOutput};
use serde_json::Value;
use std::sync::OnceLock;

static ESCAPING: OnceLock<Handlebars<'static>> = OnceLock::new();
static VERBATIM: OnceLock<Handlebars<'static>> = OnceLock::new();

/// Helpers handlebars registers out of the box
const BUILTIN_HELPERS: &[&str] = &[
    "if", "unless", "each", "with", "lookup", "raw", "log", "eq", "ne", "gt", "gte", "lt", "lte", "and", "or", "not",
    "len",
];

/// Escape the characters mustache escapes
pub fn mustache_escape(data: &str) -> String {
    let mut out = String::with_capacity(data.len());
    for ch in data.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '/' => out.push_str("&#x2F;"),
            '`' => out.push_str("&#x60;"),
            '=' => out.push_str("&#x3D;"),
            other => out.push(other),
        }
    }
    out
}

fn registry(escape: bool) -> &'static Handlebars<'static> {
    let cell = if escape { &ESCAPING } else { &VERBATIM };
    cell.get_or_init(|| {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.set_dev_mode(false);
        // `{{if}}` is a field lookup here, never a helper call
        for name in BUILTIN_HELPERS {
            handlebars.unregister_helper(name);
        }
        if escape {
            handlebars.register_escape_fn(mustache_escape);
        } else {
            handlebars.register_escape_fn(handlebars::no_escape);
        }
        handlebars
    })
}

/// Name of a helper or field reference, for error messages
fn helper_name(helper: &HelperTemplate) -> String {
    helper.name.as_name().unwrap_or("expression").to_string()
}

/// Accept only text, comments and bare `{{field}}` / `{{{field}}}` references
fn check_logic_less(template: &Template) -> Result<(), TemplateError> {
    for element in &template.elements {
        match element {
            TemplateElement::RawString(_) | TemplateElement::Comment(_) => {}
            TemplateElement::Expression(helper) | TemplateElement::HtmlExpression(helper) => {
                let bare = !helper.block
                    && helper.params.is_empty()
                    && helper.hash.is_empty()
                    && helper.block_param.is_none()
                    && helper.template.is_none()
                    && helper.inverse.is_none()
                    && helper.name.as_name().is_some();
                if !bare {
                    return Err(TemplateError::disabled(FeatureKind::Tag, helper_name(helper)));
                }
            }
            TemplateElement::HelperBlock(helper) => {
                return Err(TemplateError::disabled(FeatureKind::Tag, helper_name(helper)));
            }
            TemplateElement::PartialExpression(_) | TemplateElement::PartialBlock(_) => {
                return Err(TemplateError::disabled(FeatureKind::Tag, "partial"));
            }
            _ => return Err(TemplateError::disabled(FeatureKind::Tag, "decorator")),
        }
    }
    Ok(())
}

/// A validated interpolation template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolation {
    source: String,
    template: Template,
}

impl Interpolation {
    /// Parse `source` and reject anything beyond field interpolation
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let template = Template::compile(source).map_err(|e| TemplateError::parse(e.to_string(), 0))?;
        check_logic_less(&template)?;
        Ok(Self {
            source: source.to_string(),
            template,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render against `context`
    pub fn render(&self, context: &Value, escape: bool) -> Result<String, TemplateError> {
        let context = Context::from(context.clone());
        let mut render_context = RenderContext::new(None);
        let mut out = StringOutput::new();
        self.template
            .render(registry(escape), &context, &mut render_context, &mut out)
            .map_err(|e| TemplateError::render(e.to_string()))?;
        out.into_string().map_err(|e| TemplateError::render(e.to_string()))
    }
}

/// Compile and render interpolation source against `context`
pub fn render(source: &str, context: &Value, escape: bool) -> Result<String, TemplateError> {
    Interpolation::compile(source)?.render(context, escape)
}
