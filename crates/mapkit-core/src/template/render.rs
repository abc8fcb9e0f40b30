//! Template renderer
//!
//! Walks the node tree against a context value. The wall-clock deadline is
//! checked before every node, around every filter call and once more when the
//! render finishes. Every string the render produces is charged against the
//! byte budget, and values copied out of the context must fit in it. Filters
//! are looked up in the vocabulary again at call time, so a filter removed
//! from the allow-list after parsing still cannot run.
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

use super::ast::Node;
use super::config::SandboxLimits;
use super::error::TemplateError;
use super::expression::{Accessor, Condition, Expression, FilterChain, Operator, VariablePath};
use super::value::{compare, estimate_size, is_blank, is_empty, is_truthy, to_liquid_string};
use super::vocabulary::{FilterArgs, FilterError, Vocabulary};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::time::{Duration, Instant};

/// Time and memory accounting for one render
#[derive(Debug)]
pub struct Budget {
    started: Instant,
    timeout: Duration,
    memory_limit: usize,
    used: usize,
}

impl Budget {
    pub fn new(limits: &SandboxLimits) -> Self {
        Self {
            started: Instant::now(),
            timeout: limits.render_timeout,
            memory_limit: limits.memory_limit,
            used: 0,
        }
    }

    /// Fail once the deadline has passed
    pub fn check_time(&self) -> Result<(), TemplateError> {
        let elapsed = self.started.elapsed();
        if elapsed > self.timeout {
            return Err(TemplateError::Timeout {
                limit_ms: self.timeout.as_millis() as u64,
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }
        Ok(())
    }

    /// Account for `bytes` newly produced bytes
    pub fn charge(&mut self, bytes: usize) -> Result<(), TemplateError> {
        self.ensure(bytes)?;
        self.used += bytes;
        Ok(())
    }

    /// Fail if `bytes` more would not fit, without recording them
    pub fn ensure(&self, bytes: usize) -> Result<(), TemplateError> {
        let requested = self.used.saturating_add(bytes);
        if requested > self.memory_limit {
            return Err(TemplateError::MemoryExceeded {
                limit: self.memory_limit,
                requested,
            });
        }
        Ok(())
    }

    /// Bytes still available
    pub fn remaining(&self) -> usize {
        self.memory_limit.saturating_sub(self.used)
    }

    /// Bytes charged so far
    pub fn used(&self) -> usize {
        self.used
    }
}

/// An operand of a comparison
enum Operand {
    Value(Value),
    Empty,
    Blank,
}

/// Renders a parsed template against one context
pub struct Renderer<'a> {
    vocabulary: &'a Vocabulary,
    globals: &'a Value,
    locals: Map<String, Value>,
    budget: Budget,
}

impl<'a> Renderer<'a> {
    pub fn new(vocabulary: &'a Vocabulary, limits: &SandboxLimits, globals: &'a Value) -> Self {
        Self {
            vocabulary,
            globals,
            locals: Map::new(),
            budget: Budget::new(limits),
        }
    }

    /// Render `nodes` to a string
    pub fn render(mut self, nodes: &[Node]) -> Result<String, TemplateError> {
        let mut out = String::new();
        self.render_nodes(nodes, &mut out)?;
        self.budget.check_time()?;
        Ok(out)
    }

    fn render_nodes(&mut self, nodes: &[Node], out: &mut String) -> Result<(), TemplateError> {
        for node in nodes {
            self.budget.check_time()?;
            match node {
                Node::Text(text) => self.emit(text, out)?,
                Node::Output { chain, .. } => {
                    let value = self.evaluate_chain(chain)?;
                    self.emit(&to_liquid_string(&value), out)?;
                }
                Node::Conditional { branches, otherwise } => {
                    let mut taken = false;
                    for branch in branches {
                        let passed = self.evaluate_condition(&branch.condition)? != branch.negate;
                        if passed {
                            self.render_nodes(&branch.body, out)?;
                            taken = true;
                            break;
                        }
                    }
                    if let (false, Some(body)) = (taken, otherwise) {
                        self.render_nodes(body, out)?;
                    }
                }
                Node::Assign { name, chain } => {
                    let value = self.evaluate_chain(chain)?;
                    self.budget.charge(estimate_size(&value))?;
                    self.locals.insert(name.clone(), value);
                }
                Node::Capture { name, body } => {
                    let mut captured = String::new();
                    self.render_nodes(body, &mut captured)?;
                    self.locals.insert(name.clone(), Value::String(captured));
                }
            }
        }
        Ok(())
    }

    fn emit(&mut self, text: &str, out: &mut String) -> Result<(), TemplateError> {
        self.budget.charge(text.len())?;
        out.push_str(text);
        Ok(())
    }

    fn evaluate_chain(&mut self, chain: &FilterChain) -> Result<Value, TemplateError> {
        let mut value = self.evaluate(&chain.input)?;

        for call in &chain.filters {
            self.budget.check_time()?;
            let filter = self.vocabulary.lookup_filter(&call.name)?;

            let positional = call
                .args
                .iter()
                .map(|arg| self.evaluate(arg))
                .collect::<Result<Vec<_>, _>>()?;
            let keyword = call
                .keyword_args
                .iter()
                .map(|(key, arg)| Ok((key.clone(), self.evaluate(arg)?)))
                .collect::<Result<Vec<_>, TemplateError>>()?;
            let args = FilterArgs {
                positional,
                keyword,
                budget: self.budget.remaining(),
            };

            value = filter(&value, &args).map_err(|err| match err {
                FilterError::Invalid(message) => TemplateError::render(message),
                FilterError::OverBudget { requested } => TemplateError::MemoryExceeded {
                    limit: self.budget.memory_limit,
                    requested: self.budget.used().saturating_add(requested),
                },
            })?;
            self.budget.charge(estimate_size(&value))?;
            self.budget.check_time()?;
        }

        Ok(value)
    }

    fn evaluate(&self, expression: &Expression) -> Result<Value, TemplateError> {
        match self.operand(expression)? {
            Operand::Value(value) => Ok(value),
            Operand::Empty | Operand::Blank => Ok(Value::String(String::new())),
        }
    }

    fn operand(&self, expression: &Expression) -> Result<Operand, TemplateError> {
        Ok(match expression {
            Expression::Literal(value) => Operand::Value(value.clone()),
            Expression::Empty => Operand::Empty,
            Expression::Blank => Operand::Blank,
            Expression::Variable(path) => Operand::Value(self.lookup(path)?),
        })
    }

    fn evaluate_condition(&self, condition: &Condition) -> Result<bool, TemplateError> {
        match condition {
            Condition::Compare { left, comparison: None } => Ok(is_truthy(&self.evaluate(left)?)),
            Condition::Compare {
                left,
                comparison: Some((operator, right)),
            } => {
                let left = self.operand(left)?;
                let right = self.operand(right)?;
                Ok(compare_operands(left, *operator, right))
            }
            Condition::And(left, right) => Ok(self.evaluate_condition(left)? && self.evaluate_condition(right)?),
            Condition::Or(left, right) => Ok(self.evaluate_condition(left)? || self.evaluate_condition(right)?),
        }
    }

    /// Resolve a variable; anything missing is `nil`
    fn lookup(&self, path: &VariablePath) -> Result<Value, TemplateError> {
        let mut accessors = path.accessors.iter();
        let Some(first) = accessors.next() else {
            return Ok(Value::Null);
        };

        let root = match self.accessor_key(first)? {
            Value::String(name) => self.locals.get(&name).or_else(|| self.globals.get(&name)),
            _ => None,
        };
        let Some(root) = root else {
            return Ok(Value::Null);
        };

        let mut current = Cow::Borrowed(root);
        for accessor in accessors {
            let key = self.accessor_key(accessor)?;
            let dotted = matches!(accessor, Accessor::Key(_));
            current = match current {
                Cow::Borrowed(value) => match step(value, &key, dotted) {
                    Some(next) => next,
                    None => return Ok(Value::Null),
                },
                Cow::Owned(value) => match step(&value, &key, dotted) {
                    Some(next) => Cow::Owned(next.into_owned()),
                    None => return Ok(Value::Null),
                },
            };
        }

        if let Cow::Borrowed(found) = &current {
            self.budget.ensure(estimate_size(found))?;
        }
        Ok(current.into_owned())
    }

    fn accessor_key(&self, accessor: &Accessor) -> Result<Value, TemplateError> {
        match accessor {
            Accessor::Key(name) => Ok(Value::String(name.clone())),
            Accessor::Dynamic(expression) => self.evaluate(expression),
        }
    }
}

/// Apply one accessor, including the `size`, `first` and `last` pseudo-properties
fn step<'v>(value: &'v Value, key: &Value, dotted: bool) -> Option<Cow<'v, Value>> {
    match (value, key) {
        (Value::Object(map), Value::String(name)) => match map.get(name) {
            Some(found) => Some(Cow::Borrowed(found)),
            None if dotted && name == "size" => Some(Cow::Owned(Value::from(map.len()))),
            None => None,
        },
        (Value::Object(map), Value::Number(n)) => map.get(&n.to_string()).map(Cow::Borrowed),
        (Value::Array(items), Value::Number(n)) => {
            let index = n.as_i64()?;
            let index = if index < 0 { items.len() as i64 + index } else { index };
            usize::try_from(index).ok().and_then(|i| items.get(i)).map(Cow::Borrowed)
        }
        (Value::Array(items), Value::String(name)) if dotted => match name.as_str() {
            "size" => Some(Cow::Owned(Value::from(items.len()))),
            "first" => items.first().map(Cow::Borrowed),
            "last" => items.last().map(Cow::Borrowed),
            _ => None,
        },
        (Value::String(s), Value::String(name)) if dotted && name == "size" => {
            Some(Cow::Owned(Value::from(s.chars().count())))
        }
        _ => None,
    }
}

fn compare_operands(left: Operand, operator: Operator, right: Operand) -> bool {
    let keyword_test = |value: &Value, keyword: &Operand| match keyword {
        Operand::Empty => is_empty(value),
        Operand::Blank => is_blank(value),
        Operand::Value(_) => false,
    };

    match (left, right) {
        (Operand::Value(l), Operand::Value(r)) => compare(&l, operator, &r),
        (Operand::Value(value), keyword) | (keyword, Operand::Value(value)) => match operator {
            Operator::Equal => keyword_test(&value, &keyword),
            Operator::NotEqual => !keyword_test(&value, &keyword),
            _ => false,
        },
        (l, r) => {
            let same = matches!((l, r), (Operand::Empty, Operand::Empty) | (Operand::Blank, Operand::Blank));
            match operator {
                Operator::Equal => same,
                Operator::NotEqual => !same,
                _ => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::error::FailureReason;
    use crate::template::parser::parse;
    use serde_json::json;

    fn render_with(source: &str, context: Value, limits: SandboxLimits) -> Result<String, TemplateError> {
        let vocabulary = Vocabulary::standard();
        let nodes = parse(source, &vocabulary)?;
        Renderer::new(&vocabulary, &limits, &context).render(&nodes)
    }

    fn render(source: &str, context: Value) -> String {
        render_with(source, context, SandboxLimits::default()).unwrap()
    }

    #[test]
    fn test_variables_and_missing_values() {
        let context = json!({"user": {"name": "Ada", "tags": ["a", "b"]}});
        assert_eq!(render("Hi {{ user.name }}!", context.clone()), "Hi Ada!");
        assert_eq!(render("[{{ user.missing.deeper }}]", context.clone()), "[]");
        assert_eq!(render("{{ user.tags[1] }}", context.clone()), "b");
        assert_eq!(render("{{ user.tags[-1] }}", context.clone()), "b");
        assert_eq!(render("{{ user['name'] }}", context.clone()), "Ada");
        assert_eq!(render("{{ nothing }}", context), "");
    }

    #[test]
    fn test_pseudo_properties() {
        let context = json!({"items": [1, 2, 3], "word": "héllo", "obj": {"a": 1}});
        assert_eq!(render("{{ items.size }}-{{ items.first }}-{{ items.last }}", context.clone()), "3-1-3");
        assert_eq!(render("{{ word.size }}", context.clone()), "5");
        assert_eq!(render("{{ obj.size }}", context), "1");
    }

    #[test]
    fn test_conditionals() {
        let context = json!({"n": 0, "s": "", "f": false, "name": "Bob"});
        assert_eq!(render("{% if n %}y{% else %}n{% endif %}", context.clone()), "y");
        assert_eq!(render("{% if s %}y{% else %}n{% endif %}", context.clone()), "y");
        assert_eq!(render("{% if f %}y{% else %}n{% endif %}", context.clone()), "n");
        assert_eq!(render("{% if missing %}y{% else %}n{% endif %}", context.clone()), "n");
        assert_eq!(
            render("{% if name == 'Al' %}A{% elsif name == 'Bob' %}B{% else %}C{% endif %}", context.clone()),
            "B"
        );
        assert_eq!(render("{% unless f %}shown{% endunless %}", context.clone()), "shown");
        assert_eq!(render("{% if s == empty %}e{% endif %}", context.clone()), "e");
        assert_eq!(render("{% if missing == blank %}b{% endif %}", context.clone()), "b");
        assert_eq!(render("{% if name != blank and n == 0 %}ok{% endif %}", context), "ok");
    }

    #[test]
    fn test_boolean_operators_group_right() {
        // true or (false and false) in Liquid's right-to-left grouping
        assert_eq!(render("{% if true or false and false %}y{% else %}n{% endif %}", json!({})), "y");
        // false and (true or true)
        assert_eq!(render("{% if false and true or true %}y{% else %}n{% endif %}", json!({})), "n");
    }

    #[test]
    fn test_assign_and_capture() {
        let context = json!({"id": "a:b:c"});
        assert_eq!(render("{% assign parts = id | split: ':' %}{{ parts[1] }}", context.clone()), "b");
        assert_eq!(
            render("{% capture greeting %}Hello {{ id | upcase }}{% endcapture %}[{{ greeting }}]", context),
            "[Hello A:B:C]"
        );
    }

    #[test]
    fn test_locals_shadow_globals() {
        assert_eq!(render("{% assign x = 'local' %}{{ x }}", json!({"x": "global"})), "local");
    }

    #[test]
    fn test_filter_chain() {
        let context = json!({"email": "  Ada@Example.COM "});
        assert_eq!(render("{{ email | strip | downcase }}", context), "ada@example.com");
        assert_eq!(render("{{ 10 | divided_by: 4 | plus: 0.5 }}", json!({})), "2.5");
    }

    #[test]
    fn test_filter_error_is_generic() {
        let err = render_with("{{ 1 | divided_by: 0 }}", json!({}), SandboxLimits::default()).unwrap_err();
        assert_eq!(err.reason(), FailureReason::GenericRenderError);
    }

    #[test]
    fn test_memory_budget() {
        let limits = SandboxLimits::default().with_memory_limit(16);
        let err = render_with("{{ text }}", json!({"text": "x".repeat(17)}), limits.clone()).unwrap_err();
        assert_eq!(err.reason(), FailureReason::MemoryExceeded);

        let err = render_with("{{ 'a' | replace: 'a', 'bbbbbbbbbbbbbbbbbbbb' }}", json!({}), limits).unwrap_err();
        assert_eq!(err.reason(), FailureReason::MemoryExceeded);
    }

    #[test]
    fn test_deadline() {
        let limits = SandboxLimits::default().with_render_timeout(Duration::from_nanos(1));
        let context = json!({"text": "x".repeat(10_000)});
        let source = "{{ text | upcase | downcase | upcase | downcase | upcase }}";
        let err = render_with(source, context, limits).unwrap_err();
        assert_eq!(err.reason(), FailureReason::Timeout);
    }

    fn stall(input: &Value, _args: &FilterArgs) -> Result<Value, FilterError> {
        std::thread::sleep(Duration::from_millis(40));
        Ok(input.clone())
    }

    #[test]
    fn test_deadline_checked_after_last_filter() {
        let mut vocabulary = Vocabulary::standard();
        vocabulary.register_filter("stall", stall).unwrap();
        let nodes = parse("{{ 'a' | stall }}", &vocabulary).unwrap();
        let limits = SandboxLimits::default().with_render_timeout(Duration::from_millis(10));

        let context = json!({});
        let err = Renderer::new(&vocabulary, &limits, &context).render(&nodes).unwrap_err();
        assert_eq!(err.reason(), FailureReason::Timeout);
    }

    #[test]
    fn test_context_copies_must_fit_the_budget() {
        let limits = SandboxLimits::default().with_memory_limit(64);
        let context = json!({"big": {"blob": "x".repeat(100)}, "small": "ok"});
        let err = render_with("{% if big %}y{% endif %}", context.clone(), limits.clone()).unwrap_err();
        assert_eq!(err.reason(), FailureReason::MemoryExceeded);
        assert_eq!(render_with("{{ small }}", context, limits).unwrap(), "ok");
    }

    #[test]
    fn test_filter_removed_after_parse_cannot_run() {
        let mut vocabulary = Vocabulary::standard();
        let nodes = parse("{{ 'a' | upcase }}", &vocabulary).unwrap();
        vocabulary.remove_filter("upcase");
        let context = json!({});
        let err = Renderer::new(&vocabulary, &SandboxLimits::default(), &context)
            .render(&nodes)
            .unwrap_err();
        assert!(matches!(err, TemplateError::Render { .. }));
    }

    #[test]
    fn test_budget_accounting() {
        let mut budget = Budget::new(&SandboxLimits::default().with_memory_limit(10));
        budget.charge(4).unwrap();
        assert_eq!(budget.remaining(), 6);
        assert!(budget.charge(7).is_err());
        assert_eq!(budget.used(), 4);
    }
}
