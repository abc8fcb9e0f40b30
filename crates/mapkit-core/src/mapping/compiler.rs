//! Mapping compiler
//!
//! Walks a raw JSON mapping once, turning directive objects into typed
//! [`Node`]s. Authoring errors do not stop the walk: every problem in the
//! tree is collected with its location and returned together.
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

use super::ast::{
    is_directive_key, Conditional, InterpolationSource, Node, PathSource, Test, DIRECTIVES, METADATA_KEY,
};
use super::error::{format_location, MappingError};
use crate::mustache::Interpolation;
use crate::path::Path;
use crate::template::{value::describe_type, TemplateError, TemplateSandbox};
use serde_json::{Map, Value};

/// Default nesting limit for mapping trees
pub const DEFAULT_MAX_DEPTH: usize = 256;

const DIRECTIVE_OR_STRING: &str = "a string or a mapping directive";

/// Compiles raw mappings into node trees
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'s> {
    sandbox: &'s TemplateSandbox,
    max_depth: usize,
}

impl Default for Compiler<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler<'static> {
    /// Compile against the process-wide sandbox
    pub fn new() -> Self {
        Self {
            sandbox: TemplateSandbox::global(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl<'s> Compiler<'s> {
    /// Parse `@liquid` sources with a specific sandbox
    pub fn with_sandbox<'t>(self, sandbox: &'t TemplateSandbox) -> Compiler<'t> {
        Compiler {
            sandbox,
            max_depth: self.max_depth,
        }
    }

    /// Set the nesting limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Compile a mapping, collecting every authoring error
    pub fn compile(&self, mapping: &Value) -> Result<Node, Vec<MappingError>> {
        let mut pass = Pass {
            compiler: self,
            stack: Vec::new(),
            errors: Vec::new(),
        };
        let node = pass.node(mapping);
        if pass.errors.is_empty() {
            Ok(node)
        } else {
            Err(pass.errors)
        }
    }
}

struct Pass<'c, 's> {
    compiler: &'c Compiler<'s>,
    stack: Vec<String>,
    errors: Vec<MappingError>,
}

impl Pass<'_, '_> {
    fn location(&self) -> String {
        format_location(&self.stack)
    }

    fn nested<T>(&mut self, segment: impl Into<String>, f: impl FnOnce(&mut Self) -> T) -> T {
        self.stack.push(segment.into());
        let result = f(self);
        self.stack.pop();
        result
    }

    fn node(&mut self, value: &Value) -> Node {
        if self.stack.len() > self.compiler.max_depth {
            self.errors.push(MappingError::TooDeep {
                location: self.location(),
                limit: self.compiler.max_depth,
            });
            return Node::Value(Value::Null);
        }

        match value {
            Value::Array(items) => Node::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| self.nested(index.to_string(), |pass| pass.node(item)))
                    .collect(),
            ),
            Value::Object(map) => self.object(map),
            scalar => Node::Value(scalar.clone()),
        }
    }

    fn object(&mut self, map: &Map<String, Value>) -> Node {
        let directive_keys: Vec<&String> = map.keys().filter(|key| is_directive_key(key)).collect();

        match directive_keys.as_slice() {
            [] => Node::Object(
                map.iter()
                    .map(|(key, value)| {
                        let node = self.nested(key.as_str(), |pass| pass.node(value));
                        (key.clone(), node)
                    })
                    .collect(),
            ),
            [key] => {
                let key = key.as_str();
                for sibling in map.keys() {
                    if sibling != key && sibling != METADATA_KEY {
                        self.errors.push(MappingError::UnexpectedKey {
                            location: self.location(),
                            directive: key.to_string(),
                            key: sibling.clone(),
                        });
                    }
                }
                match map.get(key) {
                    Some(argument) => self.directive(key, argument),
                    None => Node::Value(Value::Null),
                }
            }
            keys => {
                self.errors.push(MappingError::AmbiguousDirective {
                    location: self.location(),
                    keys: keys.iter().map(|key| key.to_string()).collect(),
                });
                Node::Value(Value::Null)
            }
        }
    }

    fn directive(&mut self, key: &str, argument: &Value) -> Node {
        if !DIRECTIVES.contains(&key) {
            self.errors.push(MappingError::UnknownDirective {
                location: self.location(),
                key: key.to_string(),
            });
            return Node::Value(Value::Null);
        }

        self.nested(key, |pass| match key {
            "@path" => Node::Path(pass.path_source(argument)),
            "@if" => pass.conditional(argument),
            "@arrayPath" => pass.array_path(argument),
            "@liquid" => pass.liquid(argument),
            "@template" => pass.interpolation(argument),
            _ => Node::Literal(Box::new(pass.node(argument))),
        })
    }

    /// A path given as text, or as a directive producing text
    fn path_source(&mut self, argument: &Value) -> PathSource {
        match argument {
            Value::String(source) => match Path::parse(source) {
                Ok(path) => PathSource::Static(path),
                Err(source) => {
                    self.errors.push(MappingError::InvalidPath {
                        location: self.location(),
                        source,
                    });
                    PathSource::Static(Path::default())
                }
            },
            other => {
                let node = self.dynamic(other);
                PathSource::Dynamic {
                    node: Box::new(node),
                    location: self.location(),
                }
            }
        }
    }

    /// A value that must be a directive object
    fn dynamic(&mut self, argument: &Value) -> Node {
        let is_directive = matches!(argument, Value::Object(map) if map.keys().any(|key| is_directive_key(key)));
        if !is_directive {
            self.errors.push(MappingError::InvalidType {
                location: self.location(),
                expected: DIRECTIVE_OR_STRING.to_string(),
                found: describe_type(argument).to_string(),
            });
            return Node::Value(Value::Null);
        }
        self.node(argument)
    }

    fn conditional(&mut self, argument: &Value) -> Node {
        let Value::Object(map) = argument else {
            self.errors.push(MappingError::InvalidType {
                location: self.location(),
                expected: "an object".to_string(),
                found: describe_type(argument).to_string(),
            });
            return Node::Value(Value::Null);
        };

        for field in map.keys() {
            if !matches!(field.as_str(), "exists" | "blank" | "then" | "else") {
                self.errors.push(MappingError::UnknownField {
                    location: self.location(),
                    field: field.clone(),
                });
            }
        }

        let test = match (map.contains_key("exists"), map.contains_key("blank")) {
            (true, false) => Test::Exists,
            (false, true) => Test::Blank,
            (true, true) => {
                self.errors.push(MappingError::UnexpectedKey {
                    location: self.location(),
                    directive: "exists".to_string(),
                    key: "blank".to_string(),
                });
                Test::Exists
            }
            (false, false) => {
                self.errors.push(MappingError::MissingField {
                    location: self.location(),
                    field: "exists".to_string(),
                });
                Test::Exists
            }
        };

        let subject = match map.get(test.field()) {
            Some(value) => self.nested(test.field(), |pass| pass.node(value)),
            None => Node::Value(Value::Null),
        };
        let then = map.get("then").map(|value| self.nested("then", |pass| pass.node(value)));
        let otherwise = map.get("else").map(|value| self.nested("else", |pass| pass.node(value)));

        Node::If(Box::new(Conditional {
            test,
            subject,
            then,
            otherwise,
        }))
    }

    fn array_path(&mut self, argument: &Value) -> Node {
        let items = match argument {
            Value::Array(items) if (1..=2).contains(&items.len()) => items,
            other => {
                self.errors.push(MappingError::InvalidType {
                    location: self.location(),
                    expected: "an array of a path and an optional template".to_string(),
                    found: describe_type(other).to_string(),
                });
                return Node::Value(Value::Null);
            }
        };

        let source = self.nested("0", |pass| pass.path_source(&items[0]));
        let template = items
            .get(1)
            .map(|template| Box::new(self.nested("1", |pass| pass.node(template))));
        Node::ArrayPath { source, template }
    }

    fn liquid(&mut self, argument: &Value) -> Node {
        let location = self.location();
        let compiled = match argument {
            Value::String(source) => self.compiler.sandbox.compile(source),
            other => Err(TemplateError::TypeMismatch {
                found: describe_type(other).to_string(),
            }),
        };
        match compiled {
            Ok(template) => Node::Liquid { template, location },
            Err(source) => {
                self.errors.push(MappingError::Template { location, source });
                Node::Value(Value::Null)
            }
        }
    }

    fn interpolation(&mut self, argument: &Value) -> Node {
        let location = self.location();
        let source = match argument {
            Value::String(text) => match Interpolation::compile(text) {
                Ok(interpolation) => InterpolationSource::Static(interpolation),
                Err(source) => {
                    self.errors.push(MappingError::Template { location, source });
                    return Node::Value(Value::Null);
                }
            },
            other => InterpolationSource::Dynamic(Box::new(self.dynamic(other))),
        };
        Node::Template { source, location }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{FailureReason, SandboxLimits};
    use serde_json::json;

    fn errors(mapping: Value) -> Vec<String> {
        Compiler::new()
            .compile(&mapping)
            .unwrap_err()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_literals_compile_to_literal_nodes() {
        let node = Compiler::new().compile(&json!({"a": [1, "two", null, {"b": true}]})).unwrap();
        assert!(node.is_literal());
    }

    #[test]
    fn test_multiple_directive_keys() {
        assert_eq!(
            errors(json!({"foo": {"@path": "$.a", "@template": "b"}})),
            vec!["/foo should only have one @-prefixed key but it has 2 keys"]
        );
    }

    #[test]
    fn test_unknown_directive() {
        assert_eq!(errors(json!({"@nope": "x"})), vec!["/ has an invalid directive: @nope"]);
    }

    #[test]
    fn test_metadata_is_allowed_other_siblings_are_not() {
        assert!(Compiler::new()
            .compile(&json!({"@path": "$.a", "_metadata": {"label": "A"}}))
            .is_ok());
        assert_eq!(
            errors(json!({"@path": "$.a", "extra": 1})),
            vec!["/ has key \"extra\" next to directive @path"]
        );
    }

    #[test]
    fn test_errors_are_aggregated_with_locations() {
        let found = errors(json!({
            "a": {"@path": 5},
            "b": [{"@if": {"then": 1}}],
            "c": {"@arrayPath": "$.items"},
            "d": {"@liquid": "{% for x in y %}{% endfor %}"}
        }));
        assert_eq!(found.len(), 4, "{:?}", found);
        assert_eq!(found[0], "/a/@path should be a string or a mapping directive but it is a number");
        assert_eq!(found[1], "/b/0/@if should have field exists but it doesn't");
        assert!(found[2].starts_with("/c/@arrayPath should be an array"));
        assert!(found[3].starts_with("/d/@liquid template failed"));
    }

    #[test]
    fn test_nested_directive_locations() {
        let found = errors(json!({"x": {"@if": {"exists": {"@path": "$["}, "then": 1}}}));
        assert_eq!(found.len(), 1);
        assert!(found[0].starts_with("/x/@if/exists/@path has an invalid path"), "{}", found[0]);
    }

    #[test]
    fn test_if_rejects_both_tests_and_unknown_fields() {
        let found = errors(json!({"@if": {"exists": 1, "blank": 2, "when": 3}}));
        assert_eq!(found.len(), 2, "{:?}", found);
        assert!(found.contains(&"/@if has unknown field when".to_string()));
        assert!(found.contains(&"/@if has key \"blank\" next to directive exists".to_string()));
    }

    #[test]
    fn test_liquid_checks_type_and_length_at_compile_time() {
        let err = Compiler::new().compile(&json!({"@liquid": 42})).unwrap_err();
        assert_eq!(err[0].failure_reason(), Some(FailureReason::TypeMismatch));

        let err = Compiler::new()
            .compile(&json!({"@liquid": "x".repeat(1001)}))
            .unwrap_err();
        assert_eq!(err[0].failure_reason(), Some(FailureReason::ParseTooLong));

        let sandbox = TemplateSandbox::with_limits(SandboxLimits::default().with_max_template_length(2000));
        assert!(Compiler::new()
            .with_sandbox(&sandbox)
            .compile(&json!({"@liquid": "x".repeat(1001)}))
            .is_ok());
    }

    #[test]
    fn test_dynamic_path_must_be_directive() {
        assert!(Compiler::new()
            .compile(&json!({"@path": {"@template": "$.{{field}}"}}))
            .is_ok());
        assert_eq!(
            errors(json!({"@path": {"a": 1}})),
            vec!["/@path should be a string or a mapping directive but it is an object"]
        );
    }

    #[test]
    fn test_array_path_locations() {
        let found = errors(json!({"@arrayPath": ["$.items", {"id": {"@bad": 1}}]}));
        assert_eq!(found, vec!["/@arrayPath/1/id has an invalid directive: @bad"]);
    }

    #[test]
    fn test_max_depth() {
        let mut mapping = json!(1);
        for _ in 0..10 {
            mapping = json!({ "a": mapping });
        }
        assert!(Compiler::new().with_max_depth(10).compile(&mapping).is_ok());
        let err = Compiler::new().with_max_depth(9).compile(&mapping).unwrap_err();
        assert!(matches!(err[0], MappingError::TooDeep { limit: 9, .. }));
    }
}
