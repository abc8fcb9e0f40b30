//! Mapkit Core - Directive resolution engine for declarative payload mapping
//!
//! This crate turns a JSON *mapping* (a tree of literals and `@`-directives)
//! plus an incoming event document into an outbound JSON payload.
//!
//! # Main Components
//!
//! - **Paths**: the `$.a.b[0]` reference grammar with never-failing lookups
//! - **Mappings**: compile-once directive trees and their resolver
//! - **Template Sandbox**: an allow-listed Liquid subset with time, length
//!   and memory ceilings, used by `@liquid`
//! - **Interpolation**: logic-less `{{field}}` templates, used by `@template`
//!
//! # Example
//!
//! ```
//! use mapkit_core::{transform, Result};
//! use serde_json::json;
//!
//! fn example() -> Result<()> {
//!     let mapping = json!({
//!         "user_id": {"@path": "$.userId"},
//!         "products": {"@arrayPath": ["$.products", {"sku": {"@path": "$.id"}}]},
//!         "greeting": {"@liquid": "Hello {{ name | capitalize }}"}
//!     });
//!     let event = json!({"userId": "u1", "name": "ada", "products": [{"id": "p1"}]});
//!
//!     let payload = transform(&mapping, &event)?;
//!     assert_eq!(payload["products"], json!([{"sku": "p1"}]));
//!     assert_eq!(payload["greeting"], "Hello Ada");
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

pub mod error;
pub mod mapping;
pub mod mustache;
pub mod path;
pub mod template;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use mapping::{Compiler, Mapping, MappingError, ResolveOptions, Resolver};
pub use path::{Path, PathError};
pub use template::{FailureReason, SandboxLimits, TemplateError, TemplateSandbox};

use serde_json::Value;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compile `mapping` and resolve it against `context`
///
/// `None` means the mapping resolved to nothing (for example a top-level
/// `@path` that found no data).
pub fn resolve(mapping: &Value, context: &Value) -> Result<Option<Value>> {
    Mapping::compile(mapping)?.resolve(context)
}

/// Build a payload from an event object
///
/// The event must be a JSON object. A mapping that resolves to nothing
/// produces `null`.
pub fn transform(mapping: &Value, payload: &Value) -> Result<Value> {
    transform_with(mapping, payload, &ResolveOptions::default())
}

/// [`transform`] with explicit options
pub fn transform_with(mapping: &Value, payload: &Value, options: &ResolveOptions) -> Result<Value> {
    if !payload.is_object() {
        return Err(Error::Payload {
            message: format!(
                "payload must be an object but it is {}",
                template::value::describe_type(payload)
            ),
        });
    }

    let compiler = Compiler::new().with_max_depth(options.max_depth);
    let resolver = Resolver::new().with_options(options.clone());
    let resolved = Mapping::compile_with(mapping, &compiler)?.resolve_with(payload, &resolver)?;
    Ok(resolved.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_transform_rejects_non_object_payloads() {
        for payload in [json!(123), json!([]), json!("x"), json!(null)] {
            let err = transform(&json!({"a": 1}), &payload).unwrap_err();
            assert!(matches!(err, Error::Payload { .. }), "{}", payload);
        }
    }

    #[test]
    fn test_resolve_accepts_any_context() {
        assert_eq!(resolve(&json!({"@path": "$[1]"}), &json!([1, 2])).unwrap(), Some(json!(2)));
        assert_eq!(resolve(&json!({"@path": "$.x"}), &json!(5)).unwrap(), None);
    }

    #[test]
    fn test_no_op_mappings() {
        assert_eq!(transform(&json!({}), &json!({"cool": false})).unwrap(), json!({}));
        assert_eq!(transform(&json!({"cool": true}), &json!({})).unwrap(), json!({"cool": true}));
        assert_eq!(transform(&json!({"@path": "$.x"}), &json!({})).unwrap(), Value::Null);
    }

    #[test]
    fn test_transform_with_options() {
        let options = ResolveOptions {
            escape_templates: false,
            ..ResolveOptions::default()
        };
        let out = transform_with(&json!({"@template": "{{a}}"}), &json!({"a": "<b>"}), &options).unwrap();
        assert_eq!(out, json!("<b>"));
    }

    #[test]
    fn test_invalid_mappings_fail_before_resolution() {
        let err = transform(&json!({"@template": false}), &json!({})).unwrap_err();
        assert_eq!(err.mapping_errors().len(), 1);
    }
}
