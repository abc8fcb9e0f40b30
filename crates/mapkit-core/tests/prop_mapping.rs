//! Property-based tests for the mapping resolver
//!
//! These tests verify invariants that should hold for every mapping and
//! every event, not just hand-picked fixtures.

use mapkit_core::path::Path;
use mapkit_core::{resolve, Mapping};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Strategy for scalar JSON values
fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ._-]{0,12}".prop_map(Value::from),
    ]
}

fn object_of(entries: Vec<(String, Value)>) -> Value {
    Value::Object(entries.into_iter().collect::<Map<String, Value>>())
}

/// Strategy for directive-free JSON trees
fn literal_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec(("[a-z_]{1,8}", inner), 0..6).prop_map(object_of),
        ]
    })
}

/// Strategy for path expressions over short lowercase keys
fn path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop_oneof!["[a-c]".prop_map(|k| format!(".{}", k)), (0usize..3).prop_map(|i| format!("[{}]", i))], 0..4)
        .prop_map(|segments| format!("${}", segments.concat()))
}

/// Strategy for mappings mixing literals with path and conditional directives
fn mapping_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        3 => scalar_strategy(),
        2 => path_strategy().prop_map(|path| json!({"@path": path})),
        1 => (path_strategy(), scalar_strategy(), scalar_strategy()).prop_map(|(path, then, otherwise)| {
            json!({"@if": {"exists": {"@path": path}, "then": then, "else": otherwise}})
        }),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Array),
            prop::collection::vec(("[a-z_]{1,8}", inner.clone()), 0..5).prop_map(object_of),
            (path_strategy(), inner).prop_map(|(path, template)| json!({"@arrayPath": [path, template]})),
        ]
    })
}

/// Strategy for event documents using the same short keys as the paths
fn context_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(4, 48, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec(("[a-c]", inner), 0..4).prop_map(object_of),
        ]
    })
}

fn has_directive_keys(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.iter().any(|(key, child)| key.starts_with('@') || has_directive_keys(child)),
        Value::Array(items) => items.iter().any(has_directive_keys),
        _ => false,
    }
}

proptest! {
    #[test]
    fn prop_literals_resolve_to_themselves(tree in literal_strategy(), context in context_strategy()) {
        prop_assert_eq!(resolve(&tree, &context).unwrap(), Some(tree));
    }

    #[test]
    fn prop_resolution_is_idempotent(mapping in mapping_strategy(), context in context_strategy()) {
        let once = resolve(&mapping, &context).unwrap();
        if let Some(output) = once {
            prop_assert_eq!(resolve(&output, &context).unwrap(), Some(output));
        }
    }

    #[test]
    fn prop_output_has_no_directive_keys(mapping in mapping_strategy(), context in context_strategy()) {
        if let Some(output) = resolve(&mapping, &context).unwrap() {
            prop_assert!(!has_directive_keys(&output), "{}", output);
        }
    }

    #[test]
    fn prop_compiled_mapping_is_deterministic(mapping in mapping_strategy(), context in context_strategy()) {
        let compiled = Mapping::compile(&mapping).unwrap();
        prop_assert_eq!(compiled.resolve(&context).unwrap(), compiled.resolve(&context).unwrap());
    }

    #[test]
    fn prop_path_lookup_never_panics(source in "\\PC{0,24}", data in context_strategy()) {
        if let Ok(path) = Path::parse(&source) {
            let _ = path.lookup(&data);
            prop_assert_eq!(path.as_str(), source.as_str());
        }
    }

    #[test]
    fn prop_generated_paths_always_parse(source in path_strategy()) {
        prop_assert!(Path::parse(&source).is_ok());
    }
}
