//! Liquid value semantics over JSON values
//!
//! Truthiness, stringification, `empty`/`blank` tests, comparisons and
//! number coercion follow Liquid's rules: only `false` and `nil` are falsy,
//! `nil` renders as an empty string and arrays render as the concatenation
//! of their elements.

use super::expression::Operator;
use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Liquid truthiness
pub fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// Render a value as output text
pub fn to_liquid_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(to_liquid_string).collect(),
        Value::Object(_) => value.to_string(),
    }
}

/// `empty`: an empty string, array or object
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// `blank`: nil, false, whitespace-only strings and empty collections
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// A number as Liquid sees it, keeping integers exact
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    /// Strict conversion: numbers and numeric strings only
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Numeric::Int(i)),
                None => n.as_f64().map(Numeric::Float),
            },
            Value::String(s) => Self::parse(s.trim()),
            _ => None,
        }
    }

    /// Lenient conversion used by math filters: anything non-numeric is 0
    pub fn coerce(value: &Value) -> Self {
        Self::from_value(value).unwrap_or(Numeric::Int(0))
    }

    fn parse(text: &str) -> Option<Self> {
        if let Ok(i) = text.parse::<i64>() {
            return Some(Numeric::Int(i));
        }
        text.parse::<f64>().ok().filter(|f| f.is_finite()).map(Numeric::Float)
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Int(i) => i as f64,
            Numeric::Float(f) => f,
        }
    }

    /// Convert back to JSON; non-finite floats become `nil`
    pub fn into_value(self) -> Value {
        match self {
            Numeric::Int(i) => Value::from(i),
            Numeric::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        }
    }
}

/// Liquid equality: numbers compare by value regardless of representation
pub fn liquid_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        },
        (Value::Array(a), Value::Array(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| liquid_eq(x, y)),
        _ => left == right,
    }
}

/// Ordering between two numbers or two strings; anything else is unordered
pub fn liquid_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => {
            let a = Numeric::from_value(left)?.as_f64();
            let b = Numeric::from_value(right)?.as_f64();
            a.partial_cmp(&b)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Evaluate `left op right`
pub fn compare(left: &Value, operator: Operator, right: &Value) -> bool {
    match operator {
        Operator::Equal => liquid_eq(left, right),
        Operator::NotEqual => !liquid_eq(left, right),
        Operator::Less => liquid_cmp(left, right) == Some(Ordering::Less),
        Operator::Greater => liquid_cmp(left, right) == Some(Ordering::Greater),
        Operator::LessOrEqual => matches!(liquid_cmp(left, right), Some(Ordering::Less | Ordering::Equal)),
        Operator::GreaterOrEqual => matches!(liquid_cmp(left, right), Some(Ordering::Greater | Ordering::Equal)),
        Operator::Contains => contains(left, right),
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => match needle {
            Value::Null => false,
            other => s.contains(to_liquid_string(other).as_str()),
        },
        Value::Array(items) => items.iter().any(|item| liquid_eq(item, needle)),
        Value::Object(map) => match needle {
            Value::String(key) => map.contains_key(key),
            _ => false,
        },
        _ => false,
    }
}

/// Approximate heap footprint of a value, in bytes
pub fn estimate_size(value: &Value) -> usize {
    match value {
        Value::Null | Value::Bool(_) => 1,
        Value::Number(_) => 8,
        Value::String(s) => s.len(),
        Value::Array(items) => items.iter().map(|item| estimate_size(item) + 8).sum(),
        Value::Object(map) => map.iter().map(|(key, item)| key.len() + estimate_size(item) + 8).sum(),
    }
}

/// Human-readable JSON type, used in error messages
pub fn describe_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
