//! Standard filter implementations
//!
//! Every filter here is pure: it reads its input and arguments and returns a
//! new value. Filters that can grow their input check the render's remaining
//! byte budget before building the result.
//!
//! Copyright (c) 2025 Mapkit Team
//! Licensed under the Apache-2.0 license

use super::value::{estimate_size, is_empty, to_liquid_string, Numeric};
use super::vocabulary::{FilterArgs, FilterError, FilterFn};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use std::fmt::Write;

type FilterResult = Result<Value, FilterError>;

/// Filters registered by [`Vocabulary::standard`](super::Vocabulary::standard)
pub const STANDARD_FILTERS: &[(&str, FilterFn)] = &[
    // strings
    ("append", append),
    ("prepend", prepend),
    ("capitalize", capitalize),
    ("downcase", downcase),
    ("upcase", upcase),
    ("strip", strip),
    ("lstrip", lstrip),
    ("rstrip", rstrip),
    ("strip_html", strip_html),
    ("strip_newlines", strip_newlines),
    ("escape", escape),
    ("escape_once", escape_once),
    ("remove", remove),
    ("remove_first", remove_first),
    ("replace", replace),
    ("replace_first", replace_first),
    ("split", split),
    ("slice", slice),
    ("truncate", truncate),
    ("truncatewords", truncatewords),
    ("url_encode", url_encode),
    ("url_decode", url_decode),
    ("base64_encode", base64_encode),
    ("base64_decode", base64_decode),
    // math
    ("abs", abs),
    ("ceil", ceil),
    ("floor", floor),
    ("round", round),
    ("plus", plus),
    ("minus", minus),
    ("times", times),
    ("divided_by", divided_by),
    ("modulo", modulo),
    ("at_least", at_least),
    ("at_most", at_most),
    // misc
    ("default", default),
    ("size", size),
    ("first", first),
    ("last", last),
    ("join", join),
    ("date", date),
    ("json", json),
];

fn text(value: &Value) -> String {
    to_liquid_string(value)
}

fn string_arg(args: &FilterArgs, index: usize, filter: &str) -> Result<String, FilterError> {
    args.required(index, filter).map(text)
}

fn optional_string_arg(args: &FilterArgs, index: usize, default: &str) -> String {
    args.get(index).map_or_else(|| default.to_string(), text)
}

fn int_arg(args: &FilterArgs, index: usize, filter: &str) -> Result<i64, FilterError> {
    let value = args.required(index, filter)?;
    match Numeric::from_value(value) {
        Some(Numeric::Int(i)) => Ok(i),
        Some(Numeric::Float(f)) => Ok(f as i64),
        None => Err(format!("{}: invalid integer '{}'", filter, text(value)).into()),
    }
}

fn optional_int_arg(args: &FilterArgs, index: usize, default: i64, filter: &str) -> Result<i64, FilterError> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(default),
        Some(_) => int_arg(args, index, filter),
    }
}

// ---- strings ---------------------------------------------------------------

fn append(input: &Value, args: &FilterArgs) -> FilterResult {
    let mut out = text(input);
    let suffix = string_arg(args, 0, "append")?;
    args.reserve(out.len() + suffix.len())?;
    out.push_str(&suffix);
    Ok(Value::String(out))
}

fn prepend(input: &Value, args: &FilterArgs) -> FilterResult {
    let mut out = string_arg(args, 0, "prepend")?;
    let rest = text(input);
    args.reserve(out.len() + rest.len())?;
    out.push_str(&rest);
    Ok(Value::String(out))
}

fn capitalize(input: &Value, _args: &FilterArgs) -> FilterResult {
    let s = text(input);
    let mut chars = s.chars();
    let out = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    };
    Ok(Value::String(out))
}

fn downcase(input: &Value, _args: &FilterArgs) -> FilterResult {
    Ok(Value::String(text(input).to_lowercase()))
}

fn upcase(input: &Value, _args: &FilterArgs) -> FilterResult {
    Ok(Value::String(text(input).to_uppercase()))
}

fn strip(input: &Value, _args: &FilterArgs) -> FilterResult {
    Ok(Value::String(text(input).trim().to_string()))
}

fn lstrip(input: &Value, _args: &FilterArgs) -> FilterResult {
    Ok(Value::String(text(input).trim_start().to_string()))
}

fn rstrip(input: &Value, _args: &FilterArgs) -> FilterResult {
    Ok(Value::String(text(input).trim_end().to_string()))
}

fn strip_html(input: &Value, _args: &FilterArgs) -> FilterResult {
    let s = text(input);
    let mut out = String::with_capacity(s.len());
    let mut rest = s.as_str();

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let head: String = tail.chars().take(7).collect::<String>().to_ascii_lowercase();

        let skip = if head.starts_with("<!--") {
            tail.find("-->").map(|end| end + 3)
        } else if head.starts_with("<script") {
            find_ignore_case(tail, "</script>")
        } else if head.starts_with("<style") {
            find_ignore_case(tail, "</style>")
        } else {
            tail.find('>').map(|end| end + 1)
        };

        match skip {
            Some(len) => rest = &tail[len..],
            None => {
                out.push_str(tail);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Ok(Value::String(out))
}

/// Byte offset just past the first case-insensitive occurrence of `needle`
fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let needle = needle.as_bytes();
    bytes
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
        .map(|start| start + needle.len())
}

fn strip_newlines(input: &Value, _args: &FilterArgs) -> FilterResult {
    Ok(Value::String(text(input).replace(&['\r', '\n'][..], "")))
}

fn escape_char(ch: char, out: &mut String) {
    match ch {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#39;"),
        other => out.push(other),
    }
}

fn escape(input: &Value, args: &FilterArgs) -> FilterResult {
    if input.is_null() {
        return Ok(Value::Null);
    }
    let s = text(input);
    args.reserve(s.len() * 6)?;
    let mut out = String::with_capacity(s.len());
    s.chars().for_each(|ch| escape_char(ch, &mut out));
    Ok(Value::String(out))
}

/// Length of an HTML entity at the start of `s`, if there is one
/// Longest entity name `escape_once` recognises
const MAX_ENTITY_LEN: usize = 32;

fn entity_len(s: &str) -> Option<usize> {
    let body = s.strip_prefix('&')?;
    let window = &body.as_bytes()[..body.len().min(MAX_ENTITY_LEN)];
    let end = window.iter().position(|&b| b == b';')?;
    let name = &body[..end];
    let valid = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit())
    } else if let Some(dec) = name.strip_prefix('#') {
        !dec.is_empty() && dec.chars().all(|c| c.is_ascii_digit())
    } else {
        !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
    };
    valid.then_some(end + 2)
}

fn escape_once(input: &Value, args: &FilterArgs) -> FilterResult {
    let s = text(input);
    args.reserve(s.len() * 6)?;
    let mut out = String::with_capacity(s.len());
    let mut index = 0;
    while let Some(ch) = s[index..].chars().next() {
        if ch == '&' {
            if let Some(len) = entity_len(&s[index..]) {
                out.push_str(&s[index..index + len]);
                index += len;
                continue;
            }
        }
        escape_char(ch, &mut out);
        index += ch.len_utf8();
    }
    Ok(Value::String(out))
}

fn remove(input: &Value, args: &FilterArgs) -> FilterResult {
    let needle = string_arg(args, 0, "remove")?;
    let s = text(input);
    if needle.is_empty() {
        return Ok(Value::String(s));
    }
    Ok(Value::String(s.replace(&needle, "")))
}

fn remove_first(input: &Value, args: &FilterArgs) -> FilterResult {
    let needle = string_arg(args, 0, "remove_first")?;
    Ok(Value::String(text(input).replacen(&needle, "", 1)))
}

fn replace(input: &Value, args: &FilterArgs) -> FilterResult {
    let needle = string_arg(args, 0, "replace")?;
    let replacement = optional_string_arg(args, 1, "");
    let s = text(input);
    if needle.is_empty() {
        return Ok(Value::String(s));
    }
    let count = s.matches(needle.as_str()).count();
    args.reserve(s.len() + count.saturating_mul(replacement.len()))?;
    Ok(Value::String(s.replace(&needle, &replacement)))
}

fn replace_first(input: &Value, args: &FilterArgs) -> FilterResult {
    let needle = string_arg(args, 0, "replace_first")?;
    let replacement = optional_string_arg(args, 1, "");
    let s = text(input);
    args.reserve(s.len() + replacement.len())?;
    Ok(Value::String(s.replacen(&needle, &replacement, 1)))
}

fn split(input: &Value, args: &FilterArgs) -> FilterResult {
    let separator = string_arg(args, 0, "split")?;
    let s = text(input);
    let count = if s.is_empty() {
        0
    } else if separator.is_empty() {
        s.chars().count()
    } else if separator == " " {
        s.split_whitespace().count()
    } else {
        s.matches(separator.as_str()).count() + 1
    };
    args.reserve(s.len() + count * 8)?;

    let mut parts: Vec<String> = if s.is_empty() {
        Vec::new()
    } else if separator.is_empty() {
        s.chars().map(String::from).collect()
    } else if separator == " " {
        s.split_whitespace().map(String::from).collect()
    } else {
        s.split(separator.as_str()).map(String::from).collect()
    };
    while parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    Ok(Value::Array(parts.into_iter().map(Value::String).collect()))
}

/// Resolve a possibly negative offset/length pair against `len` items
fn slice_bounds(len: usize, offset: i64, length: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if offset < 0 { len + offset } else { offset };
    if start < 0 || start >= len || length <= 0 {
        return None;
    }
    let end = start.saturating_add(length).min(len);
    Some((start as usize, end as usize))
}

fn slice(input: &Value, args: &FilterArgs) -> FilterResult {
    let offset = int_arg(args, 0, "slice")?;
    let length = optional_int_arg(args, 1, 1, "slice")?;

    match input {
        Value::Array(items) => Ok(Value::Array(match slice_bounds(items.len(), offset, length) {
            Some((start, end)) => items[start..end].to_vec(),
            None => Vec::new(),
        })),
        other => {
            let chars: Vec<char> = text(other).chars().collect();
            Ok(Value::String(match slice_bounds(chars.len(), offset, length) {
                Some((start, end)) => chars[start..end].iter().collect(),
                None => String::new(),
            }))
        }
    }
}

fn truncate(input: &Value, args: &FilterArgs) -> FilterResult {
    let limit = optional_int_arg(args, 0, 50, "truncate")?.max(0) as usize;
    let ellipsis = optional_string_arg(args, 1, "...");
    let s = text(input);
    if s.chars().count() <= limit {
        return Ok(Value::String(s));
    }
    let keep = limit.saturating_sub(ellipsis.chars().count());
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(&ellipsis);
    Ok(Value::String(out))
}

fn truncatewords(input: &Value, args: &FilterArgs) -> FilterResult {
    let limit = optional_int_arg(args, 0, 15, "truncatewords")?.max(1) as usize;
    let ellipsis = optional_string_arg(args, 1, "...");
    let s = text(input);
    let words: Vec<&str> = s.split_whitespace().collect();
    if words.len() <= limit {
        return Ok(Value::String(s));
    }
    let mut out = words[..limit].join(" ");
    out.push_str(&ellipsis);
    Ok(Value::String(out))
}

fn url_encode(input: &Value, args: &FilterArgs) -> FilterResult {
    if input.is_null() {
        return Ok(Value::Null);
    }
    let s = text(input);
    args.reserve(s.len() * 3)?;
    Ok(Value::String(url::form_urlencoded::byte_serialize(s.as_bytes()).collect()))
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn url_decode(input: &Value, _args: &FilterArgs) -> FilterResult {
    if input.is_null() {
        return Ok(Value::Null);
    }
    let s = text(input);
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let high = bytes.get(i + 1).copied().and_then(hex_value);
                let low = bytes.get(i + 2).copied().and_then(hex_value);
                match (high, low) {
                    (Some(high), Some(low)) => {
                        out.push((high << 4) | low);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            byte => out.push(byte),
        }
        i += 1;
    }
    String::from_utf8(out)
        .map(Value::String)
        .map_err(|_| FilterError::from("url_decode: invalid UTF-8 sequence"))
}

fn base64_encode(input: &Value, args: &FilterArgs) -> FilterResult {
    let s = text(input);
    args.reserve(s.len() / 3 * 4 + 4)?;
    Ok(Value::String(BASE64.encode(s.as_bytes())))
}

fn base64_decode(input: &Value, _args: &FilterArgs) -> FilterResult {
    let bytes = BASE64
        .decode(text(input).as_bytes())
        .map_err(|e| FilterError::from(format!("base64_decode: invalid base64 provided ({})", e)))?;
    Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}

// ---- math ------------------------------------------------------------------

fn math_result(value: Numeric) -> FilterResult {
    Ok(value.into_value())
}

fn arithmetic(
    input: &Value,
    args: &FilterArgs,
    filter: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> FilterResult {
    let left = Numeric::coerce(input);
    let right = Numeric::coerce(args.required(0, filter)?);
    let result = match (left, right) {
        (Numeric::Int(a), Numeric::Int(b)) => match int_op(a, b) {
            Some(i) => Numeric::Int(i),
            None => Numeric::Float(float_op(a as f64, b as f64)),
        },
        (a, b) => Numeric::Float(float_op(a.as_f64(), b.as_f64())),
    };
    math_result(result)
}

fn abs(input: &Value, _args: &FilterArgs) -> FilterResult {
    math_result(match Numeric::coerce(input) {
        Numeric::Int(i) => i.checked_abs().map_or(Numeric::Float((i as f64).abs()), Numeric::Int),
        Numeric::Float(f) => Numeric::Float(f.abs()),
    })
}

/// Round a float to an integer, keeping it a float when it does not fit
fn to_integer(f: f64) -> Numeric {
    if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Numeric::Int(f as i64)
    } else {
        Numeric::Float(f)
    }
}

fn ceil(input: &Value, _args: &FilterArgs) -> FilterResult {
    math_result(match Numeric::coerce(input) {
        Numeric::Int(i) => Numeric::Int(i),
        Numeric::Float(f) => to_integer(f.ceil()),
    })
}

fn floor(input: &Value, _args: &FilterArgs) -> FilterResult {
    math_result(match Numeric::coerce(input) {
        Numeric::Int(i) => Numeric::Int(i),
        Numeric::Float(f) => to_integer(f.floor()),
    })
}

fn round(input: &Value, args: &FilterArgs) -> FilterResult {
    let digits = optional_int_arg(args, 0, 0, "round")?;
    math_result(match Numeric::coerce(input) {
        Numeric::Int(i) => Numeric::Int(i),
        Numeric::Float(f) if digits <= 0 => to_integer(f.round()),
        Numeric::Float(f) => {
            let factor = 10f64.powi(digits.min(15) as i32);
            Numeric::Float((f * factor).round() / factor)
        }
    })
}

fn plus(input: &Value, args: &FilterArgs) -> FilterResult {
    arithmetic(input, args, "plus", i64::checked_add, |a, b| a + b)
}

fn minus(input: &Value, args: &FilterArgs) -> FilterResult {
    arithmetic(input, args, "minus", i64::checked_sub, |a, b| a - b)
}

fn times(input: &Value, args: &FilterArgs) -> FilterResult {
    arithmetic(input, args, "times", i64::checked_mul, |a, b| a * b)
}

fn is_zero(value: Numeric) -> bool {
    match value {
        Numeric::Int(i) => i == 0,
        Numeric::Float(f) => f == 0.0,
    }
}

fn divided_by(input: &Value, args: &FilterArgs) -> FilterResult {
    if is_zero(Numeric::coerce(args.required(0, "divided_by")?)) {
        return Err("divided by 0".into());
    }
    arithmetic(input, args, "divided_by", floored_div, |a, b| a / b)
}

fn modulo(input: &Value, args: &FilterArgs) -> FilterResult {
    if is_zero(Numeric::coerce(args.required(0, "modulo")?)) {
        return Err("divided by 0".into());
    }
    arithmetic(input, args, "modulo", floored_rem, |a, b| a - b * (a / b).floor())
}

/// Integer division rounding toward negative infinity
fn floored_div(a: i64, b: i64) -> Option<i64> {
    let quotient = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        quotient.checked_sub(1)
    } else {
        Some(quotient)
    }
}

/// Remainder with the sign of the divisor
fn floored_rem(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

fn at_least(input: &Value, args: &FilterArgs) -> FilterResult {
    let value = Numeric::coerce(input);
    let bound = Numeric::coerce(args.required(0, "at_least")?);
    math_result(if bound.as_f64() > value.as_f64() { bound } else { value })
}

fn at_most(input: &Value, args: &FilterArgs) -> FilterResult {
    let value = Numeric::coerce(input);
    let bound = Numeric::coerce(args.required(0, "at_most")?);
    math_result(if bound.as_f64() < value.as_f64() { bound } else { value })
}

// ---- misc ------------------------------------------------------------------

fn default(input: &Value, args: &FilterArgs) -> FilterResult {
    let fallback = args.get(0).cloned().unwrap_or_else(|| Value::String(String::new()));
    let allow_false = args.keyword("allow_false").is_some_and(|v| v == &Value::Bool(true));
    let use_fallback = match input {
        Value::Null => true,
        Value::Bool(false) => !allow_false,
        other => is_empty(other),
    };
    Ok(if use_fallback { fallback } else { input.clone() })
}

fn size(input: &Value, _args: &FilterArgs) -> FilterResult {
    let size = match input {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => 0,
    };
    Ok(Value::from(size))
}

fn first(input: &Value, _args: &FilterArgs) -> FilterResult {
    Ok(match input {
        Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
        Value::String(s) => s.chars().next().map_or(Value::Null, |c| Value::String(c.to_string())),
        _ => Value::Null,
    })
}

fn last(input: &Value, _args: &FilterArgs) -> FilterResult {
    Ok(match input {
        Value::Array(items) => items.last().cloned().unwrap_or(Value::Null),
        Value::String(s) => s.chars().last().map_or(Value::Null, |c| Value::String(c.to_string())),
        _ => Value::Null,
    })
}

fn join(input: &Value, args: &FilterArgs) -> FilterResult {
    let separator = optional_string_arg(args, 0, " ");
    match input {
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(text).collect();
            let total = parts.iter().map(String::len).sum::<usize>() + separator.len() * parts.len();
            args.reserve(total)?;
            Ok(Value::String(parts.join(&separator)))
        }
        other => Ok(Value::String(text(other))),
    }
}

/// Interpret a filter input as a point in time
fn parse_date(input: &Value) -> Option<DateTime<FixedOffset>> {
    match input {
        Value::Number(n) => {
            let seconds = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp(seconds, 0).map(|dt| dt.fixed_offset())
        }
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("now") || s.eq_ignore_ascii_case("today") {
                return Some(Utc::now().fixed_offset());
            }
            if let Ok(seconds) = s.parse::<i64>() {
                return DateTime::from_timestamp(seconds, 0).map(|dt| dt.fixed_offset());
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt);
            }
            if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
                return Some(dt);
            }
            for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(Utc.from_utc_datetime(&naive).fixed_offset());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
        }
        _ => None,
    }
}

fn date(input: &Value, args: &FilterArgs) -> FilterResult {
    let format = match args.get(0) {
        Some(Value::Null) | None => return Ok(input.clone()),
        Some(value) => text(value),
    };
    if format.is_empty() || input.is_null() {
        return Ok(input.clone());
    }
    let Some(datetime) = parse_date(input) else {
        return Ok(input.clone());
    };

    let mut out = String::new();
    write!(out, "{}", datetime.format(&format))
        .map_err(|_| FilterError::from(format!("date: invalid format '{}'", format)))?;
    Ok(Value::String(out))
}

fn json(input: &Value, args: &FilterArgs) -> FilterResult {
    args.reserve(estimate_size(input) * 2)?;
    serde_json::to_string(input)
        .map(Value::String)
        .map_err(|e| FilterError::from(format!("json: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, input: Value, args: Vec<Value>) -> Value {
        let filter = STANDARD_FILTERS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
            .unwrap_or_else(|| panic!("no filter {}", name));
        filter(&input, &FilterArgs::new(args)).unwrap()
    }

    fn call_err(name: &str, input: Value, args: Vec<Value>) -> FilterError {
        let filter = STANDARD_FILTERS.iter().find(|(n, _)| *n == name).map(|(_, f)| *f).unwrap();
        filter(&input, &FilterArgs::new(args)).unwrap_err()
    }

    #[test]
    fn test_string_filters() {
        assert_eq!(call("append", json!("a"), vec![json!("b")]), json!("ab"));
        assert_eq!(call("prepend", json!("a"), vec![json!("b")]), json!("ba"));
        assert_eq!(call("capitalize", json!("hELLO world"), vec![]), json!("Hello world"));
        assert_eq!(call("downcase", json!("ABC"), vec![]), json!("abc"));
        assert_eq!(call("upcase", json!("abc"), vec![]), json!("ABC"));
        assert_eq!(call("strip", json!("  a  "), vec![]), json!("a"));
        assert_eq!(call("lstrip", json!("  a  "), vec![]), json!("a  "));
        assert_eq!(call("rstrip", json!("  a  "), vec![]), json!("  a"));
        assert_eq!(call("strip_newlines", json!("a\r\nb\n"), vec![]), json!("ab"));
        assert_eq!(call("remove", json!("banana"), vec![json!("an")]), json!("ba"));
        assert_eq!(call("remove_first", json!("banana"), vec![json!("an")]), json!("bana"));
        assert_eq!(call("replace", json!("banana"), vec![json!("a"), json!("o")]), json!("bonono"));
        assert_eq!(call("replace_first", json!("banana"), vec![json!("a"), json!("o")]), json!("bonana"));
    }

    #[test]
    fn test_append_to_nil() {
        assert_eq!(call("append", Value::Null, vec![json!("x")]), json!("x"));
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(
            call("strip_html", json!("<p>Hi <b>there</b></p><script>alert(1)</script><!-- c -->!"), vec![]),
            json!("Hi there!")
        );
        assert_eq!(call("strip_html", json!("a < b"), vec![]), json!("a < b"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(call("escape", json!("<a href=\"x\">'&'</a>"), vec![]), json!("&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"));
        assert_eq!(call("escape_once", json!("&lt;b&gt; & <i>"), vec![]), json!("&lt;b&gt; &amp; &lt;i&gt;"));
        assert_eq!(call("escape_once", json!("&#39;&#x27;"), vec![]), json!("&#39;&#x27;"));
    }

    #[test]
    fn test_escape_once_only_keeps_short_entities() {
        let long = format!("&{};", "a".repeat(40));
        assert_eq!(call("escape_once", json!(long), vec![]), json!(format!("&amp;{};", "a".repeat(40))));

        let ampersands = "&".repeat(200_000);
        let escaped = call("escape_once", json!(ampersands), vec![]);
        assert_eq!(escaped.as_str().map(str::len), Some(200_000 * 5));
    }

    #[test]
    fn test_split() {
        assert_eq!(call("split", json!("a:b:c"), vec![json!(":")]), json!(["a", "b", "c"]));
        assert_eq!(call("split", json!("a,b,,"), vec![json!(",")]), json!(["a", "b"]));
        assert_eq!(call("split", json!(" a  b "), vec![json!(" ")]), json!(["a", "b"]));
        assert_eq!(call("split", json!("abc"), vec![json!("")]), json!(["a", "b", "c"]));
        assert_eq!(call("split", json!(""), vec![json!(",")]), json!([]));
    }

    #[test]
    fn test_split_reserves_before_building() {
        let filter = STANDARD_FILTERS.iter().find(|(n, _)| *n == "split").map(|(_, f)| *f).unwrap();
        let args = FilterArgs {
            budget: 100,
            ..FilterArgs::new(vec![json!("")])
        };
        let err = filter(&json!("x".repeat(20)), &args).unwrap_err();
        assert_eq!(err, FilterError::OverBudget { requested: 20 + 20 * 8 });

        let args = FilterArgs {
            budget: 29,
            ..FilterArgs::new(vec![json!(",")])
        };
        assert_eq!(filter(&json!("a,b,c"), &args).unwrap(), json!(["a", "b", "c"]));
    }

    #[test]
    fn test_slice() {
        assert_eq!(call("slice", json!("Liquid"), vec![json!(0)]), json!("L"));
        assert_eq!(call("slice", json!("Liquid"), vec![json!(2), json!(5)]), json!("quid"));
        assert_eq!(call("slice", json!("Liquid"), vec![json!(-3), json!(2)]), json!("ui"));
        assert_eq!(call("slice", json!("Liquid"), vec![json!(10)]), json!(""));
        assert_eq!(call("slice", json!([1, 2, 3]), vec![json!(1), json!(2)]), json!([2, 3]));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(call("truncate", json!("Ground control to Major Tom."), vec![json!(20)]), json!("Ground control to..."));
        assert_eq!(call("truncate", json!("short"), vec![json!(20)]), json!("short"));
        assert_eq!(
            call("truncate", json!("Ground control to Major Tom."), vec![json!(25), json!(", and so on")]),
            json!("Ground control, and so on")
        );
        assert_eq!(
            call("truncatewords", json!("Ground control to Major Tom."), vec![json!(3)]),
            json!("Ground control to...")
        );
    }

    #[test]
    fn test_url_and_base64() {
        assert_eq!(call("url_encode", json!("john@liquid.com a/b"), vec![]), json!("john%40liquid.com+a%2Fb"));
        assert_eq!(call("url_decode", json!("%27Stop%21%27+said+Fred"), vec![]), json!("'Stop!' said Fred"));
        assert_eq!(call("url_decode", json!("100%"), vec![]), json!("100%"));
        assert_eq!(call("base64_encode", json!("one two three"), vec![]), json!("b25lIHR3byB0aHJlZQ=="));
        assert_eq!(call("base64_decode", json!("b25lIHR3byB0aHJlZQ=="), vec![]), json!("one two three"));
        assert!(matches!(call_err("base64_decode", json!("@@@"), vec![]), FilterError::Invalid(_)));
    }

    #[test]
    fn test_math() {
        assert_eq!(call("plus", json!(4), vec![json!(2)]), json!(6));
        assert_eq!(call("plus", json!("4"), vec![json!(2.5)]), json!(6.5));
        assert_eq!(call("minus", json!(4), vec![json!(6)]), json!(-2));
        assert_eq!(call("times", json!(3), vec![json!(4)]), json!(12));
        assert_eq!(call("divided_by", json!(7), vec![json!(2)]), json!(3));
        assert_eq!(call("divided_by", json!(-7), vec![json!(2)]), json!(-4));
        assert_eq!(call("divided_by", json!(7.0), vec![json!(2)]), json!(3.5));
        assert_eq!(call("modulo", json!(7), vec![json!(3)]), json!(1));
        assert_eq!(call("modulo", json!(-7), vec![json!(3)]), json!(2));
        assert_eq!(call("abs", json!(-17), vec![]), json!(17));
        assert_eq!(call("ceil", json!(1.2), vec![]), json!(2));
        assert_eq!(call("floor", json!(1.8), vec![]), json!(1));
        assert_eq!(call("round", json!(2.7), vec![]), json!(3));
        assert_eq!(call("round", json!(183.357), vec![json!(2)]), json!(183.36));
        assert_eq!(call("at_least", json!(4), vec![json!(5)]), json!(5));
        assert_eq!(call("at_most", json!(4), vec![json!(5)]), json!(4));
        assert_eq!(call("plus", Value::Null, vec![json!(1)]), json!(1));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(call_err("divided_by", json!(1), vec![json!(0)]), FilterError::Invalid("divided by 0".into()));
        assert!(matches!(call_err("modulo", json!(1), vec![json!(0.0)]), FilterError::Invalid(_)));
    }

    #[test]
    fn test_integer_overflow_falls_back_to_float() {
        assert_eq!(call("plus", json!(i64::MAX), vec![json!(1)]), json!(i64::MAX as f64 + 1.0));
    }

    #[test]
    fn test_default() {
        assert_eq!(call("default", Value::Null, vec![json!("x")]), json!("x"));
        assert_eq!(call("default", json!(""), vec![json!("x")]), json!("x"));
        assert_eq!(call("default", json!(false), vec![json!("x")]), json!("x"));
        assert_eq!(call("default", json!(0), vec![json!("x")]), json!(0));

        let mut args = FilterArgs::new(vec![json!("x")]);
        args.keyword.push(("allow_false".into(), json!(true)));
        assert_eq!(default(&json!(false), &args).unwrap(), json!(false));
    }

    #[test]
    fn test_collections() {
        assert_eq!(call("size", json!("héllo"), vec![]), json!(5));
        assert_eq!(call("size", json!([1, 2]), vec![]), json!(2));
        assert_eq!(call("size", Value::Null, vec![]), json!(0));
        assert_eq!(call("first", json!(["a", "b"]), vec![]), json!("a"));
        assert_eq!(call("last", json!(["a", "b"]), vec![]), json!("b"));
        assert_eq!(call("first", json!([]), vec![]), Value::Null);
        assert_eq!(call("join", json!(["a", 1, "c"]), vec![json!(", ")]), json!("a, 1, c"));
        assert_eq!(call("join", json!(["a", "b"]), vec![]), json!("a b"));
    }

    #[test]
    fn test_date() {
        assert_eq!(call("date", json!("2024-03-05T10:20:30Z"), vec![json!("%Y/%m/%d")]), json!("2024/03/05"));
        assert_eq!(call("date", json!("2024-03-05"), vec![json!("%b %d, %Y")]), json!("Mar 05, 2024"));
        assert_eq!(call("date", json!(0), vec![json!("%Y")]), json!("1970"));
        assert_eq!(call("date", json!("not a date"), vec![json!("%Y")]), json!("not a date"));
        assert_eq!(call("date", json!("2024-03-05"), vec![]), json!("2024-03-05"));
        assert!(matches!(call_err("date", json!("2024-03-05"), vec![json!("%Q")]), FilterError::Invalid(_)));
    }

    #[test]
    fn test_json() {
        assert_eq!(call("json", json!({"a": [1, "b"]}), vec![]), json!(r#"{"a":[1,"b"]}"#));
        assert_eq!(call("json", json!("x"), vec![]), json!("\"x\""));
    }

    #[test]
    fn test_budget_checked_before_growth() {
        let mut args = FilterArgs::new(vec![json!("a"), json!("0123456789")]);
        args.budget = 50;
        let err = replace(&json!("aaaaaaaaaa"), &args).unwrap_err();
        assert!(matches!(err, FilterError::OverBudget { .. }));
    }

    #[test]
    fn test_missing_required_argument() {
        assert!(matches!(call_err("append", json!("a"), vec![]), FilterError::Invalid(_)));
        assert!(matches!(call_err("slice", json!("a"), vec![]), FilterError::Invalid(_)));
    }
}
