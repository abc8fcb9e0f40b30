// Tests for output formatting
//
// Writers are pointed at a shared in-memory buffer so the exact bytes that
// would reach stdout can be asserted.

use super::*;
use mapkit_core::Mapping;
use serde_json::json;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn writer(format: OutputFormat, quiet: bool) -> (OutputWriter, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let writer = OutputWriter::with_writer(format, false, quiet, Box::new(buffer.clone()));
    (writer, buffer)
}

fn mapping_errors() -> Vec<MappingError> {
    Mapping::compile(&json!({"a": {"@nope": 1}, "b": {"@if": {"then": 1}}}))
        .unwrap_err()
        .mapping_errors()
        .to_vec()
}

#[test]
fn test_data_formats() {
    let value = json!({"b": 1, "a": [true]});

    let (mut out, buffer) = writer(OutputFormat::Json, false);
    out.data(&value).unwrap();
    assert_eq!(buffer.contents(), "{\"a\":[true],\"b\":1}\n");

    let (mut out, buffer) = writer(OutputFormat::Yaml, false);
    out.data(&value).unwrap();
    assert_eq!(buffer.contents(), "a:\n- true\nb: 1\n");

    let (mut out, buffer) = writer(OutputFormat::JsonPretty, false);
    out.data(&json!([1])).unwrap();
    assert_eq!(buffer.contents(), "[\n  1\n]\n");
}

#[test]
fn test_messages_only_in_human_format() {
    let (mut out, buffer) = writer(OutputFormat::Json, false);
    out.info("hello").unwrap();
    out.success("done").unwrap();
    out.warning("careful").unwrap();
    out.section("Title").unwrap();
    assert_eq!(buffer.contents(), "");

    let (mut out, buffer) = writer(OutputFormat::Human, false);
    out.info("hello").unwrap();
    out.warning("careful").unwrap();
    assert_eq!(buffer.contents(), "INFO: hello\nWARNING: careful\n");
}

#[test]
fn test_quiet_suppresses_chatter_but_not_data() {
    let (mut out, buffer) = writer(OutputFormat::Human, true);
    out.info("hello").unwrap();
    out.success("done").unwrap();
    out.data(&json!(1)).unwrap();
    assert_eq!(buffer.contents(), "1\n");
}

#[test]
fn test_validation_report_human() {
    let report = ValidationReport::failed(&mapping_errors());
    let (mut out, buffer) = writer(OutputFormat::Human, false);
    out.validation_report(&report).unwrap();

    let text = buffer.contents();
    assert!(text.starts_with("❌ Mapping is invalid - 2 error(s)"), "{}", text);
    assert!(text.contains("1. 📍 /a\n"));
    assert!(text.contains("2. 📍 /b/@if\n"));
    assert!(text.contains("should have field exists"));
}

#[test]
fn test_validation_report_json() {
    let report = ValidationReport::failed(&mapping_errors());
    let (mut out, buffer) = writer(OutputFormat::Json, false);
    out.validation_report(&report).unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&buffer.contents()).unwrap();
    assert_eq!(parsed["valid"], false);
    assert_eq!(parsed["errors"][0]["location"], "/a");
    assert_eq!(parsed["errors"][0]["message"], "/a has an invalid directive: @nope");
}

#[test]
fn test_validation_report_passed() {
    let (mut out, buffer) = writer(OutputFormat::Human, false);
    out.validation_report(&ValidationReport::passed(3)).unwrap();
    assert_eq!(buffer.contents(), "✅ Mapping is valid (3 directive(s))\n");
}

#[test]
fn test_table() {
    let (mut out, buffer) = writer(OutputFormat::Human, false);
    out.table(
        &["Line", "Status"],
        vec![
            vec!["1".to_string(), "ok".to_string()],
            vec!["2".to_string(), "failed".to_string()],
        ],
    )
    .unwrap();

    let text = buffer.contents();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Line │ Status");
    assert_eq!(lines[2], "1    │ ok");
    assert_eq!(lines[3], "2    │ failed");
}

#[test]
fn test_no_progress_with_custom_writer() {
    let (out, _) = writer(OutputFormat::Human, false);
    assert!(out.spinner("working").is_none());
    assert!(out.progress_bar(10, "working").is_none());
}
