//! Render command handler

use super::utils::{build_sandbox, read_document, read_text};
use crate::cli::{OutputFormat, RenderArgs};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::timing::Timer;
use crate::output::OutputWriter;
use mapkit_core::template::Evaluation;
use mapkit_core::SandboxLimits;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{instrument, warn};

/// Machine-readable outcome of a render
#[derive(Debug, Serialize)]
struct RenderReport {
    status: &'static str,
    output: Option<String>,
    reason: Option<String>,
    error: Option<String>,
    elapsed_ms: u64,
}

impl From<&Evaluation> for RenderReport {
    fn from(evaluation: &Evaluation) -> Self {
        Self {
            status: if evaluation.failure().is_some() { "failed" } else { "done" },
            output: evaluation.output.clone(),
            reason: evaluation.failure().map(|reason| reason.to_string()),
            error: evaluation.error.as_ref().map(ToString::to_string),
            elapsed_ms: evaluation.elapsed.as_millis() as u64,
        }
    }
}

/// Configuration limits with command-line overrides applied
fn effective_limits(config: &Config, args: &RenderArgs) -> SandboxLimits {
    let mut limits = config.sandbox.clone();
    if let Some(ms) = args.timeout_ms {
        limits = limits.with_render_timeout(Duration::from_millis(ms));
    }
    if let Some(chars) = args.max_length {
        limits = limits.with_max_template_length(chars);
    }
    if let Some(bytes) = args.memory_limit {
        limits = limits.with_memory_limit(bytes);
    }
    limits
}

/// Handle the render command
#[instrument(skip(config, output), fields(template = ?args.template))]
pub async fn handle_render(args: RenderArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let _timer = Timer::new("render_command");
    let sandbox = build_sandbox(effective_limits(config, &args))?;

    let source = match (&args.inline, &args.template) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => read_text(path)?,
        (None, None) => return Err(Error::invalid_args("either TEMPLATE or --inline is required")),
    };
    let context = match &args.context {
        Some(path) => read_document(path)?,
        None => Value::Object(Default::default()),
    };

    let evaluation = sandbox.run(&Value::String(source), &context);

    if output.format() != OutputFormat::Human {
        output.data(&RenderReport::from(&evaluation))?;
    }

    match evaluation.into_result() {
        Ok(rendered) => {
            if output.format() == OutputFormat::Human {
                output.writeln(&rendered)?;
            }
            Ok(())
        }
        Err(error) => {
            warn!(reason = %error.reason(), "template evaluation failed");
            Err(mapkit_core::Error::from(error).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapkit_core::FailureReason;
    use std::fs;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn inline(source: &str) -> RenderArgs {
        RenderArgs {
            template: None,
            inline: Some(source.to_string()),
            context: None,
            timeout_ms: None,
            max_length: None,
            memory_limit: None,
        }
    }

    async fn render(args: RenderArgs, format: OutputFormat) -> (Result<()>, String) {
        let captured = Captured::default();
        let mut output = OutputWriter::with_writer(format, false, false, Box::new(captured.clone()));
        let result = handle_render(args, &Config::default(), &mut output).await;
        let text = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        (result, text)
    }

    #[tokio::test]
    async fn test_render_with_context_file() {
        let dir = TempDir::new().unwrap();
        let context = dir.path().join("event.json");
        fs::write(&context, r#"{"name": "ada"}"#).unwrap();

        let mut args = inline("Hello {{ name | capitalize }}");
        args.context = Some(context);
        let (result, text) = render(args, OutputFormat::Human).await;
        assert!(result.is_ok());
        assert_eq!(text, "Hello Ada\n");
    }

    #[tokio::test]
    async fn test_render_report_on_failure() {
        let mut args = inline("{{ 'abcdef' }}");
        args.max_length = Some(5);
        let (result, text) = render(args, OutputFormat::Json).await;

        let err = result.unwrap_err();
        match &err {
            Error::Core(core) => assert_eq!(core.failure_reason(), Some(FailureReason::ParseTooLong)),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(err.exit_code(), 9);

        let report: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(report["status"], "failed");
        assert_eq!(report["reason"], "parse_too_long");
        assert_eq!(report["output"], Value::Null);
    }

    #[tokio::test]
    async fn test_render_from_file() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("greeting.liquid");
        fs::write(&template, "{% assign x = 2 %}{{ x | plus: 1 }}").unwrap();

        let mut args = inline("");
        args.inline = None;
        args.template = Some(template);
        let (result, text) = render(args, OutputFormat::Json).await;
        assert!(result.is_ok());
        let report: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(report["output"], "3");
        assert_eq!(report["status"], "done");
    }

    #[test]
    fn test_limit_overrides() {
        let mut args = inline("x");
        args.timeout_ms = Some(50);
        args.memory_limit = Some(1024);
        let limits = effective_limits(&Config::default(), &args);
        assert_eq!(limits.render_timeout, Duration::from_millis(50));
        assert_eq!(limits.memory_limit, 1024);
        assert_eq!(limits.max_template_length, 1000);
    }
}
