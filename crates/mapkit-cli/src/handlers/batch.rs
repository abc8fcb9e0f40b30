//! Batch command handler
//!
//! Events are read from a newline-delimited JSON file and resolved on the
//! blocking pool, at most `--concurrency` at a time. Results are written in
//! input order, one JSON object per event; a failing event produces an
//! `error` line and does not stop the batch.

use super::utils::{build_sandbox, compile_mapping, read_document, read_text, resolve_event, resolve_options};
use crate::cli::BatchArgs;
use crate::config::Config;
use crate::error::{Error, ErrorContext, Result};
use crate::logging::timing::Timer;
use crate::output::OutputWriter;
use mapkit_core::{Mapping, ResolveOptions, Resolver, TemplateSandbox};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// One line of batch output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchLine {
    /// 1-based line number in the events file
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<LineError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BatchLine {
    fn resolved(line: usize, output: Value) -> Self {
        Self {
            line,
            output: Some(output),
            error: None,
        }
    }

    fn failed(line: usize, message: String, reason: Option<String>) -> Self {
        Self {
            line,
            output: None,
            error: Some(LineError { message, reason }),
        }
    }

    fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Shared, read-only state handed to every worker
struct Job {
    mapping: Mapping,
    sandbox: TemplateSandbox,
    options: ResolveOptions,
}

impl Job {
    fn run(&self, line: usize, text: &str) -> BatchLine {
        let event: Value = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => return BatchLine::failed(line, format!("invalid JSON: {}", e), None),
        };

        let resolver = Resolver::new()
            .with_sandbox(&self.sandbox)
            .with_options(self.options.clone());
        match resolve_event(&self.mapping, &event, &resolver, false) {
            Ok(output) => BatchLine::resolved(line, output),
            Err(e) => BatchLine::failed(line, e.to_string(), e.failure_reason().map(|r| r.to_string())),
        }
    }
}

enum Sink {
    Output,
    File(BufWriter<File>),
}

impl Sink {
    fn emit(&mut self, output: &mut OutputWriter, line: &BatchLine) -> Result<()> {
        let json = serde_json::to_string(line)?;
        match self {
            Sink::Output => output.writeln(&json),
            Sink::File(writer) => Ok(writeln!(writer, "{}", json)?),
        }
    }

    fn finish(self) -> Result<()> {
        if let Sink::File(mut writer) = self {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Non-empty lines with their 1-based line numbers
fn event_lines(content: &str) -> Vec<(usize, String)> {
    content
        .lines()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(index, text)| (index + 1, text.to_string()))
        .collect()
}

async fn join(line: usize, handle: JoinHandle<BatchLine>) -> BatchLine {
    match handle.await {
        Ok(result) => result,
        Err(e) => BatchLine::failed(line, format!("worker failed: {}", e), None),
    }
}

/// Handle the batch command
#[instrument(skip(config, output), fields(mapping = %args.mapping.display(), events = %args.events.display()))]
pub async fn handle_batch(args: BatchArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let _timer = Timer::with_details("batch_command", &args.events.display().to_string());
    if args.concurrency == 0 {
        return Err(Error::invalid_args("--concurrency must be at least 1"));
    }

    let options = resolve_options(config, &args.flags);
    let sandbox = build_sandbox(config.sandbox.clone())?;
    let mapping = compile_mapping(&read_document(&args.mapping)?, &sandbox, options.max_depth)?;
    let job = Arc::new(Job {
        mapping,
        sandbox,
        options,
    });

    let content = read_text(&args.events).with_context(|| format!("reading events from {}", args.events.display()))?;
    let lines = event_lines(&content);
    let total = lines.len();
    info!(total, concurrency = args.concurrency, "Starting batch");

    let mut sink = match &args.save_to {
        Some(path) => Sink::File(BufWriter::new(File::create(path)?)),
        None => Sink::Output,
    };
    let progress = output.progress_bar(total as u64, "resolving events");

    let mut pending: VecDeque<(usize, JoinHandle<BatchLine>)> = VecDeque::with_capacity(args.concurrency);
    let mut failed = 0;

    let mut record = |result: BatchLine, output: &mut OutputWriter, sink: &mut Sink| -> Result<()> {
        if result.is_error() {
            failed += 1;
            debug!(line = result.line, "event failed");
        }
        if let Some(pb) = &progress {
            pb.inc(1);
        }
        sink.emit(output, &result)
    };

    for (line, text) in lines {
        if pending.len() >= args.concurrency {
            if let Some((done, handle)) = pending.pop_front() {
                record(join(done, handle).await, &mut *output, &mut sink)?;
            }
        }
        let job = Arc::clone(&job);
        pending.push_back((line, tokio::task::spawn_blocking(move || job.run(line, &text))));
    }
    while let Some((done, handle)) = pending.pop_front() {
        record(join(done, handle).await, &mut *output, &mut sink)?;
    }

    sink.finish()?;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if let Some(path) = &args.save_to {
        output.section("Batch Summary")?;
        output.table(
            &["Events", "Resolved", "Failed"],
            vec![vec![total.to_string(), (total - failed).to_string(), failed.to_string()]],
        )?;
        output.success(&format!("✓ Output saved to {}", path.display()))?;
    }

    if failed > 0 {
        warn!(failed, total, "Batch finished with failures");
        return Err(Error::BatchFailed { failed, total });
    }
    info!(total, "Batch finished");
    Ok(())
}
