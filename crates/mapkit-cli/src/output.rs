//! Output formatting and writing utilities
//!
//! This module formats results in JSON, YAML or a human-readable layout,
//! lists mapping errors, and drives progress indicators.

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::logging::redaction;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use is_terminal::IsTerminal;
use mapkit_core::MappingError;
use serde::Serialize;
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, trace};

/// One authoring or resolution error, ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub location: String,
    pub message: String,
}

impl From<&MappingError> for ErrorEntry {
    fn from(error: &MappingError) -> Self {
        Self {
            location: error.location().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result of `mapkit validate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub directives: usize,
    pub errors: Vec<ErrorEntry>,
}

impl ValidationReport {
    pub fn passed(directives: usize) -> Self {
        Self {
            valid: true,
            directives,
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: &[MappingError]) -> Self {
        Self {
            valid: false,
            directives: 0,
            errors: errors.iter().map(ErrorEntry::from).collect(),
        }
    }
}

/// Trait for formatting output with specialized support for common types
pub trait OutputFormatter {
    /// Format a serializable value
    fn format<T: Serialize>(&self, value: &T) -> Result<String>;

    /// Format a validation report
    fn format_validation_report(&self, report: &ValidationReport) -> Result<String>;
}

impl OutputFormatter for OutputFormat {
    fn format<T: Serialize>(&self, value: &T) -> Result<String> {
        match self {
            OutputFormat::Json => Ok(serde_json::to_string(value)?),
            OutputFormat::JsonPretty | OutputFormat::Human => Ok(serde_json::to_string_pretty(value)?),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?.trim_end().to_string()),
        }
    }

    fn format_validation_report(&self, report: &ValidationReport) -> Result<String> {
        match self {
            OutputFormat::Human => Ok(format_validation_report_human(report)),
            _ => self.format(report),
        }
    }
}

/// Output writer that handles different output formats and colors
pub struct OutputWriter {
    format: OutputFormat,
    use_color: bool,
    show_progress: bool,
    quiet: bool,
    writer: Box<dyn Write + Send>,
}

impl OutputWriter {
    /// Create a new output writer
    pub fn new(format: OutputFormat, use_color: bool, quiet: bool) -> Self {
        Self {
            format,
            use_color,
            show_progress: !quiet && io::stderr().is_terminal(),
            quiet,
            writer: Box::new(io::stdout()),
        }
    }

    /// Create an output writer with a custom writer
    pub fn with_writer(format: OutputFormat, use_color: bool, quiet: bool, writer: Box<dyn Write + Send>) -> Self {
        Self {
            format,
            use_color,
            show_progress: false,
            quiet,
            writer,
        }
    }

    /// Get the output format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Turn progress indicators off, e.g. from configuration
    pub fn disable_progress(&mut self) {
        self.show_progress = false;
    }

    /// Write a line of output
    pub fn writeln(&mut self, content: &str) -> Result<()> {
        writeln!(self.writer, "{}", content)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write an info message
    pub fn info(&mut self, message: &str) -> Result<()> {
        debug!("Output info: {}", message);

        if self.quiet || self.format != OutputFormat::Human {
            return Ok(());
        }
        if self.use_color {
            self.writeln(&format!("{} {}", "ℹ".blue(), message))
        } else {
            self.writeln(&format!("INFO: {}", message))
        }
    }

    /// Write a success message
    pub fn success(&mut self, message: &str) -> Result<()> {
        if self.quiet || self.format != OutputFormat::Human {
            return Ok(());
        }
        if self.use_color {
            self.writeln(&message.green().to_string())
        } else {
            self.writeln(message)
        }
    }

    /// Write a warning message
    pub fn warning(&mut self, message: &str) -> Result<()> {
        if self.format != OutputFormat::Human {
            return Ok(());
        }
        if self.use_color {
            self.writeln(&message.yellow().to_string())
        } else {
            self.writeln(&format!("WARNING: {}", message))
        }
    }

    /// Write a section header
    pub fn section(&mut self, title: &str) -> Result<()> {
        if self.quiet || self.format != OutputFormat::Human {
            return Ok(());
        }
        self.writeln("")?;
        if self.use_color {
            self.writeln(&format!("═══ {} ═══", title).bright_blue().to_string())
        } else {
            self.writeln(&format!("=== {} ===", title))
        }
    }

    /// Write data in the configured format
    pub fn data<T: Serialize>(&mut self, value: &T) -> Result<()> {
        if tracing::enabled!(tracing::Level::TRACE) {
            let mut redacted = serde_json::to_value(value)?;
            redaction::redact_json_value(&mut redacted);
            trace!(data = %redacted, "Outputting data");
        }

        let formatted = self.format.format(value)?;
        self.writeln(&formatted)
    }

    /// Write a validation report
    pub fn validation_report(&mut self, report: &ValidationReport) -> Result<()> {
        let formatted = self.format.format_validation_report(report)?;
        let formatted = if self.use_color && self.format == OutputFormat::Human {
            colorize_report(&formatted, report.valid)
        } else {
            formatted
        };
        self.writeln(formatted.trim_end())
    }

    /// Create a progress bar for long operations
    pub fn progress_bar(&self, length: u64, message: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = ProgressBar::new(length);
        pb.set_style(default_progress_style());
        pb.set_message(message.to_string());
        Some(pb)
    }

    /// Create a spinner for indeterminate progress
    pub fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(default_spinner_style());
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }

    /// Write a table (for human format)
    pub fn table(&mut self, headers: &[&str], rows: Vec<Vec<String>>) -> Result<()> {
        if self.quiet || self.format != OutputFormat::Human {
            return Ok(());
        }

        let mut widths = headers.iter().map(|h| h.chars().count()).collect::<Vec<_>>();
        for row in &rows {
            for (i, cell) in row.iter().enumerate().take(widths.len()) {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let header_row = headers
            .iter()
            .enumerate()
            .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
            .collect::<Vec<_>>()
            .join(" │ ");

        if self.use_color {
            self.writeln(&header_row.bold().to_string())?;
        } else {
            self.writeln(&header_row)?;
        }

        let separator = widths.iter().map(|w| "─".repeat(*w)).collect::<Vec<_>>().join("─┼─");
        self.writeln(&separator)?;

        for row in rows {
            let row_str = row
                .iter()
                .enumerate()
                .map(|(i, cell)| match widths.get(i) {
                    Some(width) => format!("{:width$}", cell, width = width),
                    None => cell.clone(),
                })
                .collect::<Vec<_>>()
                .join(" │ ");
            self.writeln(row_str.trim_end())?;
        }

        Ok(())
    }
}

/// Helper function to create a progress bar style
pub fn default_progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Helper function to create a spinner style
pub fn default_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn format_validation_report_human(report: &ValidationReport) -> String {
    let mut output = String::new();

    if report.valid {
        output.push_str(&format!("✅ Mapping is valid ({} directive(s))\n", report.directives));
        return output;
    }

    output.push_str(&format!("❌ Mapping is invalid - {} error(s)\n\n", report.errors.len()));
    for (i, entry) in report.errors.iter().enumerate() {
        output.push_str(&format!("{}. 📍 {}\n", i + 1, entry.location));
        output.push_str(&format!("   💬 {}\n", entry.message));
    }

    output
}

fn colorize_report(text: &str, valid: bool) -> String {
    let mut lines = text.lines();
    let Some(headline) = lines.next() else {
        return String::new();
    };
    let headline = if valid {
        headline.green().bold().to_string()
    } else {
        headline.red().bold().to_string()
    };
    std::iter::once(headline)
        .chain(lines.map(str::to_string))
        .collect::<Vec<_>>()
        .join("\n")
}
