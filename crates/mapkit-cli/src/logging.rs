//! Logging utilities for the Mapkit CLI
//!
//! This module provides:
//! - Structured logging setup (compact, full or JSON; console or file)
//! - Request ID generation and tracking
//! - Sensitive data redaction for logged payloads
//! - Performance timing spans

use crate::config;
use crate::error::{Error, Result};
use is_terminal::IsTerminal;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{field, Span};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Global request ID for the current session
static REQUEST_ID: OnceLock<String> = OnceLock::new();

/// Effective logging settings, after verbosity, config file and environment
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    /// Log level filter
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Enable console output
    pub console: bool,
    /// Optional file output path; replaces the console sink
    pub file: Option<PathBuf>,
    /// Include thread IDs
    pub thread_ids: bool,
    /// Include file and line numbers
    pub source_location: bool,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact format for production
    Compact,
    /// Full format with all details
    Full,
    /// JSON structured format
    Json,
}

impl LogFormat {
    fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "compact" => Some(LogFormat::Compact),
            "full" => Some(LogFormat::Full),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            console: true,
            file: None,
            thread_ids: false,
            source_location: false,
        }
    }
}

impl LogSettings {
    /// Create settings from verbosity level
    pub fn from_verbosity(verbosity: u8) -> Self {
        let mut settings = Self::default();

        match verbosity {
            0 => {}
            1 => {
                settings.level = "info".to_string();
            }
            2 => {
                settings.level = "debug".to_string();
                settings.source_location = true;
            }
            _ => {
                settings.level = "trace".to_string();
                settings.format = LogFormat::Full;
                settings.source_location = true;
                settings.thread_ids = true;
            }
        }

        settings
    }

    /// Apply the `logging` section of the configuration file
    pub fn merge_with_config(&mut self, config: &config::LoggingConfig) {
        if let Some(format) = LogFormat::parse(&config.format) {
            // -vvv asks for the full format regardless of the file
            if self.format != LogFormat::Full {
                self.format = format;
            }
        }
        if config.file.is_some() {
            self.file = config.file.clone();
        }
    }

    /// Apply environment overrides
    pub fn merge_with_env(&mut self) {
        self.merge_with(|name| std::env::var(name).ok());
    }

    fn merge_with(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(rust_log) = var("RUST_LOG") {
            self.level = rust_log;
        }

        if let Some(format) = var("MAPKIT_LOG_FORMAT") {
            match LogFormat::parse(&format) {
                Some(format) => self.format = format,
                None => eprintln!("Invalid log format: {}, using default", format),
            }
        }

        if let Some(file) = var("MAPKIT_LOG_FILE") {
            self.file = Some(PathBuf::from(file));
        }

        if let Some(console) = var("MAPKIT_LOG_CONSOLE") {
            self.console = console.to_lowercase() == "true" || console == "1";
        }
    }
}

/// Initialize the global logging system
///
/// The returned guard flushes the file sink when dropped and must be held
/// until the process exits.
pub fn init_logging(settings: LogSettings) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_new(&settings.level)
        .map_err(|e| Error::other(format!("Invalid log filter {}: {}", settings.level, e)))?;

    let (writer, guard, ansi) = match &settings.file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| Error::config(format!("Log file {} has no file name", path.display())))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(writer), Some(guard), false)
        }
        None if settings.console => (
            BoxMakeWriter::new(std::io::stderr),
            None,
            std::io::stderr().is_terminal(),
        ),
        None => (BoxMakeWriter::new(std::io::sink), None, false),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(settings.thread_ids)
        .with_file(settings.source_location)
        .with_line_number(settings.source_location);

    // Each format is a different subscriber type
    let installed = match settings.format {
        LogFormat::Compact => tracing::subscriber::set_global_default(builder.with_ansi(ansi).compact().finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.with_ansi(false).json().finish()),
        LogFormat::Full => tracing::subscriber::set_global_default(builder.with_ansi(ansi).finish()),
    };
    installed.map_err(|e| Error::other(format!("Failed to initialize logging: {}", e)))?;

    let request_id = REQUEST_ID.get_or_init(generate_request_id);

    tracing::debug!(
        request_id = %request_id,
        settings = ?settings,
        "Logging system initialized"
    );

    Ok(guard)
}

/// Generate a unique request ID for this session
pub fn generate_request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}

/// Get the current request ID
pub fn current_request_id() -> Option<&'static str> {
    REQUEST_ID.get().map(|s| s.as_str())
}

/// Create a span with request ID and timing
pub fn create_operation_span(operation: &str, details: Option<&str>) -> Span {
    tracing::info_span!(
        "operation",
        operation = operation,
        request_id = current_request_id().unwrap_or("unknown"),
        details = details.unwrap_or(""),
        duration_ms = field::Empty,
    )
}

/// Sensitive data redaction utilities
pub mod redaction {
    use regex::Regex;
    use serde_json::Value;
    use std::sync::OnceLock;

    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

    fn patterns() -> &'static [Regex] {
        PATTERNS.get_or_init(|| {
            [
                r#"(?i)(api[_-]?key|apikey|write[_-]?key)[=:\s]+['"]?([a-zA-Z0-9_-]{10,})['"]?"#,
                r#"(?i)(token|bearer)[=:\s]+['"]?([a-zA-Z0-9_.-]{10,})['"]?"#,
                r#"(?i)(password|passwd|pwd)[=:\s]+['"]?([^\s'"]{3,})['"]?"#,
            ]
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
        })
    }

    /// Redact sensitive information from a string
    pub fn redact_sensitive(input: &str) -> String {
        patterns().iter().fold(input.to_string(), |acc, regex| {
            regex.replace_all(&acc, "$1=***").into_owned()
        })
    }

    /// Redact sensitive information from JSON values
    pub fn redact_json_value(value: &mut Value) {
        match value {
            Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    if is_sensitive_key(key) {
                        *val = Value::String("***".to_string());
                    } else {
                        redact_json_value(val);
                    }
                }
            }
            Value::Array(arr) => arr.iter_mut().for_each(redact_json_value),
            Value::String(s) => *s = redact_sensitive(s),
            _ => {}
        }
    }

    fn is_sensitive_key(key: &str) -> bool {
        let key_lower = key.to_lowercase();
        ["apikey", "api_key", "writekey", "write_key", "token", "password", "passwd", "secret", "credential", "authorization"]
            .iter()
            .any(|needle| key_lower.contains(needle))
    }
}

/// Performance timing utilities
pub mod timing {
    use std::time::{Duration, Instant};
    use tracing::Span;

    /// A timer that logs its duration when dropped
    pub struct Timer {
        start: Instant,
        span: Span,
        operation: String,
    }

    impl Timer {
        pub fn new(operation: &str) -> Self {
            Self::build(operation, None)
        }

        pub fn with_details(operation: &str, details: &str) -> Self {
            Self::build(operation, Some(details))
        }

        fn build(operation: &str, details: Option<&str>) -> Self {
            Self {
                start: Instant::now(),
                span: super::create_operation_span(operation, details),
                operation: operation.to_string(),
            }
        }

        /// Get elapsed time without finishing the timer
        pub fn elapsed(&self) -> Duration {
            self.start.elapsed()
        }
    }

    impl Drop for Timer {
        fn drop(&mut self) {
            let duration = self.start.elapsed();
            self.span.record("duration_ms", duration.as_millis() as u64);

            tracing::debug!(
                operation = %self.operation,
                duration_ms = duration.as_millis() as u64,
                "Operation completed"
            );
        }
    }
}
