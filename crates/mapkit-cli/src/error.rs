//! Error types and handling for the CLI
//!
//! Every failure mode maps to a distinct process exit code so scripts can
//! tell an invalid mapping from a sandbox violation or a missing file.

use mapkit_core::FailureReason;
use std::io;
use std::path::PathBuf;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for CLI operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Error from mapkit-core
    #[error("{0}")]
    Core(#[from] mapkit_core::Error),

    /// File not found
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Invalid file format
    #[error("Invalid file format for {}: {}", path.display(), message)]
    InvalidFormat { path: PathBuf, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument combination
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// `mapkit validate` found authoring errors
    #[error("Validation failed with {count} error(s)")]
    ValidationFailed { count: usize },

    /// Some events of a batch could not be resolved
    #[error("{failed} of {total} events failed")]
    BatchFailed { failed: usize, total: usize },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML serialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// Generic error with context
    #[error("{message}")]
    Other { message: String },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid arguments error
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArgs(message.into())
    }

    /// Create a generic error with message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) => 1,
            Self::Core(core) => core_exit_code(core),
            Self::FileNotFound { .. } => 3,
            Self::InvalidFormat { .. } => 4,
            Self::Config(_) => 5,
            Self::InvalidArgs(_) => 6,
            Self::ValidationFailed { .. } => 2,
            Self::BatchFailed { .. } => 7,
            Self::Json(_) => 12,
            Self::Yaml(_) => 13,
            Self::Toml(_) => 14,
            Self::Other { .. } => 99,
        }
    }

    /// Check if this error should display usage help
    pub fn should_show_help(&self) -> bool {
        matches!(self, Self::InvalidArgs(_))
    }
}

fn core_exit_code(error: &mapkit_core::Error) -> i32 {
    use mapkit_core::Error as Core;

    match error {
        Core::InvalidMapping { .. } => 2,
        Core::Payload { .. } => 4,
        Core::Configuration { .. } => 5,
        Core::Json { .. } => 12,
        _ => match error.failure_reason() {
            Some(FailureReason::GenericRenderError) | None => 8,
            Some(_) => 9,
        },
    }
}

/// Extension trait for displaying errors with context
pub trait ErrorContext<T> {
    /// Add context with a closure (only evaluated on error)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other {
                message: format!("{}: {}", f(), inner),
            }
        })
    }
}

/// Format an error for display to the user
pub fn format_error(error: &Error, use_color: bool) -> String {
    let mut message = if use_color {
        use colored::Colorize;
        format!("{} {}", "Error:".red().bold(), error)
    } else {
        format!("Error: {}", error)
    };

    // One line per authoring error reads better than the joined message
    if let Error::Core(core) = error {
        let errors = core.mapping_errors();
        if !errors.is_empty() {
            message = format!("Error: mapping has {} error(s)", errors.len());
            for item in errors {
                message.push_str(&format!("\n  - {}", item));
            }
        }
    }

    message
}
