//! Configuration management for the CLI
//!
//! Configuration is loaded from, in order of precedence:
//! - the file named by `--config` or `MAPKIT_CONFIG`
//! - `.mapkit.{yaml,yml,json,toml}` in the current directory
//! - `mapkit/config.{yaml,json,toml}` in the user config directory
//! - `.mapkit.{yaml,json,toml}` in the home directory
//!
//! Command-line flags are applied on top by the handlers.

use crate::error::{Error, Result};
use mapkit_core::{ResolveOptions, SandboxLimits};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Template sandbox ceilings
    pub sandbox: SandboxLimits,

    /// Mapping compilation and resolution options
    pub resolve: ResolveOptions,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// File this configuration was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Show progress indicators
    pub progress: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log format (compact, full, json)
    pub format: String,

    /// Log file path
    pub file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { progress: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "compact".to_string(),
            file: None,
        }
    }
}

/// Supported configuration file syntaxes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    Yaml,
    Json,
    Toml,
}

impl Syntax {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Syntax::Yaml,
            Some("toml") => Syntax::Toml,
            _ => Syntax::Json,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;

        let mut config: Config = match Syntax::of(path) {
            Syntax::Yaml => serde_yaml::from_str(&content)?,
            Syntax::Json => serde_json::from_str(&content)?,
            Syntax::Toml => toml::from_str(&content).map_err(|e| Error::InvalidFormat {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?,
        };

        config.validate()?;
        config.source = Some(path.to_path_buf());
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        for path in Self::default_config_paths() {
            if path.exists() {
                match Self::from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "ignoring unreadable configuration");
                    }
                }
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file or default locations
    pub fn load_with_file(file: Option<&Path>) -> Result<Self> {
        if let Some(path) = file {
            Self::from_file(path)
        } else {
            Self::load()
        }
    }

    /// Check the values that the type system cannot
    pub fn validate(&self) -> Result<()> {
        self.sandbox.validate().map_err(Error::config)?;
        if self.resolve.max_depth == 0 {
            return Err(Error::config("resolve.max_depth cannot be zero"));
        }
        match self.logging.format.as_str() {
            "compact" | "full" | "json" => Ok(()),
            other => Err(Error::config(format!(
                "logging.format must be compact, full or json but it is {}",
                other
            ))),
        }
    }

    /// Get default configuration file paths to check
    pub fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from(".mapkit.yaml"),
            PathBuf::from(".mapkit.yml"),
            PathBuf::from(".mapkit.json"),
            PathBuf::from(".mapkit.toml"),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            let mapkit_dir = config_dir.join("mapkit");
            paths.push(mapkit_dir.join("config.yaml"));
            paths.push(mapkit_dir.join("config.json"));
            paths.push(mapkit_dir.join("config.toml"));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".mapkit.yaml"));
            paths.push(home_dir.join(".mapkit.json"));
            paths.push(home_dir.join(".mapkit.toml"));
        }

        paths
    }

    /// Render the configuration as YAML, JSON or TOML
    pub fn to_string_as(&self, format: crate::cli::ConfigFormat) -> Result<String> {
        use crate::cli::ConfigFormat;

        Ok(match format {
            ConfigFormat::Yaml => serde_yaml::to_string(self)?,
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ConfigFormat;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::Builder;

    fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sandbox, SandboxLimits::default());
        assert!(config.resolve.escape_templates);
        assert!(!config.resolve.fail_soft_render);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_config() {
        let file = write_config(
            ".yaml",
            "sandbox:\n  render_timeout_ms: 250\nresolve:\n  fail_soft_render: true\n",
        );
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.sandbox.render_timeout, Duration::from_millis(250));
        assert_eq!(config.sandbox.max_template_length, 1000);
        assert!(config.resolve.fail_soft_render);
        assert_eq!(config.source.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_toml_config() {
        let file = write_config(".toml", "[resolve]\nescape_templates = false\n\n[logging]\nformat = \"json\"\n");
        let config = Config::from_file(file.path()).unwrap();
        assert!(!config.resolve.escape_templates);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_json_config() {
        let file = write_config(".json", r#"{"sandbox": {"max_template_length": 20}}"#);
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.sandbox.max_template_length, 20);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let file = write_config(".yaml", "sandbox:\n  memory_limit: 0\n");
        assert!(matches!(Config::from_file(file.path()), Err(Error::Config(_))));

        let file = write_config(".yaml", "logging:\n  format: xml\n");
        assert!(matches!(Config::from_file(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load_with_file(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_show_round_trips_through_every_format() {
        let config = Config::default();
        for format in [ConfigFormat::Yaml, ConfigFormat::Json, ConfigFormat::Toml] {
            let text = config.to_string_as(format).unwrap();
            assert!(text.contains("render_timeout_ms"), "{:?}: {}", format, text);
        }
    }
}
