//! Command-line interface argument parsing and definitions
//!
//! This module defines the CLI structure using clap's derive API.

use clap::{Parser, Subcommand, ValueEnum};
use is_terminal::IsTerminal;
use std::path::PathBuf;

/// Mapkit CLI - Declarative payload mapping and sandboxed templates
///
/// Validate mappings, resolve them against events (one at a time or in
/// batches), and render Liquid templates inside the sandbox.
#[derive(Parser, Debug)]
#[command(
    name = "mapkit",
    version,
    author,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Enable verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "MAPKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(short, long, value_enum, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a mapping against a single event
    Resolve(ResolveArgs),

    /// Compile a mapping and list every authoring error
    Validate(ValidateArgs),

    /// Render a Liquid template inside the sandbox
    Render(RenderArgs),

    /// Resolve a mapping against every event of an NDJSON file
    Batch(BatchArgs),

    /// Inspect configuration
    Config(ConfigArgs),

    /// Generate shell completions for the specified shell
    Completions(CompletionsArgs),
}

/// Options shared by the commands that resolve mappings
#[derive(Parser, Debug, Clone, Default)]
pub struct ResolveFlags {
    /// Do not HTML-escape `@template` interpolations
    #[arg(long)]
    pub no_escape: bool,

    /// Render "error" instead of failing when a template errors at render time
    #[arg(long)]
    pub fail_soft: bool,

    /// Maximum nesting depth of the mapping
    #[arg(long, value_name = "DEPTH")]
    pub max_depth: Option<usize>,
}

/// Arguments for the resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Path to the mapping file (JSON or YAML)
    #[arg(value_name = "MAPPING")]
    pub mapping: PathBuf,

    /// Path to the event file (JSON or YAML), `-` for stdin
    #[arg(value_name = "EVENT")]
    pub event: PathBuf,

    #[command(flatten)]
    pub flags: ResolveFlags,

    /// Accept any JSON document as the event, not only objects
    #[arg(long)]
    pub any_context: bool,

    /// Output file path (stdout if not specified)
    #[arg(long = "save-to", value_name = "OUTPUT_FILE")]
    pub save_to: Option<PathBuf>,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to the mapping file (JSON or YAML)
    #[arg(value_name = "MAPPING")]
    pub mapping: PathBuf,

    /// Maximum nesting depth of the mapping
    #[arg(long, value_name = "DEPTH")]
    pub max_depth: Option<usize>,
}

/// Arguments for the render command
#[derive(Parser, Debug)]
pub struct RenderArgs {
    /// Path to a file holding the template source
    #[arg(value_name = "TEMPLATE", required_unless_present = "inline", conflicts_with = "inline")]
    pub template: Option<PathBuf>,

    /// Template source given on the command line
    #[arg(short, long, value_name = "SOURCE")]
    pub inline: Option<String>,

    /// Path to the context document (JSON or YAML)
    #[arg(long, value_name = "CONTEXT")]
    pub context: Option<PathBuf>,

    /// Render time budget in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Maximum template length in characters
    #[arg(long, value_name = "CHARS")]
    pub max_length: Option<usize>,

    /// Memory ceiling in bytes
    #[arg(long, value_name = "BYTES")]
    pub memory_limit: Option<usize>,
}

/// Arguments for the batch command
#[derive(Parser, Debug, Clone)]
pub struct BatchArgs {
    /// Path to the mapping file (JSON or YAML)
    #[arg(value_name = "MAPPING")]
    pub mapping: PathBuf,

    /// Path to a newline-delimited JSON file of events, `-` for stdin
    #[arg(value_name = "EVENTS")]
    pub events: PathBuf,

    /// Number of events resolved at once
    #[arg(short = 'j', long, default_value = "4")]
    pub concurrency: usize,

    #[command(flatten)]
    pub flags: ResolveFlags,

    /// Output file path (stdout if not specified)
    #[arg(long = "save-to", value_name = "OUTPUT_FILE")]
    pub save_to: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show(ConfigShowArgs),

    /// Show which configuration file is in use
    Path,
}

/// Arguments for config show
#[derive(Parser, Debug)]
pub struct ConfigShowArgs {
    /// Show configuration in specified format
    #[arg(short, long, value_enum, default_value = "yaml")]
    pub format: ConfigFormat,
}

/// Configuration file formats
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Arguments for generating shell completions
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Output format options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Human,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Pretty-printed JSON output
    JsonPretty,
}

/// Supported shells for completion generation
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective verbosity level (considering quiet flag)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Check if colored output should be used
    pub fn use_color(&self) -> bool {
        !self.no_color && std::io::stdout().is_terminal()
    }
}

impl Shell {
    /// Convert to clap_complete shell type
    pub fn to_clap_shell(self) -> clap_complete::Shell {
        match self {
            Shell::Bash => clap_complete::Shell::Bash,
            Shell::Zsh => clap_complete::Shell::Zsh,
            Shell::Fish => clap_complete::Shell::Fish,
            Shell::PowerShell => clap_complete::Shell::PowerShell,
            Shell::Elvish => clap_complete::Shell::Elvish,
        }
    }
}
