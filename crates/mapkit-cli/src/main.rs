//! Mapkit CLI - Command-line interface for declarative payload mapping
//!
//! This is the main entry point for the `mapkit` binary, providing commands
//! for validating and resolving mappings and for rendering sandboxed
//! templates.

mod cli;
mod config;
mod error;
mod handlers;
mod logging;
mod output;

use cli::{Cli, Commands};
use colored::control;
use config::Config;
use error::Result;
use logging::{timing::Timer, LogSettings};
use output::OutputWriter;
use std::process;
use tracing::instrument;
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    control::set_override(cli.use_color());

    // Logging settings come partly from the config file, so load it first
    let config = match Config::load_with_file(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => exit_with(e),
    };

    let _guard = match init_logging(&cli, &config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    if let Err(e) = run(cli, config).await {
        exit_with(e);
    }
}

fn exit_with(e: error::Error) -> ! {
    eprintln!("{}", error::format_error(&e, control::SHOULD_COLORIZE.should_colorize()));

    if e.should_show_help() {
        eprintln!("\nFor more information, try '--help'");
    }

    process::exit(e.exit_code());
}

/// Main application logic
#[instrument(skip(cli, config), fields(command = ?cli.command))]
async fn run(cli: Cli, config: Config) -> Result<()> {
    let _timer = Timer::new("cli_execution");

    let mut output = OutputWriter::new(cli.output, cli.use_color(), cli.quiet);
    if !config.output.progress {
        output.disable_progress();
    }

    tracing::info!(
        command = ?cli.command,
        verbosity = cli.verbosity_level(),
        config = ?config.source,
        "Executing command"
    );

    match cli.command {
        Commands::Resolve(args) => handlers::handle_resolve(args, &config, &mut output).await,
        Commands::Validate(args) => handlers::handle_validate(args, &config, &mut output).await,
        Commands::Render(args) => handlers::handle_render(args, &config, &mut output).await,
        Commands::Batch(args) => handlers::handle_batch(args, &config, &mut output).await,
        Commands::Config(args) => handlers::handle_config(args, &config, &mut output).await,
        Commands::Completions(args) => handlers::handle_completions(args),
    }
}

/// Initialize the logging system
fn init_logging(cli: &Cli, config: &Config) -> Result<Option<WorkerGuard>> {
    let mut settings = LogSettings::from_verbosity(cli.verbosity_level());
    settings.merge_with_config(&config.logging);
    settings.merge_with_env();

    if cli.quiet {
        settings.level = "error".to_string();
        settings.console = false;
    }

    logging::init_logging(settings)
}
