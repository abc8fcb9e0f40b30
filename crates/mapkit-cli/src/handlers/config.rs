//! Configuration command handlers

use crate::cli::{ConfigAction, ConfigArgs, ConfigShowArgs, OutputFormat};
use crate::config::Config;
use crate::error::Result;
use crate::output::OutputWriter;
use serde::Serialize;
use std::path::PathBuf;

/// Handle the config command
pub async fn handle_config(args: ConfigArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    match args.action {
        ConfigAction::Show(show_args) => handle_config_show(show_args, config, output),
        ConfigAction::Path => handle_config_path(config, output),
    }
}

fn handle_config_show(args: ConfigShowArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let rendered = config.to_string_as(args.format)?;
    output.writeln(rendered.trim_end())
}

#[derive(Debug, Serialize)]
struct ConfigLocation {
    path: Option<PathBuf>,
    searched: Vec<PathBuf>,
}

fn handle_config_path(config: &Config, output: &mut OutputWriter) -> Result<()> {
    let location = ConfigLocation {
        path: config.source.clone(),
        searched: Config::default_config_paths(),
    };

    if output.format() != OutputFormat::Human {
        return output.data(&location);
    }

    match &location.path {
        Some(path) => output.writeln(&path.display().to_string())?,
        None => {
            output.warning("No configuration file found, using defaults")?;
            output.section("Searched Locations")?;
            for path in &location.searched {
                output.writeln(&format!("  {}", path.display()))?;
            }
        }
    }
    Ok(())
}
