//! Validate command handler

use super::utils::read_document;
use crate::cli::ValidateArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::timing::Timer;
use crate::output::{OutputWriter, ValidationReport};
use mapkit_core::{Compiler, TemplateSandbox};
use tracing::{info, instrument, warn};

/// Handle the validate command
#[instrument(skip(config, output), fields(file = %args.mapping.display()))]
pub async fn handle_validate(args: ValidateArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let _timer = Timer::with_details("validate_command", &args.mapping.display().to_string());
    output.info(&format!("Validating mapping: {}", args.mapping.display()))?;

    let document = read_document(&args.mapping)?;
    let sandbox = TemplateSandbox::with_limits(config.sandbox.clone());
    let max_depth = args.max_depth.unwrap_or(config.resolve.max_depth);
    let compiler = Compiler::new().with_sandbox(&sandbox).with_max_depth(max_depth);

    match compiler.compile(&document) {
        Ok(root) => {
            info!(directives = root.directive_count(), "Mapping is valid");
            output.validation_report(&ValidationReport::passed(root.directive_count()))
        }
        Err(errors) => {
            warn!(count = errors.len(), "Mapping is invalid");
            output.validation_report(&ValidationReport::failed(&errors))?;
            Err(Error::ValidationFailed { count: errors.len() })
        }
    }
}
