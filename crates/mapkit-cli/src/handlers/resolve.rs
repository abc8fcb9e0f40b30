//! Resolve command handler

use super::utils::{build_sandbox, compile_mapping, read_document, resolve_event, resolve_options, save_output};
use crate::cli::ResolveArgs;
use crate::config::Config;
use crate::error::Result;
use crate::logging::timing::Timer;
use crate::output::OutputWriter;
use mapkit_core::Resolver;
use tracing::{debug, info, instrument};

/// Handle the resolve command
#[instrument(skip(config, output), fields(mapping = %args.mapping.display(), event = %args.event.display()))]
pub async fn handle_resolve(args: ResolveArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let _timer = Timer::with_details("resolve_command", &args.mapping.display().to_string());
    let options = resolve_options(config, &args.flags);
    debug!(?options, "resolve options");

    let sandbox = build_sandbox(config.sandbox.clone())?;
    let mapping = {
        let _compile_timer = Timer::new("mapping_compile");
        compile_mapping(&read_document(&args.mapping)?, &sandbox, options.max_depth)?
    };
    let event = read_document(&args.event)?;

    let resolver = Resolver::new().with_sandbox(&sandbox).with_options(options);
    let payload = resolve_event(&mapping, &event, &resolver, args.any_context)?;
    info!("Mapping resolved");

    if let Some(path) = &args.save_to {
        save_output(path, &payload)?;
        output.success(&format!("✓ Output saved to {}", path.display()))?;
        return Ok(());
    }

    output.data(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{OutputFormat, ResolveFlags};
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn args(dir: &TempDir, mapping: serde_json::Value, event: serde_json::Value) -> ResolveArgs {
        let mapping_path = dir.path().join("mapping.json");
        let event_path = dir.path().join("event.json");
        fs::write(&mapping_path, mapping.to_string()).unwrap();
        fs::write(&event_path, event.to_string()).unwrap();
        ResolveArgs {
            mapping: mapping_path,
            event: event_path,
            flags: ResolveFlags::default(),
            any_context: false,
            save_to: None,
        }
    }

    #[tokio::test]
    async fn test_resolve_saves_payload() {
        let dir = TempDir::new().unwrap();
        let mut args = args(
            &dir,
            json!({"user": {"@path": "$.userId"}, "greeting": {"@template": "Hi {{name}}"}}),
            json!({"userId": "u1", "name": "<Ada>"}),
        );
        let target: PathBuf = dir.path().join("payload.json");
        args.save_to = Some(target.clone());

        let mut output = OutputWriter::with_writer(OutputFormat::Json, false, true, Box::new(std::io::sink()));
        handle_resolve(args, &Config::default(), &mut output).await.unwrap();

        let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(target).unwrap()).unwrap();
        assert_eq!(saved, json!({"user": "u1", "greeting": "Hi &lt;Ada&gt;"}));
    }

    #[tokio::test]
    async fn test_resolve_rejects_invalid_mapping() {
        let dir = TempDir::new().unwrap();
        let args = args(&dir, json!({"a": {"@if": {}}}), json!({}));
        let mut output = OutputWriter::with_writer(OutputFormat::Json, false, true, Box::new(std::io::sink()));

        let err = handle_resolve(args, &Config::default(), &mut output).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_resolve_rejects_non_object_event() {
        let dir = TempDir::new().unwrap();
        let args = args(&dir, json!({"a": 1}), json!([1, 2]));
        let mut output = OutputWriter::with_writer(OutputFormat::Json, false, true, Box::new(std::io::sink()));

        let err = handle_resolve(args, &Config::default(), &mut output).await.unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
