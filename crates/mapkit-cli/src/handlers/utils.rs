//! Shared utilities for command handlers

use crate::cli::ResolveFlags;
use crate::config::Config;
use crate::error::{Error, Result};
use mapkit_core::template::value::describe_type;
use mapkit_core::{Compiler, Mapping, ResolveOptions, Resolver, SandboxLimits, TemplateSandbox};
use serde_json::Value;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::debug;

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|s| s.to_str()), Some("yaml") | Some("yml"))
}

/// Read a file, or stdin for `-`
pub fn read_text(path: &Path) -> Result<String> {
    if is_stdin(path) {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        return Ok(content);
    }
    if !path.exists() {
        return Err(Error::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = fs::read_to_string(path)?;
    debug!(path = %path.display(), bytes = content.len(), "read file");
    Ok(content)
}

/// Read a JSON or YAML document
pub fn read_document(path: &Path) -> Result<Value> {
    let content = read_text(path)?;
    parse_document(path, &content)
}

fn parse_document(path: &Path, content: &str) -> Result<Value> {
    let parsed = if is_yaml(path) {
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(content).map_err(|e| e.to_string())
    };
    parsed.map_err(|message| Error::InvalidFormat {
        path: path.to_path_buf(),
        message,
    })
}

/// Configuration file options with command-line flags applied on top
pub fn resolve_options(config: &Config, flags: &ResolveFlags) -> ResolveOptions {
    let mut options = config.resolve.clone();
    if flags.no_escape {
        options.escape_templates = false;
    }
    if flags.fail_soft {
        options.fail_soft_render = true;
    }
    if let Some(depth) = flags.max_depth {
        options.max_depth = depth;
    }
    options
}

/// Build a sandbox, rejecting unusable limits
pub fn build_sandbox(limits: SandboxLimits) -> Result<TemplateSandbox> {
    limits.validate().map_err(Error::config)?;
    Ok(TemplateSandbox::with_limits(limits))
}

/// Compile a mapping document against `sandbox`
pub fn compile_mapping(document: &Value, sandbox: &TemplateSandbox, max_depth: usize) -> Result<Mapping> {
    if max_depth == 0 {
        return Err(Error::invalid_args("--max-depth must be at least 1"));
    }
    let compiler = Compiler::new().with_sandbox(sandbox).with_max_depth(max_depth);
    Ok(Mapping::compile_with(document, &compiler)?)
}

/// Resolve one event, treating absence as `null`
///
/// Unless `any_context` is set the event must be a JSON object.
pub fn resolve_event(
    mapping: &Mapping,
    event: &Value,
    resolver: &Resolver<'_>,
    any_context: bool,
) -> mapkit_core::Result<Value> {
    if !any_context && !event.is_object() {
        return Err(mapkit_core::Error::Payload {
            message: format!("event must be an object but it is {}", describe_type(event)),
        });
    }
    Ok(mapping.resolve_with(event, resolver)?.unwrap_or(Value::Null))
}

/// Write `value` to `path`, as YAML for `.yaml`/`.yml` and pretty JSON otherwise
pub fn save_output(path: &Path, value: &Value) -> Result<()> {
    let content = if is_yaml(path) {
        serde_yaml::to_string(value)?
    } else {
        let mut json = serde_json::to_string_pretty(value)?;
        json.push('\n');
        json
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}
