//! Resource ceilings for template evaluation
//!
//! Limits are fixed when a sandbox is built and never change afterwards.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default wall-clock budget for one render
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_millis(500);
/// Default maximum template source length, in characters
pub const DEFAULT_MAX_TEMPLATE_LENGTH: usize = 1000;
/// Default allocation budget for one render, in bytes
pub const DEFAULT_MEMORY_LIMIT: usize = 100_000_000;

/// Hard ceilings applied to every evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxLimits {
    /// Render-time ceiling
    #[serde(with = "millis", rename = "render_timeout_ms")]
    pub render_timeout: Duration,
    /// Parse-length ceiling, in characters
    pub max_template_length: usize,
    /// Bytes a single render may allocate for strings and values it produces
    pub memory_limit: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            max_template_length: DEFAULT_MAX_TEMPLATE_LENGTH,
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }
}

impl SandboxLimits {
    /// Create a new set of limits
    pub fn new(render_timeout: Duration, max_template_length: usize, memory_limit: usize) -> Self {
        Self {
            render_timeout,
            max_template_length,
            memory_limit,
        }
    }

    /// Override the render timeout
    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    /// Override the memory budget
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = bytes;
        self
    }

    /// Override the template length ceiling
    pub fn with_max_template_length(mut self, chars: usize) -> Self {
        self.max_template_length = chars;
        self
    }

    /// Validate the limits
    pub fn validate(&self) -> Result<(), String> {
        if self.render_timeout.is_zero() {
            return Err("Render timeout cannot be zero".to_string());
        }
        if self.max_template_length == 0 {
            return Err("Maximum template length cannot be zero".to_string());
        }
        if self.memory_limit == 0 {
            return Err("Memory limit cannot be zero".to_string());
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
