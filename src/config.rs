//! Engine configuration loading.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GuardError, Result};
use crate::ratelimit::Policy;

/// Top-level configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between cleanup sweeps, in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Whether to seed the registry with the built-in policy table
    #[serde(default = "default_use_default_policies")]
    pub use_default_policies: bool,

    /// Policies to register, merged over the defaults (last write wins)
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: default_cleanup_interval(),
            use_default_policies: default_use_default_policies(),
            policies: Vec::new(),
        }
    }
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_use_default_policies() -> bool {
    true
}

/// Configuration for a single rate limit policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// The operation key this policy applies to
    pub operation: String,
    /// Window length in seconds
    pub window_secs: u64,
    /// Maximum requests admitted within the window
    pub max_requests: u64,
    /// Denial message; a generic one is used when absent
    #[serde(default)]
    pub message: Option<String>,
}

impl From<PolicyConfig> for Policy {
    fn from(config: PolicyConfig) -> Self {
        let message = config
            .message
            .unwrap_or_else(|| "Too many requests. Please try again later.".to_string());
        Policy::new(
            config.operation,
            Duration::from_secs(config.window_secs),
            config.max_requests,
            message,
        )
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading engine configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GuardError::Config(format!("failed to parse engine config: {}", e)))
    }

    /// The cleanup sweep interval as a `Duration`.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}
