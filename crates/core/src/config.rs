//! # Fabric Configuration
//!
//! Tunables for the bus, supervision and the bundled tool agents.
//!
//! Resolution order: defaults, then an optional JSON file, then
//! `SWITCHBOARD_*` environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::ModelConfig;
use crate::swarm::correlation::ReplyPolicy;

/// Filesystem guard for the file-oriented agents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAccessConfig {
    /// Relative paths resolve against this directory; nothing outside it is readable
    pub base_dir: PathBuf,
    /// Maximum bytes returned for a single file
    pub max_file_size: usize,
    /// Allowed extensions (empty = all allowed)
    pub allowed_extensions: Vec<String>,
    /// Path prefixes that are always refused
    pub blocked_paths: Vec<String>,
}

impl Default for FileAccessConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            max_file_size: 10 * 1024 * 1024,
            allowed_extensions: Vec::new(),
            blocked_paths: vec![
                "/etc".to_string(),
                "/sys".to_string(),
                "/proc".to_string(),
            ],
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    /// Default wait for a correlated response
    pub request_timeout_ms: u64,
    /// Publish an `AGENT_INFO` event when an agent becomes active
    pub announce_on_init: bool,
    /// Publish an `Ack` for every request an agent accepts
    pub acknowledge_requests: bool,
    /// Concurrent legacy calls per adapter
    pub max_concurrent_requests: usize,
    /// How callers reconcile broadcast replies
    pub reply_policy: ReplyPolicy,
    /// Time in-flight requests get to answer after shutdown begins
    pub shutdown_grace_ms: u64,
    /// `max_files` used when a request does not supply one
    pub default_max_files: usize,
    pub file_access: FileAccessConfig,
    pub model: ModelConfig,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            announce_on_init: true,
            acknowledge_requests: false,
            max_concurrent_requests: 4,
            reply_policy: ReplyPolicy::FirstWins,
            shutdown_grace_ms: 1_000,
            default_max_files: 100,
            file_access: FileAccessConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl FabricConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load a JSON config file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let mut config: FabricConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {:?}", path))?;
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_parse::<u64>("SWITCHBOARD_TIMEOUT_MS") {
            self.request_timeout_ms = v;
        }
        if let Some(v) = env_parse::<u64>("SWITCHBOARD_SHUTDOWN_GRACE_MS") {
            self.shutdown_grace_ms = v;
        }
        if let Some(v) = env_parse::<usize>("SWITCHBOARD_MAX_CONCURRENT") {
            self.max_concurrent_requests = v.max(1);
        }
        if let Some(v) = env_parse::<usize>("SWITCHBOARD_MAX_FILE_SIZE") {
            self.file_access.max_file_size = v;
        }
        if let Some(v) = env_parse::<usize>("SWITCHBOARD_MAX_FILES") {
            self.default_max_files = v;
        }
        if let Ok(dir) = std::env::var("SWITCHBOARD_BASE_DIR") {
            tracing::info!(base_dir = %dir, "Base directory overridden by SWITCHBOARD_BASE_DIR");
            self.file_access.base_dir = PathBuf::from(dir);
        }
        if let Ok(model) = std::env::var("SWITCHBOARD_MODEL") {
            self.model.model = model;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}
