//! Configuration loading and validation for Stepwise agents.
//!
//! Loads settings from `~/.stepwise/config.toml` with environment
//! variable overrides. Validates all settings before an agent is built.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stepwise_core::provider::ToolChoice;

/// Settings for one agent.
///
/// Maps directly to `~/.stepwise/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Unique name of the agent
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Model passed to the provider
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Step budget per run
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Identical assistant replies needed before the agent counts as stuck
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: usize,

    /// Tool observations longer than this many characters are truncated
    #[serde(default = "default_max_observe", skip_serializing_if = "Option::is_none")]
    pub max_observe: Option<usize>,

    #[serde(default)]
    pub tool_choice: ToolChoice,

    /// Overrides the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Overrides the built-in next-step prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_prompt: Option<String>,
}

fn default_name() -> String {
    "stepwise".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_steps() -> u32 {
    20
}
fn default_duplicate_threshold() -> usize {
    2
}
fn default_max_observe() -> Option<usize> {
    Some(2000)
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            max_steps: default_max_steps(),
            duplicate_threshold: default_duplicate_threshold(),
            max_observe: default_max_observe(),
            tool_choice: ToolChoice::default(),
            system_prompt: None,
            next_step_prompt: None,
        }
    }
}

impl AgentSettings {
    /// Load settings from the default path (~/.stepwise/config.toml).
    ///
    /// A missing file yields defaults. `STEPWISE_MODEL` and
    /// `STEPWISE_MAX_STEPS` override the file.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut settings = Self::load_from(&config_path)?;
        settings.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Apply environment overrides through `lookup`, then re-validate.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(model) = lookup("STEPWISE_MODEL") {
            self.model = model;
        }

        if let Some(raw) = lookup("STEPWISE_MAX_STEPS") {
            self.max_steps = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "STEPWISE_MAX_STEPS must be a non-negative integer, got '{raw}'"
                ))
            })?;
        }

        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".stepwise")
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.duplicate_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "duplicate_threshold must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
