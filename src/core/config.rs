//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.parley/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::state::ChatSettings;
use crate::core::viewport::NEAR_BOTTOM_THRESHOLD;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TransportConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ChatConfig {
    pub require_tool_approval: Option<bool>,
    pub show_reasoning_steps: Option<bool>,
    pub max_input_length: Option<usize>,
    pub near_bottom_threshold: Option<u32>,
    pub enable_file_upload: Option<bool>,
    pub system_prompt: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/chat";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub settings: ChatSettings,
    pub show_reasoning_steps: bool,
    pub near_bottom_threshold: u32,
    pub enable_file_upload: bool,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.parley/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".parley").join("config.toml"))
}

/// Load config from `~/.parley/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `ParleyConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<ParleyConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(ParleyConfig::default());
        }
    };
    load_config_from(&path)
}

/// Load config from an explicit path, generating a default if it's missing.
pub fn load_config_from(path: &Path) -> Result<ParleyConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(ParleyConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ParleyConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", redacted(&config));
    Ok(config)
}

/// Debug view of the config without the API key.
fn redacted(config: &ParleyConfig) -> String {
    format!(
        "endpoint={:?}, api_key={}, headers={:?}, chat={:?}",
        config.transport.endpoint,
        if config.transport.api_key.is_some() { "<set>" } else { "<unset>" },
        config.transport.headers.as_ref().map(|h| h.keys().collect::<Vec<_>>()),
        config.chat
    )
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# Parley Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [transport]
# endpoint = "http://localhost:3000/api/chat"   # Or set PARLEY_ENDPOINT env var
# api_key = "sk-..."                            # Or set PARLEY_API_KEY env var

# [transport.headers]
# X-Team = "docs"

# [chat]
# require_tool_approval = false
# show_reasoning_steps = true
# max_input_length = 4000
# near_bottom_threshold = 100
# enable_file_upload = true
# system_prompt = "You are a helpful assistant."
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_endpoint` is from the CLI flag (None = not specified).
pub fn resolve(config: &ParleyConfig, cli_endpoint: Option<&str>) -> ResolvedConfig {
    resolve_with_env(config, cli_endpoint, |key| std::env::var(key).ok())
}

fn resolve_with_env(
    config: &ParleyConfig,
    cli_endpoint: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    // Endpoint: CLI → env → config → default
    let endpoint = cli_endpoint
        .map(|s| s.to_string())
        .or_else(|| env("PARLEY_ENDPOINT"))
        .or_else(|| config.transport.endpoint.clone())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

    // API key: env → config
    let api_key = env("PARLEY_API_KEY").or_else(|| config.transport.api_key.clone());

    let chat = &config.chat;
    ResolvedConfig {
        endpoint,
        api_key,
        headers: config.transport.headers.clone().unwrap_or_default(),
        settings: ChatSettings {
            require_tool_approval: chat.require_tool_approval.unwrap_or(false),
            max_input_length: chat.max_input_length,
            system_prompt: chat.system_prompt.clone(),
        },
        show_reasoning_steps: chat.show_reasoning_steps.unwrap_or(true),
        near_bottom_threshold: chat.near_bottom_threshold.unwrap_or(NEAR_BOTTOM_THRESHOLD),
        enable_file_upload: chat.enable_file_upload.unwrap_or(true),
    }
}
