use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    ENV_PREFIX, HTTP_REQUEST_TIMEOUT_SECS, LOCAL_CONFIG_PATH, PLACEHOLDER_TURN_CONTENT,
};
use crate::session::LateResponsePolicy;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// URL the conversation is POSTed to
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Request timeout for the HTTP exchange
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// What to do with a response that arrives after switching conversations
    #[serde(default)]
    pub late_responses: LateResponsePolicy,

    /// UI configuration
    #[serde(default)]
    pub ui: UIConfig,
}

fn default_timeout() -> u64 {
    HTTP_REQUEST_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout_secs: HTTP_REQUEST_TIMEOUT_SECS,
            late_responses: LateResponsePolicy::default(),
            ui: UIConfig::default(),
        }
    }
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UIConfig {
    /// Print turn ids next to messages
    pub show_turn_ids: bool,
    /// Text shown in place of the pending reply
    pub placeholder_text: String,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            show_turn_ids: false,
            placeholder_text: PLACEHOLDER_TURN_CONTENT.to_string(),
        }
    }
}

/// Layered configuration: defaults, then `global`, then the local project
/// file, then `PARLEY_*` environment variables
pub fn config_figment(global: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if let Some(global) = global.filter(|path| path.exists()) {
        figment = figment.merge(Toml::file(global));
    }

    let local_config = PathBuf::from(LOCAL_CONFIG_PATH);
    if local_config.exists() {
        figment = figment.merge(Toml::file(&local_config));
    }

    figment.merge(Env::prefixed(ENV_PREFIX))
}

/// Load configuration from multiple sources
pub fn load_config() -> Result<Config> {
    let global_config = get_config_dir()?.join("config.toml");
    config_figment(Some(global_config.as_path()))
        .extract()
        .context("Failed to load configuration")
}

/// Load a single TOML file, still honouring `PARLEY_*` overrides
pub fn load_config_file(path: &Path) -> Result<Config> {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX))
        .extract()
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "parley") {
        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;
        Ok(config_dir.to_path_buf())
    } else {
        // Fallback to home directory
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        let config_dir = PathBuf::from(home).join(".config").join("parley");
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = if let Some(p) = path {
        p
    } else {
        get_config_dir()?.join("config.toml")
    };

    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Create a default configuration file if it doesn't exist
pub fn init_config() -> Result<PathBuf> {
    let config_file = get_config_dir()?.join("config.toml");

    if !config_file.exists() {
        save_config(&Config::default(), Some(config_file.clone()))?;
        println!("Created default configuration at: {}", config_file.display());
    }

    // Create example local config
    let local_example = PathBuf::from(format!("{}.example", LOCAL_CONFIG_PATH));
    if !local_example.exists() {
        if let Some(parent) = local_example.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let example_config = r#"# Parley Project Configuration
# This file overrides global settings for this project

endpoint = "YOUR_ENDPOINT_URL"
request_timeout_secs = 120
# apply: store late replies under the conversation they came from
# discard: drop replies that arrive after you switched conversations
late_responses = "apply"

[ui]
show_turn_ids = false
"#;
        std::fs::write(&local_example, example_config)?;
        println!("Created example configuration at: {}", local_example.display());
    }

    Ok(config_file)
}
