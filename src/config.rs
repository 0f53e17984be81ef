//! TOML configuration.
//!
//! One [`Config`] value is loaded in `main` and passed by reference to every
//! component that needs it. A missing file is not an error: every section
//! has defaults, and the API key can come from `ANTHROPIC_API_KEY`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::retry::RetryPolicy;

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const DATABASE_FILE: &str = "zotero.sqlite";
const MAX_BACKOFF_FACTOR: f64 = 10.0;
const MAX_INITIAL_DELAY_MS: u64 = 60_000;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub zotero: ZoteroConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub vault: VaultConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ZoteroConfig {
    /// Zotero data directory (the one holding `zotero.sqlite`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Retries after the first attempt when the database is locked.
    #[serde(default = "default_lock_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

impl Default for ZoteroConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_retries: default_lock_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

fn default_lock_retries() -> u32 {
    5
}
fn default_initial_delay_ms() -> u64 {
    100
}
fn default_backoff_factor() -> f64 {
    2.0
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Total attempts per request, the first one included.
    #[serde(default = "default_analysis_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: f64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_retries: default_analysis_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

pub fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_temperature() -> f64 {
    0.7
}
fn default_analysis_retries() -> u32 {
    3
}
fn default_retry_delay_secs() -> f64 {
    1.0
}
fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct VaultConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Config {
    /// API key from the environment, falling back to the config file.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.analysis.api_key.clone())
    }

    /// Configured Zotero directory, or the first default location that
    /// holds a database.
    pub fn zotero_dir(&self) -> Option<PathBuf> {
        self.zotero.path.clone().or_else(discover_zotero_dir)
    }

    pub fn lock_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.zotero.max_retries.saturating_add(1),
            Duration::from_millis(self.zotero.initial_delay_ms),
            self.zotero.backoff_factor,
        )
    }

    pub fn set_zotero_path(&mut self, path: &Path) -> crate::Result<()> {
        if !path.is_dir() {
            return Err(Error::InvalidInput(format!(
                "Path does not exist or is not a directory: {}",
                path.display()
            )));
        }
        if !path.join(DATABASE_FILE).exists() {
            return Err(Error::InvalidInput(format!(
                "No {} found in: {}",
                DATABASE_FILE,
                path.display()
            )));
        }
        self.zotero.path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn set_vault_path(&mut self, path: &Path) -> crate::Result<()> {
        if !path.is_dir() {
            return Err(Error::InvalidInput(format!(
                "Path does not exist or is not a directory: {}",
                path.display()
            )));
        }
        self.vault.path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn set_api_key(&mut self, key: &str) -> crate::Result<()> {
        validate_api_key(key)?;
        self.analysis.api_key = Some(key.trim().to_string());
        Ok(())
    }
}

/// Anthropic keys all start with `sk-ant-`.
pub fn validate_api_key(key: &str) -> crate::Result<()> {
    let key = key.trim();
    if key.is_empty() || !key.starts_with("sk-ant-") {
        return Err(Error::InvalidInput("Invalid API key format".to_string()));
    }
    Ok(())
}

/// `sk-ant-api0...wxyz` style rendering for `configure --show`.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 14 {
        return "***".to_string();
    }
    let head: String = chars[..10].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// `~/.paper-harness/config.toml`, or a relative path when there is no home.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".paper-harness"))
        .unwrap_or_else(|| PathBuf::from(".paper-harness"))
        .join("config.toml")
}

fn discover_zotero_dir() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    let candidates = [
        home.join("Zotero"),
        home.join(".zotero"),
        home.join("snap").join("zotero-snap").join("common").join("Zotero"),
    ];
    candidates
        .into_iter()
        .find(|dir| dir.join(DATABASE_FILE).exists())
}

/// Load and validate the config file. A missing file yields defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if !(0.0..=1.0).contains(&config.analysis.temperature) {
        anyhow::bail!("analysis.temperature must be in [0.0, 1.0]");
    }
    if config.analysis.max_tokens == 0 {
        anyhow::bail!("analysis.max_tokens must be > 0");
    }
    if config.analysis.retry_delay_secs < 0.0 {
        anyhow::bail!("analysis.retry_delay_secs must be >= 0");
    }
    if !(1.0..=MAX_BACKOFF_FACTOR).contains(&config.zotero.backoff_factor) {
        anyhow::bail!("zotero.backoff_factor must be in [1.0, {}]", MAX_BACKOFF_FACTOR);
    }
    if config.zotero.initial_delay_ms > MAX_INITIAL_DELAY_MS {
        anyhow::bail!("zotero.initial_delay_ms must be <= {}", MAX_INITIAL_DELAY_MS);
    }

    Ok(config)
}

pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}
