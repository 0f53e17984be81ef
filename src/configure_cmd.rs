//! `paper configure` and `paper prompts`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::{mask_api_key, save_config, Config, API_KEY_ENV};
use crate::prompts::PromptKind;

/// Flags accepted by `paper configure`. With none set, prints the current
/// configuration.
#[derive(Debug, Default)]
pub struct ConfigureArgs {
    pub zotero_path: Option<PathBuf>,
    pub vault_path: Option<PathBuf>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub show: bool,
    pub reset: bool,
}

impl ConfigureArgs {
    fn changes_anything(&self) -> bool {
        self.zotero_path.is_some()
            || self.vault_path.is_some()
            || self.api_key.is_some()
            || self.model.is_some()
            || self.reset
    }
}

pub fn run_configure(config_path: &Path, mut config: Config, args: ConfigureArgs) -> Result<()> {
    if args.reset {
        config = Config::default();
        println!("Configuration reset to defaults.");
    }
    if let Some(path) = &args.zotero_path {
        config.set_zotero_path(path)?;
        println!("Zotero directory: {}", path.display());
    }
    if let Some(path) = &args.vault_path {
        config.set_vault_path(path)?;
        println!("Vault directory: {}", path.display());
    }
    if let Some(key) = &args.api_key {
        config.set_api_key(key)?;
        println!("API key: {}", mask_api_key(key.trim()));
    }
    if let Some(model) = &args.model {
        let model = model.trim();
        if model.is_empty() {
            anyhow::bail!("model name must not be empty");
        }
        config.analysis.model = model.to_string();
        println!("Model: {}", model);
    }

    if args.changes_anything() {
        save_config(&config, config_path)?;
        println!("Saved {}", config_path.display());
    }

    if args.show || !args.changes_anything() {
        print_config(config_path, &config);
    }
    Ok(())
}

fn print_config(config_path: &Path, config: &Config) {
    let zotero = config
        .zotero_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "not configured".to_string());
    let api_key = match (std::env::var(API_KEY_ENV).ok(), config.analysis.api_key.as_deref()) {
        (Some(k), _) if !k.trim().is_empty() => format!("{} (from {})", mask_api_key(&k), API_KEY_ENV),
        (_, Some(k)) => mask_api_key(k),
        _ => "not configured".to_string(),
    };
    let vault = config
        .vault
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "not configured".to_string());

    println!("--- Configuration ({}) ---", config_path.display());
    println!("zotero.path:             {}", zotero);
    println!(
        "zotero.lock_retries:     {} (from {}ms, x{})",
        config.zotero.max_retries, config.zotero.initial_delay_ms, config.zotero.backoff_factor
    );
    println!("analysis.api_key:        {}", api_key);
    println!("analysis.model:          {}", config.analysis.model);
    println!("analysis.max_tokens:     {}", config.analysis.max_tokens);
    println!("analysis.temperature:    {}", config.analysis.temperature);
    println!(
        "analysis.retries:        {} (from {}s, x2)",
        config.analysis.max_retries, config.analysis.retry_delay_secs
    );
    println!("vault.path:              {}", vault);
}

pub fn run_prompts() -> Result<()> {
    println!("{:<22} DESCRIPTION", "KIND");
    for kind in PromptKind::ALL {
        println!("{:<22} {}", kind.name(), kind.description());
    }
    Ok(())
}
