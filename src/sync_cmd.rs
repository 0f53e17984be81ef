//! `paper sync` and `paper sync-notes`.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::progress::ProgressMode;
use crate::store::ZoteroStore;
use crate::vault::{sync_notes_from_vault, sync_to_vault};

fn resolve_vault(config: &Config, vault: Option<PathBuf>) -> Result<PathBuf> {
    vault
        .or_else(|| config.vault.path.clone())
        .context("No vault path given. Pass --vault or run `paper configure --vault-path <dir>`.")
}

pub async fn run_sync(
    config: &Config,
    vault: Option<PathBuf>,
    dry_run: bool,
    progress: Option<ProgressMode>,
) -> Result<()> {
    let vault = resolve_vault(config, vault)?;
    let store = ZoteroStore::from_config(config)?;
    let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();

    if dry_run {
        println!("Dry run: nothing will be written.");
    }
    let stats = sync_to_vault(&store, &vault, dry_run, reporter.as_ref()).await?;

    println!("Vault sync {}:", if dry_run { "preview" } else { "complete" });
    println!("  vault:        {}", vault.display());
    println!("  papers:       {}", stats.papers_synced);
    println!("  notes:        {}", stats.notes_written);
    println!("  files copied: {}", stats.files_copied);
    println!("  collections:  {}", stats.collections_created);
    print_errors(&stats.errors);
    Ok(())
}

pub async fn run_sync_notes(
    config: &Config,
    vault: Option<PathBuf>,
    dry_run: bool,
    overwrite: bool,
    progress: Option<ProgressMode>,
) -> Result<()> {
    let vault = resolve_vault(config, vault)?;
    let store = ZoteroStore::from_config(config)?;
    let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();

    if dry_run {
        println!("Dry run: nothing will be written.");
    }
    let stats = sync_notes_from_vault(&store, &vault, dry_run, overwrite, reporter.as_ref()).await?;

    println!("Note import {}:", if dry_run { "preview" } else { "complete" });
    println!("  imported: {}", stats.notes_synced);
    println!("  skipped:  {} (already in Zotero)", stats.notes_skipped);
    print_errors(&stats.errors);
    Ok(())
}

fn print_errors(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    println!("  errors:       {}", errors.len());
    for e in errors {
        eprintln!("Warning: {}", e);
    }
}
