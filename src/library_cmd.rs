//! Read-only library commands: `list`, `show`, `notes`, `search`,
//! `collections`.
//!
//! Each prints a plain-text view to stdout, or JSON with `--json`.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::config::Config;
use crate::models::{ItemFilter, LibraryItem};
use crate::store::ZoteroStore;
use crate::vault::strip_html;

pub async fn run_list(
    config: &Config,
    collection: Option<String>,
    tags: Vec<String>,
    limit: Option<i64>,
    json: bool,
) -> Result<()> {
    let store = ZoteroStore::from_config(config)?;
    let filter = ItemFilter {
        collection,
        tags,
        limit,
    };
    let items = store.list_items(&filter).await?;

    if json {
        return print_json(&items);
    }
    if items.is_empty() {
        println!("No items found.");
        return Ok(());
    }
    print_item_table(&items);
    println!();
    println!("{} items", items.len());
    Ok(())
}

pub async fn run_show(config: &Config, item_id: i64, json: bool) -> Result<()> {
    let store = ZoteroStore::from_config(config)?;
    let Some(item) = store.get_item(item_id).await? else {
        bail!("Item {} not found", item_id);
    };

    if json {
        return print_json(&item);
    }

    let or_na = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".to_string());
    println!("--- Item {} ---", item.id);
    println!("key:          {}", item.key);
    println!("type:         {}", item.item_type);
    println!("title:        {}", item.display_title());
    println!(
        "authors:      {}",
        if item.authors.is_empty() {
            "N/A".to_string()
        } else {
            item.authors_joined()
        }
    );
    println!("year:         {}", or_na(&item.year));
    println!("publication:  {}", or_na(&item.publication));
    println!("doi:          {}", or_na(&item.doi));
    println!("url:          {}", or_na(&item.url));
    if !item.tags.is_empty() {
        println!("tags:         {}", item.tags.join(", "));
    }
    println!("added:        {}", item.date_added);
    println!("modified:     {}", item.date_modified);
    if let Some(pdf) = &item.pdf_path {
        println!("pdf:          {}", pdf.display());
    }
    for attachment in &item.attachments {
        println!(
            "attachment:   {} ({})",
            attachment.path.display(),
            attachment.content_type.as_deref().unwrap_or("unknown")
        );
    }
    if let Some(abstract_note) = &item.abstract_note {
        println!();
        println!("--- Abstract ---");
        println!("{}", abstract_note);
    }
    Ok(())
}

pub async fn run_notes(config: &Config, item_id: i64, json: bool) -> Result<()> {
    let store = ZoteroStore::from_config(config)?;
    if store.get_item(item_id).await?.is_none() {
        bail!("Item {} not found", item_id);
    }
    let notes = store.get_notes(item_id).await?;

    if json {
        return print_json(&notes);
    }
    if notes.is_empty() {
        println!("No notes for item {}.", item_id);
        return Ok(());
    }
    for note in &notes {
        let text = strip_html(&note.content);
        println!("--- Note {} ({}) modified {} ---", note.id, note.key, note.date_modified);
        println!("{}", text);
        println!();
    }
    Ok(())
}

pub async fn run_search(config: &Config, query: &str, limit: i64, json: bool) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    let store = ZoteroStore::from_config(config)?;
    let items = store.search_items(query, limit).await?;

    if json {
        return print_json(&items);
    }
    if items.is_empty() {
        println!("No results.");
        return Ok(());
    }
    print_item_table(&items);
    Ok(())
}

pub async fn run_collections(config: &Config, json: bool) -> Result<()> {
    let store = ZoteroStore::from_config(config)?;
    let collections = store.list_collections().await?;

    if json {
        return print_json(&collections);
    }
    if collections.is_empty() {
        println!("No collections.");
        return Ok(());
    }
    println!("{:<8} {:<40} {:>6}  PARENT", "ID", "NAME", "ITEMS");
    for c in &collections {
        let parent = c
            .parent_id
            .and_then(|pid| collections.iter().find(|p| p.id == pid))
            .map(|p| p.name.as_str())
            .unwrap_or("-");
        println!(
            "{:<8} {:<40} {:>6}  {}",
            c.id,
            clip(&c.name, 40),
            c.item_ids.len(),
            parent
        );
    }
    Ok(())
}

fn print_item_table(items: &[LibraryItem]) {
    println!("{:<8} {:<60} {:<30} YEAR", "ID", "TITLE", "AUTHORS");
    for item in items {
        println!(
            "{:<8} {:<60} {:<30} {}",
            item.id,
            clip(item.display_title(), 60),
            clip(&item.authors_joined(), 30),
            item.year.as_deref().unwrap_or("N/A")
        );
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cut to `max` characters, marking the cut with `…`.
fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
