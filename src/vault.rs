//! Markdown vault mirror.
//!
//! `sync_to_vault` mirrors the library into an Obsidian-style vault:
//!
//! ```text
//! <vault>/Zotero/
//! ├── repo/<KEY>/paper.md          frontmatter + abstract + attachment links
//! ├── repo/<KEY>/<note title>.md   one file per Zotero note, HTML stripped
//! ├── repo/<KEY>/<attachment>      copied when missing or older
//! └── collections/<name>.md        Dataview table over `collections`
//! ```
//!
//! `sync_notes_from_vault` goes the other way: markdown files written next
//! to a `paper.md` become Zotero notes on that paper.
//!
//! Failures on one paper or one note are recorded in the returned stats and
//! the run continues.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::models::{Collection, ItemFilter, LibraryItem};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::store::ZoteroStore;

const PAPER_FILE: &str = "paper.md";
const MAX_NOTE_TITLE_CHARS: usize = 50;
const MAX_FILENAME_CHARS: usize = 200;

static BLOCK_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|blockquote|pre|tr)>").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static FRONTMATTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\A---\s*\n(.*?)\n---").unwrap());
static ZOTERO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^zotero_id:\s*(\d+)\s*$").unwrap());

#[derive(Debug, Default, Clone, Serialize)]
pub struct VaultStats {
    pub papers_synced: usize,
    pub notes_written: usize,
    pub files_copied: usize,
    pub collections_created: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct NoteImportStats {
    pub notes_synced: usize,
    pub notes_skipped: usize,
    pub errors: Vec<String>,
}

/// Mirror every library item and collection into `vault`.
pub async fn sync_to_vault(
    store: &ZoteroStore,
    vault: &Path,
    dry_run: bool,
    progress: &dyn ProgressReporter,
) -> Result<VaultStats> {
    ensure_vault(vault)?;
    let repo_dir = vault.join("Zotero").join("repo");
    let collections_dir = vault.join("Zotero").join("collections");
    if !dry_run {
        fs::create_dir_all(&repo_dir)?;
        fs::create_dir_all(&collections_dir)?;
    }

    let items = store.list_items(&ItemFilter::default()).await?;
    let collections = store.list_collections().await?;
    let mut stats = VaultStats::default();

    let total = items.len() as u64;
    progress.report(ProgressEvent::Started {
        task: "sync".into(),
        total,
    });

    for (i, item) in items.iter().enumerate() {
        progress.report(ProgressEvent::Item {
            task: "sync".into(),
            n: i as u64 + 1,
            total,
            label: item.display_title().to_string(),
        });
        match sync_paper(store, item, &collections, &repo_dir, dry_run).await {
            Ok(paper) => {
                stats.papers_synced += 1;
                stats.notes_written += paper.notes_written;
                stats.files_copied += paper.files_copied;
            }
            Err(e) => {
                let message = format!("Error syncing item {}: {}", item.id, e);
                tracing::warn!(item_id = item.id, error = %e, "vault sync failed for item");
                progress.report(ProgressEvent::ItemFailed {
                    task: "sync".into(),
                    label: item.display_title().to_string(),
                    error: e.to_string(),
                });
                stats.errors.push(message);
            }
        }
    }

    let mut used_names = HashSet::new();
    for collection in &collections {
        let mut file_name = sanitize_filename(&collection.name);
        if file_name.is_empty() || !used_names.insert(file_name.clone()) {
            file_name = format!("{}-{}", file_name, collection.id);
            used_names.insert(file_name.clone());
        }
        let path = collections_dir.join(format!("{}.md", file_name));
        if !dry_run {
            if let Err(e) = fs::write(&path, render_collection_view(collection)) {
                stats.errors.push(format!(
                    "Error creating collection view '{}': {}",
                    collection.name, e
                ));
                continue;
            }
        }
        stats.collections_created += 1;
    }

    tracing::info!(
        papers = stats.papers_synced,
        notes = stats.notes_written,
        files = stats.files_copied,
        collections = stats.collections_created,
        errors = stats.errors.len(),
        dry_run,
        "vault sync finished"
    );
    Ok(stats)
}

struct PaperSync {
    notes_written: usize,
    files_copied: usize,
}

async fn sync_paper(
    store: &ZoteroStore,
    item: &LibraryItem,
    collections: &[Collection],
    repo_dir: &Path,
    dry_run: bool,
) -> Result<PaperSync> {
    let item_dir = repo_dir.join(&item.key);
    let member_of: Vec<&str> = collections
        .iter()
        .filter(|c| c.item_ids.contains(&item.id))
        .map(|c| c.name.as_str())
        .collect();

    if !dry_run {
        fs::create_dir_all(&item_dir)?;
        fs::write(item_dir.join(PAPER_FILE), render_paper_markdown(item, &member_of))?;
    }

    let mut result = PaperSync {
        notes_written: 0,
        files_copied: 0,
    };

    let notes = store.get_notes(item.id).await?;
    let mut used_names: HashSet<String> = HashSet::from([PAPER_FILE.to_string()]);
    for (i, note) in notes.iter().enumerate() {
        let text = strip_html(&note.content);
        if text.is_empty() {
            continue;
        }
        let title: String = text
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .chars()
            .take(MAX_NOTE_TITLE_CHARS)
            .collect();
        let mut stem = sanitize_filename(&title);
        if stem.is_empty() {
            stem = format!("note-{}", i + 1);
        }
        let mut file_name = format!("{}.md", stem);
        if !used_names.insert(file_name.clone()) {
            file_name = format!("{}-{}.md", stem, i + 1);
            used_names.insert(file_name.clone());
        }
        if !dry_run {
            fs::write(item_dir.join(&file_name), &text)?;
        }
        result.notes_written += 1;
    }

    for attachment in &item.attachments {
        let Some(name) = attachment.path.file_name() else {
            continue;
        };
        let dest = item_dir.join(name);
        if needs_copy(&attachment.path, &dest) {
            if !dry_run {
                fs::copy(&attachment.path, &dest)?;
            }
            result.files_copied += 1;
        }
    }

    Ok(result)
}

/// Copy when the destination is missing or older than the source.
fn needs_copy(source: &Path, dest: &Path) -> bool {
    let Ok(source_meta) = fs::metadata(source) else {
        return false;
    };
    if !source_meta.is_file() {
        return false;
    }
    match (fs::metadata(dest).and_then(|m| m.modified()), source_meta.modified()) {
        (Ok(dest_time), Ok(source_time)) => dest_time < source_time,
        _ => true,
    }
}

/// Import markdown files from `<vault>/Zotero/repo/<KEY>/` as notes.
pub async fn sync_notes_from_vault(
    store: &ZoteroStore,
    vault: &Path,
    dry_run: bool,
    overwrite: bool,
    progress: &dyn ProgressReporter,
) -> Result<NoteImportStats> {
    ensure_vault(vault)?;
    let mut stats = NoteImportStats::default();

    let repo_dir = vault.join("Zotero").join("repo");
    if !repo_dir.is_dir() {
        tracing::warn!(path = %repo_dir.display(), "no Zotero/repo directory in vault");
        return Ok(stats);
    }

    let candidates = collect_vault_notes(&repo_dir);
    let total = candidates.len() as u64;
    progress.report(ProgressEvent::Started {
        task: "sync-notes".into(),
        total,
    });

    for (i, candidate) in candidates.iter().enumerate() {
        progress.report(ProgressEvent::Item {
            task: "sync-notes".into(),
            n: i as u64 + 1,
            total,
            label: candidate.title.clone(),
        });
        match import_note(store, candidate, dry_run, overwrite).await {
            Ok(true) => stats.notes_synced += 1,
            Ok(false) => {
                tracing::info!(
                    file = %candidate.file.display(),
                    item_id = candidate.item_id,
                    "note already exists, skipped"
                );
                stats.notes_skipped += 1;
            }
            Err(e) => {
                progress.report(ProgressEvent::ItemFailed {
                    task: "sync-notes".into(),
                    label: candidate.title.clone(),
                    error: e.to_string(),
                });
                stats
                    .errors
                    .push(format!("Error syncing {}: {}", candidate.file.display(), e));
            }
        }
    }

    Ok(stats)
}

struct VaultNote {
    file: PathBuf,
    item_id: i64,
    title: String,
}

fn collect_vault_notes(repo_dir: &Path) -> Vec<VaultNote> {
    let mut out = Vec::new();
    let paper_dirs = WalkDir::new(repo_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir());

    for dir in paper_dirs {
        let paper_md = dir.path().join(PAPER_FILE);
        let Some(item_id) = fs::read_to_string(&paper_md)
            .ok()
            .and_then(|content| extract_zotero_id(&content))
        else {
            tracing::debug!(path = %dir.path().display(), "no paper.md with zotero_id, skipping");
            continue;
        };

        let note_files = WalkDir::new(dir.path())
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().map(|x| x == "md").unwrap_or(false))
            .filter(|p| p.file_name().map(|n| n != PAPER_FILE).unwrap_or(false));

        for file in note_files {
            let title = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            out.push(VaultNote {
                file,
                item_id,
                title,
            });
        }
    }
    out
}

/// Ok(true) when imported (or would be, in a dry run), Ok(false) when skipped.
async fn import_note(
    store: &ZoteroStore,
    candidate: &VaultNote,
    dry_run: bool,
    overwrite: bool,
) -> Result<bool> {
    let content = fs::read_to_string(&candidate.file)?;

    if !overwrite {
        let prefix = format!("{}\n", candidate.title);
        let existing = store.get_notes(candidate.item_id).await?;
        // Notes written in Zotero's editor are HTML; compare their text too.
        if existing
            .iter()
            .any(|n| n.content.starts_with(&prefix) || strip_html(&n.content).starts_with(&prefix))
        {
            return Ok(false);
        }
    }

    if !dry_run {
        store
            .add_note(candidate.item_id, &content, Some(&candidate.title))
            .await?;
    }
    Ok(true)
}

fn ensure_vault(vault: &Path) -> Result<()> {
    if vault.is_dir() {
        Ok(())
    } else {
        Err(Error::NotFound(format!(
            "Vault path does not exist: {}",
            vault.display()
        )))
    }
}

/// `paper.md`: YAML frontmatter, abstract, attachment links, notes placeholder.
pub fn render_paper_markdown(item: &LibraryItem, collections: &[&str]) -> String {
    let mut fm = vec!["---".to_string()];
    fm.push(format!("title: {}", yaml_quote(item.display_title())));
    push_list(&mut fm, "authors", item.authors.iter().map(String::as_str));
    push_list(&mut fm, "collections", collections.iter().copied());
    if let Some(year) = &item.year {
        fm.push(format!("year: {}", year));
    }
    if let Some(publication) = &item.publication {
        fm.push(format!("publication: {}", yaml_quote(publication)));
    }
    if let Some(doi) = &item.doi {
        fm.push(format!("doi: {}", yaml_quote(doi)));
    }
    if let Some(url) = &item.url {
        fm.push(format!("url: {}", yaml_quote(url)));
    }
    push_list(&mut fm, "tags", item.tags.iter().map(String::as_str));
    fm.push(format!("zotero_id: {}", item.id));
    fm.push(format!("zotero_key: {}", yaml_quote(&item.key)));
    if !item.date_added.is_empty() {
        fm.push(format!("date_added: {}", yaml_quote(&item.date_added)));
    }
    if !item.date_modified.is_empty() {
        fm.push(format!("date_modified: {}", yaml_quote(&item.date_modified)));
    }
    fm.push("---".to_string());

    let mut body = String::from("\n");
    if let Some(abstract_note) = &item.abstract_note {
        body.push_str("## Abstract\n\n");
        body.push_str(abstract_note);
        body.push_str("\n\n");
    }
    let attachment_names: Vec<String> = item
        .attachments
        .iter()
        .filter_map(|a| a.path.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    if !attachment_names.is_empty() {
        body.push_str("## Attachments\n\n");
        for name in attachment_names {
            body.push_str(&format!("- [[{}]]\n", name));
        }
        body.push('\n');
    }
    body.push_str("## Notes\n\n");
    body.push_str("*Add your notes here. Use `paper analyze` to generate reports.*\n");

    fm.join("\n") + "\n" + &body
}

/// A Dataview table of every paper whose `collections` contains this one.
pub fn render_collection_view(collection: &Collection) -> String {
    let quoted = collection.name.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        "# {name}\n\n\
         ```dataview\n\
         TABLE\n  file.link as Paper,\n  title as Title\n\
         FROM \"Zotero/repo\"\n\
         WHERE contains(collections, \"{quoted}\")\n\
         SORT title ASC\n\
         ```\n\n\
         *{count} papers in this collection*\n",
        name = collection.name,
        quoted = quoted,
        count = collection.item_ids.len()
    )
}

fn push_list<'a>(fm: &mut Vec<String>, key: &str, values: impl Iterator<Item = &'a str>) {
    let values: Vec<&str> = values.filter(|v| !v.trim().is_empty()).collect();
    if values.is_empty() {
        return;
    }
    fm.push(format!("{}:", key));
    for v in values {
        fm.push(format!("  - {}", yaml_quote(v)));
    }
}

fn yaml_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Plain text from a Zotero note. Block-level closing tags become line
/// breaks, remaining tags are dropped, common entities are decoded.
pub fn strip_html(html: &str) -> String {
    let text = BLOCK_END.replace_all(html, "\n");
    let text = TAG.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    BLANK_RUNS.replace_all(text.trim(), "\n\n").into_owned()
}

/// Replace characters that are invalid in file names, trim dots and
/// spaces, cap the length.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    replaced
        .trim_matches(|c| c == '.' || c == ' ')
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect()
}

/// `zotero_id` from a `paper.md` frontmatter block.
pub fn extract_zotero_id(content: &str) -> Option<i64> {
    let frontmatter = FRONTMATTER.captures(content)?.get(1)?.as_str();
    ZOTERO_ID
        .captures(frontmatter)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}
