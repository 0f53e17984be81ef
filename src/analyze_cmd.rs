//! `paper analyze` and `paper batch`.
//!
//! Both run the same pipeline per item: load the record, extract its PDF,
//! build the prompt, call the analysis client, and optionally save the
//! result as a Zotero note titled `AI Analysis (<kind>)`. `batch` keeps
//! going when one item fails and reports the failures at the end.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use crate::analysis::{AnalysisBackend, AnalysisClient, AnalysisResult, UsageCounters};
use crate::config::Config;
use crate::error::Error;
use crate::extract::{estimate_reading_minutes, extract_pdf_text, MIN_ANALYZABLE_CHARS};
use crate::models::{ItemFilter, LibraryItem, NoteId};
use crate::progress::{ProgressEvent, ProgressMode, ProgressReporter};
use crate::prompts::{PaperMetadata, PromptKind};
use crate::store::ZoteroStore;

pub struct AnalyzeArgs {
    pub item_id: i64,
    pub kind: PromptKind,
    pub save: bool,
    pub output: Option<PathBuf>,
    pub instructions: Option<String>,
}

/// One finished analysis.
#[derive(Debug)]
pub struct ItemAnalysis {
    pub item: LibraryItem,
    pub result: AnalysisResult,
    pub note: Option<NoteId>,
}

/// Title of the note an analysis is saved under.
pub fn note_title(kind: PromptKind) -> String {
    format!("AI Analysis ({})", kind)
}

/// Analyze one item end to end.
pub async fn analyze_item<B: AnalysisBackend>(
    store: &ZoteroStore,
    client: &mut AnalysisClient<B>,
    item_id: i64,
    kind: PromptKind,
    instructions: Option<&str>,
    save: bool,
) -> crate::Result<ItemAnalysis> {
    let item = store
        .get_item(item_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Item {} not found", item_id)))?;

    let pdf_path = item
        .pdf_path
        .clone()
        .ok_or_else(|| Error::NotFound(format!("No PDF attached to item {}", item_id)))?;

    tracing::info!(item_id, pdf = %pdf_path.display(), "extracting text");
    let text = extract_pdf_text(&pdf_path)?.unwrap_or_default();
    if text.trim().chars().count() < MIN_ANALYZABLE_CHARS {
        return Err(Error::Extraction {
            path: pdf_path,
            detail: format!(
                "extracted text is empty or shorter than {} characters",
                MIN_ANALYZABLE_CHARS
            ),
        });
    }
    tracing::info!(
        item_id,
        chars = text.chars().count(),
        reading_minutes = estimate_reading_minutes(&text, 200),
        "text extracted"
    );

    let metadata = PaperMetadata::from(&item);
    let result = client
        .analyze_paper(kind, &text, &metadata, instructions)
        .await?;

    let note = if save {
        Some(
            store
                .add_note(item_id, &result.text, Some(&note_title(kind)))
                .await?,
        )
    } else {
        None
    };

    Ok(ItemAnalysis { item, result, note })
}

pub async fn run_analyze(config: &Config, args: AnalyzeArgs) -> Result<()> {
    let store = ZoteroStore::from_config(config)?;
    let mut client = AnalysisClient::from_config(config)?;

    eprintln!("Analyzing item {} ({})...", args.item_id, args.kind);
    let analysis = analyze_item(
        &store,
        &mut client,
        args.item_id,
        args.kind,
        args.instructions.as_deref(),
        args.save,
    )
    .await?;

    let rule = "=".repeat(70);
    println!("{}", rule);
    println!("{}", analysis.item.display_title());
    println!(
        "Model: {}  Tokens: {} in, {} out",
        analysis.result.model, analysis.result.input_tokens, analysis.result.output_tokens
    );
    println!("{}", rule);
    println!();
    println!("{}", analysis.result.text);
    println!();
    println!("{}", rule);

    if let Some(note) = &analysis.note {
        println!("Saved note {} ({}) to Zotero.", note.id, note.key);
    }
    if let Some(output) = &args.output {
        std::fs::write(output, &analysis.result.text)?;
        println!("Saved analysis to {}", output.display());
    }

    let usage = client.usage();
    println!("Total tokens used: {}", usage.total_tokens());
    Ok(())
}

/// Outcome of a batch run.
#[derive(Debug, Default, Serialize)]
pub struct BatchSummary {
    pub analyzed: usize,
    /// Items without a PDF attachment.
    pub skipped: Vec<i64>,
    pub failed: Vec<(i64, String)>,
    pub usage: UsageCounters,
}

/// Analyze every item in `items` that has a PDF. Failures are collected,
/// never propagated.
pub async fn analyze_batch<B: AnalysisBackend>(
    store: &ZoteroStore,
    client: &mut AnalysisClient<B>,
    items: &[LibraryItem],
    kind: PromptKind,
    save: bool,
    progress: &dyn ProgressReporter,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    let total = items.len() as u64;
    progress.report(ProgressEvent::Started {
        task: "batch".into(),
        total,
    });

    for (i, item) in items.iter().enumerate() {
        progress.report(ProgressEvent::Item {
            task: "batch".into(),
            n: i as u64 + 1,
            total,
            label: item.display_title().to_string(),
        });

        if item.pdf_path.is_none() {
            tracing::info!(item_id = item.id, "no PDF, skipping");
            summary.skipped.push(item.id);
            continue;
        }

        match analyze_item(store, client, item.id, kind, None, save).await {
            Ok(_) => summary.analyzed += 1,
            Err(e) => {
                tracing::warn!(
                    item_id = item.id,
                    transient = e.is_transient(),
                    error = %e,
                    "analysis failed"
                );
                progress.report(ProgressEvent::ItemFailed {
                    task: "batch".into(),
                    label: item.display_title().to_string(),
                    error: e.to_string(),
                });
                summary.failed.push((item.id, e.to_string()));
            }
        }
    }

    summary.usage = client.usage();
    summary
}

pub async fn run_batch(
    config: &Config,
    filter: ItemFilter,
    kind: PromptKind,
    save: bool,
    progress: Option<ProgressMode>,
) -> Result<()> {
    let store = ZoteroStore::from_config(config)?;
    let items = store.list_items(&filter).await?;
    if items.is_empty() {
        println!("No items found to process.");
        return Ok(());
    }

    let mut client = AnalysisClient::from_config(config)?;
    let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();
    let summary = analyze_batch(&store, &mut client, &items, kind, save, reporter.as_ref()).await;

    println!("Batch complete ({}).", kind);
    println!("  analyzed:  {}", summary.analyzed);
    println!("  no PDF:    {}", summary.skipped.len());
    println!("  failed:    {}", summary.failed.len());
    for (id, error) in &summary.failed {
        println!("    item {}: {}", id, error);
    }
    println!(
        "  tokens:    {} ({} in, {} out, {} requests)",
        summary.usage.total_tokens(),
        summary.usage.input_tokens,
        summary.usage.output_tokens,
        summary.usage.requests
    );
    Ok(())
}
