mod common;

use std::fs;

use common::ZoteroFixture;
use paper_harness::error::Error;
use paper_harness::progress::NoProgress;
use paper_harness::vault::{sync_notes_from_vault, sync_to_vault};
use tempfile::TempDir;

/// One paper with a PDF, an HTML note, and a collection.
async fn library() -> (ZoteroFixture, i64) {
    let mut fx = ZoteroFixture::new().await;
    let id = fx
        .paper(
            "VAULT001",
            "Attention Is All You Need",
            &[("Ashish", "Vaswani"), ("Noam", "Shazeer")],
            "2024-05-01 12:00:00",
        )
        .await;
    fx.set_field(id, "date", "2017-06-12").await;
    fx.set_field(id, "abstractNote", "The dominant sequence transduction models...").await;
    fx.tag(id, "transformers").await;
    fx.add_attachment(
        id,
        "VPDF0001",
        "application/pdf",
        Some("storage:vaswani.pdf"),
        Some(("vaswani.pdf", b"%PDF-1.4 placeholder")),
    )
    .await;
    fx.add_note(
        id,
        "VNOTE001",
        "<div><p>AI Analysis (quick-summary)</p><p>Self-attention &amp; nothing else.</p></div>",
        "2024-05-02 00:00:00",
    )
    .await;
    let collection = fx.add_collection("Deep Learning", None).await;
    fx.add_to_collection(collection, id).await;
    (fx, id)
}

#[tokio::test]
async fn sync_writes_papers_notes_attachments_and_collections() {
    let (fx, id) = library().await;
    let store = fx.store();
    let vault = TempDir::new().unwrap();

    let stats = sync_to_vault(&store, vault.path(), false, &NoProgress)
        .await
        .unwrap();
    assert_eq!(stats.papers_synced, 1);
    assert_eq!(stats.notes_written, 1);
    assert_eq!(stats.files_copied, 1);
    assert_eq!(stats.collections_created, 1);
    assert!(stats.errors.is_empty(), "{:?}", stats.errors);

    let item_dir = vault.path().join("Zotero/repo/VAULT001");
    let paper = fs::read_to_string(item_dir.join("paper.md")).unwrap();
    assert!(paper.contains("title: \"Attention Is All You Need\""));
    assert!(paper.contains("  - \"Ashish Vaswani\""));
    assert!(paper.contains("collections:\n  - \"Deep Learning\""));
    assert!(paper.contains("year: 2017"));
    assert!(paper.contains(&format!("zotero_id: {}", id)));
    assert!(paper.contains("- [[vaswani.pdf]]"));

    let note = fs::read_to_string(item_dir.join("AI Analysis (quick-summary).md")).unwrap();
    assert_eq!(note, "AI Analysis (quick-summary)\nSelf-attention & nothing else.");

    assert_eq!(
        fs::read(item_dir.join("vaswani.pdf")).unwrap(),
        b"%PDF-1.4 placeholder"
    );

    let view = fs::read_to_string(vault.path().join("Zotero/collections/Deep Learning.md")).unwrap();
    assert!(view.contains("WHERE contains(collections, \"Deep Learning\")"));
    assert!(view.contains("*1 papers in this collection*"));
}

#[tokio::test]
async fn second_sync_does_not_recopy_attachments() {
    let (fx, _) = library().await;
    let store = fx.store();
    let vault = TempDir::new().unwrap();

    sync_to_vault(&store, vault.path(), false, &NoProgress).await.unwrap();
    let again = sync_to_vault(&store, vault.path(), false, &NoProgress).await.unwrap();
    assert_eq!(again.papers_synced, 1);
    assert_eq!(again.files_copied, 0);
}

#[tokio::test]
async fn dry_run_counts_but_writes_nothing() {
    let (fx, _) = library().await;
    let store = fx.store();
    let vault = TempDir::new().unwrap();

    let stats = sync_to_vault(&store, vault.path(), true, &NoProgress).await.unwrap();
    assert_eq!(stats.papers_synced, 1);
    assert_eq!(stats.notes_written, 1);
    assert_eq!(stats.files_copied, 1);
    assert_eq!(stats.collections_created, 1);
    assert!(!vault.path().join("Zotero").exists());
}

#[tokio::test]
async fn missing_vault_is_not_found() {
    let (fx, _) = library().await;
    let store = fx.store();
    let err = sync_to_vault(&store, std::path::Path::new("/nonexistent/vault"), false, &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn notes_import_from_vault_and_skip_existing_titles() {
    let (fx, id) = library().await;
    let store = fx.store();
    let vault = TempDir::new().unwrap();
    sync_to_vault(&store, vault.path(), false, &NoProgress).await.unwrap();

    let item_dir = vault.path().join("Zotero/repo/VAULT001");
    fs::write(item_dir.join("My Thoughts.md"), "Worth reproducing.").unwrap();

    let stats = sync_notes_from_vault(&store, vault.path(), false, false, &NoProgress)
        .await
        .unwrap();
    // The mirrored analysis note already exists in Zotero.
    assert_eq!(stats.notes_synced, 1);
    assert_eq!(stats.notes_skipped, 1);
    assert!(stats.errors.is_empty(), "{:?}", stats.errors);

    let notes = store.get_notes(id).await.unwrap();
    assert_eq!(notes.len(), 2);
    assert!(notes
        .iter()
        .any(|n| n.content == "My Thoughts\n\nWorth reproducing."));

    // Running again imports nothing new.
    let again = sync_notes_from_vault(&store, vault.path(), false, false, &NoProgress)
        .await
        .unwrap();
    assert_eq!(again.notes_synced, 0);
    assert_eq!(again.notes_skipped, 2);
    assert_eq!(store.get_notes(id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn overwrite_imports_even_when_title_exists() {
    let (fx, id) = library().await;
    let store = fx.store();
    let vault = TempDir::new().unwrap();
    sync_to_vault(&store, vault.path(), false, &NoProgress).await.unwrap();

    let stats = sync_notes_from_vault(&store, vault.path(), false, true, &NoProgress)
        .await
        .unwrap();
    assert_eq!(stats.notes_synced, 1);
    assert_eq!(stats.notes_skipped, 0);
    assert_eq!(store.get_notes(id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn notes_dry_run_leaves_zotero_untouched() {
    let (fx, id) = library().await;
    let store = fx.store();
    let vault = TempDir::new().unwrap();
    sync_to_vault(&store, vault.path(), false, &NoProgress).await.unwrap();
    fs::write(
        vault.path().join("Zotero/repo/VAULT001/Questions.md"),
        "Why sinusoids?",
    )
    .unwrap();

    let stats = sync_notes_from_vault(&store, vault.path(), true, false, &NoProgress)
        .await
        .unwrap();
    assert_eq!(stats.notes_synced, 1);
    assert_eq!(store.get_notes(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn directories_without_paper_md_are_ignored() {
    let (fx, id) = library().await;
    let store = fx.store();
    let vault = TempDir::new().unwrap();
    let stray = vault.path().join("Zotero/repo/STRAY001");
    fs::create_dir_all(&stray).unwrap();
    fs::write(stray.join("orphan.md"), "no parent").unwrap();

    let stats = sync_notes_from_vault(&store, vault.path(), false, false, &NoProgress)
        .await
        .unwrap();
    assert_eq!(stats.notes_synced, 0);
    assert_eq!(stats.notes_skipped, 0);
    assert_eq!(store.get_notes(id).await.unwrap().len(), 1);
}
