mod common;

use std::fs;

use common::minimal_pdf;
use paper_harness::error::Error;
use paper_harness::extract::{extract_pdf_bytes, extract_pdf_text, MIN_ANALYZABLE_CHARS};
use tempfile::TempDir;

#[test]
fn extracts_phrase_from_pdf_bytes() {
    let text = extract_pdf_bytes(&minimal_pdf("transformer attention phrase"))
        .unwrap()
        .unwrap();
    assert!(text.contains("transformer attention phrase"));
}

#[test]
fn extracts_phrase_from_pdf_on_disk() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("paper.pdf");
    fs::write(&path, minimal_pdf("residual learning phrase")).unwrap();

    let text = extract_pdf_text(&path).unwrap().unwrap();
    assert!(text.contains("residual learning phrase"));
    assert!(text.len() < MIN_ANALYZABLE_CHARS);
}

#[test]
fn unreadable_pdf_on_disk_names_the_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broken.pdf");
    fs::write(&path, b"not a pdf at all").unwrap();

    let err = extract_pdf_text(&path).unwrap_err();
    match err {
        Error::Extraction { path: failed, .. } => assert_eq!(failed, path),
        other => panic!("expected extraction error, got {:?}", other),
    }
}
