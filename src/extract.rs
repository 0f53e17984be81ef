//! PDF text extraction.
//!
//! Pages are extracted one by one with `pdf-extract`; empty pages are
//! skipped and the result is whitespace-normalized. If per-page extraction
//! fails outright, the whole-document extractor is tried before giving up.

use std::path::Path;

use crate::error::{Error, Result};

/// Below this many characters an extraction is not worth sending for analysis.
pub const MIN_ANALYZABLE_CHARS: usize = 100;

/// Extract plain text from the PDF at `path`.
///
/// Returns `Ok(None)` when the document contains no extractable text
/// (for example a scanned PDF without an OCR layer).
pub fn extract_pdf_text(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Err(Error::NotFound(format!("PDF file not found: {}", path.display())));
    }
    let bytes = std::fs::read(path)?;
    extract_pdf_bytes(&bytes).map_err(|detail| Error::Extraction {
        path: path.to_path_buf(),
        detail,
    })
}

/// Extract text from an in-memory PDF. Errors carry the extractor's message.
pub fn extract_pdf_bytes(bytes: &[u8]) -> std::result::Result<Option<String>, String> {
    let pages = match pdf_extract::extract_text_from_mem_by_pages(bytes) {
        Ok(pages) => pages,
        Err(e) => {
            tracing::warn!(error = %e, "per-page extraction failed, trying whole document");
            let whole = pdf_extract::extract_text_from_mem(bytes).map_err(|e| e.to_string())?;
            vec![whole]
        }
    };

    let parts: Vec<&str> = pages
        .iter()
        .map(|p| p.as_str())
        .filter(|p| !p.trim().is_empty())
        .collect();

    if parts.is_empty() {
        return Ok(None);
    }

    let cleaned = clean_text(&parts.join("\n\n"));
    if cleaned.is_empty() {
        Ok(None)
    } else {
        Ok(Some(cleaned))
    }
}

/// Trim each line, collapse runs of inner whitespace, drop blank lines.
pub fn clean_text(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reading time in minutes at `words_per_minute`, at least one.
pub fn estimate_reading_minutes(text: &str, words_per_minute: usize) -> usize {
    let words = text.split_whitespace().count();
    (words / words_per_minute.max(1)).max(1)
}
