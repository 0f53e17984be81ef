//! Attachment file resolution.
//!
//! Zotero records an attachment either with an explicit path (absolute for
//! linked files, `storage:<name>` for imported ones) or with nothing useful,
//! in which case the file sits somewhere under `storage/<KEY>/`. A file that
//! cannot be found is simply left out.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Resolve a PDF attachment: explicit path first, then the first `*.pdf`
/// in the attachment's storage directory.
pub fn resolve_pdf(storage_dir: &Path, key: &str, stored_path: Option<&str>) -> Option<PathBuf> {
    explicit_path(storage_dir, key, stored_path)
        .or_else(|| first_file(&storage_dir.join(key), is_pdf))
}

/// Resolve any attachment: explicit path first, then the first regular file
/// in the attachment's storage directory.
pub fn resolve_any(storage_dir: &Path, key: &str, stored_path: Option<&str>) -> Option<PathBuf> {
    explicit_path(storage_dir, key, stored_path)
        .or_else(|| first_file(&storage_dir.join(key), |_| true))
}

fn explicit_path(storage_dir: &Path, key: &str, stored_path: Option<&str>) -> Option<PathBuf> {
    let stored = stored_path.map(str::trim).filter(|p| !p.is_empty())?;

    let candidate = if let Some(name) = stored.strip_prefix("storage:") {
        storage_dir.join(key).join(name)
    } else if stored.starts_with("attachments:") {
        // Relative to a linked-attachment base directory we know nothing about.
        return None;
    } else {
        PathBuf::from(stored)
    };

    candidate.is_file().then_some(candidate)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// First matching regular file directly inside `dir`, by file name.
fn first_file(dir: &Path, accept: impl Fn(&Path) -> bool) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .find(|path| accept(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn storage_with(files: &[&str]) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let storage = tmp.path().join("storage");
        let dir = storage.join("ABCD2345");
        fs::create_dir_all(&dir).unwrap();
        for f in files {
            fs::write(dir.join(f), b"x").unwrap();
        }
        (tmp, storage)
    }

    #[test]
    fn storage_prefix_resolves_inside_key_dir() {
        let (_tmp, storage) = storage_with(&["paper.pdf"]);
        let path = resolve_pdf(&storage, "ABCD2345", Some("storage:paper.pdf")).unwrap();
        assert_eq!(path, storage.join("ABCD2345").join("paper.pdf"));
    }

    #[test]
    fn explicit_absolute_path_wins() {
        let (tmp, storage) = storage_with(&["a.pdf"]);
        let linked = tmp.path().join("linked.pdf");
        fs::write(&linked, b"x").unwrap();

        let path = resolve_pdf(&storage, "ABCD2345", linked.to_str()).unwrap();
        assert_eq!(path, linked);
    }

    #[test]
    fn falls_back_to_first_pdf_by_name() {
        let (_tmp, storage) = storage_with(&["notes.txt", "b.pdf", "a.PDF"]);
        let path = resolve_pdf(&storage, "ABCD2345", Some("/gone/missing.pdf")).unwrap();
        assert_eq!(path.file_name().unwrap(), "a.PDF");
    }

    #[test]
    fn generic_resolution_takes_any_file() {
        let (_tmp, storage) = storage_with(&["snapshot.html"]);
        assert!(resolve_pdf(&storage, "ABCD2345", None).is_none());
        let path = resolve_any(&storage, "ABCD2345", None).unwrap();
        assert_eq!(path.file_name().unwrap(), "snapshot.html");
    }

    #[test]
    fn missing_directory_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(resolve_any(tmp.path(), "NOPE0000", None).is_none());
        assert!(resolve_pdf(tmp.path(), "NOPE0000", Some("attachments:x.pdf")).is_none());
    }
}
