//! Core data models read from the Zotero library.
//!
//! These are read-only projections: nothing here is written back except
//! through [`crate::store::ZoteroStore::add_note`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

/// One bibliographic record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LibraryItem {
    pub id: i64,
    pub key: String,
    pub item_type: String,
    pub title: Option<String>,
    /// "First Last" per creator, in Zotero's order.
    pub authors: Vec<String>,
    pub year: Option<String>,
    pub publication: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub abstract_note: Option<String>,
    pub tags: Vec<String>,
    pub date_added: String,
    pub date_modified: String,
    pub pdf_path: Option<PathBuf>,
    pub attachments: Vec<Attachment>,
    /// Typed fields without a dedicated slot above, keyed by Zotero field name.
    pub extra: BTreeMap<String, String>,
}

impl LibraryItem {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }

    pub fn authors_joined(&self) -> String {
        self.authors.join(", ")
    }
}

/// A file attached to an item, resolved to a path on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub path: PathBuf,
    pub content_type: Option<String>,
}

/// A note child item. The first line of `content` is its title.
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub id: i64,
    pub key: String,
    pub parent_id: i64,
    pub date_added: String,
    pub date_modified: String,
    pub content: String,
}

impl Note {
    pub fn title(&self) -> &str {
        self.content.lines().next().unwrap_or("").trim()
    }
}

/// Identifier of a note created by [`crate::store::ZoteroStore::add_note`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteId {
    pub id: i64,
    pub key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub item_ids: Vec<i64>,
}

/// Filters for [`crate::store::ZoteroStore::list_items`].
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub collection: Option<String>,
    /// Every tag must be present.
    pub tags: Vec<String>,
    /// `None` returns everything.
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_title_is_first_line() {
        let note = Note {
            id: 1,
            key: "ABCD1234".into(),
            parent_id: 2,
            date_added: String::new(),
            date_modified: String::new(),
            content: "AI Analysis (methodology)\n\nBody".into(),
        };
        assert_eq!(note.title(), "AI Analysis (methodology)");
    }

    #[test]
    fn untitled_item() {
        let item = LibraryItem::default();
        assert_eq!(item.display_title(), "Untitled");
        assert_eq!(item.authors_joined(), "");
    }
}
