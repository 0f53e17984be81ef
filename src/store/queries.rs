//! SQL against the Zotero schema.
//!
//! Every function here runs on a single borrowed connection and returns raw
//! `sqlx::Error`s; retry and error mapping live one level up in
//! [`super::ZoteroStore`]. Trashed rows (`deletedItems`,
//! `deletedCollections`) are excluded everywhere.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::attachments::{self, PDF_CONTENT_TYPE};
use crate::models::{Attachment, Collection, ItemFilter, LibraryItem, Note, NoteId};

/// Item types that never show up as library entries on their own.
const CHILD_TYPES: &str = "('attachment', 'note', 'annotation')";

const ITEM_COLUMNS: &str = "SELECT i.itemID, i.key, it.typeName, i.dateAdded, i.dateModified \
     FROM items i \
     JOIN itemTypes it ON i.itemTypeID = it.itemTypeID";

pub async fn list_items(
    conn: &mut SqliteConnection,
    storage_dir: &Path,
    filter: &ItemFilter,
) -> Result<Vec<LibraryItem>, sqlx::Error> {
    let mut sql = format!(
        "{ITEM_COLUMNS} \
         WHERE i.itemID NOT IN (SELECT itemID FROM deletedItems) \
           AND it.typeName NOT IN {CHILD_TYPES}"
    );
    if filter.collection.is_some() {
        sql.push_str(
            " AND i.itemID IN (SELECT ci.itemID FROM collectionItems ci \
               JOIN collections c ON ci.collectionID = c.collectionID \
               WHERE c.collectionName = ?)",
        );
    }
    for _ in &filter.tags {
        sql.push_str(
            " AND i.itemID IN (SELECT itg.itemID FROM itemTags itg \
               JOIN tags t ON itg.tagID = t.tagID WHERE t.name = ?)",
        );
    }
    // SQLite treats a negative LIMIT as unbounded.
    sql.push_str(" ORDER BY i.dateModified DESC, i.itemID DESC LIMIT ?");

    let mut query = sqlx::query(&sql);
    if let Some(collection) = &filter.collection {
        query = query.bind(collection);
    }
    for tag in &filter.tags {
        query = query.bind(tag);
    }
    query = query.bind(filter.limit.unwrap_or(-1));

    let rows = query.fetch_all(&mut *conn).await?;
    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let item = base_item(&row)?;
        items.push(hydrate(conn, storage_dir, item).await?);
    }
    Ok(items)
}

pub async fn get_item(
    conn: &mut SqliteConnection,
    storage_dir: &Path,
    item_id: i64,
) -> Result<Option<LibraryItem>, sqlx::Error> {
    let sql = format!(
        "{ITEM_COLUMNS} \
         WHERE i.itemID = ? AND i.itemID NOT IN (SELECT itemID FROM deletedItems)"
    );
    let row = sqlx::query(&sql)
        .bind(item_id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let item = base_item(&row)?;
            Ok(Some(hydrate(conn, storage_dir, item).await?))
        }
        None => Ok(None),
    }
}

pub async fn get_notes(
    conn: &mut SqliteConnection,
    parent_id: i64,
) -> Result<Vec<Note>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT i.itemID, i.key, i.dateAdded, i.dateModified, n.note, n.parentItemID \
         FROM itemNotes n \
         JOIN items i ON n.itemID = i.itemID \
         WHERE n.parentItemID = ? \
           AND i.itemID NOT IN (SELECT itemID FROM deletedItems) \
         ORDER BY i.dateModified DESC, i.itemID DESC",
    )
    .bind(parent_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(Note {
                id: row.try_get("itemID")?,
                key: row.try_get("key")?,
                parent_id: row.try_get("parentItemID")?,
                date_added: row.try_get("dateAdded")?,
                date_modified: row.try_get("dateModified")?,
                content: row
                    .try_get::<Option<String>, _>("note")?
                    .unwrap_or_default(),
            })
        })
        .collect()
}

/// Case-insensitive substring match on titles and creator names. Each
/// matching item appears once, most recently modified first.
pub async fn search_items(
    conn: &mut SqliteConnection,
    storage_dir: &Path,
    text: &str,
    limit: i64,
) -> Result<Vec<LibraryItem>, sqlx::Error> {
    let pattern = format!("%{}%", escape_like(text));
    let sql = format!(
        "SELECT i.itemID, MAX(i.dateModified) AS modified \
         FROM items i \
         JOIN itemTypes it ON i.itemTypeID = it.itemTypeID \
         LEFT JOIN itemData d ON i.itemID = d.itemID \
           AND d.fieldID = (SELECT fieldID FROM fields WHERE fieldName = 'title') \
         LEFT JOIN itemDataValues v ON d.valueID = v.valueID \
         LEFT JOIN itemCreators ic ON i.itemID = ic.itemID \
         LEFT JOIN creators c ON ic.creatorID = c.creatorID \
         WHERE i.itemID NOT IN (SELECT itemID FROM deletedItems) \
           AND it.typeName NOT IN {CHILD_TYPES} \
           AND (v.value LIKE ?1 ESCAPE '\\' \
                OR c.firstName LIKE ?1 ESCAPE '\\' \
                OR c.lastName LIKE ?1 ESCAPE '\\') \
         GROUP BY i.itemID \
         ORDER BY modified DESC, i.itemID DESC \
         LIMIT ?2"
    );

    let ids: Vec<i64> = sqlx::query_scalar(&sql)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

    let mut items = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(item) = get_item(conn, storage_dir, id).await? {
            items.push(item);
        }
    }
    Ok(items)
}

pub async fn list_collections(
    conn: &mut SqliteConnection,
) -> Result<Vec<Collection>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT collectionID, collectionName, parentCollectionID \
         FROM collections \
         WHERE collectionID NOT IN (SELECT collectionID FROM deletedCollections) \
         ORDER BY collectionName COLLATE NOCASE, collectionID",
    )
    .fetch_all(&mut *conn)
    .await?;

    let members = sqlx::query(
        "SELECT collectionID, itemID FROM collectionItems \
         WHERE itemID NOT IN (SELECT itemID FROM deletedItems) \
         ORDER BY collectionID, orderIndex, itemID",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut by_collection: HashMap<i64, Vec<i64>> = HashMap::new();
    for row in &members {
        let collection_id: i64 = row.try_get("collectionID")?;
        let item_id: i64 = row.try_get("itemID")?;
        by_collection.entry(collection_id).or_default().push(item_id);
    }

    rows.iter()
        .map(|row| {
            let id: i64 = row.try_get("collectionID")?;
            Ok(Collection {
                id,
                name: row.try_get("collectionName")?,
                parent_id: row.try_get("parentCollectionID")?,
                item_ids: by_collection.remove(&id).unwrap_or_default(),
            })
        })
        .collect()
}

/// Why a note insert stopped. Only `Sql` can be a lock.
#[derive(Debug)]
pub enum NoteInsertError {
    ParentNotFound(i64),
    MissingNoteType,
    Sql(sqlx::Error),
}

impl std::fmt::Display for NoteInsertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoteInsertError::ParentNotFound(id) => write!(f, "parent item {} not found", id),
            NoteInsertError::MissingNoteType => f.write_str("note item type missing from schema"),
            NoteInsertError::Sql(e) => write!(f, "{}", e),
        }
    }
}

impl From<sqlx::Error> for NoteInsertError {
    fn from(e: sqlx::Error) -> Self {
        NoteInsertError::Sql(e)
    }
}

/// Insert a note item and its `itemNotes` row under `parent_id`.
///
/// Runs on a connection that already holds an open transaction; the caller
/// commits or rolls back.
pub async fn insert_note(
    conn: &mut SqliteConnection,
    parent_id: i64,
    body: &str,
) -> Result<NoteId, NoteInsertError> {
    let library_id: Option<i64> = sqlx::query_scalar(
        "SELECT libraryID FROM items \
         WHERE itemID = ? AND itemID NOT IN (SELECT itemID FROM deletedItems)",
    )
    .bind(parent_id)
    .fetch_optional(&mut *conn)
    .await?;
    let library_id = library_id.ok_or(NoteInsertError::ParentNotFound(parent_id))?;

    let note_type: Option<i64> =
        sqlx::query_scalar("SELECT itemTypeID FROM itemTypes WHERE typeName = 'note'")
            .fetch_optional(&mut *conn)
            .await?;
    let note_type = note_type.ok_or(NoteInsertError::MissingNoteType)?;

    let now = chrono::Utc::now();
    let timestamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
    let key = note_key(parent_id, now.timestamp_nanos_opt().unwrap_or_default());

    let inserted = sqlx::query(
        "INSERT INTO items (itemTypeID, libraryID, dateAdded, dateModified, key) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(note_type)
    .bind(library_id)
    .bind(&timestamp)
    .bind(&timestamp)
    .bind(&key)
    .execute(&mut *conn)
    .await?;
    let note_id = inserted.last_insert_rowid();

    sqlx::query("INSERT INTO itemNotes (itemID, parentItemID, note) VALUES (?, ?, ?)")
        .bind(note_id)
        .bind(parent_id)
        .bind(body)
        .execute(&mut *conn)
        .await?;

    Ok(NoteId { id: note_id, key })
}

/// Eight uppercase hex characters derived from the parent and a timestamp.
pub fn note_key(parent_id: i64, nanos: i64) -> String {
    let digest = Sha256::digest(format!("{}{}", parent_id, nanos).as_bytes());
    hex::encode(digest)[..8].to_uppercase()
}

fn base_item(row: &SqliteRow) -> Result<LibraryItem, sqlx::Error> {
    Ok(LibraryItem {
        id: row.try_get("itemID")?,
        key: row.try_get("key")?,
        item_type: row.try_get("typeName")?,
        date_added: row.try_get("dateAdded")?,
        date_modified: row.try_get("dateModified")?,
        ..Default::default()
    })
}

/// Fill in fields, creators, tags and attachments for a base item.
async fn hydrate(
    conn: &mut SqliteConnection,
    storage_dir: &Path,
    mut item: LibraryItem,
) -> Result<LibraryItem, sqlx::Error> {
    let fields = sqlx::query(
        "SELECT f.fieldName, CAST(v.value AS TEXT) AS value \
         FROM itemData d \
         JOIN fields f ON d.fieldID = f.fieldID \
         JOIN itemDataValues v ON d.valueID = v.valueID \
         WHERE d.itemID = ?",
    )
    .bind(item.id)
    .fetch_all(&mut *conn)
    .await?;

    let mut extra = BTreeMap::new();
    for row in &fields {
        let name: String = row.try_get("fieldName")?;
        let value: Option<String> = row.try_get("value")?;
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            continue;
        };
        match name.as_str() {
            "title" => item.title = Some(value),
            "date" => {
                item.year = year_from_date(&value);
                extra.insert(name, value);
            }
            "publicationTitle" => item.publication = Some(value),
            "DOI" => item.doi = Some(value),
            "url" => item.url = Some(value),
            "abstractNote" => item.abstract_note = Some(value),
            _ => {
                extra.insert(name, value);
            }
        }
    }
    // Conference papers and book sections carry their venue elsewhere.
    if item.publication.is_none() {
        item.publication = ["proceedingsTitle", "bookTitle"]
            .iter()
            .find_map(|f| extra.get(*f).cloned());
    }
    item.extra = extra;

    let creators = sqlx::query(
        "SELECT c.firstName, c.lastName \
         FROM itemCreators ic \
         JOIN creators c ON ic.creatorID = c.creatorID \
         WHERE ic.itemID = ? \
         ORDER BY ic.orderIndex",
    )
    .bind(item.id)
    .fetch_all(&mut *conn)
    .await?;
    for row in &creators {
        let first: Option<String> = row.try_get("firstName")?;
        let last: Option<String> = row.try_get("lastName")?;
        let name = format!(
            "{} {}",
            first.unwrap_or_default(),
            last.unwrap_or_default()
        );
        let name = name.trim();
        if !name.is_empty() {
            item.authors.push(name.to_string());
        }
    }

    item.tags = sqlx::query_scalar(
        "SELECT t.name FROM itemTags itg \
         JOIN tags t ON itg.tagID = t.tagID \
         WHERE itg.itemID = ? \
         ORDER BY t.name",
    )
    .bind(item.id)
    .fetch_all(&mut *conn)
    .await?;

    let files = sqlx::query(
        "SELECT i.key, ia.path, ia.contentType \
         FROM itemAttachments ia \
         JOIN items i ON ia.itemID = i.itemID \
         WHERE ia.parentItemID = ? \
           AND ia.itemID NOT IN (SELECT itemID FROM deletedItems) \
         ORDER BY ia.itemID",
    )
    .bind(item.id)
    .fetch_all(&mut *conn)
    .await?;
    for row in &files {
        let key: String = row.try_get("key")?;
        let path: Option<String> = row.try_get("path")?;
        let content_type: Option<String> = row.try_get("contentType")?;

        if item.pdf_path.is_none() && content_type.as_deref() == Some(PDF_CONTENT_TYPE) {
            item.pdf_path = attachments::resolve_pdf(storage_dir, &key, path.as_deref());
        }
        if let Some(resolved) = attachments::resolve_any(storage_dir, &key, path.as_deref()) {
            item.attachments.push(Attachment {
                path: resolved,
                content_type,
            });
        }
    }

    Ok(item)
}

/// First run of four digits, which is how Zotero's multipart dates
/// (`2017-06-12 2017-06-12`) and free-form dates both carry the year.
fn year_from_date(date: &str) -> Option<String> {
    let bytes = date.as_bytes();
    bytes
        .windows(4)
        .position(|w| w.iter().all(u8::is_ascii_digit))
        .map(|i| date[i..i + 4].to_string())
}

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
