//! A throwaway Zotero library on disk.
//!
//! Builds the subset of Zotero's schema the store reads, in a temp
//! directory laid out like a real data directory (`zotero.sqlite` plus
//! `storage/`), and offers small helpers to populate it.

#![allow(dead_code)]

pub mod mock;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use paper_harness::retry::RetryPolicy;
use paper_harness::store::ZoteroStore;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection, SqliteConnection};
use tempfile::TempDir;

const SCHEMA: &[&str] = &[
    "CREATE TABLE libraries (libraryID INTEGER PRIMARY KEY, type TEXT NOT NULL)",
    "CREATE TABLE itemTypes (itemTypeID INTEGER PRIMARY KEY, typeName TEXT NOT NULL)",
    "CREATE TABLE items (
        itemID INTEGER PRIMARY KEY,
        itemTypeID INT NOT NULL,
        dateAdded TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        dateModified TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        clientDateModified TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        libraryID INT NOT NULL,
        key TEXT NOT NULL,
        version INT NOT NULL DEFAULT 0,
        synced INT NOT NULL DEFAULT 0,
        UNIQUE (libraryID, key)
    )",
    "CREATE TABLE fields (fieldID INTEGER PRIMARY KEY, fieldName TEXT NOT NULL)",
    "CREATE TABLE itemDataValues (valueID INTEGER PRIMARY KEY, value UNIQUE)",
    "CREATE TABLE itemData (itemID INT, fieldID INT, valueID, PRIMARY KEY (itemID, fieldID))",
    "CREATE TABLE creators (creatorID INTEGER PRIMARY KEY, firstName TEXT, lastName TEXT, fieldMode INT)",
    "CREATE TABLE creatorTypes (creatorTypeID INTEGER PRIMARY KEY, creatorType TEXT)",
    "CREATE TABLE itemCreators (
        itemID INT NOT NULL,
        creatorID INT NOT NULL,
        creatorTypeID INT NOT NULL DEFAULT 1,
        orderIndex INT NOT NULL DEFAULT 0,
        PRIMARY KEY (itemID, orderIndex)
    )",
    "CREATE TABLE tags (tagID INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE)",
    "CREATE TABLE itemTags (itemID INT NOT NULL, tagID INT NOT NULL, type INT NOT NULL DEFAULT 0, PRIMARY KEY (itemID, tagID))",
    "CREATE TABLE collections (
        collectionID INTEGER PRIMARY KEY,
        collectionName TEXT NOT NULL,
        parentCollectionID INT DEFAULT NULL,
        libraryID INT NOT NULL DEFAULT 1,
        key TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE collectionItems (collectionID INT NOT NULL, itemID INT NOT NULL, orderIndex INT NOT NULL DEFAULT 0, PRIMARY KEY (collectionID, itemID))",
    "CREATE TABLE itemAttachments (itemID INTEGER PRIMARY KEY, parentItemID INT, linkMode INT, contentType TEXT, charsetID INT, path TEXT)",
    "CREATE TABLE itemNotes (itemID INTEGER PRIMARY KEY, parentItemID INT, note TEXT, title TEXT)",
    "CREATE TABLE deletedItems (itemID INTEGER PRIMARY KEY, dateDeleted DEFAULT CURRENT_TIMESTAMP NOT NULL)",
    "CREATE TABLE deletedCollections (collectionID INTEGER PRIMARY KEY, dateDeleted DEFAULT CURRENT_TIMESTAMP NOT NULL)",
    "INSERT INTO libraries VALUES (1, 'user')",
    "INSERT INTO itemTypes VALUES (1, 'journalArticle'), (2, 'book'), (3, 'attachment'), (4, 'note'), (5, 'conferencePaper'), (6, 'annotation')",
    "INSERT INTO fields VALUES (1, 'title'), (2, 'date'), (3, 'publicationTitle'), (4, 'DOI'), (5, 'url'), (6, 'abstractNote'), (7, 'volume'), (8, 'proceedingsTitle')",
    "INSERT INTO creatorTypes VALUES (1, 'author'), (2, 'editor')",
];

pub struct ZoteroFixture {
    pub dir: TempDir,
    conn: SqliteConnection,
}

impl ZoteroFixture {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("storage")).unwrap();

        let mut conn = SqliteConnectOptions::new()
            .filename(dir.path().join("zotero.sqlite"))
            .create_if_missing(true)
            .connect()
            .await
            .unwrap();
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut conn).await.unwrap();
        }

        Self { dir, conn }
    }

    pub fn zotero_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("zotero.sqlite")
    }

    /// Store with the default lock schedule (6 attempts from 100ms).
    pub fn store(&self) -> ZoteroStore {
        self.store_with(RetryPolicy::new(6, Duration::from_millis(100), 2.0))
    }

    pub fn store_with(&self, policy: RetryPolicy) -> ZoteroStore {
        ZoteroStore::open(self.zotero_dir(), policy).unwrap()
    }

    /// A second connection to the same file, for holding locks.
    pub async fn raw_connection(&self) -> SqliteConnection {
        SqliteConnectOptions::new()
            .filename(self.db_path())
            .connect()
            .await
            .unwrap()
    }

    pub async fn add_item(&mut self, type_name: &str, key: &str, modified: &str) -> i64 {
        sqlx::query(
            "INSERT INTO items (itemTypeID, libraryID, key, dateAdded, dateModified) \
             VALUES ((SELECT itemTypeID FROM itemTypes WHERE typeName = ?), 1, ?, ?, ?)",
        )
        .bind(type_name)
        .bind(key)
        .bind(modified)
        .bind(modified)
        .execute(&mut self.conn)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    pub async fn set_field(&mut self, item_id: i64, field: &str, value: &str) {
        sqlx::query("INSERT OR IGNORE INTO itemDataValues (value) VALUES (?)")
            .bind(value)
            .execute(&mut self.conn)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO itemData (itemID, fieldID, valueID) VALUES (?, \
             (SELECT fieldID FROM fields WHERE fieldName = ?), \
             (SELECT valueID FROM itemDataValues WHERE value = ?))",
        )
        .bind(item_id)
        .bind(field)
        .bind(value)
        .execute(&mut self.conn)
        .await
        .unwrap();
    }

    pub async fn add_creator(&mut self, item_id: i64, first: &str, last: &str, order: i64) {
        let creator_id = sqlx::query("INSERT INTO creators (firstName, lastName, fieldMode) VALUES (?, ?, 0)")
            .bind(first)
            .bind(last)
            .execute(&mut self.conn)
            .await
            .unwrap()
            .last_insert_rowid();
        sqlx::query("INSERT INTO itemCreators (itemID, creatorID, orderIndex) VALUES (?, ?, ?)")
            .bind(item_id)
            .bind(creator_id)
            .bind(order)
            .execute(&mut self.conn)
            .await
            .unwrap();
    }

    pub async fn tag(&mut self, item_id: i64, tag: &str) {
        sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
            .bind(tag)
            .execute(&mut self.conn)
            .await
            .unwrap();
        sqlx::query("INSERT INTO itemTags (itemID, tagID) VALUES (?, (SELECT tagID FROM tags WHERE name = ?))")
            .bind(item_id)
            .bind(tag)
            .execute(&mut self.conn)
            .await
            .unwrap();
    }

    /// A journal article with a title and authors, in one call.
    pub async fn paper(
        &mut self,
        key: &str,
        title: &str,
        authors: &[(&str, &str)],
        modified: &str,
    ) -> i64 {
        let id = self.add_item("journalArticle", key, modified).await;
        self.set_field(id, "title", title).await;
        for (i, (first, last)) in authors.iter().enumerate() {
            self.add_creator(id, first, last, i as i64).await;
        }
        id
    }

    pub async fn add_collection(&mut self, name: &str, parent: Option<i64>) -> i64 {
        sqlx::query("INSERT INTO collections (collectionName, parentCollectionID) VALUES (?, ?)")
            .bind(name)
            .bind(parent)
            .execute(&mut self.conn)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    pub async fn add_to_collection(&mut self, collection_id: i64, item_id: i64) {
        sqlx::query("INSERT INTO collectionItems (collectionID, itemID) VALUES (?, ?)")
            .bind(collection_id)
            .bind(item_id)
            .execute(&mut self.conn)
            .await
            .unwrap();
    }

    /// Attachment row plus, when `file_name` is given, a file at
    /// `storage/<key>/<file_name>`.
    pub async fn add_attachment(
        &mut self,
        parent_id: i64,
        key: &str,
        content_type: &str,
        stored_path: Option<&str>,
        file_name: Option<(&str, &[u8])>,
    ) -> i64 {
        let id = self.add_item("attachment", key, "2024-01-01 00:00:00").await;
        sqlx::query(
            "INSERT INTO itemAttachments (itemID, parentItemID, linkMode, contentType, path) \
             VALUES (?, ?, 0, ?, ?)",
        )
        .bind(id)
        .bind(parent_id)
        .bind(content_type)
        .bind(stored_path)
        .execute(&mut self.conn)
        .await
        .unwrap();

        if let Some((name, bytes)) = file_name {
            let dir = self.dir.path().join("storage").join(key);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(name), bytes).unwrap();
        }
        id
    }

    pub async fn add_note(&mut self, parent_id: i64, key: &str, html: &str, modified: &str) -> i64 {
        let id = self.add_item("note", key, modified).await;
        sqlx::query("INSERT INTO itemNotes (itemID, parentItemID, note) VALUES (?, ?, ?)")
            .bind(id)
            .bind(parent_id)
            .bind(html)
            .execute(&mut self.conn)
            .await
            .unwrap();
        id
    }

    pub async fn trash(&mut self, item_id: i64) {
        sqlx::query("INSERT INTO deletedItems (itemID) VALUES (?)")
            .bind(item_id)
            .execute(&mut self.conn)
            .await
            .unwrap();
    }

    pub async fn trash_collection(&mut self, collection_id: i64) {
        sqlx::query("INSERT INTO deletedCollections (collectionID) VALUES (?)")
            .bind(collection_id)
            .execute(&mut self.conn)
            .await
            .unwrap();
    }

    pub async fn count(&mut self, sql: &str) -> i64 {
        sqlx::query_scalar(sql)
            .fetch_one(&mut self.conn)
            .await
            .unwrap()
    }

    pub async fn close(self) {
        self.conn.close().await.unwrap();
    }
}

/// Single-page PDF showing `phrase` in Helvetica, with a correct xref table.
pub fn minimal_pdf(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 10 Tf 40 700 Td ({}) Tj ET", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n");
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}
