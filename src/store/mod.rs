//! Zotero library access.
//!
//! [`ZoteroStore`] reads bibliographic records from `zotero.sqlite` and
//! writes analysis notes back. Zotero keeps the database open while it
//! runs, so any statement can come back `SQLITE_BUSY`/`SQLITE_LOCKED`.
//! Every operation is therefore one *attempt*: open a fresh connection, do
//! the work, close it. Lock errors retry the whole attempt under the
//! store's [`RetryPolicy`] (100ms, 200ms, 400ms, ... by default); anything
//! else is reported immediately.
//!
//! Connections are opened with a zero busy timeout so that SQLite never
//! waits internally and all waiting happens on the policy's schedule.
//! Reads use read-only connections. `add_note` runs in a single
//! transaction that is rolled back on any failure, so a failed or retried
//! attempt never leaves a partial note behind.

mod attachments;
mod queries;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection, SqliteConnection};

use crate::config::{Config, DATABASE_FILE};
use crate::error::{Error, Result};
use crate::models::{Collection, ItemFilter, LibraryItem, Note, NoteId};
use crate::retry::{RetryError, RetryPolicy};

use queries::NoteInsertError;

pub use attachments::{resolve_any, resolve_pdf, PDF_CONTENT_TYPE};

/// Title used when `add_note` is given none.
pub const DEFAULT_NOTE_TITLE: &str = "AI Analysis";

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

pub struct ZoteroStore {
    db_path: PathBuf,
    storage_dir: PathBuf,
    policy: RetryPolicy,
}

impl ZoteroStore {
    /// Open the library in `zotero_dir` (the directory holding
    /// `zotero.sqlite` and `storage/`).
    pub fn open(zotero_dir: &Path, policy: RetryPolicy) -> Result<Self> {
        let db_path = zotero_dir.join(DATABASE_FILE);
        if !db_path.is_file() {
            return Err(Error::NotFound(format!(
                "Zotero database not found at {}",
                db_path.display()
            )));
        }
        Ok(Self {
            db_path,
            storage_dir: zotero_dir.join("storage"),
            policy,
        })
    }

    /// Open the configured (or discovered) library with the configured
    /// lock-retry policy.
    pub fn from_config(config: &Config) -> Result<Self> {
        let dir = config.zotero_dir().ok_or_else(|| {
            Error::Config(
                "No Zotero directory configured or found. \
                 Run `paper configure --zotero-path <dir>`."
                    .to_string(),
            )
        })?;
        Self::open(&dir, config.lock_retry_policy())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Regular items (not attachments, notes or annotations), newest
    /// modification first. Tag filters must all match.
    pub async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<LibraryItem>> {
        self.read(|| async move {
            let mut conn = self.connect(true).await?;
            let items = queries::list_items(&mut conn, &self.storage_dir, filter).await;
            close(conn).await;
            items
        })
        .await
    }

    /// One item with its metadata and attachments, or `None` if it does not
    /// exist or is in the trash.
    pub async fn get_item(&self, item_id: i64) -> Result<Option<LibraryItem>> {
        self.read(|| async move {
            let mut conn = self.connect(true).await?;
            let item = queries::get_item(&mut conn, &self.storage_dir, item_id).await;
            close(conn).await;
            item
        })
        .await
    }

    /// Notes attached to `parent_id`, most recently modified first.
    pub async fn get_notes(&self, parent_id: i64) -> Result<Vec<Note>> {
        self.read(|| async move {
            let mut conn = self.connect(true).await?;
            let notes = queries::get_notes(&mut conn, parent_id).await;
            close(conn).await;
            notes
        })
        .await
    }

    /// Items whose title or any creator name contains `text`, ignoring case.
    pub async fn search_items(&self, text: &str, limit: i64) -> Result<Vec<LibraryItem>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("search text must not be empty".into()));
        }
        self.read(|| async move {
            let mut conn = self.connect(true).await?;
            let items = queries::search_items(&mut conn, &self.storage_dir, text, limit).await;
            close(conn).await;
            items
        })
        .await
    }

    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        self.read(|| async move {
            let mut conn = self.connect(true).await?;
            let collections = queries::list_collections(&mut conn).await;
            close(conn).await;
            collections
        })
        .await
    }

    /// Attach a note to `parent_id`. The stored body is
    /// `"{title}\n\n{content}"`; `title` defaults to [`DEFAULT_NOTE_TITLE`].
    pub async fn add_note(
        &self,
        parent_id: i64,
        content: &str,
        title: Option<&str>,
    ) -> Result<NoteId> {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_NOTE_TITLE);
        let body = format!("{}\n\n{}", title, content);
        let body = body.as_str();

        self.ensure_database()?;
        let outcome = self
            .policy
            .run(|| self.add_note_once(parent_id, body), |e| match e {
                NoteInsertError::Sql(err) => is_busy(err),
                _ => false,
            })
            .await;

        match outcome {
            Ok(note) => {
                tracing::info!(parent_id, note_id = note.id, key = %note.key, "note added");
                Ok(note)
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                tracing::error!(parent_id, attempts, error = %last, "database stayed locked");
                Err(Error::DatabaseLocked { attempts })
            }
            Err(RetryError::Aborted(NoteInsertError::ParentNotFound(id))) => {
                Err(Error::ParentNotFound(id))
            }
            Err(RetryError::Aborted(e)) => Err(Error::StorageWrite(e.to_string())),
        }
    }

    async fn add_note_once(
        &self,
        parent_id: i64,
        body: &str,
    ) -> std::result::Result<NoteId, NoteInsertError> {
        let mut conn = self.connect(false).await?;
        let outcome = insert_in_transaction(&mut conn, parent_id, body).await;
        close(conn).await;
        outcome
    }

    /// Run one read attempt under the lock-retry policy.
    async fn read<T, F, Fut>(&self, attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        self.ensure_database()?;
        match self.policy.run(attempt, is_busy).await {
            Ok(value) => Ok(value),
            Err(RetryError::Exhausted { attempts, last }) => {
                tracing::error!(attempts, error = %last, "database stayed locked");
                Err(Error::DatabaseLocked { attempts })
            }
            Err(RetryError::Aborted(e)) => Err(Error::Database(e)),
        }
    }

    fn ensure_database(&self) -> Result<()> {
        if self.db_path.is_file() {
            Ok(())
        } else {
            Err(Error::NotFound(format!(
                "Zotero database not found at {}",
                self.db_path.display()
            )))
        }
    }

    async fn connect(&self, read_only: bool) -> std::result::Result<SqliteConnection, sqlx::Error> {
        SqliteConnectOptions::new()
            .filename(&self.db_path)
            .read_only(read_only)
            .create_if_missing(false)
            .busy_timeout(Duration::ZERO)
            .connect()
            .await
    }
}

async fn insert_in_transaction(
    conn: &mut SqliteConnection,
    parent_id: i64,
    body: &str,
) -> std::result::Result<NoteId, NoteInsertError> {
    let mut tx = conn.begin().await?;
    match queries::insert_note(&mut tx, parent_id, body).await {
        Ok(note) => {
            tx.commit().await?;
            Ok(note)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

async fn close(conn: SqliteConnection) {
    if let Err(e) = conn.close().await {
        tracing::debug!(error = %e, "closing Zotero connection failed");
    }
}

/// True for SQLite busy/locked results, including extended codes such as
/// `SQLITE_BUSY_SNAPSHOT`.
pub fn is_busy(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = err else {
        return false;
    };
    let by_code = db
        .code()
        .and_then(|c| c.parse::<i32>().ok())
        .map(|c| matches!(c & 0xFF, SQLITE_BUSY | SQLITE_LOCKED))
        .unwrap_or(false);
    by_code || {
        let msg = db.message().to_ascii_lowercase();
        msg.contains("database is locked") || msg.contains("database table is locked")
    }
}
