//! Error kinds returned at the boundary of every component.
//!
//! Callers match on [`Error`] to tell a missing record from a transient
//! failure from a request that will never succeed. Only the two retry
//! wrappers ([`crate::analysis`] and [`crate::store`]) ever retry; by the
//! time one of these values reaches a caller, recovery has been attempted.

use std::path::PathBuf;

use thiserror::Error;

use crate::analysis::FailureKind;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A caller-supplied argument violates a precondition.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The analysis endpoint rejected the request itself (4xx, unparseable reply).
    #[error("Analysis request failed ({kind}): {detail}")]
    FatalRequest { kind: FailureKind, detail: String },

    /// A transient endpoint failure persisted through every attempt.
    #[error("Analysis request failed after {attempts} attempts ({kind}): {detail}")]
    RetriesExhausted {
        attempts: u32,
        kind: FailureKind,
        detail: String,
    },

    /// A record or file that was asked for does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// `add_note` was pointed at a missing or trashed item.
    #[error("Parent item {0} not found")]
    ParentNotFound(i64),

    /// Lock contention outlasted the retry budget.
    #[error(
        "Zotero database is locked (gave up after {attempts} attempts). \
         Close Zotero and try again."
    )]
    DatabaseLocked { attempts: u32 },

    /// The note transaction failed and was rolled back.
    #[error("Failed to add note: {0}")]
    StorageWrite(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Text extraction failed for {path}: {detail}")]
    Extraction { path: PathBuf, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the kinds a retry wrapper gave up on, as opposed to kinds
    /// that were never worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::RetriesExhausted { .. } | Error::DatabaseLocked { .. }
        )
    }
}
