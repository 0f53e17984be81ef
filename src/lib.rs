//! # Paper Harness
//!
//! Analyze papers from a local Zotero library with Claude and write the
//! results back as Zotero notes.
//!
//! Two external dependencies fail transiently and are wrapped in retry
//! layers built on one [`retry::RetryPolicy`]:
//!
//! - the Anthropic Messages API ([`analysis::AnalysisClient`]): rate limits,
//!   connection failures and 5xx responses are retried with exponential
//!   backoff; other 4xx responses fail immediately;
//! - the Zotero SQLite file ([`store::ZoteroStore`]): Zotero holds it open
//!   while running, so busy/locked results are retried on a short schedule
//!   before reporting [`Error::DatabaseLocked`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌──────────┐   ┌─────────┐   ┌────────────┐
//! │  Store  │──▶│ Extract  │──▶│ Prompts │──▶│  Analysis  │
//! │ (read)  │   │  (PDF)   │   │         │   │  (HTTP)    │
//! └─────────┘   └──────────┘   └─────────┘   └─────┬──────┘
//!                                                  │
//!                      ┌───────────────────────────┤
//!                      ▼                           ▼
//!                ┌───────────┐               ┌───────────┐
//!                │   Store   │               │   Vault   │
//!                │  (note)   │               │ (markdown)│
//!                └───────────┘               └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration |
//! | [`error`] | Error kinds shared by every component |
//! | [`retry`] | Bounded exponential backoff |
//! | [`models`] | Library records, notes, collections |
//! | [`store`] | Zotero database access with lock retry |
//! | [`analysis`] | Anthropic client with usage accounting |
//! | [`prompts`] | Analysis prompt templates |
//! | [`extract`] | PDF text extraction |
//! | [`vault`] | Markdown vault mirror |
//! | [`progress`] | Progress reporting on stderr |

pub mod analysis;
pub mod analyze_cmd;
pub mod config;
pub mod configure_cmd;
pub mod error;
pub mod extract;
pub mod library_cmd;
pub mod models;
pub mod progress;
pub mod prompts;
pub mod retry;
pub mod store;
pub mod sync_cmd;
pub mod vault;

pub use error::{Error, Result};
