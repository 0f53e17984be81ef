//! # Paper Harness CLI (`paper`)
//!
//! Browse a local Zotero library, analyze papers with Claude, and mirror
//! the library into a markdown vault.
//!
//! ## Usage
//!
//! ```bash
//! paper [--config ~/.paper-harness/config.toml] [-v] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `paper configure` | Show or change the configuration |
//! | `paper list` | List library items, optionally by collection and tags |
//! | `paper show <id>` | Show one item in detail |
//! | `paper notes <id>` | Show the notes attached to an item |
//! | `paper search "<text>"` | Search titles and creator names |
//! | `paper collections` | List collections |
//! | `paper prompts` | List analysis kinds |
//! | `paper analyze <id>` | Analyze one paper and save the result as a note |
//! | `paper batch` | Analyze every matching paper that has a PDF |
//! | `paper sync` | Mirror the library into a markdown vault |
//! | `paper sync-notes` | Import vault markdown files as Zotero notes |
//! | `paper completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! paper configure --zotero-path ~/Zotero --api-key sk-ant-...
//! paper list --collection "Machine Learning" --tag unread
//! paper analyze 1234 --kind quick-summary --output summary.md
//! paper batch --tag to-read --kind methodology --limit 10
//! paper sync --vault ~/Obsidian/Research --dry-run
//! ```

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use paper_harness::analyze_cmd::{self, AnalyzeArgs};
use paper_harness::config::{self, default_config_path};
use paper_harness::configure_cmd::{self, ConfigureArgs};
use paper_harness::library_cmd;
use paper_harness::models::ItemFilter;
use paper_harness::progress::ProgressMode;
use paper_harness::prompts::PromptKind;
use paper_harness::sync_cmd;

/// Paper Harness: Claude-powered analysis for your Zotero library.
#[derive(Parser)]
#[command(
    name = "paper",
    about = "Analyze papers from your Zotero library with Claude",
    version,
    long_about = "Paper Harness reads your local Zotero database, extracts the text of attached \
    PDFs, sends it to Claude with one of several analysis prompts, and saves the result back \
    to Zotero as a note. It can also mirror the library into an Obsidian-style markdown vault."
)]
struct Cli {
    /// Path to the configuration file (TOML).
    ///
    /// Defaults to `~/.paper-harness/config.toml`. A missing file means
    /// defaults; the API key may also come from `ANTHROPIC_API_KEY`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or change the configuration.
    ///
    /// Without flags, prints the current settings. Paths are validated
    /// before being saved: the Zotero directory must contain
    /// `zotero.sqlite`, the vault directory must exist.
    Configure {
        /// Zotero data directory (the one containing zotero.sqlite).
        #[arg(long)]
        zotero_path: Option<PathBuf>,

        /// Markdown vault directory used by `sync` and `sync-notes`.
        #[arg(long)]
        vault_path: Option<PathBuf>,

        /// Anthropic API key (must start with `sk-ant-`).
        #[arg(long)]
        api_key: Option<String>,

        /// Model used for analysis.
        #[arg(long)]
        model: Option<String>,

        /// Print the configuration after applying changes.
        #[arg(long)]
        show: bool,

        /// Reset every setting to its default before applying other flags.
        #[arg(long)]
        reset: bool,
    },

    /// List library items, newest modification first.
    List {
        /// Only items in this collection (by name).
        #[arg(long)]
        collection: Option<String>,

        /// Only items with this tag. Repeat to require several tags.
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Maximum number of items.
        #[arg(long, default_value_t = 100)]
        limit: i64,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show one item with metadata, attachments, and abstract.
    Show {
        /// Zotero item ID.
        id: i64,

        #[arg(long)]
        json: bool,
    },

    /// Show the notes attached to an item.
    Notes {
        /// Zotero item ID.
        id: i64,

        #[arg(long)]
        json: bool,
    },

    /// Search titles and creator names (case-insensitive substring).
    Search {
        query: String,

        #[arg(long, default_value_t = 20)]
        limit: i64,

        #[arg(long)]
        json: bool,
    },

    /// List collections with their item counts.
    Collections {
        #[arg(long)]
        json: bool,
    },

    /// List the available analysis kinds.
    Prompts,

    /// Analyze one paper with Claude.
    ///
    /// Extracts the text of the item's PDF, sends it with the chosen
    /// prompt, prints the analysis, and saves it as a note titled
    /// `AI Analysis (<kind>)` unless `--no-save` is given.
    Analyze {
        /// Zotero item ID.
        id: i64,

        #[arg(long, value_enum, default_value_t = PromptKind::Comprehensive)]
        kind: PromptKind,

        /// Do not save the analysis as a Zotero note.
        #[arg(long)]
        no_save: bool,

        /// Also write the analysis to this file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Extra instructions appended to the prompt.
        #[arg(long)]
        instructions: Option<String>,
    },

    /// Analyze every matching item that has a PDF.
    ///
    /// Failures are reported per item and do not stop the run.
    Batch {
        #[arg(long)]
        collection: Option<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        limit: Option<i64>,

        #[arg(long, value_enum, default_value_t = PromptKind::QuickSummary)]
        kind: PromptKind,

        #[arg(long)]
        no_save: bool,

        /// Progress on stderr: off, human, or json. Defaults to human on a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Mirror the library into a markdown vault.
    Sync {
        /// Vault directory (defaults to the configured one).
        #[arg(long)]
        vault: Option<PathBuf>,

        /// Show what would be written without touching the vault.
        #[arg(long)]
        dry_run: bool,

        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Import markdown files from the vault as Zotero notes.
    ///
    /// Every `*.md` next to a `paper.md` becomes a note on that paper,
    /// titled by its file name.
    SyncNotes {
        #[arg(long)]
        vault: Option<PathBuf>,

        #[arg(long)]
        dry_run: bool,

        /// Import even when a note with the same title exists.
        #[arg(long)]
        overwrite: bool,

        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Print a shell completion script to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("paper_harness={level},paper={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't need configuration
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "paper", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Prompts => return configure_cmd::run_prompts(),
        _ => {}
    }

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let cfg = config::load_config(&config_path)?;

    match cli.command {
        Commands::Configure {
            zotero_path,
            vault_path,
            api_key,
            model,
            show,
            reset,
        } => {
            configure_cmd::run_configure(
                &config_path,
                cfg,
                ConfigureArgs {
                    zotero_path,
                    vault_path,
                    api_key,
                    model,
                    show,
                    reset,
                },
            )?;
        }
        Commands::List {
            collection,
            tags,
            limit,
            json,
        } => {
            library_cmd::run_list(&cfg, collection, tags, Some(limit), json).await?;
        }
        Commands::Show { id, json } => {
            library_cmd::run_show(&cfg, id, json).await?;
        }
        Commands::Notes { id, json } => {
            library_cmd::run_notes(&cfg, id, json).await?;
        }
        Commands::Search { query, limit, json } => {
            library_cmd::run_search(&cfg, &query, limit, json).await?;
        }
        Commands::Collections { json } => {
            library_cmd::run_collections(&cfg, json).await?;
        }
        Commands::Analyze {
            id,
            kind,
            no_save,
            output,
            instructions,
        } => {
            analyze_cmd::run_analyze(
                &cfg,
                AnalyzeArgs {
                    item_id: id,
                    kind,
                    save: !no_save,
                    output,
                    instructions,
                },
            )
            .await?;
        }
        Commands::Batch {
            collection,
            tags,
            limit,
            kind,
            no_save,
            progress,
        } => {
            let filter = ItemFilter {
                collection,
                tags,
                limit,
            };
            analyze_cmd::run_batch(&cfg, filter, kind, !no_save, progress).await?;
        }
        Commands::Sync {
            vault,
            dry_run,
            progress,
        } => {
            sync_cmd::run_sync(&cfg, vault, dry_run, progress).await?;
        }
        Commands::SyncNotes {
            vault,
            dry_run,
            overwrite,
            progress,
        } => {
            sync_cmd::run_sync_notes(&cfg, vault, dry_run, overwrite, progress).await?;
        }
        Commands::Completions { .. } | Commands::Prompts => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
