//! # RAG Chat CLI (`ragchat`)
//!
//! ## Usage
//!
//! ```bash
//! ragchat --config ./config/ragchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragchat serve` | Start the HTTP chat server |
//! | `ragchat ask "<prompt>"` | Run one turn and print the reply |
//! | `ragchat history show` | Print a session's persisted history |
//! | `ragchat history clear` | Reset a session's history |
//! | `ragchat collection resolve` | Print the configured collection's id |
//! | `ragchat collection refresh` | Rebuild the collection from the documents directory |
//! | `ragchat extract <file>` | Print the extracted pages of a document |
//!
//! API keys are read from the environment variables named in the config; a
//! `.env` file in the working directory is loaded first.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use rag_chat::blob_store::FileBlobStore;
use rag_chat::history::{HistoryStore, DEFAULT_SESSION};
use rag_chat::{commands, config, server};

/// RAG Chat: answers questions over a course document collection.
#[derive(Parser)]
#[command(name = "ragchat", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat server on `[server].bind`.
    Serve,

    /// Run one turn locally and print the reply.
    Ask {
        /// Prompt, optionally starting with a command such as `/source`.
        prompt: String,

        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
    },

    /// Inspect or reset persisted history.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Manage the collection on the retrieval backend.
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },

    /// Print the extracted pages of a document. Does not need a config.
    Extract {
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    Show {
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
    },
    Clear {
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
    },
}

#[derive(Subcommand)]
enum CollectionAction {
    /// Print the id of `[retrieval].collection`.
    Resolve,
    /// Delete the collection, recreate it and upload every document.
    Refresh {
        /// List the documents that would be uploaded and stop.
        #[arg(long)]
        dry_run: bool,
    },
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    if let Commands::Extract { path } = &cli.command {
        return commands::run_extract(path).await;
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ask { prompt, session } => {
            commands::run_ask(&cfg, &session, &prompt).await?;
        }
        Commands::History { action } => {
            let history = HistoryStore::new(
                Arc::new(FileBlobStore::new(cfg.history.dir.clone())),
                HistoryStore::policy_from_config(&cfg.history),
            );
            match action {
                HistoryAction::Show { session } => {
                    commands::run_history_show(&history, &session).await?
                }
                HistoryAction::Clear { session } => {
                    commands::run_history_clear(&history, &session).await?
                }
            }
        }
        Commands::Collection { action } => match action {
            CollectionAction::Resolve => commands::run_collection_resolve(&cfg).await?,
            CollectionAction::Refresh { dry_run } => {
                commands::run_collection_refresh(&cfg, dry_run).await?
            }
        },
        Commands::Extract { .. } => unreachable!("handled before config loading"),
    }

    Ok(())
}
