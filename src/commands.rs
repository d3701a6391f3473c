//! Implementations of the `ragchat` subcommands other than `serve`.
//!
//! Output goes to stdout; diagnostics go through `tracing` to stderr.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rag_chat_core::provenance::TextExtractor;
use rag_chat_core::retrieval::RetrievalClient;

use crate::config::Config;
use crate::documents::scan_documents;
use crate::extract::FileExtractor;
use crate::history::HistoryStore;
use crate::retrieval::AlbertBackend;
use crate::session::SessionOrchestrator;

fn retrieval_client(config: &Config) -> Result<RetrievalClient> {
    let backend = AlbertBackend::from_config(&config.retrieval)?;
    Ok(RetrievalClient::new(Arc::new(backend)))
}

/// `ragchat ask`: run one turn and print the reply.
pub async fn run_ask(config: &Config, session: &str, prompt: &str) -> Result<()> {
    let orchestrator = SessionOrchestrator::from_config(config)?;
    let turn = orchestrator.handle_turn(session, prompt).await?;
    println!("{}", turn.text);
    Ok(())
}

/// `ragchat history show`.
pub async fn run_history_show(history: &HistoryStore, session: &str) -> Result<()> {
    let log = history.load(session).await?;
    if log.is_empty() {
        println!("No history for session '{}'.", session);
        return Ok(());
    }
    for entry in &log {
        let role = serde_json::to_value(entry.role)?;
        println!("[{}] {}", role.as_str().unwrap_or("?"), entry.content);
    }
    Ok(())
}

/// `ragchat history clear`.
pub async fn run_history_clear(history: &HistoryStore, session: &str) -> Result<()> {
    history.clear(session).await?;
    println!("{}", rag_chat_core::command::RESET_CONFIRMATION);
    Ok(())
}

/// `ragchat collection resolve`.
pub async fn run_collection_resolve(config: &Config) -> Result<()> {
    let client = retrieval_client(config)?;
    let name = &config.retrieval.collection;
    match client.resolve_collection(name).await? {
        Some(id) => println!("{}\t{}", name, id),
        None => println!("Collection '{}' not found.", name),
    }
    Ok(())
}

/// `ragchat collection refresh`: delete, recreate and re-upload.
pub async fn run_collection_refresh(config: &Config, dry_run: bool) -> Result<()> {
    let documents = scan_documents(&config.documents)?;
    if documents.is_empty() {
        bail!(
            "no documents matched under {}",
            config.documents.dir.display()
        );
    }

    if dry_run {
        for doc in &documents {
            println!("{}", doc.name);
        }
        println!("{} documents would be uploaded.", documents.len());
        return Ok(());
    }

    let client = retrieval_client(config)?;
    let name = &config.retrieval.collection;
    let existing = client.resolve_collection(name).await?;
    let id = client
        .refresh_collection(
            existing.as_ref(),
            name,
            &config.retrieval.embedding_model,
            &documents,
        )
        .await?;
    println!(
        "Collection '{}' refreshed (id {}), {} documents uploaded.",
        name,
        id,
        documents.len()
    );
    Ok(())
}

/// `ragchat extract`: print the pages of one document.
pub async fn run_extract(path: &Path) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("not a file path: {}", path.display()))?;

    let pages = FileExtractor::new(dir).extract_pages(name).await?;
    for (i, page) in pages.iter().enumerate() {
        println!("--- page {} ---", i + 1);
        println!("{}", page);
    }
    Ok(())
}
