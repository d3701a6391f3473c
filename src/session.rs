//! Turn orchestration.
//!
//! [`SessionOrchestrator::handle_turn`] runs one user prompt through the
//! pipeline:
//!
//! ```text
//! parse ─┬─ help  ─────────────────────────────────────────────▶ help text
//!        ├─ reset ─ clear history ─────────────────────────────▶ "History reset."
//!        └─ resolve collection ─ search ─┬─ find ─ provenance ─▶ sources
//!                                        └─ compose ─ complete ─ persist ─ annotate ─▶ answer
//! ```
//!
//! With retrieval turned off the collection is never resolved or searched:
//! the model sees history, the optional system entry and the prompt, and
//! `find`/`source` report no sources.
//!
//! Network calls (collection listing, search, completion) are bounded by
//! the configured timeouts. History is written only once the completion has
//! returned, so an abandoned turn never leaves half an exchange behind.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rag_chat_core::command::{parse_with_prefix, Command, RESET_CONFIRMATION};
use rag_chat_core::completion::ChatCompletion;
use rag_chat_core::error::{ChatError, Result};
use rag_chat_core::provenance::{locate_chunks, ProvenanceReport, TextExtractor};
use rag_chat_core::retrieval::RetrievalClient;
use rag_chat_core::{ConversationEntry, RetrievedChunk};
use serde::Serialize;

use crate::blob_store::FileBlobStore;
use crate::completion::OpenAiChat;
use crate::config::Config;
use crate::extract::FileExtractor;
use crate::history::HistoryStore;
use crate::retrieval::AlbertBackend;

/// Separator placed between chunk contents in the tool message.
pub const CHUNK_SEPARATOR: &str = "\n\n\n";

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    HelpReturned,
    ResetReturned,
    FindReturned,
    AnswerReturned,
}

/// Result of a successful turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub outcome: TurnOutcome,
    pub text: String,
}

impl Turn {
    fn new(outcome: TurnOutcome, text: impl Into<String>) -> Self {
        Self {
            outcome,
            text: text.into(),
        }
    }
}

/// Per-turn knobs, resolved from [`Config`] once.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub collection: String,
    pub k: usize,
    pub score_threshold: f64,
    pub command_prefix: char,
    /// Persona prompt; `None` when the system prompt feature is off.
    pub system_prompt: Option<String>,
    pub explain_suffix: String,
    /// Resolve and search the collection on every answering turn.
    pub retrieval: bool,
    pub provenance: bool,
    pub retrieval_timeout: Duration,
    pub completion_timeout: Duration,
}

impl TurnSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            collection: config.retrieval.collection.clone(),
            k: config.retrieval.k,
            score_threshold: config.retrieval.score_threshold,
            command_prefix: config.prompt.prefix_char(),
            system_prompt: config
                .features
                .system_prompt
                .then(|| config.prompt.system_prompt.clone()),
            explain_suffix: config.prompt.explain_suffix.clone(),
            retrieval: config.features.retrieval,
            provenance: config.features.provenance,
            retrieval_timeout: config.retrieval.timeout(),
            completion_timeout: config.completion.timeout(),
        }
    }

    /// System message content for `command`, if any.
    fn system_message(&self, command: &Command) -> Option<String> {
        let explain = matches!(command, Command::Explain);
        match (&self.system_prompt, explain) {
            (Some(prompt), true) => Some(format!("{}\n\n{}", prompt, self.explain_suffix)),
            (Some(prompt), false) => Some(prompt.clone()),
            (None, true) => Some(self.explain_suffix.clone()),
            (None, false) => None,
        }
    }
}

async fn timed<T, F>(stage: &'static str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or(Err(ChatError::Timeout {
            stage,
            secs: limit.as_secs(),
        }))
}

pub struct SessionOrchestrator {
    completion: Arc<dyn ChatCompletion>,
    retrieval: RetrievalClient,
    extractor: Arc<dyn TextExtractor>,
    history: Arc<HistoryStore>,
    settings: TurnSettings,
}

impl SessionOrchestrator {
    pub fn new(
        completion: Arc<dyn ChatCompletion>,
        retrieval: RetrievalClient,
        extractor: Arc<dyn TextExtractor>,
        history: Arc<HistoryStore>,
        settings: TurnSettings,
    ) -> Self {
        Self {
            completion,
            retrieval,
            extractor,
            history,
            settings,
        }
    }

    /// Wire the HTTP collaborators, file-backed history and document
    /// extractor described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let completion = Arc::new(OpenAiChat::from_config(&config.completion)?);
        let backend = Arc::new(AlbertBackend::from_config(&config.retrieval)?);
        let extractor = Arc::new(FileExtractor::new(config.documents.dir.clone()));
        let history = Arc::new(HistoryStore::new(
            Arc::new(FileBlobStore::new(config.history.dir.clone())),
            HistoryStore::policy_from_config(&config.history),
        ));
        Ok(Self::new(
            completion,
            RetrievalClient::new(backend),
            extractor,
            history,
            TurnSettings::from_config(config),
        ))
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    /// Run one turn for `session`.
    pub async fn handle_turn(&self, session: &str, raw_prompt: &str) -> Result<Turn> {
        let (prompt, command) = parse_with_prefix(raw_prompt, self.settings.command_prefix);
        tracing::debug!(session, ?command, "turn started");

        let turn = match command {
            Command::Help => Turn::new(
                TurnOutcome::HelpReturned,
                Command::help_text(self.settings.command_prefix),
            ),
            Command::Reset => {
                self.history.clear(session).await?;
                Turn::new(TurnOutcome::ResetReturned, RESET_CONFIRMATION)
            }
            command => self.retrieve_and_answer(session, &prompt, command).await?,
        };

        tracing::info!(session, outcome = ?turn.outcome, len = turn.text.len(), "turn finished");
        Ok(turn)
    }

    async fn retrieve_and_answer(&self, session: &str, prompt: &str, command: Command) -> Result<Turn> {
        let chunks = self.retrieve(prompt).await?;

        if command == Command::Find {
            let report = self.provenance(&chunks).await;
            return Ok(Turn::new(TurnOutcome::FindReturned, report.to_string()));
        }

        let history = self.history.load(session).await?;
        let messages = self.compose(history, &command, &chunks, prompt);

        let answer = timed(
            "completion",
            self.settings.completion_timeout,
            self.completion.complete(&messages),
        )
        .await?;

        self.history.append_turn(session, prompt, &answer).await?;

        let text = match command {
            Command::Source => {
                let report = self.provenance(&chunks).await;
                format!("{}\n\n{}", answer, report)
            }
            Command::Unrecognized(name) => {
                format!("Command '{}' not recognized. Response: {}", name, answer)
            }
            _ => answer,
        };
        Ok(Turn::new(TurnOutcome::AnswerReturned, text))
    }

    async fn retrieve(&self, prompt: &str) -> Result<Vec<RetrievedChunk>> {
        if !self.settings.retrieval {
            tracing::debug!("retrieval disabled, answering without context");
            return Ok(Vec::new());
        }

        let limit = self.settings.retrieval_timeout;
        let name = &self.settings.collection;

        let collection = timed(
            "collection lookup",
            limit,
            self.retrieval.resolve_collection(name),
        )
        .await?
        .ok_or_else(|| ChatError::CollectionNotFound(name.clone()))?;

        let chunks = timed(
            "search",
            limit,
            self.retrieval
                .search(prompt, &collection, self.settings.k, self.settings.score_threshold),
        )
        .await?;
        tracing::debug!(collection = %collection, chunks = chunks.len(), "retrieved chunks");
        Ok(chunks)
    }

    async fn provenance(&self, chunks: &[RetrievedChunk]) -> ProvenanceReport {
        if self.settings.provenance {
            locate_chunks(self.extractor.as_ref(), chunks).await
        } else {
            ProvenanceReport::ids_only(chunks)
        }
    }

    /// History, then the optional system entry, then retrieved context as a
    /// tool entry (omitted when retrieval is off), then the user prompt.
    fn compose(
        &self,
        mut messages: Vec<ConversationEntry>,
        command: &Command,
        chunks: &[RetrievedChunk],
        prompt: &str,
    ) -> Vec<ConversationEntry> {
        if let Some(system) = self.settings.system_message(command) {
            messages.push(ConversationEntry::system(system));
        }
        if self.settings.retrieval {
            let context: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
            messages.push(ConversationEntry::tool(context.join(CHUNK_SEPARATOR)));
        }
        messages.push(ConversationEntry::user(prompt));
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(system_prompt: Option<&str>) -> TurnSettings {
        TurnSettings {
            collection: "c".to_string(),
            k: 6,
            score_threshold: 0.5,
            command_prefix: '/',
            system_prompt: system_prompt.map(str::to_string),
            explain_suffix: "Go step by step.".to_string(),
            retrieval: true,
            provenance: true,
            retrieval_timeout: Duration::from_secs(1),
            completion_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn explain_extends_the_system_prompt() {
        let s = settings(Some("You help students."));
        assert_eq!(
            s.system_message(&Command::Explain).unwrap(),
            "You help students.\n\nGo step by step."
        );
        assert_eq!(s.system_message(&Command::None).unwrap(), "You help students.");
    }

    #[test]
    fn explain_without_system_prompt_sends_suffix_alone() {
        let s = settings(None);
        assert_eq!(s.system_message(&Command::Explain).unwrap(), "Go step by step.");
        assert_eq!(s.system_message(&Command::Source), None);
    }

    #[tokio::test]
    async fn timed_maps_expiry_to_stage() {
        let err = timed("search", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ChatError::Timeout { stage: "search", .. }));
    }
}
