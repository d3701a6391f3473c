//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rag_chat::history::HistoryStore;
use rag_chat::session::{SessionOrchestrator, TurnSettings};
use rag_chat_core::completion::ChatCompletion;
use rag_chat_core::error::{ChatError, Result};
use rag_chat_core::history::HistoryPolicy;
use rag_chat_core::provenance::TextExtractor;
use rag_chat_core::retrieval::{RetrievalBackend, RetrievalClient};
use rag_chat_core::store::memory::InMemoryBlobStore;
use rag_chat_core::{CollectionId, CollectionSummary, ConversationEntry, RetrievedChunk};

pub const COLLECTION: &str = "moodle_pdfs";

/// Chat model that answers with a fixed reply (or error) and records every
/// message list it receives.
#[derive(Default)]
pub struct ScriptedChat {
    pub reply: String,
    pub fail: bool,
    pub delay: Option<Duration>,
    pub calls: Mutex<Vec<Vec<ConversationEntry>>>,
}

impl ScriptedChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_messages(&self) -> Vec<ConversationEntry> {
        self.calls.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChatCompletion for ScriptedChat {
    async fn complete(&self, messages: &[ConversationEntry]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ChatError::CompletionBackend("503 Service Unavailable".into()));
        }
        Ok(self.reply.clone())
    }
}

/// Backend holding one collection and a fixed hit list.
pub struct ScriptedBackend {
    pub collection_exists: bool,
    pub hits: Vec<RetrievedChunk>,
    pub fail_search: bool,
    pub calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn with_hits(hits: Vec<RetrievedChunk>) -> Self {
        Self {
            collection_exists: true,
            hits,
            fail_search: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RetrievalBackend for ScriptedBackend {
    async fn list_collections(&self, offset: usize, _limit: usize) -> Result<Vec<CollectionSummary>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.collection_exists || offset > 0 {
            return Ok(Vec::new());
        }
        Ok(vec![
            CollectionSummary {
                id: CollectionId::from(3),
                name: "other".to_string(),
            },
            CollectionSummary {
                id: CollectionId::from(7),
                name: COLLECTION.to_string(),
            },
        ])
    }

    async fn create_collection(&self, _name: &str, _model: &str) -> Result<CollectionId> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CollectionId::from(8))
    }

    async fn delete_collection(&self, _id: &CollectionId) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn upload_document(&self, _collection: &CollectionId, _path: &Path, _name: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn semantic_search(
        &self,
        collections: &[CollectionId],
        _query: &str,
        k: usize,
        _score_threshold: f64,
    ) -> Result<Vec<RetrievedChunk>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(collections, &[CollectionId::from(7)]);
        if self.fail_search {
            return Err(ChatError::RetrievalBackend("search returned 500".into()));
        }
        Ok(self.hits.iter().take(k).cloned().collect())
    }
}

/// Extractor serving documents from a map of page lists.
#[derive(Default)]
pub struct MapExtractor {
    pub docs: HashMap<String, Vec<String>>,
    pub calls: AtomicUsize,
}

impl MapExtractor {
    pub fn with(doc: &str, pages: &[&str]) -> Self {
        let mut docs = HashMap::new();
        docs.insert(doc.to_string(), pages.iter().map(|p| p.to_string()).collect());
        Self {
            docs,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextExtractor for MapExtractor {
    async fn extract_pages(&self, document: &str) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.docs
            .get(document)
            .cloned()
            .ok_or_else(|| ChatError::Extraction(format!("{document}: not found")))
    }
}

pub fn chunk(doc: &str, id: &str, content: &str, score: f64) -> RetrievedChunk {
    RetrievedChunk {
        source_document: doc.to_string(),
        chunk_id: id.to_string(),
        content: content.to_string(),
        relevance_score: score,
    }
}

pub fn settings() -> TurnSettings {
    TurnSettings {
        collection: COLLECTION.to_string(),
        k: 6,
        score_threshold: 0.5,
        command_prefix: '/',
        system_prompt: Some("You are a teaching assistant.".to_string()),
        explain_suffix: "Explain step by step.".to_string(),
        retrieval: true,
        provenance: true,
        retrieval_timeout: Duration::from_secs(5),
        completion_timeout: Duration::from_secs(5),
    }
}

/// Collaborators plus the orchestrator wired over them.
pub struct Harness {
    pub chat: Arc<ScriptedChat>,
    pub backend: Arc<ScriptedBackend>,
    pub extractor: Arc<MapExtractor>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub orchestrator: Arc<SessionOrchestrator>,
}

impl Harness {
    pub fn new(chat: ScriptedChat, backend: ScriptedBackend, extractor: MapExtractor) -> Self {
        Self::with_settings(chat, backend, extractor, settings())
    }

    pub fn with_settings(
        chat: ScriptedChat,
        backend: ScriptedBackend,
        extractor: MapExtractor,
        settings: TurnSettings,
    ) -> Self {
        let chat = Arc::new(chat);
        let backend = Arc::new(backend);
        let extractor = Arc::new(extractor);
        let blobs = Arc::new(InMemoryBlobStore::new());
        let history = Arc::new(HistoryStore::new(blobs.clone(), HistoryPolicy::default()));
        let orchestrator = Arc::new(SessionOrchestrator::new(
            chat.clone(),
            RetrievalClient::new(backend.clone()),
            extractor.clone(),
            history,
            settings,
        ));
        Self {
            chat,
            backend,
            extractor,
            blobs,
            orchestrator,
        }
    }

    /// Default scenario: two hits above the threshold and one below, from
    /// a document the extractor knows.
    pub fn default_scenario(reply: &str) -> Self {
        let hits = vec![
            chunk("course.pdf", "c1", "Gaussian elimination reduces a matrix", 0.9),
            chunk("course.pdf", "c2", "Nothing like this in the text", 0.7),
            chunk("course.pdf", "c3", "Too weak to keep", 0.2),
        ];
        let extractor = MapExtractor::with(
            "course.pdf",
            &["Chapter 1\nGaussian elimination reduces a matrix\nto row echelon form."],
        );
        Self::new(ScriptedChat::replying(reply), ScriptedBackend::with_hits(hits), extractor)
    }
}
