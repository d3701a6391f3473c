//! Core data models used throughout RAG Chat.
//!
//! These types represent the conversation transcript and the retrieval
//! results that flow through a single turn.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Author of a [`ConversationEntry`].
///
/// Serialized lowercase so entries can be handed to an OpenAI-style chat
/// endpoint unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// One message of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub content: String,
}

impl ConversationEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    /// Length of the content in characters (Unicode scalar values).
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// The persisted transcript of one session: user/assistant pairs, oldest first.
pub type HistoryLog = Vec<ConversationEntry>;

/// A fragment returned by the retrieval backend for the current turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Name of the document the chunk was indexed from.
    pub source_document: String,
    /// Backend identifier of the chunk.
    pub chunk_id: String,
    /// Chunk text as indexed by the backend.
    pub content: String,
    /// Similarity score reported by the backend (higher is better).
    pub relevance_score: f64,
}

/// Identifier of a collection on the retrieval backend.
///
/// Backends disagree on whether ids are integers or strings. The id keeps
/// the JSON type it arrived with so it is sent back exactly as received;
/// `"007"` stays a string and `7` stays a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionId {
    Number(i64),
    Text(String),
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionId::Number(n) => write!(f, "{n}"),
            CollectionId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CollectionId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for CollectionId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

/// One row of the backend's collection listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    pub id: CollectionId,
    pub name: String,
}

/// A local file to upload into a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    pub path: PathBuf,
    /// Upload name: the path relative to the documents directory, `/`
    /// separated. The backend reports it back as the chunk's source
    /// document, so it must resolve against that directory.
    pub name: String,
}
