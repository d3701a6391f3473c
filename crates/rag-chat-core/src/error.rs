//! Error taxonomy for a chat turn.
//!
//! Every failure a turn can surface is one of these variants. The display
//! strings start with a stable prefix so a user-visible message always tells
//! a retrieval problem apart from a completion problem.

use thiserror::Error;

/// Turn-level failure.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Persisted history could not be decoded. No automatic repair.
    #[error("history for '{key}' is corrupt: {reason}")]
    CorruptHistory { key: String, reason: String },

    /// Collection listing was paged past the safety bound without a match.
    #[error(
        "too many collections on the retrieval backend ({scanned} scanned without a match); \
         delete some before retrying"
    )]
    TooManyCollections { scanned: usize },

    /// Non-success response (or transport failure) from the retrieval backend.
    #[error("retrieval backend error: {0}")]
    RetrievalBackend(String),

    /// Failure reported by the completion collaborator.
    #[error("completion backend error: {0}")]
    CompletionBackend(String),

    /// The configured collection does not exist on the retrieval backend.
    #[error("collection '{0}' not found on the retrieval backend")]
    CollectionNotFound(String),

    /// A collaborator call exceeded the configured request timeout.
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    /// The blob store failed to read or write.
    #[error("storage error: {0}")]
    Storage(String),

    /// A document could not be turned into text.
    #[error("text extraction failed: {0}")]
    Extraction(String),
}

impl ChatError {
    /// Machine-readable code used by the HTTP layer.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::CorruptHistory { .. } => "history_corrupt",
            ChatError::TooManyCollections { .. } => "too_many_collections",
            ChatError::RetrievalBackend(_) => "retrieval_backend",
            ChatError::CompletionBackend(_) => "completion_backend",
            ChatError::CollectionNotFound(_) => "configuration",
            ChatError::Timeout { .. } => "timeout",
            ChatError::Storage(_) => "storage",
            ChatError::Extraction(_) => "extraction",
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
