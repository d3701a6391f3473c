//! Chat completion collaborator.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ConversationEntry;

/// A language model that turns an ordered message list into one reply.
///
/// Single-shot and non-streaming. Implementations report failures as
/// [`ChatError::CompletionBackend`](crate::error::ChatError::CompletionBackend).
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, messages: &[ConversationEntry]) -> Result<String>;
}
