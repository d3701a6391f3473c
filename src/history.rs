//! Per-session history persistence.
//!
//! [`HistoryStore`] applies the core [`HistoryPolicy`] on top of a
//! [`BlobStore`]. Each session lives under its own key; every
//! load-modify-persist sequence holds one async mutex so concurrent turns
//! cannot lose each other's writes.

use std::sync::Arc;

use rag_chat_core::error::Result;
use rag_chat_core::history::{decode_log, encode_log, HistoryPolicy};
use rag_chat_core::store::BlobStore;
use rag_chat_core::HistoryLog;
use tokio::sync::Mutex;

use crate::config::HistoryConfig;

/// Session used when the caller does not name one.
pub const DEFAULT_SESSION: &str = "default";

pub struct HistoryStore {
    blobs: Arc<dyn BlobStore>,
    policy: HistoryPolicy,
    lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(blobs: Arc<dyn BlobStore>, policy: HistoryPolicy) -> Self {
        Self {
            blobs,
            policy,
            lock: Mutex::new(()),
        }
    }

    pub fn policy_from_config(config: &HistoryConfig) -> HistoryPolicy {
        HistoryPolicy {
            char_budget: config.char_budget,
            max_messages: config.max_messages,
        }
    }

    pub fn policy(&self) -> HistoryPolicy {
        self.policy
    }

    fn key(session: &str) -> String {
        format!("history:{session}")
    }

    /// Persisted log of `session`; empty if none was ever written.
    pub async fn load(&self, session: &str) -> Result<HistoryLog> {
        let _guard = self.lock.lock().await;
        self.load_unlocked(session).await
    }

    async fn load_unlocked(&self, session: &str) -> Result<HistoryLog> {
        let key = Self::key(session);
        let blob = self.blobs.load(&key).await?;
        decode_log(&key, blob)
    }

    /// Append one exchange, evict, persist. Returns the persisted log.
    pub async fn append_turn(
        &self,
        session: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<HistoryLog> {
        let _guard = self.lock.lock().await;
        let mut log = self.load_unlocked(session).await?;
        let before = log.len() + 2;
        self.policy.append_turn(&mut log, user_text, assistant_text);
        if log.len() < before {
            tracing::debug!(session, evicted = before - log.len(), "history evicted");
        }
        self.blobs.save(&Self::key(session), &encode_log(&log)).await?;
        Ok(log)
    }

    /// Replace the session's history with an empty log.
    pub async fn clear(&self, session: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.blobs.save(&Self::key(session), &encode_log(&[])).await
    }
}
