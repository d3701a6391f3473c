//! Bounded conversation history.
//!
//! The history is an append-only log of user/assistant pairs. After every
//! append the [`HistoryPolicy`] evicts the oldest pairs until both bounds
//! hold:
//!
//! - total characters ≤ `char_budget`, unless only four entries (two
//!   exchanges) remain, and
//! - entry count ≤ `2 × max_messages`.
//!
//! Eviction works from the front, two entries at a time, so a pair is never
//! split.
//!
//! ```rust
//! use rag_chat_core::history::HistoryPolicy;
//!
//! let policy = HistoryPolicy { char_budget: 10, max_messages: 20 };
//! let mut log = Vec::new();
//! for i in 0..5 {
//!     policy.append_turn(&mut log, format!("question {i}"), format!("answer {i}"));
//! }
//! assert_eq!(log.len(), 4);
//! assert_eq!(log[0].content, "question 3");
//! ```

use serde_json::Value;

use crate::error::{ChatError, Result};
use crate::models::{ConversationEntry, HistoryLog};

/// Default character budget for the persisted history.
pub const DEFAULT_CHAR_BUDGET: usize = 3000;
/// Default maximum number of user/assistant exchanges kept.
pub const DEFAULT_MAX_MESSAGES: usize = 20;
/// Entry count under which the character budget is no longer enforced.
pub const MIN_RETAINED_ENTRIES: usize = 4;

/// Eviction bounds for a session history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPolicy {
    /// Maximum total characters across all persisted entries.
    pub char_budget: usize,
    /// Maximum number of exchanges (the entry bound is twice this).
    pub max_messages: usize,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            char_budget: DEFAULT_CHAR_BUDGET,
            max_messages: DEFAULT_MAX_MESSAGES,
        }
    }
}

impl HistoryPolicy {
    /// Maximum number of persisted entries.
    pub fn max_entries(&self) -> usize {
        self.max_messages.saturating_mul(2)
    }

    /// Push a user entry then an assistant entry, then evict.
    pub fn append_turn(
        &self,
        log: &mut HistoryLog,
        user_text: impl Into<String>,
        assistant_text: impl Into<String>,
    ) {
        log.push(ConversationEntry::user(user_text));
        log.push(ConversationEntry::assistant(assistant_text));
        self.evict(log);
    }

    /// Drop the oldest pairs until the bounds hold. Returns the number of
    /// entries removed (always even).
    pub fn evict(&self, log: &mut HistoryLog) -> usize {
        let mut total = total_chars(log);
        let mut start = 0;

        while start + 2 <= log.len() {
            let remaining = log.len() - start;
            let over_budget = total > self.char_budget && remaining > MIN_RETAINED_ENTRIES;
            if !over_budget && remaining <= self.max_entries() {
                break;
            }
            total -= log[start].char_len() + log[start + 1].char_len();
            start += 2;
        }

        log.drain(..start);
        start
    }

    /// Whether `log` satisfies both bounds.
    pub fn is_satisfied_by(&self, log: &[ConversationEntry]) -> bool {
        (total_chars(log) <= self.char_budget || log.len() <= MIN_RETAINED_ENTRIES)
            && log.len() <= self.max_entries()
    }
}

/// Sum of entry lengths in characters.
pub fn total_chars(log: &[ConversationEntry]) -> usize {
    log.iter().map(ConversationEntry::char_len).sum()
}

/// Decode a persisted blob into a log. A missing blob is an empty log.
pub fn decode_log(key: &str, blob: Option<Value>) -> Result<HistoryLog> {
    match blob {
        None => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value).map_err(|e| ChatError::CorruptHistory {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Encode a log for the blob store.
pub fn encode_log(log: &[ConversationEntry]) -> Value {
    Value::Array(
        log.iter()
            .map(|e| serde_json::json!({ "role": e.role, "content": e.content }))
            .collect(),
    )
}
