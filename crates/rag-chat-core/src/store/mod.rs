//! JSON blob persistence abstraction.
//!
//! The [`BlobStore`] trait is the only storage contract the history needs:
//! whole-value load and save by key. Implementations must be `Send + Sync`
//! to work with async runtimes.

pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Key-value store of whole JSON documents.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`load`](BlobStore::load) | Read the value stored under a key, if any |
/// | [`save`](BlobStore::save) | Replace the value stored under a key |
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns `Ok(None)` when nothing has been saved under `key`.
    async fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value under `key`. No partial updates.
    async fn save(&self, key: &str, value: &Value) -> Result<()>;
}
