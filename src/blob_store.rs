//! File-backed [`BlobStore`]: one JSON file per key.
//!
//! Keys are arbitrary strings (they embed the session id), so the file name
//! is the SHA-256 of the key rather than the key itself. Each write goes to
//! its own uniquely named temporary in the same directory, which is then
//! renamed over the target. A crash never leaves a half-written history
//! behind, and concurrent writers (even from separate processes) never
//! share a temporary.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rag_chat_core::error::{ChatError, Result};
use rag_chat_core::store::BlobStore;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }
}

fn storage_err(path: &Path, e: std::io::Error) -> ChatError {
    ChatError::Storage(format!("{}: {e}", path.display()))
}

fn write_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| storage_err(dir, e))?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| storage_err(dir, e))?;
    tmp.write_all(bytes).map_err(|e| storage_err(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| storage_err(path, e.error))?;
    Ok(())
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_err(&path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ChatError::CorruptHistory {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn save(&self, key: &str, value: &Value) -> Result<()> {
        let dir = self.dir.clone();
        let path = self.path_for(key);
        let bytes = serde_json::to_vec(value).map_err(|e| ChatError::Storage(e.to_string()))?;

        tokio::task::spawn_blocking(move || write_atomically(&dir, &path, &bytes))
            .await
            .map_err(|e| ChatError::Storage(format!("write task failed: {e}")))?
    }
}
