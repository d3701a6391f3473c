//! Retrieval client: collection resolution and thresholded semantic search.
//!
//! The client drives a [`RetrievalBackend`] and owns the two decisions the
//! backend is not trusted with:
//!
//! 1. **Collection resolution** pages through the collection listing
//!    ([`PAGE_SIZE`] per page) until the named collection is found, a short
//!    page signals the end, or more than [`MAX_SCANNED_COLLECTIONS`] have
//!    been scanned.
//! 2. **Score filtering** drops every hit whose score is below the
//!    threshold, whether or not the backend already filtered server-side.
//!    Backend ranking order is preserved.
//!
//! No call is retried.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ChatError, Result};
use crate::models::{CollectionId, CollectionSummary, DocumentFile, RetrievedChunk};

/// Collections requested per listing page.
pub const PAGE_SIZE: usize = 100;
/// Listing offset past which resolution gives up.
pub const MAX_SCANNED_COLLECTIONS: usize = 1000;
/// Default number of nearest chunks requested.
pub const DEFAULT_K: usize = 6;
/// Default minimum relevance score kept.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.5;

/// Operations exposed by a retrieval backend.
///
/// Any non-success response must be reported as
/// [`ChatError::RetrievalBackend`].
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    /// One page of the collection listing.
    async fn list_collections(&self, offset: usize, limit: usize) -> Result<Vec<CollectionSummary>>;

    /// Create a collection embedded with `embedding_model`.
    async fn create_collection(&self, name: &str, embedding_model: &str) -> Result<CollectionId>;

    async fn delete_collection(&self, id: &CollectionId) -> Result<()>;

    /// Upload the file at `path` into a collection under the name `name`.
    async fn upload_document(&self, collection: &CollectionId, path: &Path, name: &str) -> Result<()>;

    /// Top-`k` chunks nearest to `query`, best first.
    async fn semantic_search(
        &self,
        collections: &[CollectionId],
        query: &str,
        k: usize,
        score_threshold: f64,
    ) -> Result<Vec<RetrievedChunk>>;
}

/// Retrieval client over a shared backend.
#[derive(Clone)]
pub struct RetrievalClient {
    backend: Arc<dyn RetrievalBackend>,
}

impl RetrievalClient {
    pub fn new(backend: Arc<dyn RetrievalBackend>) -> Self {
        Self { backend }
    }

    /// Find the id of the collection called `name`.
    ///
    /// Returns `Ok(None)` when the listing is exhausted without a match.
    ///
    /// # Errors
    ///
    /// [`ChatError::TooManyCollections`] once the offset passes
    /// [`MAX_SCANNED_COLLECTIONS`]; backend errors are propagated.
    pub async fn resolve_collection(&self, name: &str) -> Result<Option<CollectionId>> {
        let mut offset = 0;
        loop {
            let page = self.backend.list_collections(offset, PAGE_SIZE).await?;
            offset += PAGE_SIZE;

            if let Some(found) = page.iter().find(|c| c.name == name) {
                tracing::debug!(collection = name, id = %found.id, "collection resolved");
                return Ok(Some(found.id.clone()));
            }
            if offset > MAX_SCANNED_COLLECTIONS {
                return Err(ChatError::TooManyCollections { scanned: offset });
            }
            if page.len() < PAGE_SIZE {
                return Ok(None);
            }
        }
    }

    /// Semantic search restricted to one collection, filtered by score.
    pub async fn search(
        &self,
        prompt: &str,
        collection: &CollectionId,
        k: usize,
        score_threshold: f64,
    ) -> Result<Vec<RetrievedChunk>> {
        let hits = self
            .backend
            .semantic_search(std::slice::from_ref(collection), prompt, k, score_threshold)
            .await?;
        let total = hits.len();
        let kept = filter_by_threshold(hits, score_threshold);
        tracing::debug!(total, kept = kept.len(), score_threshold, "search results filtered");
        Ok(kept)
    }

    /// Rebuild the collection `name` from `documents`.
    ///
    /// Deletes `existing` if given, creates a fresh collection, then uploads
    /// every document in order. Returns the new collection id.
    pub async fn refresh_collection(
        &self,
        existing: Option<&CollectionId>,
        name: &str,
        embedding_model: &str,
        documents: &[DocumentFile],
    ) -> Result<CollectionId> {
        if let Some(id) = existing {
            self.backend.delete_collection(id).await?;
            tracing::info!(collection = name, id = %id, "deleted existing collection");
        }

        let id = self.backend.create_collection(name, embedding_model).await?;
        tracing::info!(collection = name, id = %id, "created collection");

        for doc in documents {
            self.backend.upload_document(&id, &doc.path, &doc.name).await?;
            tracing::debug!(document = %doc.name, "uploaded document");
        }

        Ok(id)
    }
}

/// Keep hits scoring at least `score_threshold`, in their original order.
pub fn filter_by_threshold(hits: Vec<RetrievedChunk>, score_threshold: f64) -> Vec<RetrievedChunk> {
    hits.into_iter()
        .filter(|h| h.relevance_score >= score_threshold)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Backend serving `total` collections named `c{i}`, optionally with the
    /// target at index `target_at`.
    struct FakeBackend {
        total: usize,
        target_at: Option<usize>,
        list_calls: AtomicUsize,
        hits: Vec<RetrievedChunk>,
        log: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn listing(total: usize, target_at: Option<usize>) -> Self {
            Self {
                total,
                target_at,
                list_calls: AtomicUsize::new(0),
                hits: Vec::new(),
                log: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RetrievalBackend for FakeBackend {
        async fn list_collections(&self, offset: usize, limit: usize) -> Result<Vec<CollectionSummary>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            let end = (offset + limit).min(self.total);
            Ok((offset.min(end)..end)
                .map(|i| CollectionSummary {
                    id: CollectionId::from(i as i64),
                    name: if Some(i) == self.target_at {
                        "target".to_string()
                    } else {
                        format!("c{i}")
                    },
                })
                .collect())
        }

        async fn create_collection(&self, name: &str, model: &str) -> Result<CollectionId> {
            self.log.lock().unwrap().push(format!("create {name} {model}"));
            Ok(CollectionId::from("new"))
        }

        async fn delete_collection(&self, id: &CollectionId) -> Result<()> {
            self.log.lock().unwrap().push(format!("delete {id}"));
            Ok(())
        }

        async fn upload_document(&self, collection: &CollectionId, path: &Path, name: &str) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("upload {} {} as {}", collection, path.display(), name));
            Ok(())
        }

        async fn semantic_search(
            &self,
            _collections: &[CollectionId],
            _query: &str,
            _k: usize,
            _score_threshold: f64,
        ) -> Result<Vec<RetrievedChunk>> {
            Ok(self.hits.clone())
        }
    }

    fn hit(id: &str, score: f64) -> RetrievedChunk {
        RetrievedChunk {
            source_document: "doc.pdf".to_string(),
            chunk_id: id.to_string(),
            content: String::new(),
            relevance_score: score,
        }
    }

    #[tokio::test]
    async fn target_on_third_page_takes_three_fetches() {
        let backend = Arc::new(FakeBackend::listing(1000, Some(250)));
        let client = RetrievalClient::new(backend.clone());
        let id = client.resolve_collection("target").await.unwrap();
        assert_eq!(id, Some(CollectionId::from(250)));
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn missing_target_on_short_listing_is_none() {
        let backend = Arc::new(FakeBackend::listing(150, None));
        let client = RetrievalClient::new(backend.clone());
        assert_eq!(client.resolve_collection("target").await.unwrap(), None);
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn endless_listing_fails_after_eleven_fetches() {
        let backend = Arc::new(FakeBackend::listing(usize::MAX / 2, None));
        let client = RetrievalClient::new(backend.clone());
        let err = client.resolve_collection("target").await.unwrap_err();
        assert!(matches!(err, ChatError::TooManyCollections { scanned: 1100 }));
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn empty_listing_is_none_after_one_fetch() {
        let backend = Arc::new(FakeBackend::listing(0, None));
        let client = RetrievalClient::new(backend.clone());
        assert_eq!(client.resolve_collection("target").await.unwrap(), None);
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn threshold_filter_keeps_order_and_boundary() {
        let hits = vec![hit("a", 0.9), hit("b", 0.6), hit("c", 0.4), hit("d", 0.5)];
        let kept = filter_by_threshold(hits, 0.5);
        let scores: Vec<f64> = kept.iter().map(|h| h.relevance_score).collect();
        assert_eq!(scores, vec![0.9, 0.6, 0.5]);
    }

    #[tokio::test]
    async fn search_filters_even_if_backend_does_not() {
        let mut backend = FakeBackend::listing(0, None);
        backend.hits = vec![hit("a", 0.9), hit("b", 0.2)];
        let client = RetrievalClient::new(Arc::new(backend));
        let kept = client
            .search("q", &CollectionId::from("1"), DEFAULT_K, DEFAULT_SCORE_THRESHOLD)
            .await
            .unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].chunk_id, "a");
    }

    #[tokio::test]
    async fn refresh_deletes_creates_then_uploads_in_order() {
        let backend = Arc::new(FakeBackend::listing(0, None));
        let client = RetrievalClient::new(backend.clone());
        let docs = vec![
            DocumentFile {
                path: PathBuf::from("/docs/a.pdf"),
                name: "a.pdf".to_string(),
            },
            DocumentFile {
                path: PathBuf::from("/docs/week2/b.pdf"),
                name: "week2/b.pdf".to_string(),
            },
        ];
        let id = client
            .refresh_collection(Some(&CollectionId::from(7)), "course", "embeddings-small", &docs)
            .await
            .unwrap();
        assert_eq!(id, CollectionId::from("new"));
        assert_eq!(
            *backend.log.lock().unwrap(),
            vec![
                "delete 7".to_string(),
                "create course embeddings-small".to_string(),
                "upload new /docs/a.pdf as a.pdf".to_string(),
                "upload new /docs/week2/b.pdf as week2/b.pdf".to_string(),
            ]
        );
    }
}
