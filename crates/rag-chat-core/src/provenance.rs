//! Best-effort provenance estimation for retrieved chunks.
//!
//! Retrieval backends index text extracted with their own pipeline, so a
//! chunk rarely appears verbatim in our own extraction of the same document
//! (collapsed whitespace, ligatures, OCR noise). The locator tolerates that
//! by matching on *normalized* text and reports an **estimated** line, never
//! an exact one.
//!
//! # Algorithm
//!
//! For each distinct document referenced by the chunk set:
//!
//! 1. Extract its pages and join them with `\n` (cached for this call only).
//! 2. Normalize to alphanumeric characters, case preserved. Record the
//!    newline count `N` of the full text and the normalized length `L`.
//! 3. For each chunk of that document, normalize it the same way and keep
//!    its first tenth (at least one character).
//! 4. Scan the normalized document left to right for that prefix. The first
//!    match at offset `i` wins.
//! 5. Estimate the line as `⌊N · i / L⌋`, assuming newlines are spread
//!    uniformly. No match → [`ChunkLocation::Unknown`].
//!
//! Only the prefix is compared, so repetitive documents can yield false
//! positives. This is accepted: the result is a hint for the reader, not a
//! citation.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::RetrievedChunk;

/// Fraction of the normalized chunk compared against the document.
pub const PREFIX_DIVISOR: usize = 10;

/// Turns a stored document into its ordered page texts.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_pages(&self, document: &str) -> Result<Vec<String>>;
}

/// Estimated position of a chunk inside its source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkLocation {
    /// Estimated zero-based line number.
    Line(u64),
    Unknown,
}

/// Normalized form of one document's reconstructed text.
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    normalized: Vec<char>,
    newline_count: usize,
}

impl NormalizedDocument {
    /// Build from the page texts of a document.
    pub fn from_pages(pages: &[String]) -> Self {
        Self::from_text(&pages.join("\n"))
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            normalized: text.chars().filter(|c| c.is_alphanumeric()).collect(),
            newline_count: text.matches('\n').count(),
        }
    }

    pub fn newline_count(&self) -> usize {
        self.newline_count
    }

    pub fn normalized_len(&self) -> usize {
        self.normalized.len()
    }

    /// Estimate where `chunk_text` starts.
    pub fn locate(&self, chunk_text: &str) -> ChunkLocation {
        let chunk: Vec<char> = chunk_text.chars().filter(|c| c.is_alphanumeric()).collect();
        if chunk.is_empty() || self.normalized.is_empty() {
            return ChunkLocation::Unknown;
        }

        let prefix_len = (chunk.len() / PREFIX_DIVISOR).max(1);
        let prefix = &chunk[..prefix_len];

        match self.normalized.windows(prefix_len).position(|w| w == prefix) {
            Some(offset) => ChunkLocation::Line(self.estimate_line(offset)),
            None => ChunkLocation::Unknown,
        }
    }

    fn estimate_line(&self, offset: usize) -> u64 {
        let lines = self.newline_count as u128 * offset as u128 / self.normalized.len() as u128;
        lines as u64
    }
}

/// Normalize text to its alphanumeric characters.
pub fn normalize(text: &str) -> String {
    text.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Per-call cache of normalized documents. `None` marks a document the
/// extractor could not read.
#[derive(Default)]
pub struct DocumentTextCache {
    docs: HashMap<String, Option<NormalizedDocument>>,
}

impl DocumentTextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized text of `document`, extracting it on first access.
    pub async fn get_or_extract<E>(&mut self, extractor: &E, document: &str) -> Option<&NormalizedDocument>
    where
        E: TextExtractor + ?Sized,
    {
        if !self.docs.contains_key(document) {
            let loaded = match extractor.extract_pages(document).await {
                Ok(pages) => Some(NormalizedDocument::from_pages(&pages)),
                Err(e) => {
                    tracing::warn!(document, error = %e, "could not read document for provenance");
                    None
                }
            };
            self.docs.insert(document.to_string(), loaded);
        }
        self.docs.get(document).and_then(Option::as_ref)
    }
}

/// One row of a [`ProvenanceReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceEntry {
    pub document: String,
    pub chunk_id: String,
    /// `None` when locations were not estimated (ids only).
    pub location: Option<ChunkLocation>,
}

/// Provenance of a chunk set, in retrieval order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceReport {
    pub entries: Vec<ProvenanceEntry>,
}

impl ProvenanceReport {
    /// Report naming each chunk's document and id without estimating lines.
    pub fn ids_only(chunks: &[RetrievedChunk]) -> Self {
        Self {
            entries: chunks
                .iter()
                .map(|c| ProvenanceEntry {
                    document: c.source_document.clone(),
                    chunk_id: c.chunk_id.clone(),
                    location: None,
                })
                .collect(),
        }
    }

    /// Estimated location per chunk id.
    pub fn locations(&self) -> HashMap<&str, ChunkLocation> {
        self.entries
            .iter()
            .filter_map(|e| e.location.map(|loc| (e.chunk_id.as_str(), loc)))
            .collect()
    }
}

impl fmt::Display for ProvenanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return f.write_str("No sources found.");
        }
        f.write_str("Sources used :")?;
        for e in &self.entries {
            match e.location {
                Some(ChunkLocation::Line(line)) => {
                    write!(f, "\nFile: {}, from line {} onwards.", e.document, line)?
                }
                Some(ChunkLocation::Unknown) => write!(
                    f,
                    "\nFile: {}, match not found, chunk ID: {}.",
                    e.document, e.chunk_id
                )?,
                None => write!(f, "\nFile: {}, Chunk ID: {}", e.document, e.chunk_id)?,
            }
        }
        Ok(())
    }
}

/// Estimate the line of every chunk, extracting each document once.
pub async fn locate_chunks<E>(extractor: &E, chunks: &[RetrievedChunk]) -> ProvenanceReport
where
    E: TextExtractor + ?Sized,
{
    let mut cache = DocumentTextCache::new();
    let mut entries = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let location = match cache.get_or_extract(extractor, &chunk.source_document).await {
            Some(doc) => doc.locate(&chunk.content),
            None => ChunkLocation::Unknown,
        };
        entries.push(ProvenanceEntry {
            document: chunk.source_document.clone(),
            chunk_id: chunk.chunk_id.clone(),
            location: Some(location),
        });
    }

    ProvenanceReport { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeExtractor {
        pages: HashMap<String, Vec<String>>,
        calls: AtomicUsize,
    }

    impl FakeExtractor {
        fn with(doc: &str, pages: &[&str]) -> Self {
            let mut map = HashMap::new();
            map.insert(doc.to_string(), pages.iter().map(|p| p.to_string()).collect());
            Self {
                pages: map,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextExtractor for FakeExtractor {
        async fn extract_pages(&self, document: &str) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .get(document)
                .cloned()
                .ok_or_else(|| ChatError::Extraction(format!("no such document: {document}")))
        }
    }

    fn chunk(doc: &str, id: &str, content: &str) -> RetrievedChunk {
        RetrievedChunk {
            source_document: doc.to_string(),
            chunk_id: id.to_string(),
            content: content.to_string(),
            relevance_score: 1.0,
        }
    }

    #[test]
    fn normalize_keeps_alphanumerics_only() {
        assert_eq!(normalize("Gauß-Jordan, step 2!\n(é)"), "GaußJordanstep2é");
    }

    #[test]
    fn match_at_start_is_line_zero() {
        let doc = NormalizedDocument::from_text("alpha beta\ngamma\ndelta\n");
        assert_eq!(doc.locate("alpha beta gamma"), ChunkLocation::Line(0));
    }

    #[test]
    fn match_at_end_approaches_newline_count() {
        let mut text = String::new();
        for i in 0..100 {
            text.push_str(&format!("line{:03}\n", i));
        }
        text.push('z');
        let doc = NormalizedDocument::from_text(&text);
        assert_eq!(doc.newline_count(), 100);
        // A 10-char chunk compares a single character; "z" only occurs at the tail.
        let loc = doc.locate("zzzzzzzzzz");
        let ChunkLocation::Line(line) = loc else {
            panic!("expected a match, got {loc:?}");
        };
        let last = doc.normalized_len() - 1;
        assert_eq!(line, (100 * last / doc.normalized_len()) as u64);
        assert_eq!(line, 99);
    }

    #[test]
    fn formatting_noise_is_tolerated() {
        let doc = NormalizedDocument::from_text("intro\n\nThe  quick\nbrown fox, jumps.\nend");
        assert_eq!(doc.locate("Thequick brown-fox jumps"), ChunkLocation::Line(0));
    }

    #[test]
    fn only_the_first_tenth_is_compared() {
        let doc = NormalizedDocument::from_text("header\nabcdefghij0123456789");
        // 20 normalized chars → 2-char prefix; the garbled tail is ignored.
        assert_eq!(doc.locate("abXXXXXXXXXXXXXXXXXX"), ChunkLocation::Line(0));
        assert_eq!(doc.locate("zaXXXXXXXXXXXXXXXXXX"), ChunkLocation::Unknown);
    }

    #[test]
    fn absent_prefix_is_unknown() {
        let doc = NormalizedDocument::from_text("some text");
        assert_eq!(doc.locate("qqqqqqqqqq"), ChunkLocation::Unknown);
        assert_eq!(doc.locate("  --  "), ChunkLocation::Unknown);
    }

    #[tokio::test]
    async fn each_document_is_extracted_once_per_call() {
        let ex = FakeExtractor::with("a.pdf", &["first page\nmore", "second page"]);
        let chunks = vec![
            chunk("a.pdf", "c1", "first page more"),
            chunk("a.pdf", "c2", "second page"),
            chunk("missing.pdf", "c3", "whatever"),
        ];
        let report = locate_chunks(&ex, &chunks).await;
        assert_eq!(ex.calls.load(Ordering::SeqCst), 2);

        let locs = report.locations();
        assert_eq!(locs["c1"], ChunkLocation::Line(0));
        assert!(matches!(locs["c2"], ChunkLocation::Line(_)));
        assert_eq!(locs["c3"], ChunkLocation::Unknown);
    }

    #[tokio::test]
    async fn report_renders_lines_and_misses() {
        let ex = FakeExtractor::with("a.pdf", &["hello world"]);
        let chunks = vec![chunk("a.pdf", "c1", "hello"), chunk("a.pdf", "c2", "nothing")];
        let text = locate_chunks(&ex, &chunks).await.to_string();
        assert_eq!(
            text,
            "Sources used :\nFile: a.pdf, from line 0 onwards.\nFile: a.pdf, match not found, chunk ID: c2."
        );
    }

    #[test]
    fn ids_only_report() {
        let report = ProvenanceReport::ids_only(&[chunk("a.pdf", "c1", "")]);
        assert_eq!(report.to_string(), "Sources used :\nFile: a.pdf, Chunk ID: c1");
        assert!(report.locations().is_empty());
        assert_eq!(ProvenanceReport::default().to_string(), "No sources found.");
    }
}
