//! Knowledge retrieval — the index seam and a deterministic local index.
//!
//! The workflow only depends on [`RetrievalIndex`]. The bundled
//! [`KeywordIndex`] scores documents by query-term overlap; it stands in
//! for an embedding-backed index, which stays behind this same trait.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::RetrievalError;

/// A ranked retrieval result.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// Chunk text.
    pub content: String,
    /// Source label (e.g. "policy_document", "email_archive").
    pub source: String,
    /// Page or section number within the source, when known.
    pub page: Option<u32>,
}

/// Ranked text retrieval over the knowledge base.
#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    /// The `k` most relevant chunks for a query.
    ///
    /// An index that holds no documents at all returns
    /// [`RetrievalError::EmptyIndex`]; a query that simply matches
    /// nothing returns an empty vec.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedChunk>, RetrievalError>;
}

// ── Keyword index ───────────────────────────────────────────────────

struct IndexedDoc {
    chunk: RetrievedChunk,
    terms: HashSet<String>,
}

/// In-memory index scoring documents by distinct query-term overlap.
///
/// Deterministic: equal scores keep insertion order.
pub struct KeywordIndex {
    docs: RwLock<Vec<IndexedDoc>>,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(Vec::new()),
        }
    }

    /// Add one document chunk to the index.
    pub fn add_document(&self, content: &str, source: &str, page: Option<u32>) {
        let terms = tokenize(content);
        let mut docs = self.docs.write().expect("index lock poisoned");
        docs.push(IndexedDoc {
            chunk: RetrievedChunk {
                content: content.to_string(),
                source: source.to_string(),
                page,
            },
            terms,
        });
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.docs.read().expect("index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for KeywordIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RetrievalIndex for KeywordIndex {
    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        let docs = self.docs.read().expect("index lock poisoned");
        if docs.is_empty() {
            return Err(RetrievalError::EmptyIndex);
        }

        let query_terms = tokenize(text);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, usize)> = docs
            .iter()
            .enumerate()
            .map(|(i, doc)| (i, doc.terms.intersection(&query_terms).count()))
            .filter(|(_, score)| *score > 0)
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, _)| docs[i].chunk.clone())
            .collect())
    }
}

/// Lowercased alphanumeric terms of three or more characters.
fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
        .map(str::to_string)
        .collect()
}
