/*!
 * Translation memory.
 *
 * Append-only store of accepted translations, searchable by similarity of
 * the source text. Vectors come from an injected `Embedder`; the memory
 * itself holds no translation logic. Clones share the same store.
 */

use std::cmp::Ordering;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::providers::Embedder;

pub mod embedding;

pub use embedding::{NgramEmbedder, cosine_similarity};

/// A source span with its accepted rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub document_id: String,
    pub chunk_index: usize,
    pub source: String,
    pub target: String,
}

impl TranslationUnit {
    pub fn new(
        document_id: impl Into<String>,
        chunk_index: usize,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            chunk_index,
            source: source.into(),
            target: target.into(),
        }
    }
}

#[derive(Debug)]
struct MemoryEntry {
    unit: TranslationUnit,
    vector: Vec<f32>,
}

/// Similarity-indexed translation memory
#[derive(Debug, Clone)]
pub struct TranslationMemory {
    entries: Arc<RwLock<Vec<MemoryEntry>>>,
    embedder: Arc<dyn Embedder>,
    min_similarity: f32,
}

impl TranslationMemory {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            embedder,
            min_similarity: 0.0,
        }
    }

    /// Memory backed by the local n-gram embedder.
    pub fn local() -> Self {
        Self::new(Arc::new(NgramEmbedder::default()))
    }

    /// Drop query results scoring below `threshold`.
    pub fn with_min_similarity(mut self, threshold: f32) -> Self {
        self.min_similarity = threshold;
        self
    }

    /// Embed and append a unit. Returns its position in the memory.
    pub async fn index(&self, unit: TranslationUnit) -> Result<usize, ProviderError> {
        // Embed outside the lock; the write section is a single push
        let vector = self.embedder.embed(&unit.source).await?;
        let mut entries = self.entries.write();
        entries.push(MemoryEntry { unit, vector });
        let position = entries.len() - 1;
        debug!("Indexed translation unit #{} into memory", position);
        Ok(position)
    }

    /// The `k` most similar units, most similar first.
    pub async fn query_nearest(&self, text: &str, k: usize) -> Result<Vec<TranslationUnit>, ProviderError> {
        Ok(self
            .query_scored(text, k)
            .await?
            .into_iter()
            .map(|(_, unit)| unit)
            .collect())
    }

    /// Like `query_nearest`, with similarity scores. Ties keep insertion order.
    pub async fn query_scored(
        &self,
        text: &str,
        k: usize,
    ) -> Result<Vec<(f32, TranslationUnit)>, ProviderError> {
        if k == 0 || text.trim().is_empty() || self.is_empty() {
            return Ok(Vec::new());
        }
        let query = self.embedder.embed(text).await?;

        let entries = self.entries.read();
        let mut scored: Vec<(f32, usize)> = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (cosine_similarity(&query, &entry.vector), i))
            .filter(|(score, _)| *score >= self.min_similarity)
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, i)| (score, entries[i].unit.clone()))
            .collect())
    }

    /// Snapshot of every unit in insertion order.
    pub fn units(&self) -> Vec<TranslationUnit> {
        self.entries.read().iter().map(|e| e.unit.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
