//! In-memory vector index.
//!
//! Brute-force cosine similarity over an insertion-ordered list. Used by the
//! test suite and for index-free local development; not meant for large
//! collections.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::IndexError;
use crate::models::{EmbeddingRecord, ScoredChunk};
use crate::services::vector_store::VectorIndex;

#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    records: Arc<RwLock<Vec<EmbeddingRecord>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_ready(&self) -> Result<(), IndexError> {
        Ok(())
    }

    async fn insert(&self, records: Vec<EmbeddingRecord>) -> Result<(), IndexError> {
        let mut store = self.records.write().await;
        debug!(count = records.len(), "inserting records into memory index");
        store.extend(records);
        Ok(())
    }

    async fn query(&self, vector: Vec<f32>, k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        let store = self.records.read().await;

        let mut scored: Vec<ScoredChunk> = store
            .iter()
            .map(|record| ScoredChunk {
                chunk: record.chunk.clone(),
                score: Self::cosine_similarity(&vector, &record.vector),
            })
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete_by_owner(&self, owner_id: &str) -> Result<(), IndexError> {
        let mut store = self.records.write().await;
        let before = store.len();
        store.retain(|record| record.chunk.metadata.owner_id != owner_id);
        debug!(
            owner_id,
            deleted = before - store.len(),
            "deleted records by owner"
        );
        Ok(())
    }
}
