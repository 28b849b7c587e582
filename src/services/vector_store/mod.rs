//! Vector index abstraction.
//!
//! The core depends only on the [`VectorIndex`] trait so the storage backend
//! can be swapped (Qdrant in production, in-memory for tests and local
//! development) and so tests can run against a deterministic index.

mod memory;
mod qdrant;

pub use memory::MemoryIndex;
pub use qdrant::QdrantIndex;

use async_trait::async_trait;

use crate::error::IndexError;
use crate::models::{EmbeddingRecord, ScoredChunk};

/// Persists (chunk, vector) records and answers nearest-neighbor queries.
///
/// The index owns its records exclusively: the core only appends and
/// bulk-deletes by owner tag, never mutates in place. Insertion is not
/// idempotent; re-inserting identical content duplicates it.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the backing collection if it does not exist yet.
    async fn ensure_ready(&self) -> Result<(), IndexError>;

    /// Append a batch of records, preserving their order.
    async fn insert(&self, records: Vec<EmbeddingRecord>) -> Result<(), IndexError>;

    /// Top-`k` records by descending cosine similarity. Tie order among
    /// equal scores is backend-defined; [`MemoryIndex`] keeps insertion
    /// order, remote backends make no such promise.
    async fn query(&self, vector: Vec<f32>, k: usize) -> Result<Vec<ScoredChunk>, IndexError>;

    /// Delete every record tagged with `owner_id`. A no-op when nothing
    /// matches; safe to retry after partial failure.
    async fn delete_by_owner(&self, owner_id: &str) -> Result<(), IndexError>;
}
