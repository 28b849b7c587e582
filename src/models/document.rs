use serde::{Deserialize, Serialize};

/// A bounded-size text segment with source provenance, the unit of retrieval.
///
/// Chunks are created by the splitter from one document's extracted text,
/// annotated with the owner and timestamp at ingestion time, and immutable
/// once indexed. They are destroyed only by an owner-scoped purge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Originating filename.
    pub source: String,

    /// Document kind ("pdf", "text").
    pub doc_type: String,

    /// Opaque owner tag supplied by the caller. Not an auth mechanism.
    pub owner_id: String,

    /// RFC 3339 ingestion timestamp.
    pub created_at: String,

    /// Position of this chunk within its document.
    pub chunk_index: u32,
}

impl Chunk {
    pub fn new(text: String, metadata: ChunkMetadata) -> Self {
        Self { text, metadata }
    }
}

/// A (chunk, vector) pair bound for the vector index.
///
/// One embedding per chunk; the vector dimensionality is fixed by the
/// embedding configuration in use at insert time.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self { chunk, vector }
    }
}

/// A retrieved chunk with its similarity score, highest first in a result set.
///
/// The score alone implies no ownership guarantee; owner filtering is a
/// separate retrieval concern.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}
