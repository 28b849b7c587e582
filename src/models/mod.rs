//! Data models: configuration, chunks, and wire payloads.

mod config;
mod document;
mod response;

pub use config::{
    ChatConfig, ChunkingConfig, Config, DEFAULT_API_BASE, DEFAULT_CHAT_MODEL, DEFAULT_COLLECTION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_QDRANT_URL, EmbeddingConfig, FALLBACK_CHAT_MODEL,
    RetrievalConfig, VectorStoreConfig,
};
pub use document::{Chunk, ChunkMetadata, EmbeddingRecord, ScoredChunk};
pub use response::{AskResponse, ChatEvent, IngestResponse, PurgeResponse, SourceRef};
