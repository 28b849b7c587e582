pub mod chunker;
pub mod embedding;
pub mod extractor;
pub mod generator;
pub mod pipeline;
pub mod retriever;
pub mod vector_store;

pub use chunker::RecursiveSplitter;
pub use embedding::{Embedder, EmbeddingClient};
pub use extractor::TextExtractor;
pub use generator::{AnswerGenerator, AnswerStream, ChatBackend, FragmentStream, OpenRouterBackend};
pub use pipeline::{ChatStream, IngestFile, NO_DOCUMENTS_ANSWER, Pipeline};
pub use retriever::Retriever;
pub use vector_store::{MemoryIndex, QdrantIndex, VectorIndex};
