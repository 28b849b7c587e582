mod ask;
mod ingest;
mod purge;
mod status;

pub use ask::{AskArgs, handle_ask};
pub use ingest::{IngestArgs, handle_ingest};
pub use purge::handle_purge;
pub use status::handle_status;

use anyhow::Result;
use std::sync::Arc;

use crate::models::Config;
use crate::services::{EmbeddingClient, OpenRouterBackend, Pipeline, QdrantIndex};

/// Assemble the pipeline from configuration with the production backends.
pub fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let embedder = EmbeddingClient::new(&config.embedding)?;
    let index = QdrantIndex::new(&config.vector_store, config.embedding.dimension)?;
    let backend = OpenRouterBackend::new(&config.chat)?;

    Ok(Pipeline::new(
        Arc::new(embedder),
        Arc::new(index),
        Arc::new(backend),
        &config.chunking,
        &config.chat,
        &config.retrieval,
    ))
}
