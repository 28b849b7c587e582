use anyhow::Result;

use crate::models::Config;
use crate::services::QdrantIndex;

pub async fn handle_status(_owner: &str) -> Result<()> {
    let config = Config::load()?;

    println!("Configuration:");
    println!("  embedding model: {}", config.embedding.model);
    println!("  chat model:      {}", config.chat.resolved_model());
    println!("  fallback model:  {}", config.chat.fallback_model);
    println!(
        "  chunking:        size {} / overlap {}",
        config.chunking.chunk_size, config.chunking.chunk_overlap
    );

    let api_key_set = config.chat.api_key.is_some();
    println!(
        "  api key:         {}",
        if api_key_set { "set" } else { "missing" }
    );

    let index = QdrantIndex::new(&config.vector_store, config.embedding.dimension)?;
    let connected = index.health_check().await.unwrap_or(false);
    println!("\nVector store:");
    println!("  url:        {}", config.vector_store.url);
    println!("  collection: {}", index.collection());
    println!(
        "  status:     {}",
        if connected { "connected" } else { "unreachable" }
    );

    if !api_key_set {
        eprintln!("\nHint: set OPENROUTER_API_KEY to enable embedding and chat calls.");
    }
    if !connected {
        eprintln!("Warning: Qdrant not running. Start with: docker run -p 6334:6334 qdrant/qdrant");
    }

    Ok(())
}
