//! Qdrant-backed vector index.

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder, value::Kind,
};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::IndexError;
use crate::models::{Chunk, ChunkMetadata, EmbeddingRecord, ScoredChunk, VectorStoreConfig};
use crate::services::vector_store::VectorIndex;

pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    dimension: u64,
}

impl QdrantIndex {
    pub fn new(config: &VectorStoreConfig, dimension: u64) -> Result<Self, IndexError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| IndexError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension,
        })
    }

    pub async fn health_check(&self) -> Result<bool, IndexError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| IndexError::ConnectionError(e.to_string()))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    async fn collection_exists(&self) -> Result<bool, IndexError> {
        match self.client.collection_info(&self.collection).await {
            Ok(_) => Ok(true),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    Ok(false)
                } else {
                    Err(IndexError::CollectionError(msg))
                }
            }
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_ready(&self) -> Result<(), IndexError> {
        if self.collection_exists().await? {
            return Ok(());
        }

        let create_collection = CreateCollectionBuilder::new(&self.collection)
            .vectors_config(VectorParamsBuilder::new(self.dimension, Distance::Cosine));

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| IndexError::CollectionError(e.to_string()))?;

        Ok(())
    }

    async fn insert(&self, records: Vec<EmbeddingRecord>) -> Result<(), IndexError> {
        if records.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = records
            .into_iter()
            .map(|record| {
                let mut payload: HashMap<String, Value> = HashMap::new();
                payload.insert("text".to_string(), record.chunk.text.into());
                payload.insert("source".to_string(), record.chunk.metadata.source.into());
                payload.insert(
                    "doc_type".to_string(),
                    record.chunk.metadata.doc_type.into(),
                );
                payload.insert(
                    "owner_id".to_string(),
                    record.chunk.metadata.owner_id.into(),
                );
                payload.insert(
                    "created_at".to_string(),
                    record.chunk.metadata.created_at.into(),
                );
                payload.insert(
                    "chunk_index".to_string(),
                    (record.chunk.metadata.chunk_index as i64).into(),
                );

                // Random ids: repeated inserts of identical content create
                // duplicate records by design.
                PointStruct::new(Uuid::new_v4().to_string(), record.vector, payload)
            })
            .collect();

        let upsert = UpsertPointsBuilder::new(&self.collection, points);

        self.client
            .upsert_points(upsert)
            .await
            .map_err(|e| IndexError::InsertError(e.to_string()))?;

        Ok(())
    }

    async fn query(&self, vector: Vec<f32>, k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        let search = SearchPointsBuilder::new(&self.collection, vector, k as u64)
            .with_payload(true);

        let results = self
            .client
            .search_points(search)
            .await
            .map_err(|e| IndexError::QueryError(e.to_string()))?;

        let scored: Vec<ScoredChunk> = results
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;
                let chunk = Chunk::new(
                    get_str(&payload, "text"),
                    ChunkMetadata {
                        source: get_str(&payload, "source"),
                        doc_type: get_str(&payload, "doc_type"),
                        owner_id: get_str(&payload, "owner_id"),
                        created_at: get_str(&payload, "created_at"),
                        chunk_index: get_int(&payload, "chunk_index") as u32,
                    },
                );
                ScoredChunk {
                    chunk,
                    score: point.score,
                }
            })
            .collect();

        Ok(scored)
    }

    async fn delete_by_owner(&self, owner_id: &str) -> Result<(), IndexError> {
        let filter = Filter::must([Condition::matches("owner_id", owner_id.to_string())]);
        let delete = DeletePointsBuilder::new(&self.collection).points(filter);

        self.client
            .delete_points(delete)
            .await
            .map_err(|e| IndexError::DeleteError(e.to_string()))?;

        Ok(())
    }
}

fn get_str(payload: &HashMap<String, Value>, key: &str) -> String {
    payload
        .get(key)
        .and_then(|v| match &v.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

fn get_int(payload: &HashMap<String, Value>, key: &str) -> i64 {
    payload
        .get(key)
        .and_then(|v| match &v.kind {
            Some(Kind::IntegerValue(n)) => Some(*n),
            _ => None,
        })
        .unwrap_or_default()
}
