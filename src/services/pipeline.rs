//! Ingestion and question-answering pipeline.
//!
//! Wires the extractor, splitter, embedder, vector index, retriever, and
//! generator together behind the four operations the surrounding layers
//! call: `ingest`, `ask`, `ask_stream`, and `purge`. The pipeline is
//! stateless across calls; every question is answered independently.

use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{AskError, IndexError, IngestError};
use crate::models::{
    AskResponse, ChatConfig, ChatEvent, Chunk, ChunkMetadata, ChunkingConfig, EmbeddingRecord,
    IngestResponse, PurgeResponse, RetrievalConfig, SourceRef,
};
use crate::services::chunker::RecursiveSplitter;
use crate::services::embedding::Embedder;
use crate::services::extractor::TextExtractor;
use crate::services::generator::{AnswerGenerator, AnswerStream, ChatBackend};
use crate::services::retriever::Retriever;
use crate::services::vector_store::VectorIndex;
use crate::utils::has_usable_text;

/// Fixed answer returned when retrieval finds nothing. A successful
/// response, not an error.
pub const NO_DOCUMENTS_ANSWER: &str =
    "I could not find any relevant document content to answer your question. \
     Please upload some documents first.";

/// Generic message surfaced when a stream fails terminally; the cause is
/// logged, not exposed.
const STREAM_ERROR_MESSAGE: &str = "Failed to generate answer";

/// One uploaded file. Size and type validation happen upstream.
#[derive(Debug, Clone)]
pub struct IngestFile {
    pub bytes: Vec<u8>,
    pub filename: String,
}

pub struct Pipeline {
    extractor: TextExtractor,
    splitter: RecursiveSplitter,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    retriever: Retriever,
    generator: AnswerGenerator,
    default_k: usize,
}

impl Pipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        backend: Arc<dyn ChatBackend>,
        chunking: &ChunkingConfig,
        chat: &ChatConfig,
        retrieval: &RetrievalConfig,
    ) -> Self {
        Self {
            extractor: TextExtractor::new(),
            splitter: RecursiveSplitter::new(chunking),
            embedder: Arc::clone(&embedder),
            index: Arc::clone(&index),
            retriever: Retriever::new(embedder, Arc::clone(&index)),
            generator: AnswerGenerator::new(backend, chat),
            default_k: (retrieval.top_k as usize).max(1),
        }
    }

    /// Extract, chunk, embed, and index a batch of files for one owner.
    ///
    /// All-or-nothing: the first failing file fails the whole batch and no
    /// chunks are inserted. Files are processed sequentially in the order
    /// given, and chunk order within each document is preserved.
    pub async fn ingest(
        &self,
        files: Vec<IngestFile>,
        owner_id: &str,
    ) -> Result<IngestResponse, IngestError> {
        if files.is_empty() {
            return Err(IngestError::NoFiles);
        }

        let created_at = chrono::Utc::now().to_rfc3339();
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut filenames: Vec<String> = Vec::new();

        for file in files {
            let doc_type = TextExtractor::doc_type(&file.filename)
                .unwrap_or("unknown")
                .to_string();
            let text = self
                .extractor
                .extract(file.bytes, &file.filename)
                .await
                .map_err(|source| IngestError::ExtractionError {
                    filename: file.filename.clone(),
                    source,
                })?;

            let mut chunk_index = 0u32;
            for piece in self.splitter.split(&text) {
                if !has_usable_text(&piece) {
                    continue;
                }
                chunks.push(Chunk::new(
                    piece,
                    ChunkMetadata {
                        source: file.filename.clone(),
                        doc_type: doc_type.clone(),
                        owner_id: owner_id.to_string(),
                        created_at: created_at.clone(),
                        chunk_index,
                    },
                ));
                chunk_index += 1;
            }

            filenames.push(file.filename);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(texts).await?;

        let records: Vec<EmbeddingRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord::new(chunk, vector))
            .collect();
        let chunk_count = records.len();

        self.index.ensure_ready().await?;
        self.index.insert(records).await?;

        info!(chunk_count, owner_id, "ingested document batch");
        Ok(IngestResponse {
            chunk_count,
            files: filenames,
        })
    }

    /// Answer a question in one shot, grounded in the owner's documents.
    pub async fn ask(
        &self,
        question: &str,
        owner_id: Option<&str>,
        k: Option<usize>,
    ) -> Result<AskResponse, AskError> {
        let question = valid_question(question)?;
        let k = k.unwrap_or(self.default_k);

        let results = self.retriever.retrieve(question, k, owner_id).await?;
        if results.is_empty() {
            return Ok(AskResponse {
                answer: NO_DOCUMENTS_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let chunks: Vec<Chunk> = results.iter().map(|r| r.chunk.clone()).collect();
        let sources: Vec<SourceRef> = chunks.iter().map(SourceRef::from_chunk).collect();
        let answer = self.generator.generate(question, &chunks).await?;

        Ok(AskResponse { answer, sources })
    }

    /// Answer a question as a stream of events: zero or more fragments, then
    /// one terminal sources event, or one terminal error event.
    ///
    /// Retrieval failures surface as `Err` here, before any event is
    /// produced; generation failures surface in-stream.
    pub async fn ask_stream(
        &self,
        question: &str,
        owner_id: Option<&str>,
        k: Option<usize>,
    ) -> Result<ChatStream, AskError> {
        let question = valid_question(question)?;
        let k = k.unwrap_or(self.default_k);

        let results = self.retriever.retrieve(question, k, owner_id).await?;
        if results.is_empty() {
            return Ok(ChatStream::fixed(NO_DOCUMENTS_ANSWER));
        }

        let chunks: Vec<Chunk> = results.iter().map(|r| r.chunk.clone()).collect();
        let sources: Vec<SourceRef> = chunks.iter().map(SourceRef::from_chunk).collect();
        let answer = self.generator.generate_stream(question, &chunks);

        Ok(ChatStream::streaming(answer, sources))
    }

    /// Delete every indexed chunk belonging to `owner_id`. Idempotent;
    /// succeeds when there is nothing to delete.
    pub async fn purge(&self, owner_id: &str) -> Result<PurgeResponse, IndexError> {
        self.index.delete_by_owner(owner_id).await?;
        info!(owner_id, "purged owner documents");
        Ok(PurgeResponse::ok())
    }
}

fn valid_question(question: &str) -> Result<&str, AskError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(AskError::InvalidQuestion("question is empty".to_string()));
    }
    Ok(trimmed)
}

enum StreamState {
    Fixed { events: VecDeque<ChatEvent> },
    Streaming {
        answer: AnswerStream,
        sources: Vec<SourceRef>,
    },
    Finished,
}

/// Pull-based event sequence for one streamed answer.
///
/// Dropping the stream mid-answer cancels the underlying generation; no
/// fragments are buffered for an absent consumer.
pub struct ChatStream {
    state: StreamState,
}

impl ChatStream {
    fn fixed(answer: &str) -> Self {
        let events = VecDeque::from([ChatEvent::fragment(answer), ChatEvent::sources(Vec::new())]);
        Self {
            state: StreamState::Fixed { events },
        }
    }

    fn streaming(answer: AnswerStream, sources: Vec<SourceRef>) -> Self {
        Self {
            state: StreamState::Streaming { answer, sources },
        }
    }

    /// Next event, or `None` after the terminal event has been delivered.
    pub async fn next(&mut self) -> Option<ChatEvent> {
        match &mut self.state {
            StreamState::Fixed { events } => {
                let event = events.pop_front();
                if events.is_empty() {
                    self.state = StreamState::Finished;
                }
                event
            }
            StreamState::Streaming { answer, sources } => match answer.next().await {
                Some(Ok(fragment)) => Some(ChatEvent::fragment(fragment)),
                Some(Err(e)) => {
                    error!(error = %e, "answer stream failed");
                    self.state = StreamState::Finished;
                    Some(ChatEvent::error(STREAM_ERROR_MESSAGE))
                }
                None => {
                    let sources = std::mem::take(sources);
                    self.state = StreamState::Finished;
                    Some(ChatEvent::sources(sources))
                }
            },
            StreamState::Finished => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::error::{EmbeddingError, GenerationError};
    use crate::services::generator::FragmentStream;
    use crate::services::vector_store::MemoryIndex;

    /// Hashes words into a small fixed vector; deterministic and
    /// similarity-preserving enough for pipeline tests.
    struct HashEmbedder;

    impl HashEmbedder {
        fn vector(text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; 8];
            for word in text.split_whitespace() {
                let mut h = 0usize;
                for b in word.bytes() {
                    h = h.wrapping_mul(31).wrapping_add(b as usize);
                }
                v[h % 8] += 1.0;
            }
            v
        }
    }

    #[async_trait]
    impl Embedder for HashEmbedder {
        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(Self::vector(text))
        }

        async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|t| Self::vector(t)).collect())
        }
    }

    /// Echoes the grounding prompt back, so tests can check the answer was
    /// built from the supplied chunks.
    struct EchoBackend;

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn complete(&self, _model: &str, prompt: &str) -> Result<String, GenerationError> {
            Ok(format!("echo: {prompt}"))
        }

        async fn stream(
            &self,
            _model: &str,
            prompt: &str,
        ) -> Result<FragmentStream, GenerationError> {
            let items = vec![Ok("echo: ".to_string()), Ok(prompt.to_string())];
            Ok(Box::pin(futures_util::stream::iter(items)))
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(
            Arc::new(HashEmbedder),
            Arc::new(MemoryIndex::new()),
            Arc::new(EchoBackend),
            &ChunkingConfig::default(),
            &ChatConfig::default(),
            &RetrievalConfig::default(),
        )
    }

    fn text_file(name: &str, content: &str) -> IngestFile {
        IngestFile {
            bytes: content.as_bytes().to_vec(),
            filename: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_ingest_reports_chunk_count() {
        let pipeline = pipeline();
        let report = pipeline
            .ingest(
                vec![text_file("notes.txt", &"substantial content here. ".repeat(100))],
                "u1",
            )
            .await
            .unwrap();

        assert!(report.chunk_count > 1);
        assert_eq!(report.files, vec!["notes.txt"]);
    }

    #[tokio::test]
    async fn test_ingest_fails_whole_batch_on_bad_file() {
        let pipeline = pipeline();
        let err = pipeline
            .ingest(
                vec![
                    text_file("good.txt", "perfectly fine content"),
                    text_file("bad.zip", "unsupported"),
                ],
                "u1",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::ExtractionError { .. }));
    }

    #[tokio::test]
    async fn test_ingest_empty_batch_rejected() {
        let pipeline = pipeline();
        assert!(matches!(
            pipeline.ingest(vec![], "u1").await,
            Err(IngestError::NoFiles)
        ));
    }

    #[tokio::test]
    async fn test_ask_empty_index_returns_fixed_answer() {
        let pipeline = pipeline();
        let response = pipeline
            .ask("unrelated question", Some("u1"), None)
            .await
            .unwrap();

        assert_eq!(response.answer, NO_DOCUMENTS_ANSWER);
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_ask_grounds_answer_in_documents() {
        let pipeline = pipeline();
        pipeline
            .ingest(
                vec![text_file("rust.txt", "the borrow checker enforces aliasing rules")],
                "u1",
            )
            .await
            .unwrap();

        let response = pipeline
            .ask("borrow checker aliasing", Some("u1"), None)
            .await
            .unwrap();

        assert!(response.answer.contains("borrow checker"));
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].source, "rust.txt");
    }

    #[tokio::test]
    async fn test_ask_stream_matches_non_streaming_grounding() {
        let pipeline = pipeline();
        pipeline
            .ingest(
                vec![text_file("facts.txt", "water boils at one hundred degrees")],
                "u1",
            )
            .await
            .unwrap();

        let question = "water boils degrees";
        let single = pipeline.ask(question, Some("u1"), None).await.unwrap();

        let mut stream = pipeline
            .ask_stream(question, Some("u1"), None)
            .await
            .unwrap();
        let mut streamed = String::new();
        let mut sources = Vec::new();
        while let Some(event) = stream.next().await {
            match event {
                ChatEvent::Fragment { content } => streamed.push_str(&content),
                ChatEvent::Sources { sources: s, done } => {
                    assert!(done);
                    sources = s;
                }
                ChatEvent::Error { error } => panic!("unexpected error event: {error}"),
            }
        }

        // Both paths ground in the same retrieved context.
        assert!(single.answer.contains("water boils"));
        assert!(streamed.contains("water boils"));
        assert_eq!(sources, single.sources);
    }

    #[tokio::test]
    async fn test_ask_stream_empty_index_streams_fixed_answer() {
        let pipeline = pipeline();
        let mut stream = pipeline
            .ask_stream("anything", Some("u1"), None)
            .await
            .unwrap();

        let first = stream.next().await.unwrap();
        assert_eq!(first, ChatEvent::fragment(NO_DOCUMENTS_ANSWER));
        let second = stream.next().await.unwrap();
        assert_eq!(second, ChatEvent::sources(Vec::new()));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let pipeline = pipeline();
        assert!(matches!(
            pipeline.ask("   ", Some("u1"), None).await,
            Err(AskError::InvalidQuestion(_))
        ));
    }

    #[tokio::test]
    async fn test_purge_is_idempotent() {
        let pipeline = pipeline();
        pipeline
            .ingest(vec![text_file("doc.txt", "some indexed content")], "u1")
            .await
            .unwrap();

        assert!(pipeline.purge("u1").await.unwrap().success);
        assert!(pipeline.purge("u1").await.unwrap().success);

        let response = pipeline.ask("indexed content", Some("u1"), None).await.unwrap();
        assert_eq!(response.answer, NO_DOCUMENTS_ANSWER);
    }
}
