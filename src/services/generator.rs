//! Grounded answer generation with streaming and model fallback.
//!
//! The generator builds a grounding prompt from retrieved chunks, then calls
//! an OpenAI-compatible chat completion endpoint, either as one completion or
//! as an incrementally streamed sequence of text fragments. If the primary
//! model's streaming attempt fails (at call setup or mid-stream), a single
//! fresh attempt is made against the fallback model with the same prompt;
//! fragments already delivered are not retracted, so the consumer may see a
//! primary-model prefix followed by a fallback-model continuation.

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::models::{ChatConfig, Chunk};

/// Bounded run-ahead for streamed fragments. Keeps an abandoned consumer
/// from accumulating unread output.
const STREAM_BUFFER: usize = 16;

/// Lazy sequence of answer fragments from one upstream streaming call.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// Foreign-call boundary to a chat completion provider.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// One-shot completion.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, GenerationError>;

    /// Streaming completion. Dropping the returned stream releases the
    /// upstream connection.
    async fn stream(&self, model: &str, prompt: &str) -> Result<FragmentStream, GenerationError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone)]
pub struct OpenRouterBackend {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl OpenRouterBackend {
    pub fn new(config: &ChatConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    async fn send_request(
        &self,
        model: &str,
        prompt: &str,
        stream: bool,
    ) -> Result<reqwest::Response, GenerationError> {
        let url = format!("{}/chat/completions", self.api_base);
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout
            } else {
                GenerationError::RequestError(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::ServerError(format!(
                "status {}: {}",
                status, body
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatBackend for OpenRouterBackend {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        let response = self.send_request(model, prompt, false).await?;

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| GenerationError::InvalidResponse("empty completion".to_string()))
    }

    async fn stream(&self, model: &str, prompt: &str) -> Result<FragmentStream, GenerationError> {
        let response = self.send_request(model, prompt, true).await?;
        Ok(sse_fragment_stream(response))
    }
}

struct SseState {
    body: Pin<Box<dyn Stream<Item = reqwest::Result<Vec<u8>>> + Send>>,
    buffer: String,
    pending: VecDeque<String>,
    done: bool,
}

/// Turn a server-sent-event response body into a stream of content deltas.
///
/// Events arrive as `data: {json}` lines with a `data: [DONE]` sentinel.
/// Dropping the returned stream drops the response body, which releases the
/// upstream connection.
fn sse_fragment_stream(response: reqwest::Response) -> FragmentStream {
    let state = SseState {
        body: Box::pin(response.bytes_stream().map(|r| r.map(|b| b.to_vec()))),
        buffer: String::new(),
        pending: VecDeque::new(),
        done: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.done {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    state.buffer.push_str(&String::from_utf8_lossy(&bytes));
                    if let Err(e) = drain_sse_lines(&mut state) {
                        state.done = true;
                        return Some((Err(e), state));
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(GenerationError::StreamError(e.to_string())), state));
                }
                // Upstream closed without the sentinel; treat as completion.
                None => state.done = true,
            }
        }
    }))
}

/// Parse every complete line currently buffered, queueing content deltas.
fn drain_sse_lines(state: &mut SseState) -> Result<(), GenerationError> {
    while let Some(pos) = state.buffer.find('\n') {
        let line: String = state.buffer.drain(..=pos).collect();
        let line = line.trim();

        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();

        if data == "[DONE]" {
            state.done = true;
            return Ok(());
        }

        let chunk: StreamChunk = serde_json::from_str(data)
            .map_err(|e| GenerationError::InvalidResponse(format!("bad stream event: {e}")))?;

        if let Some(content) = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            && !content.is_empty()
        {
            state.pending.push_back(content);
        }
    }
    Ok(())
}

/// Pull-based stream of answer fragments with fallback handling built in.
///
/// Dropping the stream closes the channel; the producer notices on its next
/// send and stops pulling from the upstream call.
pub struct AnswerStream {
    rx: mpsc::Receiver<Result<String, GenerationError>>,
}

impl AnswerStream {
    /// Next fragment, a terminal error, or `None` once the answer is
    /// complete. Not restartable.
    pub async fn next(&mut self) -> Option<Result<String, GenerationError>> {
        self.rx.recv().await
    }
}

enum PumpOutcome {
    Completed,
    ConsumerGone,
    Failed(GenerationError),
}

/// Builds grounding prompts and drives the chat backend.
pub struct AnswerGenerator {
    backend: Arc<dyn ChatBackend>,
    model: String,
    fallback_model: String,
}

impl AnswerGenerator {
    pub fn new(backend: Arc<dyn ChatBackend>, config: &ChatConfig) -> Self {
        Self {
            backend,
            model: config.resolved_model(),
            fallback_model: config.fallback_model.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Numbered context blocks plus graduated grounding instructions: answer
    /// from context when it suffices, blend and label when it is partial,
    /// disclaim and fall back to general knowledge when it is irrelevant.
    pub fn build_prompt(question: &str, chunks: &[Chunk]) -> String {
        let context: Vec<String> = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("[{}] {}", i + 1, chunk.text))
            .collect();

        format!(
            "You are a helpful assistant. Answer the user's question based on \
             the document excerpts provided below.\n\n\
             Document excerpts:\n{}\n\n\
             Please note:\n\
             1. If the excerpts contain the answer, answer in detail from them.\n\
             2. If the excerpts are related but incomplete, you may supplement \
             with general knowledge, but state which parts come from the \
             documents and which are supplemented.\n\
             3. If the excerpts are entirely unrelated, you may answer from \
             your general knowledge, but tell the user that the documents \
             contain no relevant information.\n\n\
             User question: {}\n\nAnswer:",
            context.join("\n\n"),
            question
        )
    }

    /// Single-shot answer. No model fallback on this path.
    pub async fn generate(
        &self,
        question: &str,
        chunks: &[Chunk],
    ) -> Result<String, GenerationError> {
        let prompt = Self::build_prompt(question, chunks);
        debug!(model = %self.model, "generating answer");
        self.backend.complete(&self.model, &prompt).await
    }

    /// Streamed answer with the one-shot fallback policy.
    pub fn generate_stream(&self, question: &str, chunks: &[Chunk]) -> AnswerStream {
        let prompt = Self::build_prompt(question, chunks);
        let backend = Arc::clone(&self.backend);
        let model = self.model.clone();
        let fallback = self.fallback_model.clone();
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        tokio::spawn(async move {
            debug!(model = %model, "starting answer stream");
            let primary_error = match pump(backend.as_ref(), &model, &prompt, &tx).await {
                PumpOutcome::Completed | PumpOutcome::ConsumerGone => return,
                PumpOutcome::Failed(e) => e,
            };

            if model == fallback {
                let _ = tx.send(Err(primary_error)).await;
                return;
            }

            warn!(
                model = %model,
                fallback = %fallback,
                error = %primary_error,
                "primary model stream failed; attempting fallback"
            );

            match pump(backend.as_ref(), &fallback, &prompt, &tx).await {
                PumpOutcome::Completed | PumpOutcome::ConsumerGone => {}
                PumpOutcome::Failed(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        });

        AnswerStream { rx }
    }
}

/// Forward one streaming attempt into the channel. Fragments already sent
/// stay sent; a mid-stream failure reports only the error.
async fn pump(
    backend: &dyn ChatBackend,
    model: &str,
    prompt: &str,
    tx: &mpsc::Sender<Result<String, GenerationError>>,
) -> PumpOutcome {
    let mut stream = match backend.stream(model, prompt).await {
        Ok(stream) => stream,
        Err(e) => return PumpOutcome::Failed(e),
    };

    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                if tx.send(Ok(fragment)).await.is_err() {
                    return PumpOutcome::ConsumerGone;
                }
            }
            Err(e) => return PumpOutcome::Failed(e),
        }
    }

    PumpOutcome::Completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use std::sync::Mutex;

    fn chunk(text: &str) -> Chunk {
        Chunk::new(
            text.to_string(),
            ChunkMetadata {
                source: "doc.txt".to_string(),
                doc_type: "text".to_string(),
                owner_id: "u1".to_string(),
                created_at: "2026-01-01T00:00:00Z".to_string(),
                chunk_index: 0,
            },
        )
    }

    /// Scripted behavior for one model name.
    #[derive(Clone)]
    enum Script {
        /// Stream the given fragments, then finish.
        Fragments(Vec<&'static str>),
        /// Fail before the first fragment.
        FailSetup,
        /// Stream the given fragments, then fail mid-stream.
        FailAfter(Vec<&'static str>),
    }

    struct StubBackend {
        scripts: Vec<(&'static str, Script)>,
        calls: Mutex<Vec<String>>,
    }

    impl StubBackend {
        fn new(scripts: Vec<(&'static str, Script)>) -> Arc<Self> {
            Arc::new(Self {
                scripts,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn script_for(&self, model: &str) -> Script {
            self.calls.lock().unwrap().push(model.to_string());
            self.scripts
                .iter()
                .find(|(m, _)| *m == model)
                .map(|(_, s)| s.clone())
                .unwrap_or(Script::FailSetup)
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatBackend for StubBackend {
        async fn complete(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
            match self.script_for(model) {
                Script::Fragments(parts) => Ok(format!("{}|{}", parts.concat(), prompt.len())),
                _ => Err(GenerationError::ServerError("scripted failure".to_string())),
            }
        }

        async fn stream(
            &self,
            model: &str,
            _prompt: &str,
        ) -> Result<FragmentStream, GenerationError> {
            match self.script_for(model) {
                Script::Fragments(parts) => {
                    let items: Vec<Result<String, GenerationError>> =
                        parts.into_iter().map(|p| Ok(p.to_string())).collect();
                    Ok(Box::pin(futures_util::stream::iter(items)))
                }
                Script::FailSetup => Err(GenerationError::ConnectionError(
                    "scripted setup failure".to_string(),
                )),
                Script::FailAfter(parts) => {
                    let mut items: Vec<Result<String, GenerationError>> =
                        parts.into_iter().map(|p| Ok(p.to_string())).collect();
                    items.push(Err(GenerationError::StreamError(
                        "scripted mid-stream failure".to_string(),
                    )));
                    Ok(Box::pin(futures_util::stream::iter(items)))
                }
            }
        }
    }

    fn generator(backend: Arc<StubBackend>) -> AnswerGenerator {
        AnswerGenerator::new(
            backend,
            &ChatConfig {
                model: "primary".to_string(),
                fallback_model: "fallback".to_string(),
                ..Default::default()
            },
        )
    }

    async fn collect(mut stream: AnswerStream) -> Vec<Result<String, GenerationError>> {
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item);
        }
        items
    }

    #[test]
    fn test_prompt_numbers_context_blocks() {
        let chunks = vec![chunk("first excerpt"), chunk("second excerpt")];
        let prompt = AnswerGenerator::build_prompt("what is this?", &chunks);
        assert!(prompt.contains("[1] first excerpt"));
        assert!(prompt.contains("[2] second excerpt"));
        assert!(prompt.contains("User question: what is this?"));
    }

    #[tokio::test]
    async fn test_stream_happy_path() {
        let backend = StubBackend::new(vec![("primary", Script::Fragments(vec!["Hel", "lo"]))]);
        let stream = generator(backend.clone()).generate_stream("q", &[chunk("ctx")]);

        let items = collect(stream).await;
        let fragments: Vec<String> = items.into_iter().map(|i| i.unwrap()).collect();
        assert_eq!(fragments, vec!["Hel", "lo"]);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_setup_failure_falls_back() {
        let backend = StubBackend::new(vec![
            ("primary", Script::FailSetup),
            ("fallback", Script::Fragments(vec!["recovered"])),
        ]);
        let stream = generator(backend.clone()).generate_stream("q", &[chunk("ctx")]);

        let items = collect(stream).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap(), "recovered");
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_midstream_failure_keeps_primary_prefix() {
        let backend = StubBackend::new(vec![
            ("primary", Script::FailAfter(vec!["partial "])),
            ("fallback", Script::Fragments(vec!["full answer"])),
        ]);
        let stream = generator(backend).generate_stream("q", &[chunk("ctx")]);

        let items = collect(stream).await;
        let fragments: Vec<String> = items.into_iter().map(|i| i.unwrap()).collect();
        // Primary prefix stands, fallback continues; no retraction, no error.
        assert_eq!(fragments, vec!["partial ", "full answer"]);
    }

    #[tokio::test]
    async fn test_both_models_failing_yields_single_error() {
        let backend = StubBackend::new(vec![
            ("primary", Script::FailSetup),
            ("fallback", Script::FailSetup),
        ]);
        let stream = generator(backend.clone()).generate_stream("q", &[chunk("ctx")]);

        let items = collect(stream).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
        // Exactly one fallback attempt, never a second.
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_no_fallback_when_primary_is_fallback_model() {
        let backend = StubBackend::new(vec![("fallback", Script::FailSetup)]);
        let generator = AnswerGenerator::new(
            backend.clone(),
            &ChatConfig {
                model: "fallback".to_string(),
                fallback_model: "fallback".to_string(),
                ..Default::default()
            },
        );
        let stream = generator.generate_stream("q", &[chunk("ctx")]);

        let items = collect(stream).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_dropping_consumer_stops_producer() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        /// Never-ending upstream that counts how many fragments were pulled.
        struct EndlessBackend {
            pulled: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl ChatBackend for EndlessBackend {
            async fn complete(
                &self,
                _model: &str,
                _prompt: &str,
            ) -> Result<String, GenerationError> {
                Err(GenerationError::ServerError("not used".to_string()))
            }

            async fn stream(
                &self,
                _model: &str,
                _prompt: &str,
            ) -> Result<FragmentStream, GenerationError> {
                let pulled = Arc::clone(&self.pulled);
                Ok(Box::pin(futures_util::stream::unfold(pulled, |count| async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Some((Ok::<_, GenerationError>("x".to_string()), count))
                })))
            }
        }

        let pulled = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(EndlessBackend {
            pulled: Arc::clone(&pulled),
        });
        let generator = AnswerGenerator::new(
            backend,
            &ChatConfig {
                model: "primary".to_string(),
                fallback_model: "fallback".to_string(),
                ..Default::default()
            },
        );

        let mut stream = generator.generate_stream("q", &[chunk("ctx")]);
        assert!(stream.next().await.is_some());
        drop(stream);

        // The producer notices the closed channel on its next send and stops.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let settled = pulled.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pulled.load(Ordering::SeqCst), settled);

        // Run-ahead is bounded by the channel, never the upstream length.
        assert!(settled <= STREAM_BUFFER + 4, "producer kept pulling: {settled}");
    }

    #[tokio::test]
    async fn test_generate_uses_resolved_model() {
        let backend = StubBackend::new(vec![("primary", Script::Fragments(vec!["done"]))]);
        let answer = generator(backend)
            .generate("q", &[chunk("ctx")])
            .await
            .unwrap();
        assert!(answer.starts_with("done|"));
    }
}
