//! Wire-facing response and event payloads.
//!
//! The JSON shapes here are part of the core contract: existing clients parse
//! fragment events as `{"content": ...}`, the terminal event as
//! `{"sources": [...], "done": true}`, and error events as `{"error": ...}`.

use serde::{Deserialize, Serialize};

use super::document::Chunk;
use crate::utils::excerpt;

/// A source citation attached to an answer.
///
/// The excerpt is the first 200 characters of the retrieved chunk plus an
/// ellipsis marker. Serialized under the `content` key for compatibility
/// with the original client wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(rename = "content")]
    pub excerpt: String,
    pub source: String,
}

impl SourceRef {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            excerpt: excerpt(&chunk.text, 200),
            source: chunk.metadata.source.clone(),
        }
    }
}

/// Result of one ingestion batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    #[serde(rename = "chunkCount")]
    pub chunk_count: usize,
    pub files: Vec<String>,
}

/// Non-streaming answer with citations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Result of an owner-scoped purge. Always succeeds, including when there
/// was nothing to delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub success: bool,
}

impl PurgeResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// One event of a streamed answer.
///
/// A stream is zero or more `Fragment`s followed by exactly one `Sources`
/// event, or a single terminal `Error` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatEvent {
    Fragment { content: String },
    Sources { sources: Vec<SourceRef>, done: bool },
    Error { error: String },
}

impl ChatEvent {
    pub fn fragment(content: impl Into<String>) -> Self {
        ChatEvent::Fragment {
            content: content.into(),
        }
    }

    pub fn sources(sources: Vec<SourceRef>) -> Self {
        ChatEvent::Sources {
            sources,
            done: true,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ChatEvent::Error {
            error: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::ChunkMetadata;

    #[test]
    fn test_fragment_wire_shape() {
        let json = serde_json::to_string(&ChatEvent::fragment("hel")).unwrap();
        assert_eq!(json, r#"{"content":"hel"}"#);
    }

    #[test]
    fn test_terminal_wire_shape() {
        let event = ChatEvent::sources(vec![SourceRef {
            excerpt: "abc...".to_string(),
            source: "a.pdf".to_string(),
        }]);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"sources":[{"content":"abc...","source":"a.pdf"}],"done":true}"#
        );
    }

    #[test]
    fn test_error_wire_shape() {
        let json = serde_json::to_string(&ChatEvent::error("boom")).unwrap();
        assert_eq!(json, r#"{"error":"boom"}"#);
    }

    #[test]
    fn test_source_ref_excerpt_bounded() {
        let chunk = Chunk::new(
            "x".repeat(500),
            ChunkMetadata {
                source: "big.pdf".to_string(),
                doc_type: "pdf".to_string(),
                owner_id: "u1".to_string(),
                created_at: "2026-01-01T00:00:00Z".to_string(),
                chunk_index: 0,
            },
        );
        let source = SourceRef::from_chunk(&chunk);
        assert_eq!(source.excerpt.chars().count(), 203);
        assert!(source.excerpt.ends_with("..."));
        assert_eq!(source.source, "big.pdf");
    }

    #[test]
    fn test_source_ref_short_chunk_keeps_marker() {
        let chunk = Chunk::new(
            "short note".to_string(),
            ChunkMetadata {
                source: "note.txt".to_string(),
                doc_type: "text".to_string(),
                owner_id: "u1".to_string(),
                created_at: "2026-01-01T00:00:00Z".to_string(),
                chunk_index: 0,
            },
        );
        let source = SourceRef::from_chunk(&chunk);
        assert_eq!(source.excerpt, "short note...");
    }

    #[test]
    fn test_ingest_response_key_casing() {
        let resp = IngestResponse {
            chunk_count: 7,
            files: vec!["a.pdf".to_string()],
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""chunkCount":7"#));
    }
}
