//! Error types for the document chat core.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors raised while extracting text from an uploaded document.
///
/// Extraction failures are permanent for the given bytes; there is no retry.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported document type: {0}")]
    UnsupportedType(String),

    #[error("failed to parse document: {0}")]
    ParseError(String),

    #[error("document contains no extractable text")]
    EmptyDocument,
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding provider: {0}")]
    ConnectionError(String),

    #[error("embedding provider error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            EmbeddingError::ServerError(msg) => {
                msg.contains("503")
                    || msg.contains("502")
                    || msg.contains("504")
                    || msg.contains("429")
                    || msg.to_lowercase().contains("unavailable")
                    || msg.to_lowercase().contains("too many requests")
            }
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to vector index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to connect to vector index: {0}")]
    ConnectionError(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("insert error: {0}")]
    InsertError(String),

    #[error("query error: {0}")]
    QueryError(String),

    #[error("delete error: {0}")]
    DeleteError(String),
}

impl Retryable for IndexError {
    fn is_retryable(&self) -> bool {
        match self {
            IndexError::ConnectionError(_) => true,
            IndexError::CollectionError(msg)
            | IndexError::InsertError(msg)
            | IndexError::QueryError(msg)
            | IndexError::DeleteError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("unavailable")
                    || msg_lower.contains("too many")
            }
        }
    }
}

/// Errors related to answer generation.
///
/// A streamed answer surfaces this only after the one-shot fallback attempt
/// against the secondary model has also failed.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to connect to chat provider: {0}")]
    ConnectionError(String),

    #[error("chat provider error: {0}")]
    ServerError(String),

    #[error("chat request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid completion response: {0}")]
    InvalidResponse(String),

    #[error("stream interrupted: {0}")]
    StreamError(String),

    #[error("generation timeout")]
    Timeout,
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),
}

/// Errors raised by the ingestion path.
///
/// Ingestion is all-or-nothing at the batch boundary: the first failing file
/// fails the whole call and its reason becomes the batch's failure reason.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file read error: {0}")]
    FileReadError(String),

    #[error("extraction failed for {filename}: {source}")]
    ExtractionError {
        filename: String,
        source: ExtractionError,
    },

    #[error("embedding error: {0}")]
    EmbeddingError(#[from] EmbeddingError),

    #[error("vector index error: {0}")]
    IndexError(#[from] IndexError),

    #[error("no files provided")]
    NoFiles,
}

/// Errors raised by the question-answering path.
#[derive(Debug, Error)]
pub enum AskError {
    #[error("embedding error: {0}")]
    EmbeddingError(#[from] EmbeddingError),

    #[error("vector index error: {0}")]
    IndexError(#[from] IndexError),

    #[error("generation error: {0}")]
    GenerationError(#[from] GenerationError),

    #[error("invalid question: {0}")]
    InvalidQuestion(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("ask error: {0}")]
    Ask(#[from] AskError),

    #[error("vector index error: {0}")]
    Index(#[from] IndexError),

    #[error("{0}")]
    Other(String),
}
