//! Document text extraction.
//!
//! Turns raw uploaded bytes into plain text. PDF parsing is CPU-bound and
//! runs on the blocking pool; plain text files pass through unchanged.
//! Extraction failures are permanent for the given bytes.

use tracing::debug;

use crate::error::ExtractionError;
use crate::utils::has_usable_text;

/// Extracts plain text from uploaded document bytes.
#[derive(Debug, Clone, Default)]
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Document kind for a filename, used as chunk provenance.
    pub fn doc_type(filename: &str) -> Option<&'static str> {
        match extension(filename).as_deref() {
            Some("pdf") => Some("pdf"),
            Some("txt") | Some("md") => Some("text"),
            _ => None,
        }
    }

    /// Extract text from `bytes`, dispatching on the filename extension.
    ///
    /// Fails when the extension is unsupported, the document cannot be
    /// parsed, or parsing yields nothing but whitespace.
    pub async fn extract(&self, bytes: Vec<u8>, filename: &str) -> Result<String, ExtractionError> {
        let text = match Self::doc_type(filename) {
            Some("pdf") => extract_pdf(bytes).await?,
            Some("text") => String::from_utf8_lossy(&bytes).into_owned(),
            _ => {
                return Err(ExtractionError::UnsupportedType(filename.to_string()));
            }
        };

        if !has_usable_text(&text) {
            return Err(ExtractionError::EmptyDocument);
        }

        debug!(filename, chars = text.len(), "extracted document text");
        Ok(text)
    }
}

async fn extract_pdf(bytes: Vec<u8>) -> Result<String, ExtractionError> {
    tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| ExtractionError::ParseError(e.to_string()))
    })
    .await
    .map_err(|e| ExtractionError::ParseError(format!("extraction task failed: {e}")))?
}

fn extension(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
