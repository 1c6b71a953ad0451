use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::{ResumeStore, StorageError};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("resume could not be loaded: {0}")]
    Unreadable(#[from] StorageError),

    #[error("PDF parse error: {0}")]
    Pdf(String),

    #[error("document contains no extractable text")]
    NoText,
}

/// Turns a stored resume into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, location: &str) -> Result<String, ExtractionError>;
}

/// Extracts text from PDF resumes held in a `ResumeStore`.
pub struct PdfTextExtractor {
    store: Arc<dyn ResumeStore>,
}

impl PdfTextExtractor {
    pub fn new(store: Arc<dyn ResumeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, location: &str) -> Result<String, ExtractionError> {
        let bytes = self.store.load(location).await?;
        let text = extract_pdf_text(bytes).await?;
        debug!(%location, chars = text.len(), "Extracted resume text");
        Ok(text)
    }
}

/// Runs the (CPU-bound, panic-prone on malformed input) PDF parser on the blocking pool.
async fn extract_pdf_text(bytes: Vec<u8>) -> Result<String, ExtractionError> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| ExtractionError::Pdf(format!("extractor aborted: {e}")))?
        .map_err(|e| ExtractionError::Pdf(e.to_string()))?;

    if text.trim().is_empty() {
        return Err(ExtractionError::NoText);
    }
    Ok(text)
}
