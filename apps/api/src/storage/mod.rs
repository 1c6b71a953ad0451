//! Resume storage and text extraction.
//!
//! Uploaded resumes live under a fixed `resumes` namespace, either on the
//! local filesystem or in an S3-compatible bucket. Both backends hand out an
//! opaque location string that later feeds `load` and `delete`.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub mod extract;
pub mod local;
pub mod s3;

pub use extract::{ExtractionError, PdfTextExtractor, TextExtractor};
pub use local::LocalResumeStore;
pub use s3::S3ResumeStore;

/// Logical namespace every resume is written under.
pub const RESUME_NAMESPACE: &str = "resumes";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create resume directory {path}: {source}")]
    CreateNamespace {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write {location}: {source}")]
    Write {
        location: String,
        source: std::io::Error,
    },

    #[error("failed to read {location}: {source}")]
    Read {
        location: String,
        source: std::io::Error,
    },

    #[error("failed to delete {location}: {source}")]
    Delete {
        location: String,
        source: std::io::Error,
    },

    #[error("location '{0}' is outside the resume namespace")]
    InvalidLocation(String),

    #[error("S3 error: {0}")]
    S3(String),
}

/// Durable store for uploaded resume documents.
///
/// Carried in `AppState` as `Arc<dyn ResumeStore>`.
#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// Writes `content` under a freshly generated name and returns its location.
    async fn store(&self, content: &[u8]) -> Result<String, StorageError>;

    async fn load(&self, location: &str) -> Result<Vec<u8>, StorageError>;

    /// Removes a stored resume. Deleting a location that no longer exists succeeds.
    async fn delete(&self, location: &str) -> Result<(), StorageError>;
}

/// Collision-resistant file name for a new upload.
pub(crate) fn new_resume_name() -> String {
    format!("{}.pdf", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_resume_names_are_unique_pdfs() {
        let a = new_resume_name();
        let b = new_resume_name();
        assert_ne!(a, b);
        assert!(a.ends_with(".pdf"));
        assert!(Uuid::parse_str(a.trim_end_matches(".pdf")).is_ok());
    }
}
