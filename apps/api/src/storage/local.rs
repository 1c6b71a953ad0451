use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{new_resume_name, ResumeStore, StorageError, RESUME_NAMESPACE};

/// Filesystem-backed resume store: `<upload_dir>/resumes/<uuid>.pdf`.
pub struct LocalResumeStore {
    namespace: PathBuf,
}

impl LocalResumeStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            namespace: upload_dir.into().join(RESUME_NAMESPACE),
        }
    }

    /// Maps a location back to a path, refusing anything not directly inside the namespace.
    fn resolve(&self, location: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(location);
        if path.parent() != Some(self.namespace.as_path()) || path.file_name().is_none() {
            return Err(StorageError::InvalidLocation(location.to_string()));
        }
        Ok(path.to_path_buf())
    }
}

#[async_trait]
impl ResumeStore for LocalResumeStore {
    async fn store(&self, content: &[u8]) -> Result<String, StorageError> {
        tokio::fs::create_dir_all(&self.namespace)
            .await
            .map_err(|source| StorageError::CreateNamespace {
                path: self.namespace.display().to_string(),
                source,
            })?;

        let path = self.namespace.join(new_resume_name());
        let location = path.to_string_lossy().into_owned();

        tokio::fs::write(&path, content)
            .await
            .map_err(|source| StorageError::Write {
                location: location.clone(),
                source,
            })?;

        debug!(%location, bytes = content.len(), "Stored resume");
        Ok(location)
    }

    async fn load(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(location)?;
        tokio::fs::read(&path)
            .await
            .map_err(|source| StorageError::Read {
                location: location.to_string(),
                source,
            })
    }

    async fn delete(&self, location: &str) -> Result<(), StorageError> {
        let path = self.resolve(location)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Delete {
                location: location.to_string(),
                source,
            }),
        }
    }
}
