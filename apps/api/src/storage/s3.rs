use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, info};

use super::{new_resume_name, ResumeStore, StorageError, RESUME_NAMESPACE};

/// S3 / MinIO-backed resume store. Locations are object keys `resumes/<uuid>.pdf`.
pub struct S3ResumeStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ResumeStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Constructs an S3 client configured for MinIO (local) or AWS (production).
    pub async fn connect(
        bucket: &str,
        endpoint: &str,
        access_key_id: &str,
        secret_access_key: &str,
    ) -> Self {
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "jobboard-static",
        );

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .load()
            .await;

        info!("S3 resume store initialized (bucket: {bucket})");
        Self::new(aws_sdk_s3::Client::new(&s3_config), bucket)
    }
}

/// Accepts only keys directly under the resume namespace.
fn validate_key(location: &str) -> Result<&str, StorageError> {
    match location.strip_prefix(RESUME_NAMESPACE) {
        Some(rest)
            if rest.starts_with('/')
                && rest.len() > 1
                && !rest[1..].contains('/')
                && !rest.contains("..") =>
        {
            Ok(location)
        }
        _ => Err(StorageError::InvalidLocation(location.to_string())),
    }
}

#[async_trait]
impl ResumeStore for S3ResumeStore {
    async fn store(&self, content: &[u8]) -> Result<String, StorageError> {
        let key = format!("{RESUME_NAMESPACE}/{}", new_resume_name());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(content.to_vec()))
            .content_type("application/pdf")
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("upload of {key} failed: {e}")))?;

        debug!("Uploaded resume to s3://{}/{}", self.bucket, key);
        Ok(key)
    }

    async fn load(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        let key = validate_key(location)?;

        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("download of {key} failed: {e}")))?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(format!("reading {key} failed: {e}")))?;

        Ok(data.into_bytes().to_vec())
    }

    async fn delete(&self, location: &str) -> Result<(), StorageError> {
        let key = validate_key(location)?;

        // DeleteObject succeeds for keys that do not exist.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("delete of {key} failed: {e}")))?;

        Ok(())
    }
}
