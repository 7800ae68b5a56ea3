//! Raw document fetcher backed by S3-compatible object storage.
//!
//! The object key is the document id. Not used by the answer pipeline; it
//! backs the raw document endpoint.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use thiserror::Error;

use crate::config::ObjectStorageConfig;

#[derive(Error, Debug)]
pub enum BlobStoreError {
    #[error("Object storage credentials not configured")]
    NotConfigured,

    #[error("Object {0} not found")]
    NotFound(String),

    #[error("S3 error: {0}")]
    Sdk(String),

    #[error("Failed to read object body: {0}")]
    Body(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn fetch_raw(&self, document_id: &str) -> Result<Vec<u8>, BlobStoreError>;
}

#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Returns `None` when the access key pair is missing.
    pub async fn from_config(config: &ObjectStorageConfig) -> Option<Self> {
        let (access_key_id, secret_access_key) =
            match (&config.access_key_id, &config.secret_access_key) {
                (Some(id), Some(secret)) if config.has_credentials() => (id, secret),
                _ => return None,
            };

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "context-engine",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let shared = loader.load().await;
        // Custom endpoints (MinIO, R2, localstack) generally need path-style addressing.
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.endpoint_url.is_some())
            .build();

        Some(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn fetch_raw(&self, document_id: &str) -> Result<Vec<u8>, BlobStoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(document_id)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    BlobStoreError::NotFound(document_id.to_string())
                } else {
                    tracing::error!(
                        bucket = %self.bucket,
                        key = document_id,
                        error = %DisplayErrorContext(&service_error),
                        "S3 get_object failed"
                    );
                    BlobStoreError::Sdk(DisplayErrorContext(&service_error).to_string())
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| BlobStoreError::Body(e.to_string()))?
            .into_bytes();

        tracing::debug!(bucket = %self.bucket, key = document_id, size = bytes.len(), "Fetched raw document");
        Ok(bytes.to_vec())
    }
}
