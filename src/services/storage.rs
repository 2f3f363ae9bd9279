//! S3 object storage for evidence photos and PDF reports.
//!
//! Supports both AWS S3 and MinIO for development.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::config::StorageSettings;
use crate::error::{AppError, AppResult};

/// Object storage seam used by the uploader and the submission pipeline.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object under `key` in `bucket`.
    async fn put(&self, bucket: &str, key: &str, data: Bytes, content_type: &str)
    -> AppResult<()>;

    /// Fetch an object and its stored content type.
    async fn get(&self, bucket: &str, key: &str) -> AppResult<(Vec<u8>, Option<String>)>;

    /// Ensure the bucket exists, creating it if necessary.
    async fn ensure_bucket(&self, bucket: &str) -> AppResult<()>;

    /// Publicly resolvable URL of an object.
    fn public_url(&self, bucket: &str, key: &str) -> String;

    /// Recover the object key from a URL produced by [`ObjectStore::public_url`].
    fn key_from_public_url(&self, bucket: &str, url: &str) -> Option<String> {
        let prefix = self.public_url(bucket, "");
        url.strip_prefix(&prefix)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

/// S3 storage client wrapper.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    public_base_url: String,
}

impl S3Storage {
    /// Create a new S3 storage client from configuration.
    pub fn new(config: &StorageSettings) -> Self {
        let credentials =
            Credentials::new(&config.access_key, &config.secret_key, None, None, "workshop");

        let region = Region::new(config.region.clone());

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(region)
            .credentials_provider(credentials)
            .force_path_style(true); // Required for MinIO

        // Use custom endpoint for MinIO in development
        if let Some(ref endpoint) = config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!(
            "S3 storage initialized: public_base_url={}",
            config.public_base_url
        );

        Self {
            client,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> AppResult<()> {
        let body = aws_sdk_s3::primitives::ByteStream::from(data);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                AppError::Storage(format!(
                    "Failed to upload '{}' to bucket '{}': {}",
                    key,
                    bucket,
                    e.into_service_error()
                ))
            })?;

        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> AppResult<(Vec<u8>, Option<String>)> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    AppError::NotFound(format!("Object '{}'", key))
                } else {
                    AppError::Storage(format!("Failed to get object from S3: {}", service_error))
                }
            })?;

        let content_type = response.content_type().map(String::from);
        let data = response
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read S3 response body: {}", e)))?
            .into_bytes()
            .to_vec();

        Ok((data, content_type))
    }

    async fn ensure_bucket(&self, bucket: &str) -> AppResult<()> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                info!("S3 bucket '{}' exists", bucket);
                Ok(())
            }
            Err(e) => {
                // Check if it's a "not found" error
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    info!("Creating S3 bucket '{}'", bucket);
                    self.client
                        .create_bucket()
                        .bucket(bucket)
                        .send()
                        .await
                        .map_err(|e| {
                            AppError::Storage(format!("Failed to create bucket: {}", e))
                        })?;
                    info!("S3 bucket '{}' created", bucket);
                    Ok(())
                } else {
                    Err(AppError::Storage(format!(
                        "Failed to access bucket '{}': {}",
                        bucket, service_error
                    )))
                }
            }
        }
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        public_object_url(&self.public_base_url, bucket, key)
    }
}

/// Build the public URL of an object: `{base}/{bucket}/{key}`.
pub fn public_object_url(base: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), bucket, key)
}

/// Get the content type for a file based on its extension.
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Object name for an evidence photo: `{prefix}_{8 hex}.{ext}`.
///
/// The suffix comes from a fresh UUID so concurrent uploads never collide.
pub fn evidence_object_name(prefix: &str, extension: &str) -> String {
    format!("{}_{}.{}", prefix, short_suffix(8), extension)
}

/// Object name for a PDF report: `Reporte_{order}_{4 hex}.pdf`.
pub fn report_object_name(order_id: &str) -> String {
    format!(
        "Reporte_{}_{}.pdf",
        crate::models::service_order::sanitize_object_prefix(order_id),
        short_suffix(4)
    )
}

fn short_suffix(len: usize) -> String {
    Uuid::new_v4().simple().to_string()[..len].to_string()
}
