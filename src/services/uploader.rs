//! Parallel upload of evidence photos.
//!
//! Each photo is stored by its own task; a photo that fails is logged and left
//! out of the result without affecting its siblings.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::models::EvidenceImage;
use crate::services::storage::{ObjectStore, evidence_object_name};

/// Why a single photo was not stored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadFailureKind {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("task panicked: {0}")]
    Panicked(String),
}

/// A photo that did not make it to storage.
#[derive(Debug, Clone)]
pub struct UploadFailure {
    /// Position of the photo in the submitted list.
    pub index: usize,
    pub filename: String,
    pub kind: UploadFailureKind,
}

/// Aggregated outcome of one upload batch.
#[derive(Debug, Default)]
pub struct UploadBatch {
    /// Public URLs of stored photos, in completion order.
    pub urls: Vec<String>,
    pub failures: Vec<UploadFailure>,
}

impl UploadBatch {
    pub fn uploaded(&self) -> usize {
        self.urls.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

type TaskOutcome = (usize, Result<String, UploadFailureKind>);

/// Uploads a batch of photos concurrently with a bounded number of in-flight
/// requests.
#[derive(Clone)]
pub struct EvidenceUploader {
    store: Arc<dyn ObjectStore>,
    concurrency: usize,
    timeout: Duration,
}

impl EvidenceUploader {
    pub fn new(store: Arc<dyn ObjectStore>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    /// Store every photo under `{prefix}_{suffix}.{ext}` in `bucket`.
    ///
    /// Never fails as a whole: the returned batch lists stored URLs and the
    /// photos that could not be stored. Cancelling `cancel` stops tasks that
    /// have not finished yet.
    pub async fn upload_all(
        &self,
        photos: &[EvidenceImage],
        prefix: &str,
        bucket: &str,
        cancel: &CancellationToken,
    ) -> UploadBatch {
        let mut batch = UploadBatch::default();
        if photos.is_empty() {
            return batch;
        }

        let permits = self.concurrency.min(photos.len());
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();
        let mut task_index = HashMap::with_capacity(photos.len());

        info!(
            "Uploading evidence: prefix={}, photos={}, concurrency={}",
            prefix,
            photos.len(),
            permits
        );

        for (index, photo) in photos.iter().enumerate() {
            let store = Arc::clone(&self.store);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let timeout = self.timeout;
            let bucket = bucket.to_string();
            let extension = photo.extension();
            let key = evidence_object_name(prefix, &extension);
            let content_type = photo.upload_content_type();
            let data = photo.bytes.clone();

            let handle = tasks.spawn(async move {
                let work = async {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return Err(UploadFailureKind::Cancelled),
                    };

                    match tokio::time::timeout(timeout, store.put(&bucket, &key, data, &content_type))
                        .await
                    {
                        Ok(Ok(())) => Ok(store.public_url(&bucket, &key)),
                        Ok(Err(e)) => Err(UploadFailureKind::Storage(e.to_string())),
                        Err(_) => Err(UploadFailureKind::TimedOut(timeout)),
                    }
                };

                let result = tokio::select! {
                    _ = cancel.cancelled() => Err(UploadFailureKind::Cancelled),
                    result = work => result,
                };
                (index, result)
            });
            task_index.insert(handle.id(), index);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (index, result) = match joined {
                Ok((_, outcome)) => outcome,
                Err(e) => match task_index.get(&e.id()) {
                    Some(&index) => (index, Err(UploadFailureKind::Panicked(e.to_string()))),
                    None => {
                        error!("Evidence upload task {} ended unexpectedly: {}", e.id(), e);
                        continue;
                    }
                },
            };

            let filename = &photos[index].filename;
            match result {
                Ok(url) => {
                    debug!("Evidence stored: index={}, url={}", index, url);
                    batch.urls.push(url);
                }
                Err(kind) => {
                    warn!(
                        "Evidence upload failed: prefix={}, index={}, file={}, reason={}",
                        prefix, index, filename, kind
                    );
                    batch.failures.push(UploadFailure {
                        index,
                        filename: filename.clone(),
                        kind,
                    });
                }
            }
        }

        info!(
            "Evidence upload finished: prefix={}, uploaded={}, failed={}",
            prefix,
            batch.uploaded(),
            batch.failed()
        );

        batch
    }
}
