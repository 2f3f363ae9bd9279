//! Service order submission pipeline.
//!
//! Upload evidence, build the report, store the report, then persist the
//! record. The record is written once, after every earlier stage resolved.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{Local, Utc};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::db::ServiceOrderRepository;
use crate::error::{AppError, AppResult};
use crate::models::{ServiceOrderRecord, ServiceOrderRequest};
use crate::services::report::{ReportContent, ReportDocumentBuilder};
use crate::services::storage::{ObjectStore, report_object_name};
use crate::services::uploader::{EvidenceUploader, UploadBatch};

/// Result of a successful submission.
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub record: ServiceOrderRecord,
    pub report_filename: String,
    pub report_bytes: Vec<u8>,
    pub photos_received: usize,
    pub uploads: UploadBatch,
}

/// Buckets the pipeline writes to.
#[derive(Debug, Clone)]
pub struct Buckets {
    pub evidence: String,
    pub reports: String,
}

/// Orchestrates one submission end to end.
#[derive(Clone)]
pub struct SubmissionService {
    store: Arc<dyn ObjectStore>,
    repository: Arc<dyn ServiceOrderRepository>,
    uploader: EvidenceUploader,
    builder: ReportDocumentBuilder,
    buckets: Buckets,
}

impl SubmissionService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        repository: Arc<dyn ServiceOrderRepository>,
        uploader: EvidenceUploader,
        builder: ReportDocumentBuilder,
        buckets: Buckets,
    ) -> Self {
        Self {
            store,
            repository,
            uploader,
            builder,
            buckets,
        }
    }

    /// Wire the pipeline from configuration.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn ObjectStore>,
        repository: Arc<dyn ServiceOrderRepository>,
    ) -> Self {
        let uploader = EvidenceUploader::new(
            Arc::clone(&store),
            config.submission.upload_concurrency,
            config.submission.upload_timeout,
        );
        let builder = ReportDocumentBuilder::new(config.submission.staging_dir.clone());
        let buckets = Buckets {
            evidence: config.storage.evidence_bucket.clone(),
            reports: config.storage.reports_bucket.clone(),
        };
        Self::new(store, repository, uploader, builder, buckets)
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn repository(&self) -> &Arc<dyn ServiceOrderRepository> {
        &self.repository
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    /// Run the full pipeline for one validated request.
    pub async fn submit(
        &self,
        request: ServiceOrderRequest,
        cancel: &CancellationToken,
    ) -> AppResult<SubmissionOutcome> {
        let order_id = request.order_id.clone();
        let photos_received = request.photos.len();
        let created_at = Utc::now();

        info!(
            "Submission started: order_id={}, photos={}",
            order_id, photos_received
        );

        // 1. Evidence (best effort)
        let uploads = self
            .uploader
            .upload_all(
                &request.photos,
                &request.evidence_prefix(),
                &self.buckets.evidence,
                cancel,
            )
            .await;

        if cancel.is_cancelled() {
            return Err(AppError::ServiceUnavailable(
                "Submission cancelled before completion".to_string(),
            ));
        }

        // 2. Report, from every submitted photo regardless of upload outcome
        let issued_at = created_at.with_timezone(&Local).naive_local();
        let content = ReportContent::from_request(&request, issued_at);
        let images: Vec<Bytes> = request.photos.iter().map(|p| p.bytes.clone()).collect();
        let builder = self.builder.clone();
        let rendered = tokio::task::spawn_blocking(move || builder.build(&content, &images))
            .await
            .map_err(|e| AppError::Document(format!("Report task failed: {}", e)))??;

        // 3. Report storage
        let report_filename = report_object_name(&order_id);
        let report_bytes = rendered.bytes;
        self.store
            .put(
                &self.buckets.reports,
                &report_filename,
                Bytes::from(report_bytes.clone()),
                "application/pdf",
            )
            .await
            .map_err(|e| match e {
                AppError::Storage(_) => e,
                other => AppError::Storage(format!("Failed to store report: {}", other)),
            })?;
        let report_url = self.store.public_url(&self.buckets.reports, &report_filename);

        info!(
            "Report stored: order_id={}, file={}, pages={}",
            order_id, report_filename, rendered.page_count
        );

        // 4. Single insert
        let record = ServiceOrderRecord {
            id: Uuid::now_v7(),
            order_id: request.order_id,
            technician: request.technician,
            advisor: request.advisor,
            vehicle_model: request.vehicle_model,
            vehicle_year: request.vehicle_year,
            failures: request.failures,
            comments: request.comments,
            evidence_urls: uploads.urls.clone(),
            report_url,
            status: request.status,
            created_at,
        };
        let record = self.repository.insert_service_order(record).await?;

        info!(
            "Submission completed: order_id={}, id={}, photos_uploaded={}, photos_failed={}",
            order_id,
            record.id,
            uploads.uploaded(),
            uploads.failed()
        );

        Ok(SubmissionOutcome {
            record,
            report_filename,
            report_bytes,
            photos_received,
            uploads,
        })
    }
}
