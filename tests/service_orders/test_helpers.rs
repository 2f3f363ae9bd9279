//! Shared helpers: in-memory backends, app factory and multipart bodies.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::{App, dev::ServiceResponse, test, web};
use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;
use workshop_orders_lib::api::{
    UploadLimits, configure_health_routes, configure_service_order_routes,
};
use workshop_orders_lib::db::ServiceOrderRepository;
use workshop_orders_lib::error::{AppError, AppResult};
use workshop_orders_lib::middleware::RequestLogger;
use workshop_orders_lib::models::ServiceOrderRecord;
use workshop_orders_lib::services::storage::public_object_url;
use workshop_orders_lib::services::submission::Buckets;
use workshop_orders_lib::services::{
    EvidenceUploader, ObjectStore, ReportDocumentBuilder, SubmissionService,
};

pub const EVIDENCE_BUCKET: &str = "evidencias-taller";
pub const REPORTS_BUCKET: &str = "reportes-pdf";
pub const STORAGE_BASE_URL: &str = "http://storage.test";

const BOUNDARY: &str = "----workshop-test-boundary";

/// Object store backed by a map. Puts into `reject_bucket` fail.
#[derive(Default)]
pub struct InMemoryStore {
    objects: Mutex<HashMap<(String, String), (Bytes, String)>>,
    reject_bucket: Option<String>,
}

impl InMemoryStore {
    pub fn rejecting(bucket: &str) -> Self {
        Self {
            reject_bucket: Some(bucket.to_string()),
            ..Default::default()
        }
    }

    pub fn keys_in(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Content types stored in a bucket.
    pub fn content_types_in(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((b, _), _)| b == bucket)
            .map(|(_, (_, ct))| ct.clone())
            .collect()
    }

    pub fn remove(&self, bucket: &str, key: &str) {
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn put(&self, bucket: &str, key: &str, data: Bytes, content_type: &str) -> AppResult<()> {
        if self.reject_bucket.as_deref() == Some(bucket) {
            return Err(AppError::Storage(format!("bucket '{}' unavailable", bucket)));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(
                (bucket.to_string(), key.to_string()),
                (data, content_type.to_string()),
            );
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> AppResult<(Vec<u8>, Option<String>)> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(data, ct)| (data.to_vec(), Some(ct.clone())))
            .ok_or_else(|| AppError::NotFound(format!("Object '{}'", key)))
    }

    async fn ensure_bucket(&self, _bucket: &str) -> AppResult<()> {
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        public_object_url(STORAGE_BASE_URL, bucket, key)
    }
}

/// Record repository backed by a map.
#[derive(Default)]
pub struct InMemoryRepository {
    records: Mutex<HashMap<Uuid, ServiceOrderRecord>>,
    offline: AtomicBool,
}

impl InMemoryRepository {
    pub fn offline() -> Self {
        let repo = Self::default();
        repo.offline.store(true, Ordering::SeqCst);
        repo
    }

    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    fn check(&self) -> AppResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::Database("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceOrderRepository for InMemoryRepository {
    async fn ping(&self) -> AppResult<()> {
        self.check()
    }

    async fn insert_service_order(
        &self,
        record: ServiceOrderRecord,
    ) -> AppResult<ServiceOrderRecord> {
        self.check()?;
        self.records
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_service_order(&self, id: Uuid) -> AppResult<Option<ServiceOrderRecord>> {
        self.check()?;
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }
}

pub fn default_limits() -> UploadLimits {
    UploadLimits {
        max_upload_size: 5 * 1024 * 1024,
        max_photos: 6,
    }
}

/// Create a test app with the full `/api/v1` surface.
pub async fn create_test_app(
    store: Arc<InMemoryStore>,
    repository: Arc<InMemoryRepository>,
    limits: UploadLimits,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = ServiceResponse,
    Error = actix_web::Error,
> {
    let store: Arc<dyn ObjectStore> = store;
    let repository: Arc<dyn ServiceOrderRepository> = repository;

    let uploader = EvidenceUploader::new(Arc::clone(&store), 4, Duration::from_secs(5));
    let service = SubmissionService::new(
        store,
        Arc::clone(&repository),
        uploader,
        ReportDocumentBuilder::default(),
        Buckets {
            evidence: EVIDENCE_BUCKET.to_string(),
            reports: REPORTS_BUCKET.to_string(),
        },
    );

    test::init_service(
        App::new()
            .wrap(RequestLogger)
            .app_data(web::Data::new(service))
            .app_data(web::Data::from(repository))
            .app_data(web::Data::new(limits))
            .service(
                web::scope("/api/v1")
                    .configure(configure_health_routes)
                    .configure(configure_service_order_routes),
            ),
    )
    .await
}

/// One part of a multipart body.
pub enum Part {
    Text(&'static str, String),
    File {
        name: &'static str,
        filename: String,
        content_type: &'static str,
        data: Vec<u8>,
    },
}

impl Part {
    pub fn text(name: &'static str, value: &str) -> Self {
        Part::Text(name, value.to_string())
    }

    pub fn photo(filename: &str, content_type: &'static str, data: Vec<u8>) -> Self {
        Part::File {
            name: "photos",
            filename: filename.to_string(),
            content_type,
            data,
        }
    }
}

/// The text fields of a valid submission.
pub fn valid_fields() -> Vec<Part> {
    vec![
        Part::text("order_id", "ot-2024-001"),
        Part::text("technician", "Juan Perez"),
        Part::text("advisor", "Maria"),
        Part::text("vehicle_model", "Hilux"),
        Part::text("vehicle_year", "2022"),
        Part::text("failures", "Ruido en suspension delantera"),
        Part::text("comments", "Cliente reporta golpeteo"),
    ]
}

/// Encode parts as `multipart/form-data`; returns (content type, body).
pub fn multipart_body(parts: &[Part]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: {}\r\n\r\n",
                        name, filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

/// Build a POST request carrying the parts.
pub fn submit_request(uri: &str, parts: &[Part]) -> test::TestRequest {
    let (content_type, body) = multipart_body(parts);
    test::TestRequest::post()
        .uri(uri)
        .insert_header(("content-type", content_type))
        .set_payload(body)
}

/// Encode a small PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([235, 10, 30]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Encode a small JPEG.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([40, 40, 40]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Jpeg).unwrap();
    out.into_inner()
}
