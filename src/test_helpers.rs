//! In-memory store and repository for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::db::ServiceOrderRepository;
use crate::error::{AppError, AppResult};
use crate::models::ServiceOrderRecord;
use crate::services::storage::{ObjectStore, public_object_url};

type FailurePredicate = Arc<dyn Fn(&str, &Bytes) -> bool + Send + Sync>;

/// Object store that keeps everything in a map.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), (Bytes, String)>>,
    fail_when: Mutex<Option<FailurePredicate>>,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `put` for which the predicate (bucket, data) holds.
    pub fn fail_when(self, predicate: impl Fn(&str, &Bytes) -> bool + Send + Sync + 'static) -> Self {
        *self.fail_when.lock().unwrap() = Some(Arc::new(predicate));
        self
    }

    /// Sleep inside every `put`.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(data, _)| data.clone())
    }

    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(_, ct)| ct.clone())
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

    /// Highest number of concurrent `put` calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, bucket: &str, key: &str, data: Bytes, content_type: &str) -> AppResult<()> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let predicate = self.fail_when.lock().unwrap().clone();
        if predicate.is_some_and(|fail| fail(bucket, &data)) {
            return Err(AppError::Storage(format!("simulated failure for '{}'", key)));
        }

        self.objects.lock().unwrap().insert(
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
        public_object_url("http://storage.test", bucket, key)
    }
}

/// Repository that keeps records in a map.
#[derive(Default)]
pub struct MemoryRepository {
    records: Mutex<HashMap<Uuid, ServiceOrderRecord>>,
    fail_inserts: AtomicBool,
    insert_calls: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let repo = Self::default();
        repo.fail_inserts.store(true, Ordering::SeqCst);
        repo
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<ServiceOrderRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl ServiceOrderRepository for MemoryRepository {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn insert_service_order(
        &self,
        record: ServiceOrderRecord,
    ) -> AppResult<ServiceOrderRecord> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Database("simulated insert failure".to_string()));
        }
        self.records
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_service_order(&self, id: Uuid) -> AppResult<Option<ServiceOrderRecord>> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }
}

/// Encode a small solid-colour PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Encode a small solid-colour JPEG.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([20, 90, 200]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Jpeg).unwrap();
    out.into_inner()
}
