//! Service order API handlers.

use actix_multipart::{Field, Multipart};
use actix_web::http::header;
use actix_web::{HttpResponse, web};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::config::SubmissionSettings;
use crate::error::{AppError, AppResult};
use crate::models::{
    EvidenceImage, ServiceOrderForm, ServiceOrderRecord, SubmitServiceOrderResponse,
    is_accepted_image_type,
};
use crate::services::SubmissionService;

/// Multipart field carrying evidence photos.
const PHOTOS_FIELD: &str = "photos";

/// Header carrying the record id when the PDF is returned directly.
pub const SERVICE_ORDER_ID_HEADER: &str = "X-Service-Order-Id";

/// Limits applied while reading a submission.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    /// Total bytes across all multipart parts.
    pub max_upload_size: usize,
    pub max_photos: usize,
}

impl From<&SubmissionSettings> for UploadLimits {
    fn from(settings: &SubmissionSettings) -> Self {
        Self {
            max_upload_size: settings.max_upload_size,
            max_photos: settings.max_photos,
        }
    }
}

/// Query parameters for submitting a service order.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SubmitQuery {
    /// Return the generated PDF instead of the JSON summary.
    #[serde(default)]
    pub download: bool,
}

/// Submit a service order.
///
/// Uploads the evidence photos, generates the PDF report, stores it and
/// records the order. Photos that cannot be stored are left out of the record
/// but still appear in the report.
#[utoipa::path(
    post,
    path = "/api/v1/service-orders",
    tag = "Service Orders",
    params(SubmitQuery),
    request_body(
        content = crate::models::ServiceOrderMultipart,
        content_type = "multipart/form-data"
    ),
    responses(
        (status = 201, description = "Service order recorded", body = SubmitServiceOrderResponse),
        (status = 400, description = "Invalid form data", body = crate::error::ErrorResponse),
        (status = 413, description = "Submission too large", body = crate::error::ErrorResponse),
        (status = 500, description = "Report or database failure", body = crate::error::ErrorResponse),
        (status = 502, description = "Report could not be stored", body = crate::error::ErrorResponse),
    )
)]
pub async fn submit_service_order(
    service: web::Data<SubmissionService>,
    limits: web::Data<UploadLimits>,
    query: web::Query<SubmitQuery>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let form = read_form(payload, &limits).await?;
    let request = form.validate()?;

    // A client that goes away drops this future and cancels pending uploads
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let outcome = service.submit(request, &cancel).await?;

    if query.download {
        return Ok(HttpResponse::Created()
            .content_type("application/pdf")
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", outcome.report_filename),
            ))
            .insert_header((SERVICE_ORDER_ID_HEADER, outcome.record.id.to_string()))
            .body(outcome.report_bytes));
    }

    let photos_failed = outcome.uploads.failed();
    let message = if photos_failed == 0 {
        "Service order recorded".to_string()
    } else {
        format!(
            "Service order recorded; {} photo(s) could not be stored",
            photos_failed
        )
    };

    Ok(HttpResponse::Created().json(SubmitServiceOrderResponse {
        photos_received: outcome.photos_received,
        photos_uploaded: outcome.uploads.uploaded(),
        photos_failed,
        report_filename: outcome.report_filename,
        service_order: outcome.record,
        message,
    }))
}

/// Get a service order by ID.
#[utoipa::path(
    get,
    path = "/api/v1/service-orders/{id}",
    tag = "Service Orders",
    params(
        ("id" = Uuid, Path, description = "Service order UUID")
    ),
    responses(
        (status = 200, description = "Service order", body = ServiceOrderRecord),
        (status = 404, description = "Service order not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_service_order(
    service: web::Data<SubmissionService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let record = find_record(&service, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Download the PDF report of a service order.
#[utoipa::path(
    get,
    path = "/api/v1/service-orders/{id}/report",
    tag = "Service Orders",
    params(
        ("id" = Uuid, Path, description = "Service order UUID")
    ),
    responses(
        (status = 200, description = "PDF report", content_type = "application/pdf"),
        (status = 404, description = "Service order or report not found", body = crate::error::ErrorResponse),
        (status = 502, description = "Storage failure", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_service_order_report(
    service: web::Data<SubmissionService>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let record = find_record(&service, id).await?;

    let bucket = &service.buckets().reports;
    let key = service
        .store()
        .key_from_public_url(bucket, &record.report_url)
        .ok_or_else(|| AppError::NotFound(format!("Report for service order {}", id)))?;

    let (data, _) = service.store().get(bucket, &key).await?;

    debug!("Report served: id={}, file={}, bytes={}", id, key, data.len());

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", key),
        ))
        .body(data))
}

async fn find_record(service: &SubmissionService, id: Uuid) -> AppResult<ServiceOrderRecord> {
    service
        .repository()
        .get_service_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Service order {}", id)))
}

/// Read every multipart part into a raw form, enforcing size and count limits.
async fn read_form(mut payload: Multipart, limits: &UploadLimits) -> AppResult<ServiceOrderForm> {
    let mut form = ServiceOrderForm::default();
    let mut total_bytes = 0usize;

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::InvalidInput(format!("Multipart error: {}", e)))?;

        let name = field.name().unwrap_or_default().to_string();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let content_type = field.content_type().map(|mime| mime.to_string());

        let data = read_field(&mut field, &mut total_bytes, limits.max_upload_size).await?;

        if name == PHOTOS_FIELD {
            let filename = filename.unwrap_or_default();
            // Browsers send an empty part when no file was chosen
            if filename.is_empty() && data.is_empty() {
                continue;
            }

            let content_type = content_type.unwrap_or_default();
            if !is_accepted_image_type(&content_type) {
                return Err(AppError::InvalidInput(format!(
                    "Photo '{}' has unsupported type '{}'; only PNG and JPEG are accepted",
                    filename, content_type
                )));
            }
            if form.photos.len() >= limits.max_photos {
                return Err(AppError::InvalidInput(format!(
                    "At most {} photos can be attached",
                    limits.max_photos
                )));
            }

            form.photos
                .push(EvidenceImage::new(data, filename, content_type));
            continue;
        }

        let value = String::from_utf8(data)
            .map_err(|_| AppError::InvalidInput(format!("Field '{}' is not valid UTF-8", name)))?;
        if !form.set_field(&name, value) {
            debug!("Ignoring unknown multipart field: {}", name);
        }
    }

    info!(
        "Service order form received: photos={}, bytes={}",
        form.photos.len(),
        total_bytes
    );

    Ok(form)
}

async fn read_field(field: &mut Field, total_bytes: &mut usize, max: usize) -> AppResult<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::InvalidInput(format!("Read error: {}", e)))?;
        *total_bytes += chunk.len();
        if *total_bytes > max {
            return Err(AppError::PayloadTooLarge(format!(
                "Submission exceeds the {} byte limit",
                max
            )));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

/// Configure service order routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/service-orders").route(web::post().to(submit_service_order)))
        .service(web::resource("/service-orders/{id}").route(web::get().to(get_service_order)))
        .service(
            web::resource("/service-orders/{id}/report")
                .route(web::get().to(get_service_order_report)),
        );
}
