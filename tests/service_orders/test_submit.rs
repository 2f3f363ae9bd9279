//! Submission tests: validation, limits, evidence and report delivery.

use std::sync::Arc;

use actix_web::test;
use serde_json::Value;
use workshop_orders_lib::api::UploadLimits;

use super::test_helpers::*;

/// (1) Valid form with photos → 201, normalised record, photos stored.
#[actix_rt::test]
async fn test_submit_records_service_order() {
    let store = Arc::new(InMemoryStore::default());
    let repo = Arc::new(InMemoryRepository::default());
    let app = create_test_app(store.clone(), repo.clone(), default_limits()).await;

    let mut parts = valid_fields();
    parts.push(Part::photo("front.png", "image/png", png_bytes(32, 24)));
    parts.push(Part::photo("rear.jpg", "image/jpeg", jpeg_bytes(32, 24)));

    let resp = test::call_service(&app, submit_request("/api/v1/service-orders", &parts).to_request()).await;
    assert_eq!(resp.status(), 201);
    assert!(resp.headers().contains_key("x-request-id"));

    let body: Value = test::read_body_json(resp).await;
    let order = &body["service_order"];
    assert_eq!(order["order_id"], "OT-2024-001");
    assert_eq!(order["technician"], "JUAN PEREZ");
    assert_eq!(order["advisor"], "MARIA");
    assert_eq!(order["vehicle_model"], "HILUX");
    assert_eq!(order["vehicle_year"], 2022);
    assert_eq!(order["failures"], "Ruido en suspension delantera");
    assert_eq!(order["status"], "pending");
    assert_eq!(body["photos_received"], 2);
    assert_eq!(body["photos_uploaded"], 2);
    assert_eq!(body["photos_failed"], 0);

    let urls = order["evidence_urls"].as_array().unwrap();
    assert_eq!(urls.len(), 2);
    for url in urls {
        let url = url.as_str().unwrap();
        assert!(
            url.starts_with(&format!("{}/{}/OT-2024-001_JUAN_PEREZ_", STORAGE_BASE_URL, EVIDENCE_BUCKET)),
            "unexpected evidence url {}",
            url
        );
    }

    let report_filename = body["report_filename"].as_str().unwrap();
    assert!(report_filename.starts_with("Reporte_OT-2024-001_"));
    assert!(report_filename.ends_with(".pdf"));
    assert_eq!(
        order["report_url"],
        format!("{}/{}/{}", STORAGE_BASE_URL, REPORTS_BUCKET, report_filename)
    );

    assert_eq!(store.keys_in(EVIDENCE_BUCKET).len(), 2);
    assert_eq!(store.keys_in(REPORTS_BUCKET), vec![report_filename.to_string()]);
    assert_eq!(repo.count(), 1);
}

/// (2) Free-text vehicle model and explicit status are accepted.
#[actix_rt::test]
async fn test_submit_with_free_text_model_and_status() {
    let repo = Arc::new(InMemoryRepository::default());
    let app = create_test_app(Arc::default(), repo.clone(), default_limits()).await;

    let parts = vec![
        Part::text("order_id", "A1"),
        Part::text("technician", "Luis"),
        Part::text("vehicle_model", "Land Cruiser 70"),
        Part::text("vehicle_year", "1995"),
        Part::text("failures", "Cambio de aceite"),
        Part::text("status", "finalized"),
    ];

    let resp = test::call_service(&app, submit_request("/api/v1/service-orders", &parts).to_request()).await;
    assert_eq!(resp.status(), 201);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["service_order"]["vehicle_model"], "LAND CRUISER 70");
    assert_eq!(body["service_order"]["status"], "finalized");
    assert!(body["service_order"]["advisor"].is_null());
    assert!(body["service_order"]["comments"].is_null());
    assert_eq!(body["photos_received"], 0);
    assert_eq!(repo.count(), 1);
}

/// (3) Labels outside the known statuses are kept.
#[actix_rt::test]
async fn test_submit_keeps_custom_status() {
    let app = create_test_app(Arc::default(), Arc::default(), default_limits()).await;

    let mut parts = valid_fields();
    parts.push(Part::text("status", "On_Hold"));

    let resp = test::call_service(&app, submit_request("/api/v1/service-orders", &parts).to_request()).await;
    assert_eq!(resp.status(), 201);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["service_order"]["status"], "on_hold");
}

/// (4) Photos are stored with their declared content type.
#[actix_rt::test]
async fn test_submit_stores_declared_content_type() {
    let store = Arc::new(InMemoryStore::default());
    let app = create_test_app(store.clone(), Arc::default(), default_limits()).await;

    let mut parts = valid_fields();
    parts.push(Part::photo("IMG_0001.HEIC", "image/jpeg", jpeg_bytes(16, 16)));

    let resp = test::call_service(&app, submit_request("/api/v1/service-orders", &parts).to_request()).await;
    assert_eq!(resp.status(), 201);

    assert_eq!(store.content_types_in(EVIDENCE_BUCKET), vec!["image/jpeg".to_string()]);
    assert_eq!(store.content_types_in(REPORTS_BUCKET), vec!["application/pdf".to_string()]);
}

/// (5) Upper-casing that pushes a field past its limit is rejected up front.
#[actix_rt::test]
async fn test_submit_rejects_order_id_too_long_after_upper_casing() {
    let store = Arc::new(InMemoryStore::default());
    let repo = Arc::new(InMemoryRepository::default());
    let app = create_test_app(store.clone(), repo.clone(), default_limits()).await;

    let mut parts: Vec<Part> = valid_fields()
        .into_iter()
        .filter(|p| !matches!(p, Part::Text("order_id", _)))
        .collect();
    parts.push(Part::text("order_id", &"\u{df}".repeat(50)));
    parts.push(Part::photo("front.png", "image/png", png_bytes(8, 8)));

    let resp = test::call_service(&app, submit_request("/api/v1/service-orders", &parts).to_request()).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(repo.count(), 0);
    assert!(store.keys_in(EVIDENCE_BUCKET).is_empty());
}

/// (6) Missing required field → 400, nothing stored.
#[actix_rt::test]
async fn test_submit_missing_field_rejected() {
    let store = Arc::new(InMemoryStore::default());
    let repo = Arc::new(InMemoryRepository::default());
    let app = create_test_app(store.clone(), repo.clone(), default_limits()).await;

    let parts: Vec<Part> = valid_fields()
        .into_iter()
        .filter(|p| !matches!(p, Part::Text("technician", _)))
        .collect();

    let resp = test::call_service(&app, submit_request("/api/v1/service-orders", &parts).to_request()).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "INVALID_INPUT");
    assert!(body["message"].as_str().unwrap().contains("technician"));
    assert_eq!(repo.count(), 0);
    assert!(store.keys_in(REPORTS_BUCKET).is_empty());
}

/// (7) Year outside the accepted range → 400.
#[actix_rt::test]
async fn test_submit_year_out_of_range_rejected() {
    let repo = Arc::new(InMemoryRepository::default());
    let app = create_test_app(Arc::default(), repo.clone(), default_limits()).await;

    let mut parts: Vec<Part> = valid_fields()
        .into_iter()
        .filter(|p| !matches!(p, Part::Text("vehicle_year", _)))
        .collect();
    parts.push(Part::text("vehicle_year", "1989"));

    let resp = test::call_service(&app, submit_request("/api/v1/service-orders", &parts).to_request()).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(repo.count(), 0);
}

/// (8) Non-image attachment → 400.
#[actix_rt::test]
async fn test_submit_unsupported_photo_type_rejected() {
    let repo = Arc::new(InMemoryRepository::default());
    let app = create_test_app(Arc::default(), repo.clone(), default_limits()).await;

    let mut parts = valid_fields();
    parts.push(Part::photo("notes.txt", "text/plain", b"not a photo".to_vec()));

    let resp = test::call_service(&app, submit_request("/api/v1/service-orders", &parts).to_request()).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["message"].as_str().unwrap().contains("text/plain"));
    assert_eq!(repo.count(), 0);
}

/// (9) More photos than allowed → 400.
#[actix_rt::test]
async fn test_submit_too_many_photos_rejected() {
    let limits = UploadLimits {
        max_photos: 2,
        ..default_limits()
    };
    let repo = Arc::new(InMemoryRepository::default());
    let app = create_test_app(Arc::default(), repo.clone(), limits).await;

    let mut parts = valid_fields();
    for i in 0..3 {
        parts.push(Part::photo(&format!("p{}.png", i), "image/png", png_bytes(8, 8)));
    }

    let resp = test::call_service(&app, submit_request("/api/v1/service-orders", &parts).to_request()).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(repo.count(), 0);
}

/// (10) Body larger than the configured limit → 413.
#[actix_rt::test]
async fn test_submit_over_size_limit_rejected() {
    let limits = UploadLimits {
        max_upload_size: 4 * 1024,
        ..default_limits()
    };
    let repo = Arc::new(InMemoryRepository::default());
    let app = create_test_app(Arc::default(), repo.clone(), limits).await;

    let mut parts = valid_fields();
    parts.push(Part::photo("big.png", "image/png", vec![0u8; 16 * 1024]));

    let resp = test::call_service(&app, submit_request("/api/v1/service-orders", &parts).to_request()).await;
    assert_eq!(resp.status(), 413);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "PAYLOAD_TOO_LARGE");
    assert_eq!(repo.count(), 0);
}

/// (11) Empty file part from a browser form is ignored.
#[actix_rt::test]
async fn test_submit_ignores_empty_photo_part() {
    let app = create_test_app(Arc::default(), Arc::default(), default_limits()).await;

    let mut parts = valid_fields();
    parts.push(Part::photo("", "application/octet-stream", Vec::new()));

    let resp = test::call_service(&app, submit_request("/api/v1/service-orders", &parts).to_request()).await;
    assert_eq!(resp.status(), 201);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["photos_received"], 0);
}

/// (12) Evidence bucket down → record still created without evidence URLs.
#[actix_rt::test]
async fn test_submit_tolerates_evidence_failures() {
    let store = Arc::new(InMemoryStore::rejecting(EVIDENCE_BUCKET));
    let repo = Arc::new(InMemoryRepository::default());
    let app = create_test_app(store.clone(), repo.clone(), default_limits()).await;

    let mut parts = valid_fields();
    parts.push(Part::photo("a.png", "image/png", png_bytes(16, 16)));
    parts.push(Part::photo("b.png", "image/png", png_bytes(16, 16)));

    let resp = test::call_service(&app, submit_request("/api/v1/service-orders", &parts).to_request()).await;
    assert_eq!(resp.status(), 201);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["photos_received"], 2);
    assert_eq!(body["photos_uploaded"], 0);
    assert_eq!(body["photos_failed"], 2);
    assert!(body["service_order"]["evidence_urls"].as_array().unwrap().is_empty());
    assert!(body["message"].as_str().unwrap().contains("2 photo(s)"));
    assert_eq!(store.keys_in(REPORTS_BUCKET).len(), 1);
    assert_eq!(repo.count(), 1);
}

/// (13) Report bucket down → 502 and no record.
#[actix_rt::test]
async fn test_submit_report_storage_failure() {
    let store = Arc::new(InMemoryStore::rejecting(REPORTS_BUCKET));
    let repo = Arc::new(InMemoryRepository::default());
    let app = create_test_app(store, repo.clone(), default_limits()).await;

    let resp = test::call_service(
        &app,
        submit_request("/api/v1/service-orders", &valid_fields()).to_request(),
    )
    .await;
    assert_eq!(resp.status(), 502);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "STORAGE_ERROR");
    assert_eq!(repo.count(), 0);
}

/// (14) Database down → 500 with a generic message.
#[actix_rt::test]
async fn test_submit_database_failure() {
    let repo = Arc::new(InMemoryRepository::offline());
    let app = create_test_app(Arc::default(), repo, default_limits()).await;

    let resp = test::call_service(
        &app,
        submit_request("/api/v1/service-orders", &valid_fields()).to_request(),
    )
    .await;
    assert_eq!(resp.status(), 500);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "DATABASE_ERROR");
    assert_eq!(body["message"], "An internal database error occurred");
}

/// (15) `download=true` returns the PDF with the record id header.
#[actix_rt::test]
async fn test_submit_download_returns_pdf() {
    let repo = Arc::new(InMemoryRepository::default());
    let app = create_test_app(Arc::default(), repo.clone(), default_limits()).await;

    let mut parts = valid_fields();
    parts.push(Part::photo("front.png", "image/png", png_bytes(24, 24)));

    let resp = test::call_service(
        &app,
        submit_request("/api/v1/service-orders?download=true", &parts).to_request(),
    )
    .await;
    assert_eq!(resp.status(), 201);

    let headers = resp.headers().clone();
    assert_eq!(headers.get("content-type").unwrap(), "application/pdf");
    let disposition = headers.get("content-disposition").unwrap().to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"Reporte_OT-2024-001_"));
    let id = headers.get("x-service-order-id").unwrap().to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&id).is_ok());

    let body = test::read_body(resp).await;
    assert!(body.starts_with(b"%PDF-"));
    assert!(lopdf::Document::load_mem(&body).is_ok());
    assert_eq!(repo.count(), 1);
}
