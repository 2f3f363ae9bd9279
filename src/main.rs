//! Workshop service-order server - Main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, web};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use workshop_orders_lib::api::{self, ApiDoc, UploadLimits};
use workshop_orders_lib::api::service_orders::SERVICE_ORDER_ID_HEADER;
use workshop_orders_lib::config::Config;
use workshop_orders_lib::db::{DbPool, ServiceOrderRepository};
use workshop_orders_lib::middleware::{self, REQUEST_ID_HEADER};
use workshop_orders_lib::services::{ObjectStore, S3Storage, SubmissionService};

/// Perform health check (for Docker healthcheck).
fn health_check() -> bool {
    // Simple check - just verify we can load config
    Config::from_env().is_ok()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Check for --health-check flag (used by Docker HEALTHCHECK)
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|arg| arg == "--health-check") {
        dotenvy::dotenv().ok();
        std::process::exit(if health_check() { 0 } else { 1 });
    }

    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, DATABASE_URL and S3 credentials must be set");
            error!("  - In production, values must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Workshop Orders Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
        info!("Using development defaults for DATABASE_URL and S3 credentials");
    }

    // Initialize database
    let pool = match DbPool::new(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };
    info!("Database connection established");

    if let Err(e) = pool.run_migrations().await {
        error!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }
    info!("Database migrations complete");

    // Initialize object storage
    let storage = S3Storage::new(&config.storage);
    for bucket in [
        &config.storage.evidence_bucket,
        &config.storage.reports_bucket,
    ] {
        if let Err(e) = storage.ensure_bucket(bucket).await {
            error!("Failed to prepare bucket '{}': {}", bucket, e);
            std::process::exit(1);
        }
    }

    let store: Arc<dyn ObjectStore> = Arc::new(storage);
    let repository: Arc<dyn ServiceOrderRepository> = Arc::new(pool);
    let submission = web::Data::new(SubmissionService::from_config(
        &config,
        store,
        Arc::clone(&repository),
    ));
    let repository_data: web::Data<dyn ServiceOrderRepository> = web::Data::from(repository);
    let limits = web::Data::new(UploadLimits::from(&config.submission));

    info!(
        "Submission limits: {}MB max size, {} photos, {} parallel uploads, {}s upload timeout",
        config.submission.max_upload_size / 1024 / 1024,
        config.submission.max_photos,
        config.submission.upload_concurrency,
        config.submission.upload_timeout.as_secs()
    );

    let bind_address = config.bind_address();
    let is_development = config.is_development();
    let max_upload_size = config.submission.max_upload_size;

    let worker_count = if is_development {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!(
            "Starting server at http://{} ({} workers)",
            bind_address, cpus
        );
        cpus
    };

    // Start HTTP server
    let server = HttpServer::new(move || {
        let cors = if is_development {
            // Permissive CORS for development
            Cors::default()
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
        } else {
            // Restrictive CORS for production (same-origin only)
            Cors::default()
        };
        let cors = cors
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .expose_headers(vec![
                header::CONTENT_DISPOSITION.as_str(),
                REQUEST_ID_HEADER,
                SERVICE_ORDER_ID_HEADER,
            ])
            .max_age(3600);

        App::new()
            // Add CORS middleware (must be before other middleware)
            .wrap(cors)
            // Add request logging middleware
            .wrap(middleware::RequestLogger)
            // Add shared state
            .app_data(submission.clone())
            .app_data(repository_data.clone())
            .app_data(limits.clone())
            // Multipart size is enforced while streaming; this bounds other bodies
            .app_data(web::PayloadConfig::new(max_upload_size))
            // OpenAPI document and Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
            // Configure API routes
            .service(
                web::scope("/api/v1")
                    .configure(api::configure_health_routes)
                    .configure(api::configure_service_order_routes),
            )
    });

    server
        .workers(worker_count)
        .bind(&bind_address)?
        .run()
        .await
}
