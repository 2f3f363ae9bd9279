//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Workshop Orders Server",
        version = "0.1.0",
        description = "API server for recording workshop service orders with photo evidence and generated PDF reports"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        // Service order endpoints
        api::service_orders::submit_service_order,
        api::service_orders::get_service_order,
        api::service_orders::get_service_order_report,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            // Service orders
            models::ServiceOrderRecord,
            models::ServiceOrderMultipart,
            models::SubmitServiceOrderResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Service Orders", description = "Service order submission and retrieval")
    )
)]
pub struct ApiDoc;
