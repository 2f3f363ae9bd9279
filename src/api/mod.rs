//! API endpoint modules.

pub mod health;
pub mod openapi;
pub mod service_orders;

pub use health::configure_health_routes;
pub use openapi::ApiDoc;
pub use service_orders::{UploadLimits, configure_routes as configure_service_order_routes};
