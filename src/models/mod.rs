//! Domain models for the workshop service-order server.

pub mod evidence;
pub mod service_order;

// Re-export commonly used types
pub use evidence::{EvidenceImage, is_accepted_image_type};
pub use service_order::{
    OrderStatus, ServiceOrderForm, ServiceOrderMultipart, ServiceOrderRecord,
    ServiceOrderRequest, SubmitServiceOrderResponse, VEHICLE_MODELS,
};
