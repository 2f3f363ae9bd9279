//! Service order domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::evidence::EvidenceImage;
use crate::error::{AppError, AppResult};

/// Vehicle models offered in the workshop pick-list.
pub const VEHICLE_MODELS: &[&str] = &[
    "Hilux", "Yaris", "Corolla", "RAV4", "Hiace", "Tacoma", "Camry", "Prius", "Avanza", "Raize",
    "Tundra", "Otro",
];

/// Oldest vehicle year accepted.
pub const MIN_VEHICLE_YEAR: i32 = 1990;

/// Newest vehicle year accepted.
pub const MAX_VEHICLE_YEAR: i32 = 2030;

const MAX_ORDER_ID_LEN: usize = 50;
const MAX_NAME_LEN: usize = 100;

/// Longest status label the record table holds.
const MAX_STATUS_LEN: usize = 20;

/// Service order status.
///
/// Open set: `pending` and `finalized` are the labels this server writes by
/// default, any other label is kept as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    #[default]
    Pending,
    Finalized,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Finalized => "finalized",
            Self::Other(label) => label,
        }
    }

    /// Normalise a submitted label. Spanish aliases map onto the known
    /// labels; anything else is kept lower-cased. Blank input yields `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let label = s.trim().to_lowercase();
        match label.as_str() {
            "" => None,
            "pending" | "pendiente" => Some(Self::Pending),
            "finalized" | "finalizado" => Some(Self::Finalized),
            _ => Some(Self::Other(label)),
        }
    }
}

/// Stored labels are taken verbatim.
impl From<String> for OrderStatus {
    fn from(label: String) -> Self {
        match label.as_str() {
            "pending" => Self::Pending,
            "finalized" => Self::Finalized,
            _ => Self::Other(label),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw submission as received from the client, before validation.
#[derive(Debug, Clone, Default)]
pub struct ServiceOrderForm {
    pub order_id: Option<String>,
    pub technician: Option<String>,
    pub advisor: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_year: Option<String>,
    pub failures: Option<String>,
    pub comments: Option<String>,
    pub status: Option<String>,
    pub photos: Vec<EvidenceImage>,
}

impl ServiceOrderForm {
    /// Set a text field by its multipart name. Unknown names are ignored.
    pub fn set_field(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "order_id" => &mut self.order_id,
            "technician" => &mut self.technician,
            "advisor" => &mut self.advisor,
            "vehicle_model" => &mut self.vehicle_model,
            "vehicle_year" => &mut self.vehicle_year,
            "failures" => &mut self.failures,
            "comments" => &mut self.comments,
            "status" => &mut self.status,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Validate and normalise every field, producing an immutable request.
    pub fn validate(self) -> AppResult<ServiceOrderRequest> {
        let order_id = required_upper(self.order_id, "order_id", MAX_ORDER_ID_LEN)?;
        let technician = required_upper(self.technician, "technician", MAX_NAME_LEN)?;
        let advisor = optional(self.advisor)
            .map(|a| bounded_upper(a, "advisor", MAX_NAME_LEN))
            .transpose()?;

        let vehicle_model = normalize_vehicle_model(
            optional(self.vehicle_model)
                .ok_or_else(|| missing_field("vehicle_model"))?
                .as_str(),
        )?;

        let vehicle_year = parse_vehicle_year(
            optional(self.vehicle_year)
                .ok_or_else(|| missing_field("vehicle_year"))?
                .as_str(),
        )?;

        // Free text is stored verbatim; only emptiness is checked
        let failures = self
            .failures
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| missing_field("failures"))?;
        let comments = self.comments.filter(|c| !c.trim().is_empty());

        let status = self
            .status
            .as_deref()
            .and_then(OrderStatus::parse)
            .unwrap_or_default();
        if status.as_str().chars().count() > MAX_STATUS_LEN {
            return Err(AppError::InvalidInput(format!(
                "status must be at most {} characters",
                MAX_STATUS_LEN
            )));
        }

        Ok(ServiceOrderRequest {
            order_id,
            technician,
            advisor,
            vehicle_model,
            vehicle_year,
            failures,
            comments,
            status,
            photos: self.photos,
        })
    }
}

/// Validated, normalised submission. Never mutated once built.
#[derive(Debug, Clone)]
pub struct ServiceOrderRequest {
    pub order_id: String,
    pub technician: String,
    pub advisor: Option<String>,
    pub vehicle_model: String,
    pub vehicle_year: i32,
    pub failures: String,
    pub comments: Option<String>,
    pub status: OrderStatus,
    pub photos: Vec<EvidenceImage>,
}

impl ServiceOrderRequest {
    /// Prefix for evidence object names: `{order_id}_{technician}`, restricted
    /// to characters safe in object keys and URLs.
    pub fn evidence_prefix(&self) -> String {
        sanitize_object_prefix(&format!("{}_{}", self.order_id, self.technician))
    }
}

/// Persisted service order.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ServiceOrderRecord {
    /// Record UUID (v7, time ordered).
    pub id: Uuid,
    /// Work order or plate number.
    pub order_id: String,
    /// Technician who performed the inspection.
    pub technician: String,
    /// Service advisor, when recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisor: Option<String>,
    /// Vehicle model.
    pub vehicle_model: String,
    /// Vehicle model year.
    pub vehicle_year: i32,
    /// Failures found and parts required.
    pub failures: String,
    /// Additional comments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    /// Public URLs of uploaded evidence photos.
    pub evidence_urls: Vec<String>,
    /// Public URL of the generated PDF report.
    pub report_url: String,
    /// Order status (`pending`, `finalized` or another label).
    #[schema(value_type = String, example = "pending")]
    pub status: OrderStatus,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
}

/// Multipart form accepted by `POST /service-orders` (documentation only).
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct ServiceOrderMultipart {
    /// Work order or plate number.
    pub order_id: String,
    /// Technician name.
    pub technician: String,
    /// Service advisor name.
    pub advisor: Option<String>,
    /// Vehicle model (pick-list entry or free text).
    pub vehicle_model: String,
    /// Vehicle year (1990-2030).
    pub vehicle_year: i32,
    /// Failures and parts.
    pub failures: String,
    /// Additional comments.
    pub comments: Option<String>,
    /// `pending` (default), `finalized` or another label.
    pub status: Option<String>,
    /// Evidence photos (PNG or JPEG file parts, repeatable).
    pub photos: Vec<String>,
}

/// Response after submitting a service order.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubmitServiceOrderResponse {
    /// The persisted record.
    pub service_order: ServiceOrderRecord,
    /// Filename of the stored PDF report.
    pub report_filename: String,
    /// Photos received in the request.
    pub photos_received: usize,
    /// Photos stored successfully.
    pub photos_uploaded: usize,
    /// Photos that could not be stored.
    pub photos_failed: usize,
    /// Status message.
    pub message: String,
}

/// Match a vehicle model against the pick-list, accepting free text otherwise.
///
/// The result is upper-cased so catalogue and free-text entries compare alike.
pub fn normalize_vehicle_model(raw: &str) -> AppResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(missing_field("vehicle_model"));
    }

    let model = VEHICLE_MODELS
        .iter()
        .find(|m| m.eq_ignore_ascii_case(trimmed))
        .map(|m| m.to_string())
        .unwrap_or_else(|| trimmed.to_string());

    bounded_upper(model, "vehicle_model", MAX_NAME_LEN)
}

/// Parse a vehicle year within the accepted range.
pub fn parse_vehicle_year(raw: &str) -> AppResult<i32> {
    let year = raw.trim().parse::<i32>().map_err(|_| {
        AppError::InvalidInput(format!("vehicle_year must be a number, got '{}'", raw))
    })?;

    if !(MIN_VEHICLE_YEAR..=MAX_VEHICLE_YEAR).contains(&year) {
        return Err(AppError::InvalidInput(format!(
            "vehicle_year must be between {} and {}",
            MIN_VEHICLE_YEAR, MAX_VEHICLE_YEAR
        )));
    }

    Ok(year)
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_object_prefix(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required_upper(value: Option<String>, field: &str, max_len: usize) -> AppResult<String> {
    let value = optional(value).ok_or_else(|| missing_field(field))?;
    bounded_upper(value, field, max_len)
}

/// Upper-case, then bound the length: some characters expand ("ß" to "SS").
fn bounded_upper(value: String, field: &str, max_len: usize) -> AppResult<String> {
    let upper = value.to_uppercase();
    if upper.chars().count() > max_len {
        return Err(AppError::InvalidInput(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(upper)
}

fn missing_field(field: &str) -> AppError {
    AppError::InvalidInput(format!("Missing required field: {}", field))
}
