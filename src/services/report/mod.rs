//! Service report PDF generation.
//!
//! Layout is computed first as plain positioned elements, then rendered to
//! PDF. Evidence photos are embedded from the raw submitted bytes, whether or
//! not they also reached object storage.

pub mod fonts;
pub mod layout;
pub mod render;

use std::path::PathBuf;

use bytes::Bytes;
use chrono::NaiveDateTime;
use tracing::info;

use crate::error::AppResult;
use crate::models::ServiceOrderRequest;

pub use layout::{ReportLayout, layout_report, wrap_text};
pub use render::RenderedReport;

/// Fields printed on the report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportContent {
    pub order_id: String,
    pub technician: String,
    pub advisor: Option<String>,
    pub vehicle_model: String,
    pub vehicle_year: i32,
    pub failures: String,
    pub comments: Option<String>,
    /// Printed in the metadata band as `dd/mm/YYYY HH:MM`.
    pub issued_at: NaiveDateTime,
}

impl ReportContent {
    pub fn from_request(request: &ServiceOrderRequest, issued_at: NaiveDateTime) -> Self {
        Self {
            order_id: request.order_id.clone(),
            technician: request.technician.clone(),
            advisor: request.advisor.clone(),
            vehicle_model: request.vehicle_model.clone(),
            vehicle_year: request.vehicle_year,
            failures: request.failures.clone(),
            comments: request.comments.clone(),
            issued_at,
        }
    }
}

/// Builds the service report PDF.
#[derive(Debug, Clone, Default)]
pub struct ReportDocumentBuilder {
    staging_dir: Option<PathBuf>,
}

impl ReportDocumentBuilder {
    /// `staging_dir` holds the temporary copies of photos while they are
    /// decoded; the OS temp dir is used when absent.
    pub fn new(staging_dir: Option<PathBuf>) -> Self {
        Self { staging_dir }
    }

    /// Lay out and render the report. CPU bound; run on the blocking pool.
    pub fn build(&self, content: &ReportContent, images: &[Bytes]) -> AppResult<RenderedReport> {
        let layout = layout_report(content, images.len());
        let rendered = render::render(&layout, images, self.staging_dir.as_deref())?;

        info!(
            "Report built: order_id={}, pages={}, embedded_images={}, skipped_images={}",
            content.order_id, rendered.page_count, rendered.embedded_images, rendered.skipped_images
        );

        Ok(rendered)
    }
}
