//! Business logic services.

pub mod report;
pub mod storage;
pub mod submission;
pub mod uploader;

pub use report::{ReportDocumentBuilder, RenderedReport};
pub use storage::{ObjectStore, S3Storage};
pub use submission::{SubmissionOutcome, SubmissionService};
pub use uploader::{EvidenceUploader, UploadBatch};
