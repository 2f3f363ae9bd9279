//! Evidence photos attached to a service order.
//!
//! Held in memory for the duration of one submission only.

use bytes::Bytes;

use crate::services::storage::content_type_for_extension;

/// Content types accepted for evidence photos.
pub const ACCEPTED_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/jpg"];

/// A user-attached photograph documenting vehicle condition or required parts.
#[derive(Debug, Clone)]
pub struct EvidenceImage {
    /// Raw file content.
    pub bytes: Bytes,
    /// Filename declared by the client.
    pub filename: String,
    /// Content type declared by the client.
    pub content_type: String,
}

impl EvidenceImage {
    pub fn new(
        bytes: impl Into<Bytes>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
            content_type: content_type.into(),
        }
    }

    /// File extension used when naming the stored object.
    ///
    /// Taken from the declared filename; falls back to the content type.
    pub fn extension(&self) -> String {
        let from_name = self
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.trim().to_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

        match from_name {
            Some(ext) => ext,
            None => extension_for_content_type(&self.content_type).to_string(),
        }
    }

    /// Content type sent with the upload: the declared one, or one derived
    /// from the extension when the client declared none.
    pub fn upload_content_type(&self) -> String {
        let declared = self.content_type.trim();
        if declared.is_empty() {
            content_type_for_extension(&self.extension()).to_string()
        } else {
            declared.to_string()
        }
    }

    /// Size of the photo in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Whether a declared content type is accepted as evidence.
pub fn is_accepted_image_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    ACCEPTED_IMAGE_TYPES.contains(&essence.as_str())
}

fn extension_for_content_type(content_type: &str) -> &'static str {
    match content_type.to_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}
