use serde::{Deserialize, Serialize};

use super::base64_bytes;
use super::enums::{AttachmentModule, OcrStatus};

/// A new image or PDF to attach to a record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttachmentDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub ocr_text: Option<String>,
    #[serde(default)]
    pub ocr_status: OcrStatus,
    /// Form section the file was captured for; `None` for general uploads.
    #[serde(default)]
    pub module: Option<AttachmentModule>,
}

/// A stored attachment, owned by exactly one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub record_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub ocr_text: Option<String>,
    #[serde(default)]
    pub ocr_status: OcrStatus,
    #[serde(default)]
    pub module: Option<AttachmentModule>,
}
