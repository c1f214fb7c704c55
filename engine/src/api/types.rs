//! REST API request/response types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::model::Capabilities;
use crate::script::ScriptSummary;

/// One registered model as shown by `GET /api/models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    pub capabilities: ModelCapabilities,
}

/// Serializable mirror of the model capability flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCapabilities {
    pub storable: bool,
    pub object: bool,
    pub listable: bool,
    pub custom_attributes: bool,
    pub media: bool,
}

impl From<Capabilities> for ModelCapabilities {
    fn from(caps: Capabilities) -> Self {
        ModelCapabilities {
            storable: caps.storable,
            object: caps.object,
            listable: caps.listable,
            custom_attributes: caps.custom_attributes,
            media: caps.media,
        }
    }
}

/// Response for both import endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    /// `"N file(s) processed"`, with `"with errors"` appended when any
    /// file failed
    pub message: String,
    pub files_processed: usize,
    pub blocks: usize,
    pub records: usize,
    pub errors: usize,
}

impl ImportResponse {
    pub fn new(files_processed: usize, summary: ScriptSummary, failed: bool) -> Self {
        let mut message = format!("{files_processed} file(s) processed");
        if failed || summary.errors > 0 {
            message.push_str(" with errors");
        }
        ImportResponse {
            message,
            files_processed,
            blocks: summary.blocks,
            records: summary.records,
            errors: summary.errors,
        }
    }
}

/// Response for `GET /api/import/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStatus {
    pub importing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

impl ImportStatus {
    pub fn idle() -> Self {
        ImportStatus {
            importing: false,
            file: None,
            size: None,
        }
    }

    pub fn processing(file: String, size: usize) -> Self {
        ImportStatus {
            importing: true,
            file: Some(file),
            size: Some(size),
        }
    }
}

/// Uniform error body.
pub fn error_response(message: &str) -> Value {
    json!({ "status": "error", "message": message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_response_message() {
        let clean = ImportResponse::new(2, ScriptSummary::default(), false);
        assert_eq!(clean.message, "2 file(s) processed");

        let failed = ImportResponse::new(1, ScriptSummary::default(), true);
        assert_eq!(failed.message, "1 file(s) processed with errors");
    }
}
