//! REST API types for frontend integration.
//!
//! The view is returned as JSON cards; the PDF travels base64 encoded in the
//! same response, or as a raw attachment from `/api/document`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::document::{RenderedView, SkippedRecord, DOCUMENT_FILE_NAME, DOCUMENT_MIME};
use crate::transform::pipeline::{FilterOptions, LogoStats, RenderOutput, TableInfo};

/// Response sent after a CSV upload has been rendered.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResponse {
    /// Unique job identifier
    pub job_id: String,

    /// "ready" or "warning" (some wallets skipped)
    pub status: String,

    pub generated_at: DateTime<Utc>,

    pub view: RenderedView,

    pub metadata: ResponseMetadata,

    pub document: DocumentPayload,
}

/// Metadata about the run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub total_wallets: usize,
    pub rendered_wallets: usize,
    pub page_count: usize,
    pub csv_info: CsvMetadata,
    pub logos: LogoStats,
    pub skipped: Vec<SkippedRecord>,
    pub filter_options: FilterOptions,
}

/// CSV file metadata
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

impl From<TableInfo> for CsvMetadata {
    fn from(table: TableInfo) -> Self {
        Self {
            encoding: table.encoding,
            delimiter: table.delimiter.to_string(),
            row_count: table.row_count,
            columns: table.headers,
        }
    }
}

/// The PDF, base64 encoded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPayload {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: usize,
    pub data: String,
}

impl DocumentPayload {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            file_name: DOCUMENT_FILE_NAME.to_string(),
            mime_type: DOCUMENT_MIME.to_string(),
            size_bytes: bytes.len(),
            data: STANDARD.encode(bytes),
        }
    }
}

impl From<RenderOutput> for RenderResponse {
    fn from(output: RenderOutput) -> Self {
        RenderResponse {
            job_id: Uuid::new_v4().to_string(),
            status: if output.skipped.is_empty() { "ready" } else { "warning" }.to_string(),
            generated_at: Utc::now(),
            document: DocumentPayload::from_bytes(&output.document),
            view: output.view,
            metadata: ResponseMetadata {
                total_wallets: output.record_count,
                rendered_wallets: output.rendered_count,
                page_count: output.page_count,
                csv_info: output.table.into(),
                logos: output.logos,
                skipped: output.skipped,
                filter_options: output.filter_options,
            },
        }
    }
}

/// Body returned when the selection matched nothing.
pub fn empty_response(message: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "empty",
        "message": message,
        "view": { "sections": [] },
        "document": null
    })
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "view": { "sections": [] },
        "document": null
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_payload() {
        let payload = DocumentPayload::from_bytes(b"%PDF-1.4");
        assert_eq!(payload.file_name, "crypto_wallets.pdf");
        assert_eq!(payload.mime_type, "application/pdf");
        assert_eq!(payload.size_bytes, 8);
        assert_eq!(STANDARD.decode(&payload.data).unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn test_csv_metadata_from_table() {
        let meta = CsvMetadata::from(TableInfo {
            encoding: "utf-8".into(),
            delimiter: ';',
            headers: vec!["Wallet Name".into(), "Wallet Address".into()],
            row_count: 3,
        });
        assert_eq!(meta.delimiter, ";");
        assert_eq!(meta.columns.len(), 2);

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["rowCount"], 3);
    }

    #[test]
    fn test_error_and_empty_bodies() {
        let err = error_response("The CSV file must have a column named 'Wallet Name'.");
        assert_eq!(err["status"], "error");
        assert!(err["document"].is_null());

        let empty = empty_response("No wallets match the selected filters.");
        assert_eq!(empty["status"], "empty");
        assert_eq!(empty["view"]["sections"].as_array().unwrap().len(), 0);
    }
}
