//! VirusSeq API types
//!
//! Shapes of the JSON bodies returned by the submission service.

use serde::{Deserialize, Serialize};

/// Body of a successful `POST /submissions`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionCreated {
    pub submission_id: String,
}

/// Body of a refused request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub error_info: ErrorInfo,
}

/// Details attached to a refused request; which fields are present depends
/// on the message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    #[serde(default)]
    pub invalid_fields: Vec<InvalidField>,

    #[serde(default)]
    pub unknown_headers: Vec<String>,

    #[serde(default)]
    pub missing_headers: Vec<String>,
}

/// One refused cell of the metadata table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InvalidField {
    pub field_name: String,

    #[serde(default)]
    pub value: serde_json::Value,

    pub reason: String,

    /// 1-based data row of the submitted table
    pub index: usize,
}

/// Message sent with a refused table header
pub const HEADERS_INCORRECT: &str = "Headers are incorrect!";

/// Message sent when individual rows failed validation
pub const INVALID_FIELDS: &str = "Found records with invalid fields";

/// One page of `GET /uploads`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadsPage {
    #[serde(default)]
    pub data: Vec<Upload>,
}

/// Processing state of one submitted sample
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Upload {
    pub submitter_sample_id: String,

    pub status: UploadStatus,

    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Queued,
    Processing,
    Complete,
    Error,
}

/// Split an upload's error string into `(field, message)` pairs
///
/// The service reports `#section/field: message#section/field: message`.
/// Only the last path component of each label is kept.
pub fn parse_upload_errors(error: &str) -> Vec<(Option<String>, String)> {
    error
        .split('#')
        .skip(1)
        .filter(|item| !item.trim().is_empty())
        .map(|item| match item.split_once(':') {
            Some((label, message)) => {
                let field = label.rsplit('/').next().unwrap_or(label).trim();
                let field = (!field.is_empty()).then(|| field.to_string());
                (field, message.trim().to_string())
            }
            None => (None, item.trim().to_string()),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_fields_body() {
        let json = r#"{"status":"BAD_REQUEST","message":"Found records with invalid fields","errorInfo":{"invalidFields":[{"fieldName":"specimen collector sample ID","value":"","reason":"NOT_ALLOWED_TO_BE_EMPTY","index":1},{"fieldName":"study_id","value":" 23434","reason":"UNAUTHORIZED_FOR_STUDY_UPLOAD","index":2}]}}"#;
        let body: ApiErrorBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.message, INVALID_FIELDS);
        assert_eq!(body.error_info.invalid_fields.len(), 2);
        assert_eq!(body.error_info.invalid_fields[1].index, 2);
        assert_eq!(body.error_info.invalid_fields[1].reason, "UNAUTHORIZED_FOR_STUDY_UPLOAD");
    }

    #[test]
    fn test_forbidden_body_without_details() {
        let body: ApiErrorBody =
            serde_json::from_str(r#"{"status":"FORBIDDEN","message":"Denied","errorInfo":{}}"#).unwrap();
        assert_eq!(body.status, "FORBIDDEN");
        assert!(body.error_info.invalid_fields.is_empty());
    }

    #[test]
    fn test_uploads_page() {
        let json = r##"{"data":[{"submitterSampleId":"QC-1","status":"COMPLETE","analysisId":"a1"},{"submitterSampleId":"QC-2","status":"ERROR","error":"#sample_collection/host: is required"}]}"##;
        let page: UploadsPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.data[0].status, UploadStatus::Complete);
        assert_eq!(page.data[1].status, UploadStatus::Error);
        assert!(page.data[1].error.is_some());
    }

    #[test]
    fn test_parse_upload_errors() {
        let parsed = parse_upload_errors(
            "#sample_collection/host: is required#sample_collection/sample_collection/collection date: bad date#no label here",
        );
        assert_eq!(
            parsed,
            vec![
                (Some("host".to_string()), "is required".to_string()),
                (Some("collection date".to_string()), "bad date".to_string()),
                (None, "no label here".to_string()),
            ]
        );
        assert!(parse_upload_errors("").is_empty());
    }
}
