//! Error types module
//!
//! Every fallible operation in blobflow returns [`BlobError`]. Variants map
//! one-to-one onto the failure kinds a caller (or the HTTP layer in front of
//! the storage manager) is expected to distinguish.

use serde::{Deserialize, Serialize};

use crate::models::DocumentFormat;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Blob '{blob}' not found in container '{container}'")]
    BlobNotFound { container: String, blob: String },

    #[error("Upload of blob '{blob}' failed: {cause}")]
    UploadFailed { blob: String, cause: String },

    #[error("Download of blob '{blob}' failed: {cause}")]
    DownloadFailed { blob: String, cause: String },

    #[error("Delete of blob '{blob}' failed: {cause}")]
    DeleteFailed { blob: String, cause: String },

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Malformed content (content type '{content_type}', {byte_len} bytes): {source}")]
    MalformedContent {
        content_type: String,
        byte_len: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Extraction of {format} document failed: {cause}")]
    ExtractionFailed { format: DocumentFormat, cause: String },

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Result type for blobflow operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Fieldless discriminant of [`BlobError`], carried by failed extraction results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidConfiguration,
    ContainerNotFound,
    BlobNotFound,
    UploadFailed,
    DownloadFailed,
    DeleteFailed,
    UnsupportedContentType,
    MalformedContent,
    ExtractionFailed,
    UnsupportedFormat,
    SheetNotFound,
    Backend,
}

impl ErrorKind {
    /// HTTP status code a transport layer should answer with.
    ///
    /// Only the two not-found kinds map to 404; everything the caller can fix
    /// by changing the request maps to 400; the rest is a server-side 500.
    pub fn http_status_code(self) -> u16 {
        match self {
            ErrorKind::BlobNotFound | ErrorKind::ContainerNotFound => 404,
            ErrorKind::UnsupportedContentType
            | ErrorKind::UnsupportedFormat
            | ErrorKind::SheetNotFound => 400,
            _ => 500,
        }
    }

    /// Machine-readable error code (e.g., "BLOB_NOT_FOUND")
    pub fn error_code(self) -> &'static str {
        match self {
            ErrorKind::InvalidConfiguration => "INVALID_CONFIGURATION",
            ErrorKind::ContainerNotFound => "CONTAINER_NOT_FOUND",
            ErrorKind::BlobNotFound => "BLOB_NOT_FOUND",
            ErrorKind::UploadFailed => "UPLOAD_FAILED",
            ErrorKind::DownloadFailed => "DOWNLOAD_FAILED",
            ErrorKind::DeleteFailed => "DELETE_FAILED",
            ErrorKind::UnsupportedContentType => "UNSUPPORTED_CONTENT_TYPE",
            ErrorKind::MalformedContent => "MALFORMED_CONTENT",
            ErrorKind::ExtractionFailed => "EXTRACTION_FAILED",
            ErrorKind::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ErrorKind::SheetNotFound => "SHEET_NOT_FOUND",
            ErrorKind::Backend => "STORAGE_BACKEND_ERROR",
        }
    }
}

impl BlobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlobError::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            BlobError::ContainerNotFound(_) => ErrorKind::ContainerNotFound,
            BlobError::BlobNotFound { .. } => ErrorKind::BlobNotFound,
            BlobError::UploadFailed { .. } => ErrorKind::UploadFailed,
            BlobError::DownloadFailed { .. } => ErrorKind::DownloadFailed,
            BlobError::DeleteFailed { .. } => ErrorKind::DeleteFailed,
            BlobError::UnsupportedContentType(_) => ErrorKind::UnsupportedContentType,
            BlobError::MalformedContent { .. } => ErrorKind::MalformedContent,
            BlobError::ExtractionFailed { .. } => ErrorKind::ExtractionFailed,
            BlobError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            BlobError::SheetNotFound(_) => ErrorKind::SheetNotFound,
            BlobError::Backend(_) => ErrorKind::Backend,
        }
    }

    /// True for the errors a transport layer answers with a not-found response.
    pub fn is_not_found(&self) -> bool {
        self.kind().http_status_code() == 404
    }

    pub fn http_status_code(&self) -> u16 {
        self.kind().http_status_code()
    }

    pub fn error_code(&self) -> &'static str {
        self.kind().error_code()
    }

    /// Wrap a parser failure with the diagnostics of the payload it was given.
    pub fn malformed(
        content_type: impl Into<String>,
        byte_len: usize,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        BlobError::MalformedContent {
            content_type: content_type.into(),
            byte_len,
            source: source.into(),
        }
    }

    pub fn extraction(format: DocumentFormat, cause: impl std::fmt::Display) -> Self {
        BlobError::ExtractionFailed {
            format,
            cause: cause.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_errors_map_to_404() {
        let err = BlobError::BlobNotFound {
            container: "test".to_string(),
            blob: "missing.txt".to_string(),
        };
        assert_eq!(err.http_status_code(), 404);
        assert!(err.is_not_found());
        assert_eq!(err.error_code(), "BLOB_NOT_FOUND");

        let err = BlobError::ContainerNotFound("nope".to_string());
        assert_eq!(err.http_status_code(), 404);
    }

    #[test]
    fn transport_failures_map_to_500() {
        let err = BlobError::DownloadFailed {
            blob: "a.csv".to_string(),
            cause: "operation timed out".to_string(),
        };
        assert_eq!(err.http_status_code(), 500);
        assert!(!err.is_not_found());
        assert_eq!(err.kind(), ErrorKind::DownloadFailed);
    }

    #[test]
    fn malformed_content_keeps_source_and_diagnostics() {
        let err = BlobError::malformed("text/csv", 42, anyhow::anyhow!("unequal row lengths"));
        let message = err.to_string();
        assert!(message.contains("text/csv"));
        assert!(message.contains("42 bytes"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::UnsupportedFormat).unwrap();
        assert_eq!(json, "\"unsupported_format\"");
    }
}
