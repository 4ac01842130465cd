//! Blob location and listing models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one logical blob: where the storage endpoint lives, which
/// container holds the blob, and (for workbooks) which sheet to read.
///
/// Immutable once built; operations borrow it and never modify it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageConfig {
    pub base_endpoint: String,
    pub container_name: String,
    pub blob_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
}

impl StorageConfig {
    pub fn new(
        base_endpoint: impl Into<String>,
        container_name: impl Into<String>,
        blob_name: impl Into<String>,
    ) -> Self {
        Self {
            base_endpoint: base_endpoint.into(),
            container_name: container_name.into(),
            blob_name: blob_name.into(),
            sheet_name: None,
        }
    }

    pub fn with_sheet(mut self, sheet_name: impl Into<String>) -> Self {
        self.sheet_name = Some(sheet_name.into());
        self
    }

    /// Human-readable reference used in logs and extraction reports.
    pub fn reference(&self) -> String {
        format!(
            "{}/{}/{}",
            self.base_endpoint.trim_end_matches('/'),
            self.container_name,
            self.blob_name
        )
    }
}

/// Read-only snapshot of one blob, as returned by listing operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobDescriptor {
    pub name: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub last_modified: DateTime<Utc>,
}

/// Aggregate statistics for one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub name: String,
    pub blob_count: usize,
    pub total_size_bytes: u64,
    pub earliest_modified: Option<DateTime<Utc>>,
    pub latest_modified: Option<DateTime<Utc>>,
}

impl ContainerSummary {
    pub fn from_blobs(name: impl Into<String>, blobs: &[BlobDescriptor]) -> Self {
        Self {
            name: name.into(),
            blob_count: blobs.len(),
            total_size_bytes: blobs.iter().map(|b| b.size).sum(),
            earliest_modified: blobs.iter().map(|b| b.last_modified).min(),
            latest_modified: blobs.iter().map(|b| b.last_modified).max(),
        }
    }
}
