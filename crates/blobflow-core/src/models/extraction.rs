//! Models for the multi-format extraction pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BlobError, ErrorKind};
use crate::models::StorageConfig;

/// Document families the pipeline knows how to turn into text.
///
/// `Unrecognized` carries whatever the caller asked for so the failure report
/// can name it; no extractor is ever registered for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Spreadsheet,
    Pdf,
    Word,
    Markdown,
    SlideDeck,
    Unrecognized(String),
}

impl DocumentFormat {
    /// The five formats with an extractor, in dispatch-table order.
    pub const KNOWN: [DocumentFormat; 5] = [
        DocumentFormat::Spreadsheet,
        DocumentFormat::Pdf,
        DocumentFormat::Word,
        DocumentFormat::Markdown,
        DocumentFormat::SlideDeck,
    ];

    /// Pick a format from the blob name's extension (case-insensitive).
    pub fn from_blob_name(blob_name: &str) -> DocumentFormat {
        let file_name = blob_name.rsplit('/').next().unwrap_or(blob_name);
        let extension = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
            _ => return DocumentFormat::Unrecognized(String::new()),
        };
        match extension.as_str() {
            "xlsx" | "xls" => DocumentFormat::Spreadsheet,
            "pdf" => DocumentFormat::Pdf,
            "docx" => DocumentFormat::Word,
            "md" | "markdown" => DocumentFormat::Markdown,
            "pptx" => DocumentFormat::SlideDeck,
            _ => DocumentFormat::Unrecognized(format!(".{}", extension)),
        }
    }

    /// Position in the extractor dispatch table; `None` for unrecognized formats.
    pub fn slot(&self) -> Option<usize> {
        match self {
            DocumentFormat::Spreadsheet => Some(0),
            DocumentFormat::Pdf => Some(1),
            DocumentFormat::Word => Some(2),
            DocumentFormat::Markdown => Some(3),
            DocumentFormat::SlideDeck => Some(4),
            DocumentFormat::Unrecognized(_) => None,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Spreadsheet => f.write_str("spreadsheet"),
            DocumentFormat::Pdf => f.write_str("pdf"),
            DocumentFormat::Word => f.write_str("word"),
            DocumentFormat::Markdown => f.write_str("markdown"),
            DocumentFormat::SlideDeck => f.write_str("slide deck"),
            DocumentFormat::Unrecognized(tag) if tag.is_empty() => f.write_str("unrecognized"),
            DocumentFormat::Unrecognized(tag) => write!(f, "unrecognized ({})", tag),
        }
    }
}

/// One unit of pipeline work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionItem {
    pub location: StorageConfig,
    pub format: DocumentFormat,
}

impl ExtractionItem {
    pub fn new(location: StorageConfig, format: DocumentFormat) -> Self {
        Self { location, format }
    }

    /// Build an item whose format is derived from the blob name.
    pub fn from_location(location: StorageConfig) -> Self {
        let format = DocumentFormat::from_blob_name(&location.blob_name);
        Self { location, format }
    }
}

/// Per-item lifecycle: `Pending -> Downloading -> Extracting -> {Done | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    Downloading,
    Extracting,
    Done,
    Failed,
}

impl ItemState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Done | ItemState::Failed)
    }

    /// Whether moving from `self` to `next` follows the lifecycle.
    /// Failure is reachable from every non-terminal state.
    pub fn can_advance_to(self, next: ItemState) -> bool {
        matches!(
            (self, next),
            (ItemState::Pending, ItemState::Downloading)
                | (ItemState::Downloading, ItemState::Extracting)
                | (ItemState::Extracting, ItemState::Done)
                | (ItemState::Pending, ItemState::Failed)
                | (ItemState::Downloading, ItemState::Failed)
                | (ItemState::Extracting, ItemState::Failed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Running,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Done { text: String },
    Failed { kind: ErrorKind, message: String },
}

/// Result for one submitted item; a batch report is a `Vec` of these in
/// submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub source_reference: String,
    pub format: DocumentFormat,
    pub outcome: ExtractionOutcome,
}

impl ExtractionResult {
    pub fn done(item: &ExtractionItem, text: String) -> Self {
        Self {
            source_reference: item.location.reference(),
            format: item.format.clone(),
            outcome: ExtractionOutcome::Done { text },
        }
    }

    pub fn failed(item: &ExtractionItem, error: &BlobError) -> Self {
        Self {
            source_reference: item.location.reference(),
            format: item.format.clone(),
            outcome: ExtractionOutcome::Failed {
                kind: error.kind(),
                message: error.to_string(),
            },
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, ExtractionOutcome::Done { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            ExtractionOutcome::Done { text } => Some(text),
            ExtractionOutcome::Failed { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            ExtractionOutcome::Done { .. } => None,
            ExtractionOutcome::Failed { kind, .. } => Some(*kind),
        }
    }
}
