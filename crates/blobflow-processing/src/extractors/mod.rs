//! Format extractors
//!
//! One stateless adapter per document family, each turning raw bytes into
//! plain text. Empty input always yields an empty string.

mod markdown;
mod ooxml;
mod pdf;
mod slides;
mod spreadsheet;
mod word;

use std::path::PathBuf;
use std::sync::Arc;

use blobflow_core::{BlobError, BlobResult, DocumentFormat};

pub use markdown::MarkdownExtractor;
pub use pdf::PdfExtractor;
pub use slides::SlideDeckExtractor;
pub use spreadsheet::SpreadsheetExtractor;
pub use word::WordExtractor;

/// Turns one document family into text.
pub trait FormatExtractor: Send + Sync {
    fn format(&self) -> DocumentFormat;

    /// `filename_hint` is only used in diagnostics.
    fn extract(&self, bytes: &[u8], filename_hint: Option<&str>) -> BlobResult<String>;
}

/// Fixed format to extractor table, built once.
#[derive(Clone)]
pub struct ExtractorRegistry {
    slots: [Arc<dyn FormatExtractor>; 5],
}

impl ExtractorRegistry {
    /// Slide decks are spilled to `temp_dir` (the OS temp dir when `None`).
    pub fn new(temp_dir: Option<PathBuf>) -> Self {
        let slots: [Arc<dyn FormatExtractor>; 5] = [
            Arc::new(SpreadsheetExtractor),
            Arc::new(PdfExtractor),
            Arc::new(WordExtractor),
            Arc::new(MarkdownExtractor),
            Arc::new(SlideDeckExtractor::new(temp_dir)),
        ];
        Self { slots }
    }

    pub fn get(&self, format: &DocumentFormat) -> BlobResult<Arc<dyn FormatExtractor>> {
        format
            .slot()
            .map(|slot| self.slots[slot].clone())
            .ok_or_else(|| BlobError::UnsupportedFormat(format.to_string()))
    }

    pub fn supports(&self, format: &DocumentFormat) -> bool {
        format.slot().is_some()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Label used in extraction error messages.
pub(crate) fn describe(filename_hint: Option<&str>) -> &str {
    filename_hint.unwrap_or("<unnamed>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_every_known_format() {
        let registry = ExtractorRegistry::default();
        for format in DocumentFormat::KNOWN {
            let extractor = registry.get(&format).unwrap();
            assert_eq!(extractor.format(), format);
        }
    }

    #[test]
    fn unrecognized_format_is_rejected() {
        let registry = ExtractorRegistry::default();
        let err = registry
            .get(&DocumentFormat::Unrecognized(".png".into()))
            .err()
            .unwrap();
        assert!(matches!(err, BlobError::UnsupportedFormat(_)));
    }

    #[test]
    fn empty_input_yields_empty_text() {
        let registry = ExtractorRegistry::default();
        for format in DocumentFormat::KNOWN {
            let text = registry.get(&format).unwrap().extract(&[], None).unwrap();
            assert_eq!(text, "", "{format}");
        }
    }
}
