use std::io::Cursor;

use blobflow_core::{BlobError, BlobResult, DocumentFormat};
use zip::ZipArchive;

use super::ooxml::{paragraphs, read_part, WORDPROCESSING};
use super::{describe, FormatExtractor};

const DOCUMENT_PART: &str = "word/document.xml";

/// `.docx` body text, one line per paragraph.
pub struct WordExtractor;

impl FormatExtractor for WordExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Word
    }

    fn extract(&self, bytes: &[u8], filename_hint: Option<&str>) -> BlobResult<String> {
        if bytes.is_empty() {
            return Ok(String::new());
        }
        let fail = |cause: String| {
            BlobError::extraction(self.format(), format!("{}: {}", describe(filename_hint), cause))
        };

        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| fail(e.to_string()))?;
        let xml = read_part(&mut archive, DOCUMENT_PART).map_err(|e| fail(format!("{:#}", e)))?;
        let body = paragraphs(&xml, &WORDPROCESSING).map_err(|e| fail(format!("{:#}", e)))?;
        Ok(body.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::docx_fixture;

    #[test]
    fn paragraphs_are_joined_by_newlines() {
        let bytes = docx_fixture(&["Quarterly report", "Revenue grew by 5% & costs fell."]);
        let text = WordExtractor.extract(&bytes, Some("report.docx")).unwrap();
        assert_eq!(text, "Quarterly report\nRevenue grew by 5% & costs fell.");
    }

    #[test]
    fn archive_without_document_part_fails() {
        let bytes = crate::fixtures::pptx_fixture(&[vec!["not a word file"]]);
        let err = WordExtractor.extract(&bytes, Some("deck.docx")).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }
}
