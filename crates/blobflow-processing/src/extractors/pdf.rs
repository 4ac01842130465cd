use blobflow_core::{BlobError, BlobResult, DocumentFormat};

use super::{describe, FormatExtractor};

pub struct PdfExtractor;

impl FormatExtractor for PdfExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn extract(&self, bytes: &[u8], filename_hint: Option<&str>) -> BlobResult<String> {
        if bytes.is_empty() {
            return Ok(String::new());
        }
        if !bytes.starts_with(b"%PDF") {
            return Err(BlobError::extraction(
                self.format(),
                format!("{}: missing %PDF header", describe(filename_hint)),
            ));
        }

        // The layout pass panics on some malformed fonts and xref tables.
        let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
            .map_err(|_| {
                BlobError::extraction(
                    self.format(),
                    format!("{}: PDF parser panicked", describe(filename_hint)),
                )
            })?
            .map_err(|e| {
                BlobError::extraction(self.format(), format!("{}: {}", describe(filename_hint), e))
            })?;

        // Drop the blank-line padding the layout pass leaves between pages.
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .collect();
        Ok(lines.join("\n"))
    }
}
