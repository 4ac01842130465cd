use std::io::Cursor;

use blobflow_core::{BlobError, BlobResult, DocumentFormat};
use calamine::{open_workbook_auto_from_rs, Data, Reader};

use super::{describe, FormatExtractor};

/// Workbooks: one block per sheet, headed by the sheet name, one line per
/// non-empty row with cells separated by tabs.
pub struct SpreadsheetExtractor;

impl FormatExtractor for SpreadsheetExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Spreadsheet
    }

    fn extract(&self, bytes: &[u8], filename_hint: Option<&str>) -> BlobResult<String> {
        if bytes.is_empty() {
            return Ok(String::new());
        }
        let fail = |cause: String| {
            BlobError::extraction(self.format(), format!("{}: {}", describe(filename_hint), cause))
        };

        let mut workbook =
            open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| fail(e.to_string()))?;

        let mut blocks = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| fail(e.to_string()))?;
            let lines: Vec<String> = range
                .rows()
                .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
                .map(|row| {
                    row.iter()
                        .map(|c| c.to_string())
                        .collect::<Vec<_>>()
                        .join("\t")
                        .trim_end()
                        .to_string()
                })
                .collect();
            if !lines.is_empty() {
                blocks.push(format!("{}\n{}", name, lines.join("\n")));
            }
        }
        Ok(blocks.join("\n\n"))
    }
}
