//! Blob data loader
//!
//! `load` turns a blob's bytes into a [`Table`] (or one table per sheet for
//! workbooks), picking the parser from the declared content type. It touches
//! neither the network nor the filesystem.

mod columnar;
mod delimited;
mod html;
mod json;
mod workbook;
mod xml;

use blobflow_core::{BlobError, BlobResult, LoadedData, Table};

use crate::content_type::{resolve, ParserKind};

pub use workbook::sheet_names;

/// Parse `bytes` according to `content_type`.
///
/// For Excel content `sheet_name` selects one sheet; without it every sheet
/// is returned keyed by name. Other parsers ignore `sheet_name`.
pub fn load(bytes: &[u8], content_type: &str, sheet_name: Option<&str>) -> BlobResult<LoadedData> {
    let kind = resolve(content_type);
    let malformed = |e: anyhow::Error| BlobError::malformed(content_type, bytes.len(), e);

    let data = match kind {
        ParserKind::Unsupported => {
            return Err(BlobError::UnsupportedContentType(content_type.to_string()))
        }
        ParserKind::Excel => return workbook::parse(bytes, content_type, sheet_name),
        ParserKind::Csv => LoadedData::Table(delimited::parse(bytes).map_err(malformed)?),
        ParserKind::Json => LoadedData::Table(json::parse(bytes).map_err(malformed)?),
        ParserKind::Parquet => LoadedData::Table(columnar::parse(bytes).map_err(malformed)?),
        ParserKind::Html => LoadedData::Table(html::parse(bytes).map_err(malformed)?),
        ParserKind::Xml => LoadedData::Table(xml::parse(bytes).map_err(malformed)?),
    };

    if let LoadedData::Table(table) = &data {
        tracing::debug!(
            parser = %kind,
            byte_len = bytes.len(),
            rows = table.row_count(),
            columns = table.column_count(),
            "Blob parsed into table"
        );
    }
    Ok(data)
}

/// Load and require a single table (sheet given, or a non-workbook format).
pub fn load_table(bytes: &[u8], content_type: &str, sheet_name: Option<&str>) -> BlobResult<Table> {
    match load(bytes, content_type, sheet_name)? {
        LoadedData::Table(table) => Ok(table),
        LoadedData::Sheets(mut sheets) => {
            // No sheet requested: fall back to the first one.
            sheets
                .shift_remove_index(0)
                .map(|(_, table)| table)
                .ok_or_else(|| BlobError::SheetNotFound("<first sheet>".to_string()))
        }
    }
}

/// Keep Spark-style `part*.parquet` output files, preserving order.
pub fn filter_parquet_part_files<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| {
            let file = name.rsplit('/').next().unwrap_or(name);
            file.starts_with("part") && file.ends_with(".parquet")
        })
        .map(str::to_string)
        .collect()
}

/// Header used for a column with an empty name.
pub(crate) fn unnamed_column(index: usize) -> String {
    format!("Unnamed: {}", index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobflow_core::Value;

    #[test]
    fn unsupported_content_type_is_rejected() {
        let err = load(b"a,b\n1,2\n", "text/plain", None).unwrap_err();
        assert!(matches!(err, BlobError::UnsupportedContentType(ct) if ct == "text/plain"));
    }

    #[test]
    fn malformed_payload_carries_diagnostics() {
        let err = load(b"{not json", "application/json", None).unwrap_err();
        match err {
            BlobError::MalformedContent {
                content_type,
                byte_len,
                ..
            } => {
                assert_eq!(content_type, "application/json");
                assert_eq!(byte_len, 9);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn csv_loads_as_single_table() {
        let table = load_table(b"id,name\n1,Alice\n2,Bob\n", "text/csv", None).unwrap();
        assert_eq!(table.columns(), ["id", "name"]);
        assert_eq!(table.cell(1, "name"), Some(&Value::Text("Bob".to_string())));
    }

    #[test]
    fn part_files_are_filtered() {
        let names = [
            "out/_SUCCESS",
            "out/part-00000-abc.snappy.parquet",
            "out/part-00001-abc.snappy.parquet",
            "out/metadata.parquet",
            "part-00002.csv",
        ];
        assert_eq!(
            filter_parquet_part_files(&names),
            vec![
                "out/part-00000-abc.snappy.parquet".to_string(),
                "out/part-00001-abc.snappy.parquet".to_string()
            ]
        );
    }
}
