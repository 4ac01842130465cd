use std::io::Cursor;

use anyhow::anyhow;
use blobflow_core::{BlobError, BlobResult, LoadedData, Table, Value};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use indexmap::IndexMap;

use super::unnamed_column;

type Workbook = Sheets<Cursor<Vec<u8>>>;

fn open(bytes: &[u8], content_type: &str) -> BlobResult<Workbook> {
    open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| BlobError::malformed(content_type, bytes.len(), anyhow!(e)))
}

/// Sheet names in workbook order.
pub fn sheet_names(bytes: &[u8], content_type: &str) -> BlobResult<Vec<String>> {
    Ok(open(bytes, content_type)?.sheet_names())
}

pub(super) fn parse(bytes: &[u8], content_type: &str, sheet_name: Option<&str>) -> BlobResult<LoadedData> {
    let mut workbook = open(bytes, content_type)?;
    let names = workbook.sheet_names();

    let mut read = |name: &str| -> BlobResult<Table> {
        let range = workbook
            .worksheet_range(name)
            .map_err(|e| BlobError::malformed(content_type, bytes.len(), anyhow!(e)))?;
        Ok(range_to_table(&range))
    };

    match sheet_name {
        Some(wanted) => {
            if !names.iter().any(|n| n == wanted) {
                return Err(BlobError::SheetNotFound(wanted.to_string()));
            }
            Ok(LoadedData::Table(read(wanted)?))
        }
        None => {
            let mut sheets = IndexMap::with_capacity(names.len());
            for name in &names {
                sheets.insert(name.clone(), read(name)?);
            }
            Ok(LoadedData::Sheets(sheets))
        }
    }
}

/// First row is the header; the remaining rows are data.
fn range_to_table(range: &Range<Data>) -> Table {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Table::default();
    };

    let columns = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            Data::Empty => unnamed_column(i),
            other => other.to_string(),
        })
        .collect();

    Table::new(columns).with_rows(rows.map(|row| row.iter().map(cell_value).collect()))
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => Value::from_f64(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => Value::Text(s.clone()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => Value::Text(naive.to_string()),
            None => Value::from_f64(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::xlsx_fixture;

    #[test]
    fn reads_every_sheet_in_order() {
        let bytes = xlsx_fixture(&[
            (
                "Sales",
                vec![vec!["region", "amount"], vec!["north", "10"], vec!["south", "12.5"]],
            ),
            ("Notes", vec![vec!["text"], vec!["hello"]]),
        ]);

        let data = parse(&bytes, crate::content_type::EXCEL_OPENXML, None).unwrap();
        let sheets = data.into_sheets().unwrap();
        assert_eq!(sheets.keys().collect::<Vec<_>>(), vec!["Sales", "Notes"]);

        let sales = &sheets["Sales"];
        assert_eq!(sales.columns(), ["region", "amount"]);
        assert_eq!(sales.cell(0, "amount"), Some(&Value::Int(10)));
        assert_eq!(sales.cell(1, "amount"), Some(&Value::Float(12.5)));
    }

    #[test]
    fn named_sheet_and_missing_sheet() {
        let bytes = xlsx_fixture(&[("Sheet1", vec![vec!["a"], vec!["1"]])]);

        let table = parse(&bytes, crate::content_type::EXCEL_OPENXML, Some("Sheet1"))
            .unwrap()
            .into_table()
            .unwrap();
        assert_eq!(table.row_count(), 1);

        let err = parse(&bytes, crate::content_type::EXCEL_OPENXML, Some("Missing")).unwrap_err();
        assert!(matches!(err, BlobError::SheetNotFound(name) if name == "Missing"));
    }

    #[test]
    fn corrupt_workbook_is_malformed() {
        let err = parse(b"not a zip", crate::content_type::EXCEL_LEGACY, None).unwrap_err();
        assert!(matches!(err, BlobError::MalformedContent { byte_len: 9, .. }));
    }
}
