use anyhow::Context;
use blobflow_core::{Table, Value};

use super::unnamed_column;

/// Comma separated text with a header row. Rows must match the header width.
pub(super) fn parse(bytes: &[u8]) -> anyhow::Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let columns = reader
        .headers()
        .context("reading CSV header")?
        .iter()
        .enumerate()
        .map(|(i, h)| if h.is_empty() { unnamed_column(i) } else { h.to_string() })
        .collect();
    let mut table = Table::new(columns);

    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading CSV record {}", line + 1))?;
        table.push_row(record.iter().map(Value::infer).collect());
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_cell_types() {
        let table = parse(b"id,score,name,active\n1,2.5,Alice,true\n2,,Bob,false\n").unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.rows()[0],
            vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::Text("Alice".into()),
                Value::Bool(true)
            ]
        );
        assert!(table.cell(1, "score").unwrap().is_null());
    }

    #[test]
    fn ragged_rows_are_an_error() {
        assert!(parse(b"a,b\n1,2,3\n").is_err());
    }
}
