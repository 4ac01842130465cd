use anyhow::{anyhow, Context};
use blobflow_core::{Table, Value};
use scraper::{ElementRef, Html, Selector};

fn selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e}"))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reads the first `<table>` of the document. A leading row made only of
/// `<th>` cells (or the `<thead>` row) is the header; otherwise columns are
/// numbered from 0.
pub(super) fn parse(bytes: &[u8]) -> anyhow::Result<Table> {
    let markup = std::str::from_utf8(bytes).context("HTML is not valid UTF-8")?;
    let document = Html::parse_document(markup);

    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("th, td")?;
    let header_sel = selector("th")?;

    let table = document
        .select(&table_sel)
        .next()
        .context("no <table> element found")?;

    let mut rows: Vec<(bool, Vec<String>)> = table
        .select(&row_sel)
        .map(|row| {
            let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
            let all_header = !cells.is_empty() && row.select(&header_sel).count() == cells.len();
            (all_header, cells.into_iter().map(cell_text).collect::<Vec<String>>())
        })
        .filter(|(_, cells)| !cells.is_empty())
        .collect();

    let columns = match rows.first() {
        Some((true, _)) => rows.remove(0).1,
        Some((false, cells)) => (0..cells.len()).map(|i| i.to_string()).collect(),
        None => Vec::new(),
    };

    Ok(Table::new(columns).with_rows(
        rows.into_iter()
            .map(|(_, cells)| cells.iter().map(|c| Value::infer(c)).collect()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_table_with_header_row() {
        let html = br#"<html><body>
            <table>
              <thead><tr><th>city</th><th>population</th></tr></thead>
              <tbody>
                <tr><td>Oslo</td><td>709037</td></tr>
                <tr><td>Bergen</td><td> 291940 </td></tr>
              </tbody>
            </table>
            <table><tr><th>ignored</th></tr></table>
        </body></html>"#;

        let table = parse(html).unwrap();
        assert_eq!(table.columns(), ["city", "population"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(1, "population"), Some(&Value::Int(291940)));
    }

    #[test]
    fn headerless_table_gets_numbered_columns() {
        let table = parse(b"<table><tr><td>a</td><td>1</td></tr></table>").unwrap();
        assert_eq!(table.columns(), ["0", "1"]);
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn th_row_is_the_header_and_empty_rows_are_skipped() {
        let html = b"<table>\
            <tr><th>name</th><th>active</th></tr>\
            <tr></tr>\
            <tr><td>Ada</td><td>true</td></tr>\
            <tr><td>Alan</td><td>false</td></tr>\
            </table>";

        let table = parse(html).unwrap();
        assert_eq!(table.columns(), ["name", "active"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(0, "name"), Some(&Value::Text("Ada".to_string())));
        assert_eq!(table.cell(1, "active"), Some(&Value::Bool(false)));
    }

    #[test]
    fn document_without_table_is_an_error() {
        assert!(parse(b"<p>nothing here</p>").is_err());
    }
}
