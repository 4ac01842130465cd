use anyhow::{bail, Context};
use blobflow_core::{Table, Value};
use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Each child of the root element is a row. Row attributes and the text of
/// the row's child elements become columns, named after the attribute or
/// element (namespace prefixes dropped).
pub(super) fn parse(bytes: &[u8]) -> anyhow::Result<Table> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut columns: Vec<String> = Vec::new();
    let mut rows: Vec<IndexMap<String, String>> = Vec::new();

    let mut depth = 0usize;
    let mut field: Option<String> = None;
    let mut saw_root = false;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .with_context(|| format!("XML error at byte {}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => {
                depth += 1;
                match depth {
                    1 => saw_root = true,
                    2 => rows.push(row_attributes(&e, &mut columns)?),
                    3 => {
                        let name = local_name(&e);
                        note_column(&mut columns, &name);
                        field = Some(name);
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => match depth + 1 {
                1 => saw_root = true,
                2 => rows.push(row_attributes(&e, &mut columns)?),
                3 => {
                    let name = local_name(&e);
                    note_column(&mut columns, &name);
                    if let Some(row) = rows.last_mut() {
                        row.entry(name).or_default();
                    }
                }
                _ => {}
            },
            Event::Text(t) if depth == 3 => {
                let text = t.unescape().context("unescaping XML text")?;
                if let (Some(name), Some(row)) = (&field, rows.last_mut()) {
                    row.entry(name.clone()).or_default().push_str(&text);
                }
            }
            Event::CData(t) if depth == 3 => {
                let text = String::from_utf8_lossy(&t).into_owned();
                if let (Some(name), Some(row)) = (&field, rows.last_mut()) {
                    row.entry(name.clone()).or_default().push_str(&text);
                }
            }
            Event::End(_) => {
                if depth == 3 {
                    if let (Some(name), Some(row)) = (field.take(), rows.last_mut()) {
                        row.entry(name).or_default();
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        bail!("document has no root element");
    }

    let table = Table::new(columns.clone()).with_rows(rows.into_iter().map(|row| {
        columns
            .iter()
            .map(|c| row.get(c).map(|v| Value::infer(v)).unwrap_or(Value::Null))
            .collect()
    }));
    Ok(table)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn note_column(columns: &mut Vec<String>, name: &str) {
    if !columns.iter().any(|c| c == name) {
        columns.push(name.to_string());
    }
}

fn row_attributes(e: &BytesStart<'_>, columns: &mut Vec<String>) -> anyhow::Result<IndexMap<String, String>> {
    let mut row = IndexMap::new();
    for attr in e.attributes() {
        let attr = attr.context("malformed XML attribute")?;
        let key = attr.key.local_name();
        let name = String::from_utf8_lossy(key.as_ref()).into_owned();
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let value = attr.unescape_value().context("unescaping XML attribute")?;
        note_column(columns, &name);
        row.insert(name, value.into_owned());
    }
    Ok(row)
}
