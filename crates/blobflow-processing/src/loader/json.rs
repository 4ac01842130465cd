use anyhow::{bail, Context};
use blobflow_core::{Table, Value};
use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

/// Accepts the three common table layouts:
/// records (`[{"a": 1}, ...]`), column lists (`{"a": [1, ...]}`) and
/// column maps keyed by row label (`{"a": {"0": 1, ...}}`).
pub(super) fn parse(bytes: &[u8]) -> anyhow::Result<Table> {
    let document: Json = serde_json::from_slice(bytes).context("parsing JSON document")?;

    match document {
        Json::Array(records) => from_records(records),
        Json::Object(columns) => from_columns(columns),
        other => bail!("expected a JSON array or object, found {}", kind_name(&other)),
    }
}

fn from_records(records: Vec<Json>) -> anyhow::Result<Table> {
    let mut columns: Vec<String> = Vec::new();
    let mut rows: Vec<Map<String, Json>> = Vec::with_capacity(records.len());

    for (i, record) in records.into_iter().enumerate() {
        let Json::Object(fields) = record else {
            bail!("record {} is not a JSON object", i);
        };
        for key in fields.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
        rows.push(fields);
    }

    let table = Table::new(columns.clone()).with_rows(rows.into_iter().map(|mut fields| {
        columns
            .iter()
            .map(|c| fields.remove(c).map(scalar).unwrap_or(Value::Null))
            .collect()
    }));
    Ok(table)
}

fn from_columns(columns: Map<String, Json>) -> anyhow::Result<Table> {
    let names: Vec<String> = columns.keys().cloned().collect();

    // Row labels in first-seen order; for column lists the label is the position.
    let mut labels: IndexMap<String, usize> = IndexMap::new();
    let mut cells: Vec<IndexMap<String, Value>> = Vec::with_capacity(names.len());

    for (name, column) in columns {
        let mut by_label = IndexMap::new();
        match column {
            Json::Array(values) => {
                for (i, v) in values.into_iter().enumerate() {
                    by_label.insert(i.to_string(), scalar(v));
                }
            }
            Json::Object(values) => {
                for (label, v) in values {
                    by_label.insert(label, scalar(v));
                }
            }
            other => bail!("column '{}' is a {}, expected array or object", name, kind_name(&other)),
        }
        for label in by_label.keys() {
            let next = labels.len();
            labels.entry(label.clone()).or_insert(next);
        }
        cells.push(by_label);
    }

    let table = Table::new(names).with_rows(labels.keys().map(|label| {
        cells
            .iter()
            .map(|column| column.get(label).cloned().unwrap_or(Value::Null))
            .collect()
    }));
    Ok(table)
}

fn scalar(value: Json) -> Value {
    match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        Json::String(s) => Value::Text(s),
        nested => Value::Text(nested.to_string()),
    }
}

fn kind_name(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
