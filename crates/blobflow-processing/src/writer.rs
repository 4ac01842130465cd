//! Table writers (CSV, JSON records, Parquet).

use std::fmt;
use std::sync::Arc;

use arrow_array::{ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use blobflow_core::{BlobError, BlobResult, Table, Value};
use parquet::arrow::ArrowWriter;
use serde_json::{Map, Value as Json};

use crate::content_type;

/// Output format for [`crate::writer`] functions and table uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Json,
    Parquet,
}

impl TableFormat {
    /// Content type under which the written bytes load back into a table.
    pub fn content_type(self) -> &'static str {
        match self {
            TableFormat::Csv => content_type::CSV,
            TableFormat::Json => content_type::JSON,
            TableFormat::Parquet => content_type::PARQUET,
        }
    }

    pub fn write(self, table: &Table) -> BlobResult<Vec<u8>> {
        match self {
            TableFormat::Csv => write_csv(table),
            TableFormat::Json => write_json(table),
            TableFormat::Parquet => write_parquet(table),
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableFormat::Csv => f.write_str("csv"),
            TableFormat::Json => f.write_str("json"),
            TableFormat::Parquet => f.write_str("parquet"),
        }
    }
}

fn write_error(format: TableFormat, e: impl fmt::Display) -> BlobError {
    BlobError::Backend(format!("writing {} table: {}", format, e))
}

pub fn write_csv(table: &Table) -> BlobResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(table.columns())
        .map_err(|e| write_error(TableFormat::Csv, e))?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(|v| v.to_string()))
            .map_err(|e| write_error(TableFormat::Csv, e))?;
    }
    writer
        .into_inner()
        .map_err(|e| write_error(TableFormat::Csv, e))
}

/// Array of records, columns in table order.
pub fn write_json(table: &Table) -> BlobResult<Vec<u8>> {
    let records: Vec<Json> = table
        .rows()
        .iter()
        .map(|row| {
            let record: Map<String, Json> = table
                .columns()
                .iter()
                .cloned()
                .zip(row.iter().map(to_json))
                .collect();
            Json::Object(record)
        })
        .collect();
    serde_json::to_vec(&records).map_err(|e| write_error(TableFormat::Json, e))
}

fn to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Text(s) => Json::String(s.clone()),
    }
}

/// Column types are inferred from the cells: all-integer columns become
/// Int64, numeric columns Float64, boolean columns Boolean, anything else Utf8.
pub fn write_parquet(table: &Table) -> BlobResult<Vec<u8>> {
    let mut fields = Vec::with_capacity(table.column_count());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.column_count());

    for (idx, name) in table.columns().iter().enumerate() {
        let cells: Vec<&Value> = table.rows().iter().map(|row| &row[idx]).collect();
        let (data_type, array) = column_array(&cells);
        fields.push(Field::new(name, data_type, true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays)
        .map_err(|e| write_error(TableFormat::Parquet, e))?;

    let mut writer = ArrowWriter::try_new(Vec::new(), schema, None)
        .map_err(|e| write_error(TableFormat::Parquet, e))?;
    writer
        .write(&batch)
        .map_err(|e| write_error(TableFormat::Parquet, e))?;
    writer
        .into_inner()
        .map_err(|e| write_error(TableFormat::Parquet, e))
}

fn column_array(cells: &[&Value]) -> (DataType, ArrayRef) {
    let non_null = || cells.iter().filter(|v| !v.is_null());

    if non_null().all(|v| matches!(v, Value::Int(_))) && non_null().next().is_some() {
        let array: Int64Array = cells
            .iter()
            .map(|v| match v {
                Value::Int(i) => Some(*i),
                _ => None,
            })
            .collect();
        return (DataType::Int64, Arc::new(array));
    }
    if non_null().all(|v| matches!(v, Value::Int(_) | Value::Float(_))) && non_null().next().is_some() {
        let array: Float64Array = cells
            .iter()
            .map(|v| match v {
                Value::Int(i) => Some(*i as f64),
                Value::Float(f) => Some(*f),
                _ => None,
            })
            .collect();
        return (DataType::Float64, Arc::new(array));
    }
    if non_null().all(|v| matches!(v, Value::Bool(_))) && non_null().next().is_some() {
        let array: BooleanArray = cells
            .iter()
            .map(|v| match v {
                Value::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        return (DataType::Boolean, Arc::new(array));
    }

    let array: StringArray = cells
        .iter()
        .map(|v| (!v.is_null()).then(|| v.to_string()))
        .collect();
    (DataType::Utf8, Arc::new(array))
}
