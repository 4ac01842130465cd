//! In-memory tabular data parsed from blobs.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Infer a typed value from raw text the way CSV-style readers do:
    /// empty is null, then integer, float, boolean, and finally text.
    /// Surrounding whitespace is dropped for every kind.
    pub fn infer(raw: &str) -> Value {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        if trimmed.bytes().any(|b| b.is_ascii_digit()) {
            if let Ok(f) = trimmed.parse::<f64>() {
                return Value::Float(f);
            }
        }
        match trimmed {
            "true" | "True" | "TRUE" => Value::Bool(true),
            "false" | "False" | "FALSE" => Value::Bool(false),
            _ => Value::Text(trimmed.to_string()),
        }
    }

    /// Floats with no fractional part collapse to integers.
    pub fn from_f64(f: f64) -> Value {
        if f.fract() == 0.0 && f.is_finite() && f.abs() < 9.0e15 {
            Value::Int(f as i64)
        } else {
            Value::Float(f)
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Row/column table. Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding with nulls or truncating so it fits the header.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn with_rows<I>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        for row in rows {
            self.push_row(row);
        }
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }
}

/// What the blob data loader produces: one table, or one table per workbook sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LoadedData {
    Table(Table),
    Sheets(IndexMap<String, Table>),
}

impl LoadedData {
    pub fn into_table(self) -> Option<Table> {
        match self {
            LoadedData::Table(t) => Some(t),
            LoadedData::Sheets(_) => None,
        }
    }

    pub fn into_sheets(self) -> Option<IndexMap<String, Table>> {
        match self {
            LoadedData::Sheets(s) => Some(s),
            LoadedData::Table(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_picks_the_narrowest_type() {
        assert_eq!(Value::infer(""), Value::Null);
        assert_eq!(Value::infer(" 42 "), Value::Int(42));
        assert_eq!(Value::infer("2.5"), Value::Float(2.5));
        assert_eq!(Value::infer("True"), Value::Bool(true));
        assert_eq!(Value::infer("Alice"), Value::Text("Alice".to_string()));
        // "nan"/"inf" have no digits and stay text
        assert_eq!(Value::infer("inf"), Value::Text("inf".to_string()));
    }

    #[test]
    fn infer_trims_text_like_numbers() {
        assert_eq!(Value::infer(" 1"), Value::Int(1));
        assert_eq!(Value::infer(" Alice "), Value::Text("Alice".to_string()));
        assert_eq!(Value::infer("New York"), Value::Text("New York".to_string()));
    }

    #[test]
    fn integral_floats_collapse_to_ints() {
        assert_eq!(Value::from_f64(3.0), Value::Int(3));
        assert_eq!(Value::from_f64(3.25), Value::Float(3.25));
    }

    #[test]
    fn push_row_fits_rows_to_header() {
        let mut table = Table::new(vec!["id".to_string(), "name".to_string()]);
        table.push_row(vec![Value::Int(1)]);
        table.push_row(vec![Value::Int(2), "Bob".into(), "extra".into()]);

        assert_eq!(table.rows()[0], vec![Value::Int(1), Value::Null]);
        assert_eq!(table.rows()[1].len(), 2);
        assert_eq!(table.cell(1, "name"), Some(&Value::Text("Bob".to_string())));
        assert_eq!(
            table.column("id"),
            Some(vec![&Value::Int(1), &Value::Int(2)])
        );
    }
}
