use anyhow::{bail, Context};
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow_array::{Array, ArrayRef, RecordBatch};
use arrow_schema::{DataType, TimeUnit};
use blobflow_core::{Table, Value};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

/// Columns pandas writes for its index; they are not data.
const INDEX_COLUMN_PREFIX: &str = "__index_level_";

pub(super) fn parse(bytes: &[u8]) -> anyhow::Result<Table> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(bytes))
        .context("reading parquet footer")?;

    let schema = builder.schema().clone();
    let keep: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.name().starts_with(INDEX_COLUMN_PREFIX))
        .map(|(i, _)| i)
        .collect();
    let columns = keep.iter().map(|&i| schema.field(i).name().clone()).collect();
    let mut table = Table::new(columns);

    let reader = builder.build().context("building parquet reader")?;
    for batch in reader {
        let batch = batch.context("reading parquet record batch")?;
        append_batch(&mut table, &batch, &keep)?;
    }
    Ok(table)
}

fn append_batch(table: &mut Table, batch: &RecordBatch, keep: &[usize]) -> anyhow::Result<()> {
    let mut columns = Vec::with_capacity(keep.len());
    for &i in keep {
        columns.push(column_values(batch.column(i))?);
    }
    for row in 0..batch.num_rows() {
        table.push_row(columns.iter().map(|c| c[row].clone()).collect());
    }
    Ok(())
}

fn column_values(array: &ArrayRef) -> anyhow::Result<Vec<Value>> {
    let len = array.len();
    let values = match array.data_type() {
        DataType::Null => vec![Value::Null; len],
        DataType::Boolean => {
            let a = array.as_boolean();
            (0..len).map(|i| a.is_valid(i).then(|| Value::Bool(a.value(i)))).map(or_null).collect()
        }
        DataType::Int8 => ints(array.as_primitive::<Int8Type>().iter().map(|v| v.map(i64::from))),
        DataType::Int16 => ints(array.as_primitive::<Int16Type>().iter().map(|v| v.map(i64::from))),
        DataType::Int32 => ints(array.as_primitive::<Int32Type>().iter().map(|v| v.map(i64::from))),
        DataType::Int64 => ints(array.as_primitive::<Int64Type>().iter()),
        DataType::UInt8 => ints(array.as_primitive::<UInt8Type>().iter().map(|v| v.map(i64::from))),
        DataType::UInt16 => ints(array.as_primitive::<UInt16Type>().iter().map(|v| v.map(i64::from))),
        DataType::UInt32 => ints(array.as_primitive::<UInt32Type>().iter().map(|v| v.map(i64::from))),
        DataType::UInt64 => array
            .as_primitive::<UInt64Type>()
            .iter()
            .map(|v| v.map(|u| i64::try_from(u).map(Value::Int).unwrap_or(Value::Float(u as f64))))
            .map(or_null)
            .collect(),
        DataType::Float32 => floats(array.as_primitive::<Float32Type>().iter().map(|v| v.map(f64::from))),
        DataType::Float64 => floats(array.as_primitive::<Float64Type>().iter()),
        DataType::Utf8 => texts(array.as_string::<i32>().iter()),
        DataType::LargeUtf8 => texts(array.as_string::<i64>().iter()),
        DataType::Date32 => {
            let a = array.as_primitive::<Date32Type>();
            (0..len)
                .map(|i| {
                    a.is_valid(i)
                        .then(|| a.value_as_date(i))
                        .flatten()
                        .map(|d| Value::Text(d.to_string()))
                })
                .map(or_null)
                .collect()
        }
        DataType::Timestamp(unit, _) => {
            let stamp = |i: usize| match unit {
                TimeUnit::Second => array.as_primitive::<TimestampSecondType>().value_as_datetime(i),
                TimeUnit::Millisecond => array.as_primitive::<TimestampMillisecondType>().value_as_datetime(i),
                TimeUnit::Microsecond => array.as_primitive::<TimestampMicrosecondType>().value_as_datetime(i),
                TimeUnit::Nanosecond => array.as_primitive::<TimestampNanosecondType>().value_as_datetime(i),
            };
            (0..len)
                .map(|i| {
                    array
                        .is_valid(i)
                        .then(|| stamp(i))
                        .flatten()
                        .map(|dt| Value::Text(dt.to_string()))
                })
                .map(or_null)
                .collect()
        }
        other => bail!("unsupported parquet column type {}", other),
    };
    Ok(values)
}

fn or_null(value: Option<Value>) -> Value {
    value.unwrap_or(Value::Null)
}

fn ints(iter: impl Iterator<Item = Option<i64>>) -> Vec<Value> {
    iter.map(|v| or_null(v.map(Value::Int))).collect()
}

fn floats(iter: impl Iterator<Item = Option<f64>>) -> Vec<Value> {
    iter.map(|v| or_null(v.map(Value::Float))).collect()
}

fn texts<'a>(iter: impl Iterator<Item = Option<&'a str>>) -> Vec<Value> {
    iter.map(|v| or_null(v.map(|s| Value::Text(s.to_string())))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::write_parquet;

    #[test]
    fn garbage_is_rejected() {
        assert!(parse(b"definitely not parquet").is_err());
    }

    #[test]
    fn reads_typed_columns_with_nulls() {
        let source = Table::new(vec!["id".into(), "ratio".into(), "label".into()]).with_rows([
            vec![Value::Int(1), Value::Float(0.5), Value::Text("a".into())],
            vec![Value::Int(2), Value::Null, Value::Null],
        ]);
        let bytes = write_parquet(&source).unwrap();

        let table = parse(&bytes).unwrap();
        assert_eq!(table, source);
    }
}
