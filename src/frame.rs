//! In-memory tables of typed, nullable cells.
//!
//! A [`Table`] is an ordered list of uniquely named [`Column`]s of equal
//! length. Each column carries the [`ColumnType`] tag it was built with;
//! operations that change cell storage (encoding, casting) update the tag.

use std::path::Path;

use anyhow::{Context, Result as AnyResult};
use encoding_rs::Encoding;

use crate::{
    data::{Value, parse_typed_value},
    error::{ReconcileError, Result},
    io_utils,
    schema::{ColumnType, Schema},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub datatype: ColumnType,
    pub values: Vec<Option<Value>>,
}

impl Column {
    pub fn new(name: impl Into<String>, datatype: ColumnType, values: Vec<Option<Value>>) -> Self {
        Self {
            name: name.into(),
            datatype,
            values,
        }
    }

    pub fn integers<I>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let values = values.into_iter().map(|v| Some(Value::Integer(v))).collect();
        Self::new(name, ColumnType::Integer, values)
    }

    pub fn floats<I>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let values = values.into_iter().map(|v| Some(Value::Float(v))).collect();
        Self::new(name, ColumnType::Float, values)
    }

    pub fn strings<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|v| Some(Value::String(v.into())))
            .collect();
        Self::new(name, ColumnType::String, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Non-missing cells in row order.
    pub fn present(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().flatten()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let expected = columns.first().map(Column::len).unwrap_or_default();
        for (idx, column) in columns.iter().enumerate() {
            if column.len() != expected {
                return Err(ReconcileError::RaggedColumn {
                    column: column.name.clone(),
                    expected,
                    found: column.len(),
                });
            }
            if columns[..idx].iter().any(|other| other.name == column.name) {
                return Err(ReconcileError::DuplicateColumn(column.name.clone()));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or_default()
    }

    /// Cells of row `idx` in column order.
    pub fn row(&self, idx: usize) -> Option<Vec<Option<&Value>>> {
        (idx < self.row_count()).then(|| {
            self.columns
                .iter()
                .map(|column| column.values[idx].as_ref())
                .collect()
        })
    }

    /// Keeps rows whose flag is true, preserving order.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        for column in &mut self.columns {
            let mut flags = keep.iter();
            column
                .values
                .retain(|_| flags.next().copied().unwrap_or(true));
        }
    }

    /// Loads a headed CSV file, typing each column from `schema`.
    pub fn read_csv(
        path: &Path,
        schema: &Schema,
        delimiter: u8,
        encoding: &'static Encoding,
    ) -> AnyResult<Self> {
        let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        let headers = io_utils::reader_headers(&mut reader, encoding)?;
        schema
            .validate_headers(&headers)
            .with_context(|| format!("Validating headers for {path:?}"))?;

        let mut columns: Vec<Column> = schema
            .columns
            .iter()
            .map(|meta| Column::new(meta.name.clone(), meta.datatype, Vec::new()))
            .collect();
        for (row_idx, record) in reader.byte_records().enumerate() {
            let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
            let decoded = io_utils::decode_record(&record, encoding)?;
            for (column, raw) in columns.iter_mut().zip(decoded.iter()) {
                let value = parse_typed_value(raw, &column.datatype).with_context(|| {
                    format!("Row {} column '{}'", row_idx + 2, column.name)
                })?;
                column.values.push(value);
            }
        }
        Ok(Table::new(columns)?)
    }

    /// Writes the table as CSV; missing cells become empty fields.
    pub fn write_csv(
        &self,
        path: Option<&Path>,
        delimiter: u8,
        encoding: &'static Encoding,
    ) -> AnyResult<()> {
        let mut writer = io_utils::open_csv_writer(path, delimiter, encoding)?;
        writer
            .write_record(self.columns.iter().map(|c| c.name.as_str()))
            .context("Writing output headers")?;
        for row_idx in 0..self.row_count() {
            let record = self.columns.iter().map(|column| {
                column.values[row_idx]
                    .as_ref()
                    .map(Value::as_display)
                    .unwrap_or_default()
            });
            writer
                .write_record(record)
                .with_context(|| format!("Writing output row {}", row_idx + 2))?;
        }
        writer.flush().context("Flushing output writer")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::infer_schema;
    use encoding_rs::UTF_8;
    use tempfile::tempdir;

    #[test]
    fn new_rejects_ragged_columns() {
        let err = Table::new(vec![
            Column::integers("a", [1, 2]),
            Column::integers("b", [1]),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::RaggedColumn {
                expected: 2,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn new_rejects_duplicate_names() {
        let err = Table::new(vec![
            Column::integers("a", [1]),
            Column::floats("a", [1.0]),
        ])
        .unwrap_err();
        assert!(matches!(err, ReconcileError::DuplicateColumn(name) if name == "a"));
    }

    #[test]
    fn retain_rows_keeps_order_across_columns() {
        let mut table = Table::new(vec![
            Column::integers("id", [1, 2, 3, 4]),
            Column::strings("tag", ["a", "b", "c", "d"]),
        ])
        .unwrap();
        table.retain_rows(&[true, false, true, false]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.column("tag").unwrap().values,
            vec![
                Some(Value::String("a".to_string())),
                Some(Value::String("c".to_string()))
            ]
        );
        assert_eq!(
            table.row(1).unwrap(),
            vec![Some(&Value::Integer(3)), Some(&Value::String("c".to_string()))]
        );
    }

    #[test]
    fn written_float_columns_reload_as_float() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("restored.csv");
        let table = Table::new(vec![
            Column::floats("duration", [99.0, 12.5]),
            Column::integers("age", [18, 99]),
        ])
        .unwrap();
        table.write_csv(Some(&path), b',', UTF_8).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("99.0,18"));
        let schema = infer_schema(&path, 0, b',', UTF_8).unwrap();
        let reloaded = Table::read_csv(&path, &schema, b',', UTF_8).unwrap();
        assert_eq!(reloaded, table);
    }
}
