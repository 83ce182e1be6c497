//! Reversible integer encoding of categorical columns.
//!
//! Codes follow the label-encoder convention: the distinct non-missing values
//! of a column are sorted ascending and each value's code is its position in
//! that list. A codec is built whole by [`CategoricalCodec::fit`] and never
//! changes afterwards; fitting again means building a new codec.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result as AnyResult, anyhow};
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::{MissingIdentity, ReconcileConfig, RowIdentityPolicy},
    data::{Value, fold_zero},
    error::{ReconcileError, Result},
    frame::{Column, Table},
    schema::ColumnType,
};

const CODEC_VERSION: u32 = 1;

/// Distinct original values of one column in code order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeTable {
    datatype: ColumnType,
    classes: Vec<Value>,
}

impl CodeTable {
    pub fn fit(column: &Column) -> Self {
        let mut classes: Vec<Value> = column
            .present()
            .map(|value| match value {
                Value::Float(f) => Value::Float(fold_zero(*f)),
                other => other.clone(),
            })
            .sorted()
            .collect();
        classes.dedup();
        Self {
            datatype: column.datatype,
            classes,
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[Value] {
        &self.classes
    }

    /// Type tag of the column the table was fitted on.
    pub fn datatype(&self) -> ColumnType {
        self.datatype
    }

    pub fn code_of(&self, value: &Value) -> Option<i64> {
        self.classes
            .binary_search(value)
            .ok()
            .and_then(|idx| i64::try_from(idx).ok())
    }

    pub fn value_of(&self, code: i64) -> Option<&Value> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| self.classes.get(idx))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoricalCodec {
    version: u32,
    tables: Vec<(String, CodeTable)>,
    row_identity: Option<RowIdentityPolicy>,
}

impl CategoricalCodec {
    /// Builds one code table per configured categorical column of `reference`.
    pub fn fit(config: &ReconcileConfig, reference: &Table) -> Result<Self> {
        config.validate()?;
        let mut tables = Vec::with_capacity(config.categorical_columns.len());
        for name in &config.categorical_columns {
            let column = reference
                .column(name)
                .ok_or_else(|| ReconcileError::SchemaMismatch {
                    column: name.clone(),
                    context: "reference table",
                })?;
            let codes = CodeTable::fit(column);
            debug!("Fitted {} class(es) for column '{}'", codes.len(), name);
            tables.push((name.clone(), codes));
        }
        Ok(Self {
            version: CODEC_VERSION,
            tables,
            row_identity: config.row_identity.clone(),
        })
    }

    /// Fits on `reference` and returns the codec together with the encoded
    /// reference.
    pub fn fit_transform(config: &ReconcileConfig, reference: &Table) -> Result<(Self, Table)> {
        let codec = Self::fit(config, reference)?;
        let encoded = codec.transform(reference)?;
        Ok((codec, encoded))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|(name, _)| name.as_str())
    }

    pub fn code_table(&self, column: &str) -> Option<&CodeTable> {
        self.tables
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, codes)| codes)
    }

    pub fn row_identity(&self) -> Option<&RowIdentityPolicy> {
        self.row_identity.as_ref()
    }

    /// Same code tables with a different row identity rule for `decode`.
    pub fn with_row_identity(mut self, policy: Option<RowIdentityPolicy>) -> Self {
        self.row_identity = policy;
        self
    }

    /// Replaces categorical values with their codes. Missing cells stay
    /// missing.
    pub fn transform(&self, table: &Table) -> Result<Table> {
        let mut encoded = table.clone();
        for (name, codes) in &self.tables {
            let column = encoded
                .column_mut(name)
                .ok_or_else(|| ReconcileError::SchemaMismatch {
                    column: name.clone(),
                    context: "table to encode",
                })?;
            for value in column.values.iter_mut().flatten() {
                let code = codes
                    .code_of(value)
                    .ok_or_else(|| ReconcileError::UnseenCategory {
                        column: name.clone(),
                        value: value.as_display(),
                    })?;
                *value = Value::Integer(code);
            }
            column.datatype = ColumnType::Integer;
        }
        Ok(encoded)
    }

    /// Replaces codes with their original values, then applies the row
    /// identity rule.
    pub fn decode(&self, table: &Table) -> Result<Table> {
        let mut decoded = table.clone();
        for (name, codes) in &self.tables {
            info!("Decoding column {name}");
            let column = decoded
                .column_mut(name)
                .ok_or_else(|| ReconcileError::SchemaMismatch {
                    column: name.clone(),
                    context: "table to decode",
                })?;
            for value in column.values.iter_mut().flatten() {
                let original = match value {
                    Value::Integer(code) => codes.value_of(*code),
                    _ => None,
                }
                .ok_or_else(|| ReconcileError::InvalidCode {
                    column: name.clone(),
                    value: value.as_display(),
                    classes: codes.len(),
                })?
                .clone();
                *value = original;
            }
            column.datatype = codes.datatype();
        }
        self.apply_row_identity(&mut decoded);
        Ok(decoded)
    }

    fn apply_row_identity(&self, table: &mut Table) {
        let Some(policy) = &self.row_identity else {
            return;
        };
        if policy.on_missing == MissingIdentity::Keep {
            return;
        }
        let Some(column) = table.column(&policy.column) else {
            warn!(
                "Row identity column '{}' not present; no rows dropped",
                policy.column
            );
            return;
        };
        let keep: Vec<bool> = column
            .values
            .iter()
            .map(|cell| !is_missing(cell.as_ref()))
            .collect();
        let dropped = keep.iter().filter(|flag| !**flag).count();
        if dropped > 0 {
            table.retain_rows(&keep);
            info!(
                "Dropped {} row(s) with missing '{}'",
                dropped, policy.column
            );
        }
    }

    pub fn save(&self, path: &Path) -> AnyResult<()> {
        let file = File::create(path).with_context(|| format!("Creating codec file {path:?}"))?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())
            .context("Writing codec file")?;
        writer.flush().context("Flushing codec file")
    }

    pub fn load(path: &Path) -> AnyResult<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("Opening codec file {path:?}"))?;
        let (codec, _): (CategoricalCodec, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .context("Reading codec file")?;
        if codec.version != CODEC_VERSION {
            return Err(anyhow!(
                "Unsupported codec version {} (expected {CODEC_VERSION})",
                codec.version
            ));
        }
        Ok(codec)
    }
}

fn is_missing(cell: Option<&Value>) -> bool {
    match cell {
        None => true,
        Some(Value::Float(f)) => f.is_nan(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Table {
        Table::new(vec![
            Column::strings("device", ["web", "android", "ios", "android"]),
            Column::integers("age", [30, 41, 25, 19]),
        ])
        .unwrap()
    }

    #[test]
    fn code_table_sorts_distinct_values() {
        let table = devices();
        let codes = CodeTable::fit(table.column("device").unwrap());
        assert_eq!(codes.len(), 3);
        assert_eq!(
            codes.code_of(&Value::String("android".to_string())),
            Some(0)
        );
        assert_eq!(codes.code_of(&Value::String("ios".to_string())), Some(1));
        assert_eq!(codes.code_of(&Value::String("web".to_string())), Some(2));
        assert_eq!(codes.value_of(3), None);
        assert_eq!(codes.value_of(-1), None);
    }

    #[test]
    fn code_table_ignores_missing_cells() {
        let column = Column::new(
            "device",
            ColumnType::String,
            vec![None, Some(Value::String("ios".to_string())), None],
        );
        let codes = CodeTable::fit(&column);
        assert_eq!(codes.classes(), &[Value::String("ios".to_string())]);
    }

    #[test]
    fn transform_switches_tag_to_integer() {
        let config = ReconcileConfig::new(["device"]).without_row_identity();
        let (codec, encoded) = CategoricalCodec::fit_transform(&config, &devices()).unwrap();
        let column = encoded.column("device").unwrap();
        assert_eq!(column.datatype, ColumnType::Integer);
        assert_eq!(
            column.values,
            vec![
                Some(Value::Integer(2)),
                Some(Value::Integer(0)),
                Some(Value::Integer(1)),
                Some(Value::Integer(0)),
            ]
        );
        assert_eq!(codec.columns().collect::<Vec<_>>(), vec!["device"]);
    }

    #[test]
    fn code_table_merges_signed_zeros() {
        let column = Column::floats("offset", [0.0, -0.0, 1.0]);
        let codes = CodeTable::fit(&column);
        assert_eq!(codes.len(), 2);
        assert!(matches!(codes.classes()[0], Value::Float(f) if f.is_sign_positive()));
        assert_eq!(codes.code_of(&Value::Float(-0.0)), Some(0));
        assert_eq!(codes.code_of(&Value::Float(1.0)), Some(1));

        let negative_only = CodeTable::fit(&Column::floats("offset", [-0.0, 1.0]));
        assert_eq!(negative_only.code_of(&Value::Float(0.0)), Some(0));
    }

    #[test]
    fn decode_rejects_float_codes() {
        let config = ReconcileConfig::new(["device"]).without_row_identity();
        let codec = CategoricalCodec::fit(&config, &devices()).unwrap();
        let table = Table::new(vec![Column::floats("device", [1.0])]).unwrap();
        let err = codec.decode(&table).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidCode { classes: 3, .. }));
    }

    #[test]
    fn nan_identity_counts_as_missing() {
        assert!(is_missing(Some(&Value::Float(f64::NAN))));
        assert!(is_missing(None));
        assert!(!is_missing(Some(&Value::Integer(0))));
    }
}
