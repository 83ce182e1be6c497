//! Range and type reconciliation of generated tables.
//!
//! A [`RangeAndTypeReconciler`] is built from a reference table (normally the
//! codec-encoded original data) and brings candidate tables back in line with
//! it: every cell is clamped into the reference column's observed range,
//! configured categorical columns are rounded to clean integer codes, and
//! each column is cast back to the semantic type of its reference column.
//! Clamping runs before rounding and rounding before casting, so a value
//! can neither round out of range nor have an out-of-range value hidden by
//! truncation.

use std::fmt;

use log::debug;

use crate::{
    config::{ReconcileConfig, UnclassifiedPolicy},
    data::{Value, fold_zero},
    envelope::ReferenceEnvelope,
    error::{ReconcileError, Result},
    frame::{Column, Table},
    schema::ColumnType,
};

/// 2^63; floats at or above it do not fit i64.
const I64_UPPER_EXCLUSIVE: f64 = 9_223_372_036_854_775_808.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Integer,
    Float,
    Categorical,
    Other,
}

impl SemanticType {
    pub fn classify(datatype: ColumnType) -> Self {
        match datatype {
            ColumnType::Integer => SemanticType::Integer,
            ColumnType::Float => SemanticType::Float,
            ColumnType::String => SemanticType::Categorical,
            ColumnType::Boolean | ColumnType::Date | ColumnType::DateTime => SemanticType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Integer => "integer",
            SemanticType::Float => "float",
            SemanticType::Categorical => "categorical",
            SemanticType::Other => "other",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnClass {
    pub name: String,
    pub datatype: ColumnType,
    pub class: SemanticType,
}

pub struct RangeAndTypeReconciler {
    categorical_columns: Vec<String>,
    unclassified: UnclassifiedPolicy,
    reference: Table,
    classification: Vec<ColumnClass>,
}

impl RangeAndTypeReconciler {
    /// Takes ownership of `reference` and classifies its columns once.
    pub fn new(config: &ReconcileConfig, reference: Table) -> Result<Self> {
        config.validate()?;
        let classification = reference
            .columns()
            .iter()
            .map(|column| ColumnClass {
                name: column.name.clone(),
                datatype: column.datatype,
                class: SemanticType::classify(column.datatype),
            })
            .collect();
        Ok(Self {
            categorical_columns: config.categorical_columns.clone(),
            unclassified: config.unclassified,
            reference,
            classification,
        })
    }

    pub fn classification(&self) -> &[ColumnClass] {
        &self.classification
    }

    pub fn column_class(&self, name: &str) -> Option<&ColumnClass> {
        self.classification.iter().find(|c| c.name == name)
    }

    pub fn reference(&self) -> &Table {
        &self.reference
    }

    /// Observed range of every reference column, computed on each call.
    pub fn envelope(&self) -> ReferenceEnvelope {
        ReferenceEnvelope::from_table(&self.reference)
    }

    /// Clamps, rounds, and re-types a copy of `candidate`. Column order and
    /// row count are unchanged.
    pub fn transform(&self, candidate: &Table) -> Result<Table> {
        let mut output = candidate.clone();

        self.envelope().clamp_table(&mut output)?;

        for name in &self.categorical_columns {
            let column =
                output
                    .column_mut(name)
                    .ok_or_else(|| ReconcileError::SchemaMismatch {
                        column: name.clone(),
                        context: "candidate table",
                    })?;
            cast_column(column, ColumnType::Integer, clean_categorical)?;
        }

        for column in output.columns_mut() {
            let Some(class) = self.column_class(&column.name) else {
                debug!(
                    "Column '{}' absent from reference; passed through",
                    column.name
                );
                continue;
            };
            match class.class {
                SemanticType::Integer | SemanticType::Categorical => {
                    cast_column(column, ColumnType::Integer, cast_integer)?
                }
                SemanticType::Float => cast_column(column, ColumnType::Float, cast_float)?,
                SemanticType::Other => match self.unclassified {
                    UnclassifiedPolicy::PassThrough => {
                        debug!(
                            "Column '{}' has type {} with no cast; passed through",
                            column.name, class.datatype
                        );
                    }
                    UnclassifiedPolicy::Reject => {
                        return Err(ReconcileError::UnclassifiedColumn {
                            column: column.name.clone(),
                            datatype: class.datatype,
                        });
                    }
                },
            }
        }
        Ok(output)
    }
}

/// Rounds half to even and folds `-0.0` into `0.0`.
pub fn round_code(value: f64) -> f64 {
    fold_zero(value.round_ties_even())
}

fn cast_column(
    column: &mut Column,
    target: ColumnType,
    cast: fn(&str, &Value) -> Result<Value>,
) -> Result<()> {
    for value in column.values.iter_mut().flatten() {
        *value = cast(&column.name, value)?;
    }
    column.datatype = target;
    Ok(())
}

fn cast_failed(column: &str, value: &Value, target: &'static str) -> ReconcileError {
    ReconcileError::CastFailed {
        column: column.to_string(),
        value: value.as_display(),
        target,
    }
}

fn float_to_i64(column: &str, value: &Value, f: f64) -> Result<i64> {
    if !f.is_finite() || f < i64::MIN as f64 || f >= I64_UPPER_EXCLUSIVE {
        return Err(cast_failed(column, value, "integer"));
    }
    Ok(f.trunc() as i64)
}

fn clean_categorical(column: &str, value: &Value) -> Result<Value> {
    match value {
        Value::Integer(i) => Ok(Value::Integer(*i)),
        Value::Float(f) => float_to_i64(column, value, round_code(*f)).map(Value::Integer),
        Value::Boolean(b) => Ok(Value::Integer(i64::from(*b))),
        _ => Err(cast_failed(column, value, "categorical code")),
    }
}

fn cast_integer(column: &str, value: &Value) -> Result<Value> {
    match value {
        Value::Integer(i) => Ok(Value::Integer(*i)),
        Value::Float(f) => float_to_i64(column, value, *f).map(Value::Integer),
        Value::Boolean(b) => Ok(Value::Integer(i64::from(*b))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| cast_failed(column, value, "integer")),
        Value::Date(_) | Value::DateTime(_) => Err(cast_failed(column, value, "integer")),
    }
}

fn cast_float(column: &str, value: &Value) -> Result<Value> {
    match value {
        Value::Integer(i) => Ok(Value::Float(*i as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Boolean(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| cast_failed(column, value, "float")),
        Value::Date(_) | Value::DateTime(_) => Err(cast_failed(column, value, "float")),
    }
}
