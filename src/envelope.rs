//! Reference envelope: the observed [min, max] of each reference column, and
//! the saturating clamp that maps candidate cells into it.

use std::cmp::Ordering;

use crate::{
    data::Value,
    error::{ReconcileError, Result},
    frame::{Column, Table},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub min: Value,
    pub max: Value,
}

impl Bounds {
    /// Smallest and largest non-missing cell of `column`; `None` when the
    /// column has no comparable cells.
    pub fn observe(column: &Column) -> Option<Self> {
        let mut bounds: Option<Bounds> = None;
        for value in column.present() {
            // NaN never narrows a range.
            if matches!(value, Value::Float(f) if f.is_nan()) {
                continue;
            }
            bounds = Some(match bounds {
                None => Bounds {
                    min: value.clone(),
                    max: value.clone(),
                },
                Some(mut current) => {
                    if value.compare(&current.min) == Some(Ordering::Less) {
                        current.min = value.clone();
                    }
                    if value.compare(&current.max) == Some(Ordering::Greater) {
                        current.max = value.clone();
                    }
                    current
                }
            });
        }
        bounds
    }

    /// Replaces a value below `min` with `min` and above `max` with `max`.
    /// NaN is left unchanged. A substituted numeric bound takes the storage
    /// kind of the value it replaces.
    pub fn clamp(&self, column: &str, value: &Value) -> Result<Value> {
        if !value.comparable_with(&self.min) {
            return Err(ReconcileError::IncomparableValue {
                column: column.to_string(),
                value: value.as_display(),
                bound: self.min.as_display(),
            });
        }
        if value.compare(&self.min) == Some(Ordering::Less) {
            Ok(self.min.coerce_like(value))
        } else if value.compare(&self.max) == Some(Ordering::Greater) {
            Ok(self.max.coerce_like(value))
        } else {
            Ok(value.clone())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceEnvelope {
    columns: Vec<(String, Bounds)>,
}

impl ReferenceEnvelope {
    pub fn from_table(reference: &Table) -> Self {
        let columns = reference
            .columns()
            .iter()
            .filter_map(|column| Bounds::observe(column).map(|b| (column.name.clone(), b)))
            .collect();
        Self { columns }
    }

    pub fn bounds(&self, column: &str) -> Option<&Bounds> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, bounds)| bounds)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bounds)> {
        self.columns.iter().map(|(name, b)| (name.as_str(), b))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Clamps every column of `table` that has bounds, in place. Columns
    /// without bounds and missing cells are left alone.
    pub fn clamp_table(&self, table: &mut Table) -> Result<()> {
        for column in table.columns_mut() {
            let Some(bounds) = self.bounds(&column.name) else {
                continue;
            };
            for value in column.values.iter_mut().flatten() {
                *value = bounds.clamp(&column.name, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    #[test]
    fn observe_skips_missing_and_nan() {
        let column = Column::new(
            "score",
            ColumnType::Float,
            vec![
                None,
                Some(Value::Float(f64::NAN)),
                Some(Value::Float(2.5)),
                Some(Value::Float(-1.0)),
            ],
        );
        let bounds = Bounds::observe(&column).unwrap();
        assert_eq!(bounds.min, Value::Float(-1.0));
        assert_eq!(bounds.max, Value::Float(2.5));
    }

    #[test]
    fn all_missing_column_has_no_bounds() {
        let column = Column::new("empty", ColumnType::Integer, vec![None, None]);
        assert!(Bounds::observe(&column).is_none());
    }

    #[test]
    fn clamp_saturates_at_bounds() {
        let bounds = Bounds {
            min: Value::Integer(18),
            max: Value::Integer(99),
        };
        assert_eq!(
            bounds.clamp("age", &Value::Integer(10)).unwrap(),
            Value::Integer(18)
        );
        assert_eq!(
            bounds.clamp("age", &Value::Float(150.7)).unwrap(),
            Value::Float(99.0)
        );
        assert_eq!(
            bounds.clamp("age", &Value::Float(50.2)).unwrap(),
            Value::Float(50.2)
        );
        let nan = bounds.clamp("age", &Value::Float(f64::NAN)).unwrap();
        assert!(matches!(nan, Value::Float(f) if f.is_nan()));
    }

    #[test]
    fn clamp_treats_boolean_bounds_as_zero_and_one() {
        let column = Column::new(
            "churned",
            ColumnType::Boolean,
            vec![Some(Value::Boolean(true)), Some(Value::Boolean(false))],
        );
        let bounds = Bounds::observe(&column).unwrap();
        assert_eq!(bounds.min, Value::Boolean(false));
        assert_eq!(
            bounds.clamp("churned", &Value::Float(0.7)).unwrap(),
            Value::Float(0.7)
        );
        assert_eq!(
            bounds.clamp("churned", &Value::Float(1.4)).unwrap(),
            Value::Float(1.0)
        );
        assert_eq!(
            bounds.clamp("churned", &Value::Integer(-3)).unwrap(),
            Value::Integer(0)
        );
    }

    #[test]
    fn clamp_orders_strings_lexicographically() {
        let bounds = Bounds {
            min: Value::String("b".to_string()),
            max: Value::String("d".to_string()),
        };
        assert_eq!(
            bounds.clamp("tag", &Value::String("a".to_string())).unwrap(),
            Value::String("b".to_string())
        );
    }

    #[test]
    fn clamp_rejects_numeric_against_text_bounds() {
        let bounds = Bounds {
            min: Value::String("android".to_string()),
            max: Value::String("web".to_string()),
        };
        let err = bounds.clamp("device", &Value::Float(1.2)).unwrap_err();
        assert!(matches!(err, ReconcileError::IncomparableValue { .. }));
    }
}
