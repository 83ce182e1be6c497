use std::{cmp::Ordering, fmt};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::schema::ColumnType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// Equality follows [`Ord`]: `-0.0` equals `0.0` and NaN equals NaN, so
/// sorted code tables and lookups agree with `==`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Value {}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            // Debug keeps a fraction on integral floats, so written files
            // re-infer as float.
            Value::Float(f) => format!("{f:?}"),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Numeric reading used for range checks; booleans count as 0 and 1.
    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            other => other.as_f64(),
        }
    }

    /// A boolean paired with an integer or float.
    fn mixes_boolean_and_number(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Boolean(_), b) => b.is_numeric(),
            (a, Value::Boolean(_)) => a.is_numeric(),
            _ => false,
        }
    }

    /// True when [`Value::compare`] is defined for the pair, ignoring NaN.
    pub fn comparable_with(&self, other: &Value) -> bool {
        (self.is_numeric() && other.is_numeric())
            || self.mixes_boolean_and_number(other)
            || self.rank() == other.rank()
    }

    /// Orders two cells the way a reference range check needs: integers and
    /// floats compare numerically with each other and with booleans (as 0/1),
    /// every other kind only with itself. Returns `None` for mismatched kinds
    /// and for NaN.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (a, b) if a.is_numeric() && b.is_numeric() => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (a, b) if a.mixes_boolean_and_number(b) => {
                a.as_number()?.partial_cmp(&b.as_number()?)
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Re-expresses a numeric value in the storage of `like`, so a bound
    /// substituted into a column keeps that column's numeric kind.
    pub fn coerce_like(&self, like: &Value) -> Value {
        match (self, like) {
            (Value::Integer(i), Value::Float(_)) => Value::Float(*i as f64),
            (Value::Float(f), Value::Integer(_)) if f.fract() == 0.0 => Value::Integer(*f as i64),
            (Value::Boolean(b), Value::Integer(_)) => Value::Integer(i64::from(*b)),
            (Value::Boolean(b), Value::Float(_)) => Value::Float(if *b { 1.0 } else { 0.0 }),
            _ => self.clone(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::String(_) => 0,
            Value::Integer(_) => 1,
            Value::Float(_) => 2,
            Value::Boolean(_) => 3,
            Value::Date(_) => 4,
            Value::DateTime(_) => 5,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => fold_zero(*a).total_cmp(&fold_zero(*b)),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Maps `-0.0` to `0.0`; every other float is returned unchanged.
pub fn fold_zero(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Parses a raw CSV field into a typed cell. Empty fields are missing.
pub fn parse_typed_value(value: &str, ty: &ColumnType) -> Result<Option<Value>> {
    if value.is_empty() {
        return Ok(None);
    }
    let parsed = match ty {
        ColumnType::String => Value::String(value.to_string()),
        ColumnType::Integer => {
            let parsed: i64 = value
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as integer"))?;
            Value::Integer(parsed)
        }
        ColumnType::Float => {
            let parsed: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as float"))?;
            Value::Float(parsed)
        }
        ColumnType::Boolean => {
            let lowered = value.trim().to_ascii_lowercase();
            let parsed = match lowered.as_str() {
                "true" | "t" | "yes" | "y" | "1" => true,
                "false" | "f" | "no" | "n" | "0" => false,
                _ => bail!("Failed to parse '{value}' as boolean"),
            };
            Value::Boolean(parsed)
        }
        ColumnType::Date => Value::Date(parse_naive_date(value.trim())?),
        ColumnType::DateTime => Value::DateTime(parse_naive_datetime(value.trim())?),
    };
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_typed_value_handles_empty_and_boolean_inputs() {
        assert_eq!(parse_typed_value("", &ColumnType::Integer).unwrap(), None);
        assert_eq!(
            parse_typed_value("Yes", &ColumnType::Boolean).unwrap(),
            Some(Value::Boolean(true))
        );
        assert_eq!(
            parse_typed_value("0", &ColumnType::Boolean).unwrap(),
            Some(Value::Boolean(false))
        );
        assert!(parse_typed_value("maybe", &ColumnType::Boolean).is_err());
    }

    #[test]
    fn parse_naive_datetime_supports_multiple_formats() {
        let expected =
            NaiveDateTime::parse_from_str("2024-05-06 14:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(
            parse_naive_datetime("2024-05-06T14:30:00").unwrap(),
            expected
        );
        assert_eq!(parse_naive_datetime("2024-05-06 14:30").unwrap(), expected);
    }

    #[test]
    fn compare_mixes_integer_and_float() {
        assert_eq!(
            Value::Integer(18).compare(&Value::Float(10.5)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Float(99.0).compare(&Value::Integer(99)),
            Some(Ordering::Equal)
        );
        assert_eq!(Value::Float(f64::NAN).compare(&Value::Integer(1)), None);
    }

    #[test]
    fn compare_rejects_mismatched_kinds() {
        let text = Value::String("ios".to_string());
        assert!(!text.comparable_with(&Value::Integer(1)));
        assert_eq!(text.compare(&Value::Integer(1)), None);
        assert!(Value::Float(f64::NAN).comparable_with(&Value::Integer(1)));
    }

    #[test]
    fn coerce_like_keeps_target_storage() {
        assert_eq!(
            Value::Integer(18).coerce_like(&Value::Float(3.2)),
            Value::Float(18.0)
        );
        assert_eq!(
            Value::Float(7.0).coerce_like(&Value::Integer(2)),
            Value::Integer(7)
        );
        assert_eq!(
            Value::Float(7.5).coerce_like(&Value::Integer(2)),
            Value::Float(7.5)
        );
    }

    #[test]
    fn as_display_keeps_float_fraction() {
        assert_eq!(Value::Float(99.0).as_display(), "99.0");
        assert_eq!(Value::Float(2.25).as_display(), "2.25");
        assert_eq!(Value::Integer(99).as_display(), "99");
    }

    #[test]
    fn booleans_compare_with_numbers_as_zero_and_one() {
        assert!(Value::Float(0.7).comparable_with(&Value::Boolean(false)));
        assert_eq!(
            Value::Float(0.7).compare(&Value::Boolean(true)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Boolean(true).compare(&Value::Integer(1)),
            Some(Ordering::Equal)
        );
        assert!(!Value::Boolean(true).comparable_with(&Value::String("x".to_string())));
        assert_eq!(
            Value::Boolean(true).coerce_like(&Value::Float(1.4)),
            Value::Float(1.0)
        );
    }

    #[test]
    fn equality_agrees_with_ordering_for_floats() {
        assert_eq!(Value::Float(-0.0), Value::Float(0.0));
        assert_eq!(Value::Float(-0.0).cmp(&Value::Float(0.0)), Ordering::Equal);
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(1.0), Value::Integer(1));
    }

    #[test]
    fn ord_falls_back_to_variant_rank() {
        let mut values = vec![
            Value::Float(1.0),
            Value::String("b".to_string()),
            Value::Integer(3),
            Value::String("a".to_string()),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::String("a".to_string()),
                Value::String("b".to_string()),
                Value::Integer(3),
                Value::Float(1.0),
            ]
        );
    }
}
