//! Typed values flowing through condition expressions.
//!
//! Values come either from literals in an expression or from a subject's
//! extracted columns. A `Missing` value never compares equal, less or
//! greater than anything, so every comparison involving it is false.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Truthiness when a value is used directly as a condition.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Missing => false,
            Value::Bool(flag) => *flag,
            Value::Int(value) => *value != 0,
            Value::Float(value) => *value != 0.0,
            Value::Str(value) => !value.is_empty(),
            Value::Date(_) => true,
        }
    }

    /// Numeric view of the value, parsing strings when they hold a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            Value::Str(value) => value.trim().parse::<f64>().ok(),
            Value::Missing | Value::Date(_) => None,
        }
    }

    /// Order two values, or `None` when they are not comparable.
    ///
    /// Two strings always compare as text, so category codes `"01"` and
    /// `"1"` stay distinct. A string meets a number numerically.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Missing, _) | (_, Value::Missing) => None,
            (Value::Date(left), Value::Date(right)) => Some(left.cmp(right)),
            (Value::Date(left), Value::Str(right)) => parse_date(right).map(|r| left.cmp(&r)),
            (Value::Str(left), Value::Date(right)) => parse_date(left).map(|l| l.cmp(right)),
            (Value::Date(_), _) | (_, Value::Date(_)) => None,
            (Value::Str(left), Value::Str(right)) => Some(left.cmp(right)),
            _ => {
                let left = self.as_f64()?;
                let right = other.as_f64()?;
                left.partial_cmp(&right)
            }
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => f.write_str("NULL"),
            Value::Bool(true) => f.write_str("TRUE"),
            Value::Bool(false) => f.write_str("FALSE"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value:?}"),
            Value::Str(value) => write!(f, "'{value}'"),
            Value::Date(value) => write!(f, "'{}'", value.format("%Y-%m-%d")),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_is_never_comparable() {
        assert_eq!(Value::Missing.compare(&Value::Int(1)), None);
        assert_eq!(Value::Int(1).compare(&Value::Missing), None);
        assert!(!Value::Missing.is_truthy());
    }

    #[test]
    fn strings_compare_as_text() {
        assert_eq!(Value::from("01").compare(&Value::from("1")), Some(Ordering::Less));
        assert_eq!(
            Value::from("2469.").compare(&Value::from("2469")),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::from("NaN").compare(&Value::from("NaN")), Some(Ordering::Equal));
        assert_eq!(Value::from("E").compare(&Value::from("S")), Some(Ordering::Less));
    }

    #[test]
    fn numbers_coerce_strings() {
        assert_eq!(Value::from("100").compare(&Value::Int(20)), Some(Ordering::Greater));
        assert_eq!(Value::Int(1).compare(&Value::from("01")), Some(Ordering::Equal));
        assert_eq!(Value::Int(2).compare(&Value::Float(2.0)), Some(Ordering::Equal));
    }

    #[test]
    fn dates_compare_with_iso_strings() {
        let date = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        assert_eq!(
            Value::Date(date).compare(&Value::from("2020-02-29")),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Date(date).compare(&Value::Int(3)), None);
    }
}
