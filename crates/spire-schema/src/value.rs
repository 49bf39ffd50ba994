// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Column values and SQL storage types.
//!
//! Dates and times are stored as ISO-8601 text; booleans as 0/1 integers.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::{ToSql, ToSqlOutput, Type, ValueRef};
use std::cmp::Ordering;
use std::fmt;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(r) => Some(*r),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Order two values of comparable kinds. Integers and reals compare
    /// numerically; anything else of mismatched kind is unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Integer(_) | Value::Real(_), Value::Integer(_) | Value::Real(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Value::Time(t) => write!(f, "{}", t.format(TIME_FORMAT)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Boolean(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*b))),
            Value::Integer(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Date(d) => ToSqlOutput::from(d.format(DATE_FORMAT).to_string()),
            Value::DateTime(dt) => ToSqlOutput::from(dt.format(DATETIME_FORMAT).to_string()),
            Value::Time(t) => ToSqlOutput::from(t.format(TIME_FORMAT).to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// SqlType
// ---------------------------------------------------------------------------

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Boolean,
    Integer,
    Float,
    Decimal {
        precision: Option<u8>,
        scale: Option<u8>,
    },
    Text,
    Date,
    DateTime,
    Time,
}

impl SqlType {
    pub fn name(&self) -> &'static str {
        match self {
            SqlType::Boolean => "boolean",
            SqlType::Integer => "integer",
            SqlType::Float => "float",
            SqlType::Decimal { .. } => "decimal",
            SqlType::Text => "text",
            SqlType::Date => "date",
            SqlType::DateTime => "datetime",
            SqlType::Time => "time",
        }
    }

    /// Type name used in `CREATE TABLE`.
    pub fn ddl(&self) -> String {
        match self {
            SqlType::Boolean => "BOOLEAN".into(),
            SqlType::Integer => "INTEGER".into(),
            SqlType::Float => "FLOAT".into(),
            SqlType::Decimal {
                precision: Some(p),
                scale: Some(s),
            } => format!("NUMERIC({}, {})", p, s),
            SqlType::Decimal {
                precision: Some(p),
                scale: None,
            } => format!("NUMERIC({})", p),
            SqlType::Decimal { .. } => "NUMERIC".into(),
            SqlType::Text => "TEXT".into(),
            SqlType::Date => "DATE".into(),
            SqlType::DateTime => "DATETIME".into(),
            SqlType::Time => "TIME".into(),
        }
    }

    /// Fit a non-null value to this type, widening integers for real columns.
    pub fn coerce(&self, value: Value) -> Option<Value> {
        match (self, value) {
            (SqlType::Boolean, v @ Value::Boolean(_)) => Some(v),
            (SqlType::Integer, v @ Value::Integer(_)) => Some(v),
            (SqlType::Float | SqlType::Decimal { .. }, v @ Value::Real(_)) => Some(v),
            (SqlType::Float | SqlType::Decimal { .. }, Value::Integer(i)) => {
                Some(Value::Real(i as f64))
            }
            (SqlType::Text, v @ Value::Text(_)) => Some(v),
            (SqlType::Date, v @ Value::Date(_)) => Some(v),
            (SqlType::DateTime, v @ Value::DateTime(_)) => Some(v),
            (SqlType::Time, v @ Value::Time(_)) => Some(v),
            _ => None,
        }
    }

    /// Decode a stored value at column `idx` of a result row.
    pub fn read(&self, idx: usize, raw: ValueRef<'_>) -> rusqlite::Result<Value> {
        let mismatch = |ty: Type| rusqlite::Error::InvalidColumnType(idx, self.name().into(), ty);
        let parse_failure = |ty: Type, err: chrono::ParseError| {
            rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
        };

        Ok(match (self, raw) {
            (_, ValueRef::Null) => Value::Null,
            (SqlType::Boolean, ValueRef::Integer(i)) => Value::Boolean(i != 0),
            (SqlType::Integer, ValueRef::Integer(i)) => Value::Integer(i),
            (SqlType::Float | SqlType::Decimal { .. }, ValueRef::Integer(i)) => {
                Value::Real(i as f64)
            }
            (SqlType::Float | SqlType::Decimal { .. }, ValueRef::Real(r)) => Value::Real(r),
            (_, ValueRef::Text(bytes)) => {
                let text = std::str::from_utf8(bytes).map_err(rusqlite::Error::Utf8Error)?;
                match self {
                    SqlType::Text => Value::Text(text.to_string()),
                    SqlType::Date => NaiveDate::parse_from_str(text, DATE_FORMAT)
                        .map(Value::Date)
                        .map_err(|e| parse_failure(Type::Text, e))?,
                    SqlType::DateTime => NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
                        .map(Value::DateTime)
                        .map_err(|e| parse_failure(Type::Text, e))?,
                    SqlType::Time => NaiveTime::parse_from_str(text, TIME_FORMAT)
                        .map(Value::Time)
                        .map_err(|e| parse_failure(Type::Text, e))?,
                    _ => return Err(mismatch(Type::Text)),
                }
            }
            (_, other) => return Err(mismatch(other.data_type())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_comparison_crosses_kinds() {
        assert_eq!(
            Value::Integer(3).compare(&Value::Real(2.5)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Integer(3).compare(&Value::Text("3".into())), None);
    }

    #[test]
    fn coerce_widens_integers_for_real_columns() {
        assert_eq!(SqlType::Float.coerce(Value::Integer(2)), Some(Value::Real(2.0)));
        assert_eq!(SqlType::Integer.coerce(Value::Real(2.0)), None);
        assert_eq!(SqlType::Text.coerce(Value::Integer(1)), None);
    }

    #[test]
    fn decimal_ddl() {
        let ty = SqlType::Decimal {
            precision: Some(10),
            scale: Some(2),
        };
        assert_eq!(ty.ddl(), "NUMERIC(10, 2)");
        assert_eq!(
            SqlType::Decimal {
                precision: None,
                scale: None
            }
            .ddl(),
            "NUMERIC"
        );
    }

    #[test]
    fn dates_read_back_from_text() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let binding = Value::Date(date);
        let stored = binding.to_sql().unwrap();
        let raw = match &stored {
            ToSqlOutput::Owned(v) => ValueRef::from(v),
            ToSqlOutput::Borrowed(v) => *v,
            _ => unreachable!(),
        };
        assert_eq!(SqlType::Date.read(0, raw).unwrap(), Value::Date(date));
    }

    #[test]
    fn mismatched_storage_is_an_error() {
        assert!(SqlType::Integer.read(0, ValueRef::Real(1.5)).is_err());
        assert!(SqlType::Time.read(0, ValueRef::Text(b"noon")).is_err());
    }
}
