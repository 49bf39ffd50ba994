// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Column descriptors with validation.
//!
//! Each constructor returns a [`Column`] builder carrying its SQL type and
//! the validators that run whenever a value is assigned:
//!
//! ```
//! use spire_schema::fields;
//!
//! let size = fields::integer("size").minimum(0).maximum(100);
//! assert!(size.validate(50.into()).is_ok());
//! assert!(size.validate(101.into()).is_err());
//! ```
//!
//! Patterns are matched from the start of the value; a pattern that should
//! cover the whole value must end with `$`.

use crate::error::{SchemaError, ValidationErrorKind};
use crate::table::{quote_ident, Table};
use crate::value::{SqlType, Value};
use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

/// A check applied to every non-null value assigned to a column.
#[derive(Debug, Clone)]
pub enum Validator {
    Minimum(Value),
    Maximum(Value),
    Pattern(Regex),
    MinLength(usize),
    MaxLength(usize),
    OneOf(Vec<String>),
}

impl Validator {
    pub fn check(&self, value: &Value) -> Result<(), ValidationErrorKind> {
        match self {
            // Values that cannot be ordered against the bound fail.
            Validator::Minimum(min) => match value.compare(min) {
                Some(Ordering::Equal | Ordering::Greater) => Ok(()),
                _ => Err(ValidationErrorKind::BelowMinimum),
            },
            Validator::Maximum(max) => match value.compare(max) {
                Some(Ordering::Equal | Ordering::Less) => Ok(()),
                _ => Err(ValidationErrorKind::AboveMaximum),
            },
            Validator::Pattern(pattern) => match value.as_str() {
                Some(text) if pattern.is_match(text) => Ok(()),
                _ => Err(ValidationErrorKind::PatternMismatch),
            },
            Validator::MinLength(min) => match value.as_str() {
                Some(text) if text.chars().count() < *min => {
                    Err(ValidationErrorKind::TooShort { min: *min })
                }
                _ => Ok(()),
            },
            Validator::MaxLength(max) => match value.as_str() {
                Some(text) if text.chars().count() > *max => {
                    Err(ValidationErrorKind::TooLong { max: *max })
                }
                _ => Ok(()),
            },
            Validator::OneOf(choices) => match value.as_str() {
                Some(text) if choices.iter().any(|c| c == text) => Ok(()),
                _ => Err(ValidationErrorKind::NotInEnumeration),
            },
        }
    }
}

/// Default applied when a record leaves the column unset.
#[derive(Debug, Clone)]
pub enum ColumnDefault {
    Value(Value),
    Generated(fn() -> Value),
}

impl ColumnDefault {
    pub fn produce(&self) -> Value {
        match self {
            ColumnDefault::Value(v) => v.clone(),
            ColumnDefault::Generated(f) => f(),
        }
    }
}

/// A column of a [`Table`].
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    sql_type: SqlType,
    nullable: bool,
    primary_key: bool,
    unique: bool,
    index: bool,
    default: Option<ColumnDefault>,
    references: Option<(String, String)>,
    validators: Vec<Validator>,
}

impl Column {
    /// A nullable column with no validators.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            primary_key: false,
            unique: false,
            index: false,
            default: None,
            references: None,
            validators: Vec::new(),
        }
    }

    // -- builder --------------------------------------------------------

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Primary keys are never nullable.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(ColumnDefault::Value(value.into()));
        self
    }

    pub fn default_with(mut self, generate: fn() -> Value) -> Self {
        self.default = Some(ColumnDefault::Generated(generate));
        self
    }

    /// Lower bound, fitted to the column type. A bound that does not fit
    /// is rejected by [`Schema::define`](crate::Schema::define).
    pub fn minimum(self, minimum: impl Into<Value>) -> Self {
        let bound = self.fit_bound(minimum.into());
        self.validator(Validator::Minimum(bound))
    }

    /// Upper bound, fitted like [`Column::minimum`].
    pub fn maximum(self, maximum: impl Into<Value>) -> Self {
        let bound = self.fit_bound(maximum.into());
        self.validator(Validator::Maximum(bound))
    }

    fn fit_bound(&self, bound: Value) -> Value {
        self.sql_type.coerce(bound.clone()).unwrap_or(bound)
    }

    pub fn min_length(self, min: usize) -> Self {
        self.validator(Validator::MinLength(min))
    }

    pub fn max_length(self, max: usize) -> Self {
        self.validator(Validator::MaxLength(max))
    }

    /// Require values to match `pattern` from their first character.
    pub fn pattern(self, pattern: &str) -> Result<Self, SchemaError> {
        let anchored = Regex::new(&format!("^(?:{})", pattern))?;
        Ok(self.validator(Validator::Pattern(anchored)))
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    // -- accessors ------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_indexed(&self) -> bool {
        self.index
    }

    pub fn default(&self) -> Option<&ColumnDefault> {
        self.default.as_ref()
    }

    /// Referenced `(table, column)` for foreign keys.
    pub fn references(&self) -> Option<(&str, &str)> {
        self.references
            .as_ref()
            .map(|(t, c)| (t.as_str(), c.as_str()))
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// First range bound whose type does not fit the column.
    pub fn mismatched_bound(&self) -> Option<&Value> {
        self.validators.iter().find_map(|v| match v {
            Validator::Minimum(bound) | Validator::Maximum(bound)
                if self.sql_type.coerce(bound.clone()).is_none() =>
            {
                Some(bound)
            }
            _ => None,
        })
    }

    // -- behaviour ------------------------------------------------------

    /// Check `value` against this column, returning it fitted to the
    /// column type.
    pub fn validate(&self, value: Value) -> Result<Value, ValidationErrorKind> {
        if value.is_null() {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(ValidationErrorKind::Null)
            };
        }

        let value = self
            .sql_type
            .coerce(value)
            .ok_or(ValidationErrorKind::TypeMismatch {
                expected: self.sql_type.name(),
            })?;
        for validator in &self.validators {
            validator.check(&value)?;
        }
        Ok(value)
    }

    /// Column clause of `CREATE TABLE`.
    pub fn definition(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.sql_type.ddl());
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some((table, column)) = &self.references {
            sql.push_str(&format!(
                " REFERENCES {} ({})",
                quote_ident(table),
                quote_ident(column)
            ));
        }
        sql
    }
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

fn preset(cell: &'static OnceLock<Regex>, pattern: &str) -> Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid preset pattern"))
        .clone()
}

fn uuid_pattern() -> Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    preset(
        &RE,
        r"^[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}$",
    )
}

fn email_pattern() -> Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    preset(
        &RE,
        concat!(
            r"(?i)^([-!#$%&'*+/=?^_`{}|~0-9A-Z]+(\.[-!#$%&'*+/=?^_`{}|~0-9A-Z]+)*",
            r#"|"([\x01-\x08\x0b\x0c\x0e-\x1f!#-\[\]-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])*""#,
            r")@(?:[A-Z0-9-]+\.)+[A-Z]{2,6}",
        ),
    )
}

fn ip_address_pattern() -> Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    preset(&RE, r"^\d{1,3}[.]\d{1,3}[.]\d{1,3}[.]\d{1,3}$")
}

fn token_pattern() -> Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    preset(&RE, r"^[_a-z0-9]([-_.a-z0-9]*[_a-z0-9])?$")
}

/// A fresh lower-case hyphenated UUID.
pub fn uniqid() -> Value {
    Value::Text(uuid::Uuid::new_v4().to_string())
}

/// Non-nullable unless overridden.
pub fn boolean(name: &str) -> Column {
    Column::new(name, SqlType::Boolean).nullable(false)
}

pub fn date(name: &str) -> Column {
    Column::new(name, SqlType::Date)
}

pub fn datetime(name: &str) -> Column {
    Column::new(name, SqlType::DateTime)
}

pub fn decimal(name: &str, precision: Option<u8>, scale: Option<u8>) -> Column {
    Column::new(name, SqlType::Decimal { precision, scale })
}

pub fn email(name: &str) -> Column {
    text(name).validator(Validator::Pattern(email_pattern()))
}

/// Text restricted to `choices`, given as a slice or one space-separated
/// string.
pub fn enumeration<I, S>(name: &str, choices: I) -> Column
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let choices = choices
        .into_iter()
        .flat_map(|c| {
            c.as_ref()
                .split(' ')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();
    text(name).validator(Validator::OneOf(choices))
}

pub fn float(name: &str) -> Column {
    Column::new(name, SqlType::Float)
}

/// A column referencing `table.column`, sharing its type and validators.
pub fn foreign_key(name: &str, table: &Table, column: &str) -> Result<Column, SchemaError> {
    let target = table
        .column_named(column)
        .ok_or_else(|| SchemaError::UnknownColumn {
            table: table.name().to_string(),
            column: column.to_string(),
        })?;

    let mut fk = Column::new(name, target.sql_type);
    fk.validators = target.validators.clone();
    fk.references = Some((table.name().to_string(), column.to_string()));
    Ok(fk)
}

/// UUID primary key, generated when left unset.
pub fn identifier(name: &str) -> Column {
    uuid(name).primary_key().default_with(uniqid)
}

pub fn integer(name: &str) -> Column {
    Column::new(name, SqlType::Integer)
}

pub fn ip_address(name: &str) -> Column {
    text(name).validator(Validator::Pattern(ip_address_pattern()))
}

pub fn text(name: &str) -> Column {
    Column::new(name, SqlType::Text)
}

pub fn time(name: &str) -> Column {
    Column::new(name, SqlType::Time)
}

/// Lower-case identifier-like token: `[_a-z0-9]`, optionally with `-` or
/// `.` inside.
pub fn token(name: &str) -> Column {
    text(name).validator(Validator::Pattern(token_pattern()))
}

pub fn uuid(name: &str) -> Column {
    text(name).validator(Validator::Pattern(uuid_pattern()))
}
