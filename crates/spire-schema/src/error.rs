// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for schema definition, validation and storage.

use crate::config::ConfigError;
use std::fmt;
use thiserror::Error;

/// Schema-level errors.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown column: {table}.{column}")]
    UnknownColumn { table: String, column: String },

    #[error("Bound {bound} does not fit column {table}.{column}")]
    InvalidBound {
        table: String,
        column: String,
        bound: String,
    },

    #[error("Table already defined: {0}")]
    DuplicateTable(String),

    #[error("Unsupported database URL: {0}")]
    UnsupportedUrl(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// A value rejected by a column's validators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{table}.{column}: {kind}")]
pub struct ValidationError {
    pub table: String,
    pub column: String,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(table: &str, column: &str, kind: ValidationErrorKind) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            kind,
        }
    }
}

/// Why a value was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Less than the column minimum.
    BelowMinimum,
    /// Greater than the column maximum.
    AboveMaximum,
    /// Does not match the column pattern.
    PatternMismatch,
    /// Shorter than the minimum length.
    TooShort { min: usize },
    /// Longer than the maximum length.
    TooLong { max: usize },
    /// Not one of the enumerated values.
    NotInEnumeration,
    /// Value type does not fit the column type.
    TypeMismatch { expected: &'static str },
    /// Null assigned to a non-nullable column.
    Null,
    /// The table has no such column.
    UnknownColumn,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowMinimum => write!(f, "value is below the minimum"),
            Self::AboveMaximum => write!(f, "value is above the maximum"),
            Self::PatternMismatch => write!(f, "value does not match the pattern"),
            Self::TooShort { min } => write!(f, "value is shorter than {} characters", min),
            Self::TooLong { max } => write!(f, "value is longer than {} characters", max),
            Self::NotInEnumeration => write!(f, "value is not an allowed choice"),
            Self::TypeMismatch { expected } => write!(f, "expected a {} value", expected),
            Self::Null => write!(f, "value may not be null"),
            Self::UnknownColumn => write!(f, "no such column"),
        }
    }
}
