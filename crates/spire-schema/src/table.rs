// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Table definitions and validated records.

use crate::error::{ValidationError, ValidationErrorKind};
use crate::fields::Column;
use crate::value::Value;
use std::sync::Arc;

/// A named, ordered list of columns.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Append a column. A column with the same name is replaced in place.
    pub fn column(mut self, column: Column) -> Self {
        match self.columns.iter_mut().find(|c| c.name() == column.name()) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == column)
    }

    /// Look up a column by name.
    pub fn column_named(&self, column: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == column)
    }

    // -- SQL --------------------------------------------------------------

    fn quoted_columns(&self) -> String {
        let names: Vec<String> = self.columns.iter().map(|c| quote_ident(c.name())).collect();
        names.join(", ")
    }

    pub(crate) fn create_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(Column::definition).collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(&self.name),
            columns.join(", ")
        )
    }

    pub(crate) fn index_sql(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_indexed())
            .map(|c| {
                format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                    quote_ident(&format!("ix_{}_{}", self.name, c.name())),
                    quote_ident(&self.name),
                    quote_ident(c.name())
                )
            })
            .collect()
    }

    pub(crate) fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", quote_ident(&self.name))
    }

    pub(crate) fn insert_sql(&self) -> String {
        let placeholders: Vec<String> =
            (1..=self.columns.len()).map(|i| format!("?{}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&self.name),
            self.quoted_columns(),
            placeholders.join(", ")
        )
    }

    pub(crate) fn select_sql(&self) -> String {
        format!(
            "SELECT {} FROM {}",
            self.quoted_columns(),
            quote_ident(&self.name)
        )
    }
}

/// `name` as an SQL identifier, double-quoted with embedded quotes doubled.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One row of a table. Every assignment is validated against its column.
#[derive(Debug, Clone)]
pub struct Record {
    table: Arc<Table>,
    values: Vec<Option<Value>>,
}

impl Record {
    pub fn new(table: Arc<Table>) -> Self {
        let values = vec![None; table.columns().len()];
        Self { table, values }
    }

    pub(crate) fn loaded(table: Arc<Table>, values: Vec<Value>) -> Self {
        Self {
            table,
            values: values.into_iter().map(Some).collect(),
        }
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Assign `value` to `column`, rejecting it if a validator fails.
    pub fn set(
        &mut self,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self, ValidationError> {
        let idx = self
            .table
            .position(column)
            .ok_or_else(|| self.error(column, ValidationErrorKind::UnknownColumn))?;
        let checked = self.table.columns()[idx]
            .validate(value.into())
            .map_err(|kind| self.error(column, kind))?;
        self.values[idx] = Some(checked);
        Ok(self)
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Result<Self, ValidationError> {
        self.set(column, value)?;
        Ok(self)
    }

    /// The assigned value; `None` if the column is unknown or unset.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values[self.table.position(column)?].as_ref()
    }

    /// Fill defaults for unset columns and check nullability.
    pub(crate) fn complete(&mut self) -> Result<(), ValidationError> {
        for (idx, column) in self.table.columns().iter().enumerate() {
            if self.values[idx].is_some() {
                continue;
            }
            let value = match column.default() {
                Some(default) => column
                    .validate(default.produce())
                    .map_err(|kind| self.error(column.name(), kind))?,
                None if column.is_nullable() => Value::Null,
                None => return Err(self.error(column.name(), ValidationErrorKind::Null)),
            };
            self.values[idx] = Some(value);
        }
        Ok(())
    }

    /// Values in column order; unset columns are null.
    pub(crate) fn row(&self) -> Vec<&Value> {
        self.values
            .iter()
            .map(|v| v.as_ref().unwrap_or(&Value::Null))
            .collect()
    }

    fn error(&self, column: &str, kind: ValidationErrorKind) -> ValidationError {
        ValidationError::new(self.table.name(), column, kind)
    }
}
