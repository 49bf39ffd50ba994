// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide registry of named schemas.
//!
//! A schema is created the first time its name is registered and lives for
//! the rest of the process. Registering the same name again, from any
//! thread, returns the same instance.

use crate::error::SchemaError;
use crate::interface::SchemaInterface;
use crate::table::{Record, Table};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

static SCHEMAS: OnceLock<Mutex<HashMap<String, Arc<Schema>>>> = OnceLock::new();

fn schemas() -> &'static Mutex<HashMap<String, Arc<Schema>>> {
    SCHEMAS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// A named collection of table definitions.
#[derive(Debug)]
pub struct Schema {
    name: String,
    tables: RwLock<Vec<Arc<Table>>>,
}

impl Schema {
    /// Create-or-get the schema called `name`.
    pub fn register(name: &str) -> Arc<Schema> {
        let mut schemas = schemas().lock();
        let schema = schemas.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!("registered schema {}", name);
            Arc::new(Schema {
                name: name.to_string(),
                tables: RwLock::new(Vec::new()),
            })
        });
        Arc::clone(schema)
    }

    /// The registered schema called `name`.
    pub fn get(name: &str) -> Option<Arc<Schema>> {
        schemas().lock().get(name).cloned()
    }

    /// Names of every registered schema, sorted.
    pub fn registered() -> Vec<String> {
        let mut names: Vec<String> = schemas().lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add `table` to this schema. Table names are unique per schema and
    /// every range bound must fit its column type.
    pub fn define(&self, table: Table) -> Result<Arc<Table>, SchemaError> {
        for column in table.columns() {
            if let Some(bound) = column.mismatched_bound() {
                return Err(SchemaError::InvalidBound {
                    table: table.name().to_string(),
                    column: column.name().to_string(),
                    bound: bound.to_string(),
                });
            }
        }
        let mut tables = self.tables.write();
        if tables.iter().any(|t| t.name() == table.name()) {
            return Err(SchemaError::DuplicateTable(table.name().to_string()));
        }
        let table = Arc::new(table);
        tables.push(Arc::clone(&table));
        Ok(table)
    }

    pub fn table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.read().iter().find(|t| t.name() == name).cloned()
    }

    /// Tables in definition order.
    pub fn tables(&self) -> Vec<Arc<Table>> {
        self.tables.read().clone()
    }

    /// An empty record for the table called `table`.
    pub fn record(&self, table: &str) -> Result<Record, SchemaError> {
        self.table(table)
            .map(Record::new)
            .ok_or_else(|| SchemaError::UnknownTable(table.to_string()))
    }

    /// Private in-memory database with every table created.
    pub fn construct_test_interface(self: &Arc<Self>) -> Result<SchemaInterface, SchemaError> {
        let interface = SchemaInterface::new(Arc::clone(self), "sqlite://", false)?;
        interface.create_tables()?;
        Ok(interface)
    }
}
