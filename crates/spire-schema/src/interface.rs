// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binding of a schema to a database, and the sessions it hands out.
//!
//! # Sessions
//!
//! [`SchemaInterface::session`] returns the session bound to the current
//! logical thread of control for the interface's schema, creating and
//! binding one on first use. The binding lasts until the logical context
//! ends (see [`spire_local::scope`]). [`SchemaInterface::get_session`] with
//! `independent = true` returns a fresh, unbound session instead.
//!
//! # URLs
//!
//! | URL                  | database                         |
//! |----------------------|----------------------------------|
//! | `sqlite://`          | private in-memory database       |
//! | `sqlite:///app.db`   | `app.db`, relative               |
//! | `sqlite:////var/app.db` | `/var/app.db`                 |

use crate::config::SchemaConfig;
use crate::error::SchemaError;
use crate::schema::Schema;
use crate::table::Record;
use crate::value::Value;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use spire_local::LocalStack;
use std::path::PathBuf;
use std::sync::Arc;

const SQL_TARGET: &str = "spire_schema::sql";

fn echo_sql(echo: bool, sql: &str) {
    if echo {
        tracing::info!(target: SQL_TARGET, "{}", sql);
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Target {
    /// Shared-cache in-memory database URI.
    Memory(String),
    File(PathBuf),
}

impl Target {
    fn parse(url: &str) -> Result<Self, SchemaError> {
        let rest = url
            .strip_prefix("sqlite://")
            .ok_or_else(|| SchemaError::UnsupportedUrl(url.to_string()))?;
        match rest {
            "" | ":memory:" | "/:memory:" => Ok(Target::Memory(format!(
                "file:spire-{}?mode=memory&cache=shared",
                uuid::Uuid::new_v4().simple()
            ))),
            path => Ok(Target::File(PathBuf::from(
                path.strip_prefix('/').unwrap_or(path),
            ))),
        }
    }
}

/// Opens connections to one database.
///
/// An in-memory database exists only while at least one connection to it
/// is open, so the engine holds one for its whole lifetime.
#[derive(Debug)]
struct Engine {
    url: String,
    target: Target,
    _anchor: Option<Mutex<Connection>>,
}

impl Engine {
    fn open(url: &str) -> Result<Self, SchemaError> {
        let target = Target::parse(url)?;
        let mut engine = Self {
            url: url.to_string(),
            target,
            _anchor: None,
        };
        if matches!(engine.target, Target::Memory(_)) {
            engine._anchor = Some(Mutex::new(engine.connect()?));
        }
        Ok(engine)
    }

    fn connect(&self) -> Result<Connection, SchemaError> {
        let conn = match &self.target {
            Target::Memory(uri) => {
                Connection::open_with_flags(uri, OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI)?
            }
            Target::File(path) => Connection::open(path)?,
        };
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        Ok(conn)
    }
}

// ---------------------------------------------------------------------------
// SchemaInterface
// ---------------------------------------------------------------------------

/// A schema bound to a database URL.
#[derive(Debug)]
pub struct SchemaInterface {
    schema: Arc<Schema>,
    engine: Arc<Engine>,
    echo: bool,
}

impl SchemaInterface {
    pub fn new(schema: Arc<Schema>, url: &str, echo: bool) -> Result<Self, SchemaError> {
        let engine = Engine::open(url)?;
        tracing::debug!("schema {} bound to {}", schema.name(), url);
        Ok(Self {
            schema,
            engine: Arc::new(engine),
            echo,
        })
    }

    /// Bind the registered schema called `name`.
    pub fn for_name(name: &str, url: &str, echo: bool) -> Result<Self, SchemaError> {
        let schema = Schema::get(name).ok_or_else(|| SchemaError::UnknownSchema(name.to_string()))?;
        Self::new(schema, url, echo)
    }

    pub fn from_config(config: &SchemaConfig) -> Result<Self, SchemaError> {
        config.validate()?;
        Self::for_name(&config.schema, &config.url, config.echo)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn url(&self) -> &str {
        &self.engine.url
    }

    fn bound_sessions(&self) -> LocalStack<Arc<Session>> {
        LocalStack::prefixed("schema.session", self.schema.name())
    }

    /// The session bound to the current logical context, or a new unbound
    /// session when `independent` is set.
    ///
    /// Binding is by schema name: two interfaces over the same schema share
    /// the bound session within one logical context. A tokio task outside
    /// [`spire_local::scope`] has no logical context and always gets a new
    /// session.
    pub fn get_session(&self, independent: bool) -> Result<Arc<Session>, SchemaError> {
        if independent {
            return self.open_session().map(Arc::new);
        }
        if !spire_local::has_context() {
            tracing::warn!(
                "schema `{}`: session requested outside a logical scope, returning an unbound session",
                self.schema.name()
            );
            return self.open_session().map(Arc::new);
        }

        let sessions = self.bound_sessions();
        if let Some(session) = sessions.get() {
            return Ok(session);
        }
        let session = Arc::new(self.open_session()?);
        Ok(sessions.push_retained(session))
    }

    /// Shorthand for `get_session(false)`.
    pub fn session(&self) -> Result<Arc<Session>, SchemaError> {
        self.get_session(false)
    }

    fn open_session(&self) -> Result<Session, SchemaError> {
        Ok(Session {
            schema: Arc::clone(&self.schema),
            conn: Mutex::new(self.engine.connect()?),
            pending: Mutex::new(Vec::new()),
            echo: self.echo,
            _engine: Arc::clone(&self.engine),
        })
    }

    /// Create every table (and its indexes) in definition order. Existing
    /// tables are left alone.
    pub fn create_tables(&self) -> Result<&Self, SchemaError> {
        let conn = self.engine.connect()?;
        let tables = self.schema.tables();
        for table in &tables {
            let sql = table.create_sql();
            echo_sql(self.echo, &sql);
            conn.execute_batch(&sql)?;
            for sql in table.index_sql() {
                echo_sql(self.echo, &sql);
                conn.execute_batch(&sql)?;
            }
        }
        tracing::debug!("created {} tables for schema {}", tables.len(), self.schema.name());
        Ok(self)
    }

    /// Drop every table in reverse definition order. Missing tables are
    /// skipped.
    pub fn drop_tables(&self) -> Result<&Self, SchemaError> {
        let conn = self.engine.connect()?;
        let tables = self.schema.tables();
        for table in tables.iter().rev() {
            let sql = table.drop_sql();
            echo_sql(self.echo, &sql);
            conn.execute_batch(&sql)?;
        }
        tracing::debug!("dropped {} tables for schema {}", tables.len(), self.schema.name());
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Unit of work against one database connection.
///
/// Records added to a session are held until [`Session::flush`], which
/// inserts them all in a single transaction.
#[derive(Debug)]
pub struct Session {
    schema: Arc<Schema>,
    conn: Mutex<Connection>,
    pending: Mutex<Vec<Record>>,
    echo: bool,
    _engine: Arc<Engine>,
}

impl Session {
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Queue `record` for insertion. Defaults are filled in and required
    /// columns checked here.
    pub fn add(&self, mut record: Record) -> Result<(), SchemaError> {
        let name = record.table().name();
        if self.schema.table(name).is_none() {
            return Err(SchemaError::UnknownTable(name.to_string()));
        }
        record.complete()?;
        self.pending.lock().push(record);
        Ok(())
    }

    /// Number of records waiting for a flush.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Insert all pending records in one transaction. On failure nothing is
    /// written and the records stay pending.
    pub fn flush(&self) -> Result<usize, SchemaError> {
        let records = std::mem::take(&mut *self.pending.lock());
        if records.is_empty() {
            return Ok(0);
        }

        let result = self.insert_all(&records);
        match result {
            Ok(()) => Ok(records.len()),
            Err(e) => {
                let mut pending = self.pending.lock();
                let added_since = std::mem::replace(&mut *pending, records);
                pending.extend(added_since);
                Err(e)
            }
        }
    }

    fn insert_all(&self, records: &[Record]) -> Result<(), SchemaError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for record in records {
            let sql = record.table().insert_sql();
            echo_sql(self.echo, &sql);
            tx.execute(&sql, rusqlite::params_from_iter(record.row()))?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Flush pending records.
    pub fn commit(&self) -> Result<usize, SchemaError> {
        self.flush()
    }

    /// Discard pending records. Returns how many were dropped.
    pub fn rollback(&self) -> usize {
        let dropped = std::mem::take(&mut *self.pending.lock()).len();
        if dropped > 0 {
            tracing::debug!("discarded {} pending records", dropped);
        }
        dropped
    }

    /// Every row of `table`, after flushing pending records.
    pub fn fetch_all(&self, table: &str) -> Result<Vec<Record>, SchemaError> {
        self.flush()?;
        let table = self
            .schema
            .table(table)
            .ok_or_else(|| SchemaError::UnknownTable(table.to_string()))?;

        let sql = table.select_sql();
        echo_sql(self.echo, &sql);
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            table
                .columns()
                .iter()
                .enumerate()
                .map(|(idx, column)| column.sql_type().read(idx, row.get_ref(idx)?))
                .collect::<rusqlite::Result<Vec<Value>>>()
        })?;

        let mut records = Vec::new();
        for values in rows {
            records.push(Record::loaded(Arc::clone(&table), values?));
        }
        Ok(records)
    }

    /// Run a raw SQL statement. Returns the number of rows changed.
    pub fn execute(&self, sql: &str) -> Result<usize, SchemaError> {
        echo_sql(self.echo, sql);
        Ok(self.conn.lock().execute(sql, [])?)
    }
}
