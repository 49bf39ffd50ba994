// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Integration tests for schema interfaces and context-bound sessions.
//!
//! # Test Coverage
//!
//! - Interface built from TOML configuration
//! - Related tables created in order and dropped in reverse
//! - Date, time and decimal values stored and read back
//! - Reserved words as table and column names
//! - One session per task scope under concurrency
//! - No shared session for tasks outside a scope

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use spire_schema::{
    fields, Schema, SchemaConfig, SchemaError, SchemaInterface, Table, ValidationErrorKind, Value,
};
use std::sync::{Arc, OnceLock};

fn library() -> Arc<Schema> {
    static LIBRARY: OnceLock<Arc<Schema>> = OnceLock::new();
    Arc::clone(LIBRARY.get_or_init(define_library))
}

fn define_library() -> Arc<Schema> {
    let schema = Schema::register("it-library");
    let authors = schema
        .define(
            Table::new("authors")
                .column(fields::identifier("id"))
                .column(fields::text("name").nullable(false).min_length(1).max_length(64))
                .column(fields::email("email"))
                .column(fields::date("born")),
        )
        .unwrap();
    schema
        .define(
            Table::new("books")
                .column(fields::identifier("id"))
                .column(
                    fields::foreign_key("author_id", &authors, "id")
                        .unwrap()
                        .nullable(false)
                        .index(),
                )
                .column(fields::text("title").nullable(false))
                .column(fields::enumeration("format", ["hardcover paperback ebook"]))
                .column(fields::decimal("price", Some(8), Some(2)).minimum(0.0))
                .column(fields::datetime("published_at"))
                .column(fields::time("reading_slot"))
                .column(fields::boolean("in_print").default_value(true)),
        )
        .unwrap();
    schema
}

#[test]
fn interface_from_config() {
    library();
    let config = SchemaConfig::from_toml("schema = \"it-library\"\nurl = \"sqlite://\"\n").unwrap();
    let interface = SchemaInterface::from_config(&config).unwrap();
    assert_eq!(interface.schema().name(), "it-library");

    let missing = SchemaConfig::new("it-unregistered", "sqlite://");
    assert!(matches!(
        SchemaInterface::from_config(&missing),
        Err(SchemaError::UnknownSchema(_))
    ));
    assert!(matches!(
        SchemaInterface::from_config(&SchemaConfig::new("", "sqlite://")),
        Err(SchemaError::Config(_))
    ));
}

#[test]
fn related_tables_round_trip() {
    let schema = library();
    let interface = schema.construct_test_interface().unwrap();
    let session = interface.get_session(true).unwrap();

    let author = schema
        .record("authors")
        .unwrap()
        .with("name", "Ursula")
        .unwrap()
        .with("email", "ursula@example.org")
        .unwrap()
        .with("born", NaiveDate::from_ymd_opt(1929, 10, 21).unwrap())
        .unwrap();
    let author_id = fields::uniqid();
    let author = author.with("id", author_id.clone()).unwrap();
    session.add(author).unwrap();

    let published = NaiveDateTime::new(
        NaiveDate::from_ymd_opt(1969, 3, 1).unwrap(),
        NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
    );
    let book = schema
        .record("books")
        .unwrap()
        .with("author_id", author_id.clone())
        .unwrap()
        .with("title", "The Left Hand of Darkness")
        .unwrap()
        .with("format", "paperback")
        .unwrap()
        .with("price", 12.5)
        .unwrap()
        .with("published_at", published)
        .unwrap()
        .with("reading_slot", NaiveTime::from_hms_opt(21, 0, 0).unwrap())
        .unwrap();
    session.add(book).unwrap();
    assert_eq!(session.commit().unwrap(), 2);

    let books = session.fetch_all("books").unwrap();
    assert_eq!(books.len(), 1);
    let book = &books[0];
    assert_eq!(book.get("author_id"), Some(&author_id));
    assert_eq!(book.get("price"), Some(&Value::Real(12.5)));
    assert_eq!(book.get("published_at"), Some(&Value::DateTime(published)));
    assert_eq!(book.get("in_print"), Some(&Value::Boolean(true)));

    let authors = session.fetch_all("authors").unwrap();
    assert_eq!(
        authors[0].get("born"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(1929, 10, 21).unwrap()))
    );

    interface.drop_tables().unwrap();
    interface.create_tables().unwrap();
    assert!(session.fetch_all("books").unwrap().is_empty());
}

#[test]
fn foreign_key_enforced() {
    let schema = library();
    let interface = schema.construct_test_interface().unwrap();
    let session = interface.get_session(true).unwrap();

    let orphan = schema
        .record("books")
        .unwrap()
        .with("author_id", fields::uniqid())
        .unwrap()
        .with("title", "Nobody's")
        .unwrap();
    session.add(orphan).unwrap();
    assert!(matches!(session.flush(), Err(SchemaError::Sqlite(_))));
    assert_eq!(session.rollback(), 1);
}

#[test]
fn reserved_words_as_names() {
    let schema = Schema::register("it-reserved");
    schema
        .define(
            Table::new("order")
                .column(fields::identifier("id"))
                .column(fields::integer("group").index())
                .column(fields::text("select")),
        )
        .unwrap();
    let interface = schema.construct_test_interface().unwrap();
    let session = interface.get_session(true).unwrap();

    let row = schema
        .record("order")
        .unwrap()
        .with("group", 7)
        .unwrap()
        .with("select", "all")
        .unwrap();
    session.add(row).unwrap();
    assert_eq!(session.commit().unwrap(), 1);

    let rows = session.fetch_all("order").unwrap();
    assert_eq!(rows[0].get("group"), Some(&Value::Integer(7)));
    assert_eq!(rows[0].get("select"), Some(&Value::Text("all".into())));
    interface.drop_tables().unwrap();
}

#[test]
fn validation_errors_name_the_column() {
    let schema = library();
    let mut book = schema.record("books").unwrap();

    let err = book.set("format", "scroll").unwrap_err();
    assert_eq!((err.table.as_str(), err.column.as_str()), ("books", "format"));
    assert_eq!(err.kind, ValidationErrorKind::NotInEnumeration);

    let err = book.set("price", -0.01).unwrap_err();
    assert_eq!(err.kind, ValidationErrorKind::BelowMinimum);

    let err = book.set("author_id", "42").unwrap_err();
    assert_eq!(err.kind, ValidationErrorKind::PatternMismatch);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_session_per_task_scope() {
    let schema = library();
    let interface = Arc::new(schema.construct_test_interface().unwrap());

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let interface = Arc::clone(&interface);
            tokio::spawn(spire_local::scope(async move {
                let first = interface.session().unwrap();
                tokio::task::yield_now().await;
                let second = interface.session().unwrap();
                assert!(Arc::ptr_eq(&first, &second));
                first
            }))
        })
        .collect();

    let mut sessions = Vec::new();
    for task in tasks {
        sessions.push(task.await.unwrap());
    }
    for (i, a) in sessions.iter().enumerate() {
        for b in &sessions[i + 1..] {
            assert!(!Arc::ptr_eq(a, b));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unscoped_tasks_never_share_a_session() {
    let interface = Arc::new(library().construct_test_interface().unwrap());

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let interface = Arc::clone(&interface);
            tokio::spawn(async move {
                let first = interface.session().unwrap();
                tokio::task::yield_now().await;
                let second = interface.session().unwrap();
                assert!(!Arc::ptr_eq(&first, &second));
                first
            })
        })
        .collect();

    let mut sessions = Vec::new();
    for task in tasks {
        sessions.push(task.await.unwrap());
    }
    assert!(!Arc::ptr_eq(&sessions[0], &sessions[1]));
}
