// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Validated relational schemas.
//!
//! Tables are declared with typed columns that validate every assigned
//! value (ranges, patterns, lengths, enumerations). Schemas are registered
//! process-wide by name and bound to a SQLite database through a
//! [`SchemaInterface`], which hands out sessions tied to the current
//! logical thread of control.
//!
//! # Example
//!
//! ```
//! use spire_schema::{fields, Schema, Table};
//!
//! let schema = Schema::register("doc-inventory");
//! schema
//!     .define(
//!         Table::new("items")
//!             .column(fields::identifier("id"))
//!             .column(fields::token("sku").nullable(false))
//!             .column(fields::integer("quantity").minimum(0)),
//!     )
//!     .unwrap();
//!
//! let interface = schema.construct_test_interface().unwrap();
//! let session = interface.session().unwrap();
//!
//! let item = schema.record("items").unwrap().with("sku", "bolt-m4").unwrap();
//! session.add(item).unwrap();
//! session.commit().unwrap();
//!
//! assert_eq!(session.fetch_all("items").unwrap().len(), 1);
//! assert!(schema.record("items").unwrap().with("quantity", -1).is_err());
//! ```

pub mod config;
pub mod error;
pub mod fields;
pub mod interface;
pub mod schema;
pub mod table;
pub mod value;

pub use config::{ConfigError, SchemaConfig};
pub use error::{SchemaError, ValidationError, ValidationErrorKind};
pub use fields::{Column, Validator};
pub use interface::{SchemaInterface, Session};
pub use schema::Schema;
pub use table::{Record, Table};
pub use value::{SqlType, Value};
