// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema interface configuration.
//!
//! ```toml
//! schema = "inventory"
//! url = "sqlite:///var/lib/inventory.db"
//! echo = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Binding of a registered schema to a database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Registered schema name.
    pub schema: String,

    /// Database URL (`sqlite://`, `sqlite:///path`).
    pub url: String,

    /// Log every SQL statement.
    #[serde(default)]
    pub echo: bool,
}

impl SchemaConfig {
    pub fn new(schema: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            url: url.into(),
            echo: false,
        }
    }

    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema.trim().is_empty() {
            return Err(ConfigError::Invalid("schema must not be empty".into()));
        }
        if self.url.trim().is_empty() {
            return Err(ConfigError::Invalid("url must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_toml() {
        let config = SchemaConfig::from_toml(
            r#"
            schema = "inventory"
            url = "sqlite://"
            "#,
        )
        .unwrap();
        assert_eq!(config.schema, "inventory");
        assert!(!config.echo);
    }

    #[test]
    fn missing_url_is_a_parse_error() {
        assert!(matches!(
            SchemaConfig::from_toml(r#"schema = "inventory""#),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn empty_fields_rejected() {
        assert!(SchemaConfig::new("", "sqlite://").validate().is_err());
        assert!(SchemaConfig::new("inventory", "  ").validate().is_err());
        assert!(SchemaConfig::new("inventory", "sqlite://").validate().is_ok());
    }

    #[test]
    fn from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.toml");
        std::fs::write(&path, "schema = \"s\"\nurl = \"sqlite://\"\necho = true\n").unwrap();
        let config = SchemaConfig::from_file(&path).unwrap();
        assert!(config.echo);
    }
}
