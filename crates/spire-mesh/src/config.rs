// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mesh configuration.
//!
//! Supports both programmatic and file-based configuration.
//!
//! ```toml
//! log_level = "debug"
//!
//! [server]
//! bind = "127.0.0.1"
//! port = 9000
//!
//! [proxy]
//! url = "http://inventory.internal:8080"
//! mount = "/inventory"
//!
//! [clients.billing]
//! url = "http://billing.internal:8080/api"
//!
//! [sessions.cookie]
//! name = "sid"
//! max_age = 3600
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
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

/// Top-level mesh configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshConfig {
    /// HTTP listener.
    #[serde(default)]
    pub server: ServerConfig,

    /// Optional proxy mounted on the server.
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,

    /// Named outbound clients.
    #[serde(default)]
    pub clients: BTreeMap<String, ClientConfig>,

    /// Cookie sessions; disabled when absent.
    #[serde(default)]
    pub sessions: Option<SessionConfig>,

    /// Log level.
    #[serde(default)]
    pub log_level: Option<String>,
}

impl MeshConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        if let Some(proxy) = &self.proxy {
            proxy.validate()?;
        }
        for (name, client) in &self.clients {
            if name.is_empty() {
                return Err(ConfigError::Invalid("client name is empty".into()));
            }
            client
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("client `{}`: {}", name, e)))?;
        }
        if let Some(sessions) = &self.sessions {
            sessions.validate()?;
        }
        Ok(())
    }

    /// Look up a named client.
    pub fn client(&self, name: &str) -> Option<&ClientConfig> {
        self.clients.get(name)
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// HTTP port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind.is_empty() {
            return Err(ConfigError::Invalid("server bind address is empty".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Client / proxy
// ---------------------------------------------------------------------------

/// Outbound mesh client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the remote service.
    pub url: String,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url(&self.url)
    }
}

/// Reverse proxy mounted on the mesh server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Upstream base URL.
    pub url: String,

    /// Path prefix the proxy is mounted under.
    #[serde(default = "default_mount")]
    pub mount: String,
}

fn default_mount() -> String {
    "/".to_string()
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mount: default_mount(),
        }
    }

    /// Set the mount prefix.
    pub fn mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url(&self.url)?;
        if !self.mount.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "proxy mount `{}` must start with '/'",
                self.mount
            )));
        }
        Ok(())
    }
}

/// Ensure `url` is non-empty and absolute (`scheme://authority[/path]`).
pub fn validate_url(url: &str) -> Result<(), ConfigError> {
    if url.trim().is_empty() {
        return Err(ConfigError::Invalid("url is empty".into()));
    }
    let uri: axum::http::Uri = url
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("url `{}`: {}", url, e)))?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(ConfigError::Invalid(format!("url `{}` is not absolute", url)));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Cookie session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Attach sessions to requests.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub cookie: CookieConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cookie: CookieConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cookie.name.is_empty() {
            return Err(ConfigError::Invalid("session cookie name is empty".into()));
        }
        if self.cookie.name.contains([';', '=', ' ', ',']) {
            return Err(ConfigError::Invalid(format!(
                "session cookie name `{}` contains reserved characters",
                self.cookie.name
            )));
        }
        Ok(())
    }
}

/// Session cookie attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    #[serde(default = "default_cookie_name")]
    pub name: String,

    /// Lifetime in seconds; a browser-session cookie when absent.
    #[serde(default)]
    pub max_age: Option<u64>,

    #[serde(default)]
    pub secure: bool,

    #[serde(default = "default_cookie_path")]
    pub path: String,

    #[serde(default)]
    pub domain: Option<String>,

    #[serde(default = "default_true")]
    pub http_only: bool,
}

fn default_cookie_name() -> String {
    "sessionid".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            max_age: None,
            secure: false,
            path: default_cookie_path(),
            domain: None,
            http_only: true,
        }
    }
}

/// Session store location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory for session files; the system temp dir when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MeshConfig::from_toml("").unwrap();
        assert_eq!(config.server.address(), "0.0.0.0:8080");
        assert!(config.proxy.is_none());
        assert!(config.clients.is_empty());
    }

    #[test]
    fn parses_full_file() {
        let config = MeshConfig::from_toml(
            r#"
            log_level = "debug"

            [server]
            bind = "127.0.0.1"
            port = 9000

            [proxy]
            url = "http://inventory.internal:8080"
            mount = "/inventory"

            [clients.billing]
            url = "http://billing.internal:8080/api"

            [sessions.cookie]
            name = "sid"
            max_age = 3600
            "#,
        )
        .unwrap();

        assert_eq!(config.server.address(), "127.0.0.1:9000");
        assert_eq!(config.proxy.as_ref().unwrap().mount, "/inventory");
        assert_eq!(
            config.client("billing").unwrap().url,
            "http://billing.internal:8080/api"
        );
        let sessions = config.sessions.unwrap();
        assert!(sessions.enabled);
        assert_eq!(sessions.cookie.name, "sid");
        assert_eq!(sessions.cookie.max_age, Some(3600));
        assert!(sessions.cookie.http_only);
    }

    #[test]
    fn empty_client_url_rejected() {
        let err = MeshConfig::from_toml(
            r#"
            [clients.billing]
            url = ""
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("billing")));
    }

    #[test]
    fn relative_url_rejected() {
        assert!(validate_url("/just/a/path").is_err());
        assert!(validate_url("http://localhost:8080").is_ok());
    }

    #[test]
    fn proxy_mount_must_be_absolute() {
        let proxy = ProxyConfig::new("http://localhost:1").mount("api");
        assert!(proxy.validate().is_err());
    }

    #[test]
    fn cookie_name_must_be_a_token() {
        let mut sessions = SessionConfig::default();
        sessions.cookie.name = "a;b".into();
        assert!(sessions.validate().is_err());
    }
}
