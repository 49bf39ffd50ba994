// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Spire mesh node
//!
//! Serves the context introspection endpoints and, optionally, a
//! context-propagating proxy to an upstream service.
//!
//! # Usage
//!
//! ```bash
//! # Introspection only, on port 8080
//! spire-mesh
//!
//! # Proxy /inventory/* to an upstream service
//! spire-mesh --proxy-url http://inventory.internal:8080 --mount /inventory
//!
//! # Using a config file
//! spire-mesh --config mesh.toml
//! ```
//!
//! # Endpoints
//!
//! - `GET /_spire/context` - Contexts visible to the request
//! - `GET /_spire/info` - Node info
//! - `GET /_spire/clients` - Names of the configured outbound clients
//! - `* <mount>/...` - Proxied upstream (when configured)

use anyhow::{Context as _, Result};
use clap::Parser;
use spire_mesh::config::{MeshConfig, ProxyConfig};
use axum::routing::get;
use axum::{Extension, Json};
use spire_mesh::{introspection_bundle, MeshClients, MeshProxy, MeshServer, SessionManager};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Spire mesh node
#[derive(Parser, Debug)]
#[command(name = "spire-mesh")]
#[command(about = "Context-propagating mesh server and proxy")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Upstream URL to proxy to
    #[arg(long)]
    proxy_url: Option<String>,

    /// Path prefix for the proxy
    #[arg(long, default_value = "/")]
    mount: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<MeshConfig> {
        let mut config = match &self.config {
            Some(path) => MeshConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => MeshConfig::default(),
        };
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind) = self.bind {
            config.server.bind = bind;
        }
        if let Some(url) = self.proxy_url {
            config.proxy = Some(ProxyConfig::new(url).mount(self.mount));
        }
        if let Some(level) = self.log_level {
            config.log_level = Some(level);
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// GET /_spire/clients
async fn client_names(Extension(clients): Extension<Arc<MeshClients>>) -> Json<Vec<String>> {
    Json(clients.names().map(str::to_string).collect())
}

fn build_router(config: &MeshConfig) -> Result<axum::Router> {
    let clients = Arc::new(MeshClients::from_config(&config.clients)?);
    for name in clients.names() {
        if let Some(client) = clients.get(name) {
            info!("Client {}: {}", name, client.url());
        }
    }

    let introspection = introspection_bundle().route("/clients", get(client_names));
    let mut server = MeshServer::new().bundle("/_spire", introspection)?;

    if let Some(proxy) = &config.proxy {
        info!("Proxy: {} -> {}", proxy.mount, proxy.url);
        let router = MeshProxy::from_config(proxy)?.into_router();
        server = server.bundle(&proxy.mount, router)?;
    }

    let mut router = server.into_router().layer(Extension(clients));

    if let Some(sessions) = &config.sessions {
        let manager = SessionManager::from_config(sessions.clone())
            .context("opening session store")?;
        router = Arc::new(manager).layer(router);
    }

    Ok(router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().into_config()?;
    init_logging(config.log_level.as_deref());

    let app = build_router(&config)?;

    let addr = config.server.address();
    info!("Spire mesh v{}", env!("CARGO_PKG_VERSION"));
    info!("HTTP server: http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::{header, StatusCode};
    use spire_mesh::config::{ClientConfig, SessionConfig, StoreConfig};
    use tower::ServiceExt;

    fn node_config(store: &std::path::Path) -> MeshConfig {
        let mut config = MeshConfig::default();
        config.proxy = Some(ProxyConfig::new("http://127.0.0.1:9"));
        config.sessions = Some(SessionConfig {
            store: StoreConfig {
                path: Some(store.to_path_buf()),
            },
            ..SessionConfig::default()
        });
        config
            .clients
            .insert("billing".into(), ClientConfig::new("http://billing.internal"));
        config
    }

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Option<String>, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header(header::ORIGIN, "http://console.internal")
                    .header("x-spire-tenant", "acme")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let cors = response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, cors, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn introspection_beside_root_proxy() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(&node_config(dir.path())).unwrap();

        let (status, cors, body) = get_json(app.clone(), "/_spire/info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cors.as_deref(), Some("*"));
        assert_eq!(body["name"], "spire-mesh");

        let (status, _, body) = get_json(app.clone(), "/_spire/context").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["constructed"]["tenant"], "acme");

        let (status, _, body) = get_json(app, "/_spire/clients").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!(["billing"]));
    }

    #[tokio::test]
    async fn plain_node_has_no_clients() {
        let app = build_router(&MeshConfig::default()).unwrap();
        let (status, _, body) = get_json(app, "/_spire/clients").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }

    #[test]
    fn proxy_cannot_shadow_introspection() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = node_config(dir.path());
        config.proxy = Some(ProxyConfig::new("http://127.0.0.1:9").mount("/_spire"));
        assert!(build_router(&config).is_err());
    }

    #[test]
    fn cli_flags_override_config() {
        let args = Args::parse_from([
            "spire-mesh",
            "--port",
            "9090",
            "--proxy-url",
            "http://inventory.internal:8080",
            "--mount",
            "/inventory",
        ]);
        let config = args.into_config().unwrap();
        assert_eq!(config.server.port, 9090);
        let proxy = config.proxy.unwrap();
        assert_eq!(proxy.mount, "/inventory");
        assert_eq!(proxy.url, "http://inventory.internal:8080");
    }
}
