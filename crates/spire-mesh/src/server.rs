// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mesh server: bundles mounted behind the context manager.

use crate::config::ConfigError;
use crate::error::MeshError;
use crate::middleware::manage_context;
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde::Serialize;
use std::collections::BTreeSet;

/// Serves one or more bundles with context management.
///
/// Each bundle is an axum router mounted at a distinct path prefix
/// (`"/"` merges it at the root).
#[derive(Default)]
pub struct MeshServer {
    router: Router,
    mounts: BTreeSet<String>,
}

impl MeshServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `bundle` under `mount`. Each prefix may be used once.
    pub fn bundle(mut self, mount: &str, bundle: Router) -> Result<Self, MeshError> {
        if !mount.starts_with('/') {
            return Err(ConfigError::Invalid(format!("mount `{}` must start with '/'", mount)).into());
        }
        let mount = if mount.len() > 1 {
            mount.trim_end_matches('/')
        } else {
            mount
        };
        if !self.mounts.insert(mount.to_string()) {
            return Err(ConfigError::Invalid(format!("mount `{}` is already used", mount)).into());
        }

        self.router = if mount == "/" {
            self.router.merge(bundle)
        } else {
            self.router.nest_service(mount, bundle)
        };
        Ok(self)
    }

    /// Mounted prefixes, sorted.
    pub fn mounts(&self) -> impl Iterator<Item = &str> {
        self.mounts.iter().map(String::as_str)
    }

    /// The routed application, wrapped in [`manage_context`].
    pub fn into_router(self) -> Router {
        self.router.layer(middleware::from_fn(manage_context))
    }

    /// Serve on `listener` until the server fails.
    pub async fn serve(self, listener: tokio::net::TcpListener) -> Result<(), MeshError> {
        let addr = listener.local_addr()?;
        tracing::info!("mesh server listening on http://{}", addr);
        axum::serve(listener, self.into_router()).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Introspection bundle
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ContextReport {
    current: Option<crate::Context>,
    inbound: Option<crate::Context>,
    constructed: Option<crate::Context>,
}

/// GET /context -- contexts visible to the current request.
async fn context_report() -> Json<ContextReport> {
    Json(ContextReport {
        current: crate::context::get(),
        inbound: crate::context::current_request().map(|r| r.context.clone()),
        constructed: crate::context::construct_context(),
    })
}

/// GET /info -- service metadata.
async fn info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "spire-mesh",
        "version": env!("CARGO_PKG_VERSION"),
        "context_header_prefix": crate::CONTEXT_HEADER_PREFIX,
    }))
}

/// Bundle exposing `/context` and `/info`, usually mounted at `/_spire`.
pub fn introspection_bundle() -> Router {
    Router::new()
        .route("/context", get(context_report))
        .route("/info", get(info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header("x-spire-tenant", "acme")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn introspection_reports_context() {
        let app = MeshServer::new()
            .bundle("/_spire", introspection_bundle())
            .unwrap()
            .into_router();

        let (status, body) = get_json(app, "/_spire/context").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current"]["tenant"], "acme");
        assert_eq!(body["inbound"]["tenant"], "acme");
        assert_eq!(body["constructed"]["tenant"], "acme");
    }

    #[tokio::test]
    async fn root_bundle_is_merged() {
        let app = MeshServer::new()
            .bundle("/", Router::new().route("/ping", get(|| async { "pong" })))
            .unwrap()
            .bundle("/_spire/", introspection_bundle())
            .unwrap();
        assert_eq!(app.mounts().collect::<Vec<_>>(), vec!["/", "/_spire"]);

        let (status, body) = get_json(app.into_router(), "/_spire/info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["context_header_prefix"], "X-SPIRE-");
    }

    #[test]
    fn duplicate_mount_rejected() {
        let result = MeshServer::new()
            .bundle("/a", Router::new())
            .unwrap()
            .bundle("/a/", Router::new());
        assert!(matches!(result, Err(MeshError::Config(_))));
    }

    #[test]
    fn relative_mount_rejected() {
        assert!(MeshServer::new().bundle("a", Router::new()).is_err());
    }
}
