// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Context-propagating reverse proxy.
//!
//! Every request reaching the proxy router is forwarded to the upstream
//! URL with its method, path, query, body and end-to-end headers. The
//! inbound context is parsed by [`parse_context`] and re-attached to the
//! outbound leg through [`construct_context`], so a context pushed locally
//! (e.g. by an enclosing [`crate::MeshServer`] handler) overrides it.

use crate::client::{join_url, HttpTransport, Transport};
use crate::config::{validate_url, ProxyConfig};
use crate::context::{construct_context, strip_context_headers};
use crate::error::MeshError;
use crate::middleware::parse_context;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::response::{IntoResponse, Response};
use axum::{middleware, Router};
use std::sync::Arc;

/// Largest inbound body the proxy buffers.
pub const MAX_PROXY_BODY: usize = 16 * 1024 * 1024;

/// Hop-by-hop headers (RFC 9110 section 7.6.1) plus `host`.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "host",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::try_from(name.trim()).ok())
        .collect();
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    for name in listed {
        headers.remove(name);
    }
}

/// Reverse proxy to one upstream service.
pub struct MeshProxy<T: Transport = HttpTransport> {
    url: String,
    transport: T,
}

impl MeshProxy<HttpTransport> {
    pub fn new(url: impl Into<String>) -> Result<Self, MeshError> {
        Self::with_transport(url, HttpTransport::new())
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self, MeshError> {
        config.validate()?;
        Self::new(config.url.clone())
    }
}

impl<T: Transport> MeshProxy<T> {
    pub fn with_transport(url: impl Into<String>, transport: T) -> Result<Self, MeshError> {
        let url = url.into();
        validate_url(&url)?;
        Ok(Self { url, transport })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Router forwarding every request, behind the context parser.
    pub fn into_router(self) -> Router {
        Router::new()
            .fallback(forward_request::<T>)
            .with_state(Arc::new(self))
            .layer(middleware::from_fn(parse_context))
    }

    /// Forward one request upstream and relay the response.
    pub async fn forward(&self, request: Request) -> Result<Response, MeshError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, MAX_PROXY_BODY).await?;

        let path = parts
            .uri
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/");
        let target = join_url(&self.url, path);

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        strip_context_headers(&mut headers);
        if let Some(context) = construct_context() {
            context.apply_to_headers(&mut headers)?;
        }

        let mut outbound = Request::builder()
            .method(parts.method)
            .uri(&target)
            .body(body)?;
        *outbound.headers_mut() = headers;

        tracing::debug!("proxy {} -> {}", outbound.method(), target);
        let response = self.transport.send(outbound).await?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::from(body)))
    }
}

async fn forward_request<T: Transport>(
    State(proxy): State<Arc<MeshProxy<T>>>,
    request: Request,
) -> Response {
    match proxy.forward(request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
