// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outbound mesh calls.
//!
//! [`MeshClient`] attaches the constructed context to every request and
//! hands it to a [`Transport`]. The default transport is [`HttpTransport`]
//! (reqwest); tests and embedders can plug in their own.

use crate::config::{validate_url, ClientConfig};
use crate::context::{self, Context};
use crate::error::MeshError;
use axum::body::Bytes;
use axum::http::{header, HeaderValue, Method, Request, Response};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Sends fully-formed HTTP requests.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>, MeshError>> + Send;
}

/// reqwest-backed transport.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured reqwest client (timeouts, TLS, pools...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, MeshError> {
        let request = reqwest::Request::try_from(request)?;
        let response = self.client.execute(request).await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        let mut out = Response::new(body);
        *out.status_mut() = status;
        *out.headers_mut() = headers;
        Ok(out)
    }
}

/// Join a base URL and a path (with optional query) with exactly one '/'.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.is_empty() || path == "/" {
        return format!("{}/", base);
    }
    format!("{}/{}", base, path.trim_start_matches('/'))
}

// ---------------------------------------------------------------------------
// MeshClient
// ---------------------------------------------------------------------------

/// Client for one remote mesh service.
#[derive(Debug)]
pub struct MeshClient<T: Transport = HttpTransport> {
    url: String,
    transport: Arc<T>,
}

impl MeshClient<HttpTransport> {
    /// Client for `url` over HTTP.
    pub fn new(url: impl Into<String>) -> Result<Self, MeshError> {
        Self::with_transport(url, HttpTransport::new())
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, MeshError> {
        Self::new(config.url.clone())
    }
}

impl<T: Transport> MeshClient<T> {
    /// Client for `url` over a custom transport.
    pub fn with_transport(url: impl Into<String>, transport: T) -> Result<Self, MeshError> {
        let url = url.into();
        validate_url(&url)?;
        Ok(Self {
            url,
            transport: Arc::new(transport),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build a request to `path` carrying `context` as headers.
    pub fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
        context: Option<&Context>,
    ) -> Result<Request<Bytes>, MeshError> {
        let mut request = Request::builder()
            .method(method)
            .uri(join_url(&self.url, path))
            .body(body)?;
        if let Some(context) = context {
            context.apply_to_headers(request.headers_mut())?;
        }
        Ok(request)
    }

    /// Send a request carrying the constructed context.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
    ) -> Result<Response<Bytes>, MeshError> {
        let context = context::construct_context();
        self.request_with_context(method, path, body, context.as_ref())
            .await
    }

    /// Send a request carrying an explicit context (or none).
    pub async fn request_with_context(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
        context: Option<&Context>,
    ) -> Result<Response<Bytes>, MeshError> {
        let request = self.build_request(method, path, body, context)?;
        tracing::debug!("mesh call {} {}", request.method(), request.uri());
        self.transport.send(request).await
    }

    pub async fn get(&self, path: &str) -> Result<Response<Bytes>, MeshError> {
        self.request(Method::GET, path, Bytes::new()).await
    }

    pub async fn delete(&self, path: &str) -> Result<Response<Bytes>, MeshError> {
        self.request(Method::DELETE, path, Bytes::new()).await
    }

    /// POST `payload` as JSON.
    pub async fn post_json<S: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &S,
    ) -> Result<Response<Bytes>, MeshError> {
        self.send_json(Method::POST, path, payload).await
    }

    /// PUT `payload` as JSON.
    pub async fn put_json<S: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &S,
    ) -> Result<Response<Bytes>, MeshError> {
        self.send_json(Method::PUT, path, payload).await
    }

    async fn send_json<S: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &S,
    ) -> Result<Response<Bytes>, MeshError> {
        let body = serde_json::to_vec(payload)?;
        let context = context::construct_context();
        let mut request = self.build_request(method, path, Bytes::from(body), context.as_ref())?;
        request.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.transport.send(request).await
    }
}

impl<T: Transport> Clone for MeshClient<T> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

// ---------------------------------------------------------------------------
// MeshClients
// ---------------------------------------------------------------------------

/// Named HTTP clients, one per entry of the `[clients]` config section.
#[derive(Clone, Default)]
pub struct MeshClients {
    clients: BTreeMap<String, MeshClient>,
}

impl MeshClients {
    pub fn from_config(configs: &BTreeMap<String, ClientConfig>) -> Result<Self, MeshError> {
        let clients = configs
            .iter()
            .map(|(name, config)| Ok((name.clone(), MeshClient::from_config(config)?)))
            .collect::<Result<_, MeshError>>()?;
        Ok(Self { clients })
    }

    pub fn get(&self, name: &str) -> Option<&MeshClient> {
        self.clients.get(name)
    }

    /// Client names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
