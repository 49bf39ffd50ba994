// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request context and its propagation.
//!
//! A [`Context`] describes who (or what) is making a call. It travels
//! between services as a set of `X-SPIRE-<key>` headers and, inside a
//! service, lives on a stack scoped to the logical thread of control.

use crate::error::MeshError;
use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use axum::http::{Method, Uri};
use serde::{Deserialize, Serialize};
use spire_local::{LocalGuard, LocalStack};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Header prefix that carries context entries.
pub const CONTEXT_HEADER_PREFIX: &str = "X-SPIRE-";

static CONTEXT: LocalStack<Context> = LocalStack::new("mesh.context");
static CURRENT_REQUEST: LocalStack<Arc<RequestInfo>> = LocalStack::new("mesh.request");

/// Handle returned by [`push`]; pops the context when dropped.
pub type ContextGuard = LocalGuard<Context>;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Opaque request context: an ordered map of string entries.
///
/// Keys are stored lower-cased since they round-trip through header names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    entries: BTreeMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert an entry, returning the previous value for that key.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.entries
            .insert(key.as_ref().to_ascii_lowercase(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(&key.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Collect every `X-SPIRE-*` header into a context.
    ///
    /// Header values that are not visible ASCII are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut context = Context::new();
        for (name, value) in headers {
            let Some(key) = context_key(name.as_str()) else {
                continue;
            };
            match value.to_str() {
                Ok(value) => {
                    context.insert(key, value);
                }
                Err(_) => tracing::warn!("ignoring non-ASCII context header `{}`", name),
            }
        }
        context
    }

    /// Write this context as `X-SPIRE-*` headers, replacing any context
    /// headers already present.
    pub fn apply_to_headers(&self, headers: &mut HeaderMap) -> Result<(), MeshError> {
        strip_context_headers(headers);
        for (key, value) in self.iter() {
            let name = format!("{}{}", CONTEXT_HEADER_PREFIX, key);
            let name = HeaderName::try_from(name.as_str())
                .map_err(|_| MeshError::InvalidHeader(format!("invalid context key `{}`", key)))?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                MeshError::InvalidHeader(format!("invalid value for context key `{}`", key))
            })?;
            headers.insert(name, value);
        }
        Ok(())
    }

    /// Render this context as a fresh header map.
    pub fn to_headers(&self) -> Result<HeaderMap, MeshError> {
        let mut headers = HeaderMap::new();
        self.apply_to_headers(&mut headers)?;
        Ok(headers)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = Context::new();
        for (key, value) in iter {
            context.insert(key, value);
        }
        context
    }
}

/// Context key carried by a header name, if it has the context prefix.
fn context_key(name: &str) -> Option<&str> {
    let prefix_len = CONTEXT_HEADER_PREFIX.len();
    if name.len() <= prefix_len || !name.is_char_boundary(prefix_len) {
        return None;
    }
    let (prefix, key) = name.split_at(prefix_len);
    prefix
        .eq_ignore_ascii_case(CONTEXT_HEADER_PREFIX)
        .then_some(key)
}

/// Remove every `X-SPIRE-*` header.
pub fn strip_context_headers(headers: &mut HeaderMap) {
    let names: Vec<HeaderName> = headers
        .keys()
        .filter(|name| context_key(name.as_str()).is_some())
        .cloned()
        .collect();
    for name in names {
        headers.remove(name);
    }
}

// ---------------------------------------------------------------------------
// Context stack
// ---------------------------------------------------------------------------

/// Make `context` current for the calling logical thread of control.
///
/// # Panics
///
/// When called from a tokio task that did not enter [`spire_local::scope`].
pub fn push(context: Context) -> ContextGuard {
    CONTEXT.push(context)
}

/// The current context, if one was pushed.
pub fn get() -> Option<Context> {
    CONTEXT.get()
}

/// Number of contexts stacked for the calling logical thread of control.
pub fn depth() -> usize {
    CONTEXT.depth()
}

/// Context to attach to an outbound call.
///
/// Prefers the current context, then the context of the inbound request
/// being served. Empty contexts count as absent.
pub fn construct_context() -> Option<Context> {
    if let Some(context) = get().filter(|c| !c.is_empty()) {
        return Some(context);
    }
    current_request()
        .map(|request| request.context.clone())
        .filter(|c| !c.is_empty())
}

// ---------------------------------------------------------------------------
// Current request
// ---------------------------------------------------------------------------

/// The inbound request served by the current logical thread of control.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub context: Context,
}

/// The inbound request currently being served, if any.
pub fn current_request() -> Option<Arc<RequestInfo>> {
    CURRENT_REQUEST.get()
}

/// Record `request` as the one being served.
pub(crate) fn enter_request(request: RequestInfo) -> LocalGuard<Arc<RequestInfo>> {
    CURRENT_REQUEST.push(Arc::new(request))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
