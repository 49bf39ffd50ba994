// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Spire mesh integration.
//!
//! Propagates a request-scoped [`Context`] across service boundaries.
//!
//! # Features
//!
//! - **Context stack**: push/pop the current context per logical thread of
//!   control ([`context::push`], [`context::get`])
//! - **Server**: [`MeshServer`] parses `X-SPIRE-*` headers on every inbound
//!   request and makes the context current while the handler runs
//! - **Client**: [`MeshClient`] attaches the constructed context to every
//!   outbound call
//! - **Proxy**: [`MeshProxy`] forwards requests upstream with their context
//! - **Cookie sessions**: [`web_session`] middleware with filesystem and
//!   in-memory stores
//!
//! # Architecture
//!
//! ```text
//!  inbound request (X-SPIRE-tenant: acme)
//!        |
//!        v
//!   manage_context  --push-->  context stack (task scope)
//!        |                          |
//!        v                          v
//!     handler  --MeshClient-->  construct_context() --> X-SPIRE-tenant: acme
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod middleware;
pub mod proxy;
pub mod server;
pub mod web_session;

pub use client::{HttpTransport, MeshClient, MeshClients, Transport};
pub use config::{ConfigError, MeshConfig};
pub use context::{construct_context, Context, ContextGuard, CONTEXT_HEADER_PREFIX};
pub use error::MeshError;
pub use middleware::{manage_context, parse_context};
pub use proxy::MeshProxy;
pub use server::{introspection_bundle, MeshServer};
pub use web_session::{SessionManager, WebSession};
