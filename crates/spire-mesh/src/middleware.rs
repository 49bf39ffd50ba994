// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server-side context middleware.
//!
//! Both middlewares run the rest of the request inside a logical scope, so
//! everything they push is released when the request completes, fails,
//! panics or is cancelled.
//!
//! - [`parse_context`] parses the inbound context and records the current
//!   request.
//! - [`manage_context`] additionally pushes the parsed context as the
//!   current one.

use crate::context::{self, Context, RequestInfo};
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

fn describe(request: &mut Request) -> RequestInfo {
    let context = Context::from_headers(request.headers());
    request.extensions_mut().insert(context.clone());
    RequestInfo {
        method: request.method().clone(),
        uri: request.uri().clone(),
        context,
    }
}

/// Parse the inbound context and expose it as the current request.
///
/// The parsed [`Context`] is also inserted as a request extension.
pub async fn parse_context(mut request: Request, next: Next) -> Response {
    let info = describe(&mut request);
    spire_local::scope_if_absent(async move {
        let _request = context::enter_request(info);
        next.run(request).await
    })
    .await
}

/// Parse the inbound context, push it for the duration of the request and
/// pop it afterwards.
pub async fn manage_context(mut request: Request, next: Next) -> Response {
    let info = describe(&mut request);
    tracing::debug!(
        "{} {} with {} context entries",
        info.method,
        info.uri,
        info.context.len()
    );
    spire_local::scope_if_absent(async move {
        let pushed = info.context.clone();
        let _request = context::enter_request(info);
        let _context = context::push(pushed);
        next.run(request).await
    })
    .await
}
