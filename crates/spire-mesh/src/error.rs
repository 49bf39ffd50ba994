// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mesh error type and its HTTP rendering.

use crate::config::ConfigError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Errors produced by the mesh layer.
///
/// Transport and I/O failures are carried through unchanged; this layer
/// never retries.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("Invalid context header: {0}")]
    InvalidHeader(String),

    #[error("Invalid target URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] axum::http::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Body error: {0}")]
    Body(#[from] axum::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MeshError {
    /// Status code used when this error terminates an inbound request.
    pub fn status(&self) -> StatusCode {
        match self {
            MeshError::InvalidHeader(_) | MeshError::Body(_) => StatusCode::BAD_REQUEST,
            MeshError::Transport(err) if err.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            MeshError::Transport(err) if err.is_connect() => StatusCode::SERVICE_UNAVAILABLE,
            MeshError::Transport(_) => StatusCode::BAD_GATEWAY,
            MeshError::InvalidUrl(_)
            | MeshError::Config(_)
            | MeshError::Http(_)
            | MeshError::Json(_)
            | MeshError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for MeshError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!("request failed ({}): {}", status.as_u16(), self);
        let body = ApiError {
            error: self.to_string(),
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_errors_are_client_errors() {
        let err = MeshError::InvalidHeader("x-spire-bad key".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn config_errors_are_server_errors() {
        let err = MeshError::from(ConfigError::Invalid("url is empty".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("url is empty"));
    }
}
