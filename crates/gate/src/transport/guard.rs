// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::{AuthCode, ErrorResponse};
use crate::state::GateState;

/// Constant-time string comparison to prevent timing side-channel attacks.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Check the shared application identifier header.
pub fn validate_app_id(headers: &HeaderMap, expected: &str) -> Result<(), AuthCode> {
    let presented = headers
        .get("x-app-id")
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthCode::InvalidAppId)?;
    if constant_time_eq(presented, expected) {
        Ok(())
    } else {
        Err(AuthCode::InvalidAppId)
    }
}

/// Axum middleware enforcing the `x-app-id` header on every route.
///
/// Runs before any credential logic; a missing or mismatched app id
/// short-circuits with its own error code. Exempt: `/healthz`.
pub async fn app_id_layer(
    state: State<Arc<GateState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if req.uri().path() == "/healthz" {
        return next.run(req).await;
    }

    if let Err(code) = validate_app_id(req.headers(), &state.config.app_id) {
        let body = ErrorResponse {
            status: "error".to_owned(),
            error: code.to_error_body("missing or invalid application id"),
        };
        return (
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::UNAUTHORIZED),
            axum::Json(body),
        )
            .into_response();
    }

    next.run(req).await
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
