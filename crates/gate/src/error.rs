// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire-level error codes for the auth API.
///
/// `UnknownIdentity`, `BadSecret` and `WrongProvider` rejections are
/// coalesced into `InvalidCredentials` before they reach the wire so a
/// caller cannot enumerate which emails exist; the distinction survives
/// internally as [`crate::verifier::RejectReason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthCode {
    InvalidAppId,
    InvalidCredentials,
    Unverified,
    TokenInvalid,
    TokenExpired,
    RefreshExhausted,
    RateLimited,
    Unavailable,
    BadRequest,
    Internal,
}

impl AuthCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidAppId => 401,
            Self::InvalidCredentials => 401,
            Self::Unverified => 403,
            Self::TokenInvalid => 401,
            Self::TokenExpired => 401,
            Self::RefreshExhausted => 401,
            Self::RateLimited => 429,
            Self::Unavailable => 503,
            Self::BadRequest => 400,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidAppId => "INVALID_APP_ID",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Unverified => "UNVERIFIED",
            Self::TokenInvalid => "TOKEN_INVALID",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::RefreshExhausted => "REFRESH_EXHAUSTED",
            Self::RateLimited => "RATE_LIMITED",
            Self::Unavailable => "UNAVAILABLE",
            Self::BadRequest => "BAD_REQUEST",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            status: "error".to_owned(),
            error: self.to_error_body(message),
        };
        (status, Json(body))
    }
}

impl fmt::Display for AuthCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error response envelope: `{"status":"error","error":{..}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
