// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn status_mapping_follows_taxonomy() {
    assert_eq!(AuthCode::InvalidAppId.http_status(), 401);
    assert_eq!(AuthCode::InvalidCredentials.http_status(), 401);
    assert_eq!(AuthCode::Unverified.http_status(), 403);
    assert_eq!(AuthCode::TokenExpired.http_status(), 401);
    assert_eq!(AuthCode::RefreshExhausted.http_status(), 401);
    assert_eq!(AuthCode::RateLimited.http_status(), 429);
    assert_eq!(AuthCode::Unavailable.http_status(), 503);
    assert_eq!(AuthCode::Internal.http_status(), 500);
}

#[test]
fn envelope_shape_round_trips() -> anyhow::Result<()> {
    let body = ErrorResponse {
        status: "error".to_owned(),
        error: AuthCode::TokenExpired.to_error_body("access token expired"),
    };
    let json = serde_json::to_value(&body)?;
    assert_eq!(json["status"], "error");
    assert_eq!(json["error"]["code"], "TOKEN_EXPIRED");
    assert_eq!(json["error"]["message"], "access token expired");
    Ok(())
}

#[test]
fn display_matches_code_string() {
    assert_eq!(AuthCode::Unverified.to_string(), "UNVERIFIED");
    assert_eq!(AuthCode::InvalidAppId.to_string(), "INVALID_APP_ID");
}
