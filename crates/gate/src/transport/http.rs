// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the auth endpoints.
//!
//! The refresh token travels in an httpOnly cookie scoped to `/auth`,
//! out-of-band from the access token in the response body.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AuthCode;
use crate::identity::{hash_secret, Identity, Provider, PublicIdentity};
use crate::state::GateState;
use crate::token::{TokenError, TokenKind};
use crate::verifier::{Credential, ExternalProfile, RejectReason, VerificationOutcome};

const REFRESH_COOKIE: &str = "refresh_token";

/// Successful signin/refresh response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub status: String,
    pub user: PublicIdentity,
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

fn refresh_cookie(token: &str, max_age_secs: u64) -> String {
    format!(
        "{REFRESH_COOKIE}={token}; Path=/auth; HttpOnly; Secure; SameSite=Strict; Max-Age={max_age_secs}"
    )
}

fn clear_refresh_cookie() -> String {
    format!("{REFRESH_COOKIE}=; Path=/auth; HttpOnly; Secure; SameSite=Strict; Max-Age=0")
}

/// Pull the refresh token out of the `Cookie` header.
fn refresh_cookie_value(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix("refresh_token=").map(str::to_owned))
}

fn internal(e: anyhow::Error) -> Response {
    tracing::error!(err = %e, "internal auth failure");
    AuthCode::Internal.to_http_response("internal error").into_response()
}

fn rejection(reason: RejectReason) -> Response {
    let code = reason.auth_code();
    let message = match code {
        AuthCode::Unverified => "email not verified; complete verification to sign in",
        AuthCode::TokenExpired => "token expired",
        AuthCode::TokenInvalid => "invalid token",
        _ => "invalid credentials",
    };
    tracing::debug!(reason = ?reason, "credential rejected");
    code.to_http_response(message).into_response()
}

/// Mint a fresh access/refresh pair for `identity`, record the refresh
/// jti (rotation), and build the response with the rotated cookie.
async fn issue_session(s: &GateState, identity: &Identity) -> anyhow::Result<Response> {
    let (access_token, _) = s.tokens.issue(TokenKind::Access, &identity.id)?;
    let (refresh_token, refresh_claims) = s.tokens.issue(TokenKind::Refresh, &identity.id)?;
    s.store.set_refresh_jti(&identity.id, Some(refresh_claims.jti)).await?;

    let body = SessionResponse {
        status: "ok".to_owned(),
        user: identity.public(),
        access_token,
        expires_in: s.config.access_ttl_secs,
    };
    let cookie = refresh_cookie(&refresh_token, s.config.refresh_ttl_secs);
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// `GET /healthz` — liveness, no app id required.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "running" }))
}

/// `POST /auth/signup` — create a password-provider identity.
///
/// The identity starts unverified; verification delivery is an external
/// collaborator. No tokens are issued here.
pub async fn signup(
    State(s): State<Arc<GateState>>,
    Json(req): Json<SignupRequest>,
) -> Response {
    if !req.email.contains('@') || req.password.len() < 8 {
        return AuthCode::BadRequest
            .to_http_response("email must be valid and password at least 8 characters")
            .into_response();
    }
    // Deliberately the same response for "taken" as for other signup
    // rejections: no email enumeration.
    if s.store.find_by_email(&req.email).await.is_some() {
        return AuthCode::BadRequest.to_http_response("unable to register").into_response();
    }

    let identity = Identity {
        id: uuid::Uuid::new_v4().to_string(),
        email: req.email,
        verified: false,
        provider: Provider::Password,
        display_name: req.display_name,
        avatar_url: None,
        secret_hash: Some(hash_secret(&req.password)),
        api_key_hash: None,
        refresh_jti: None,
    };
    match s.store.insert(identity.clone()).await {
        Ok(()) => {
            tracing::info!(email = %identity.email, "identity created");
            Json(serde_json::json!({ "status": "ok", "user": identity.public() }))
                .into_response()
        }
        Err(e) => internal(e),
    }
}

/// `POST /auth/signin` — password credential to token pair.
pub async fn signin(
    State(s): State<Arc<GateState>>,
    Json(req): Json<SigninRequest>,
) -> Response {
    // Rate limit before any credential check; independent of identity.
    if !s.limiter.allow(&req.email).await {
        return AuthCode::RateLimited.to_http_response("too many signin attempts").into_response();
    }

    let credential = Credential::Password { email: req.email, password: req.password };
    match s.verifier.verify(&credential).await {
        Ok(VerificationOutcome::Verified(identity)) => {
            match issue_session(&s, &identity).await {
                Ok(resp) => resp,
                Err(e) => internal(e),
            }
        }
        Ok(VerificationOutcome::Rejected(reason)) => rejection(reason),
        Err(e) => internal(e),
    }
}

/// `POST /auth/external` — upstream-verified identity assertion.
pub async fn external(
    State(s): State<Arc<GateState>>,
    Json(profile): Json<ExternalProfile>,
) -> Response {
    match s.verifier.verify(&Credential::External { profile }).await {
        Ok(VerificationOutcome::Verified(identity)) => {
            match issue_session(&s, &identity).await {
                Ok(resp) => resp,
                Err(e) => internal(e),
            }
        }
        Ok(VerificationOutcome::Rejected(reason)) => rejection(reason),
        Err(e) => internal(e),
    }
}

/// `POST /auth/refresh` — rotate the token pair from the refresh cookie.
pub async fn refresh(State(s): State<Arc<GateState>>, headers: HeaderMap) -> Response {
    let Some(token) = refresh_cookie_value(&headers) else {
        return AuthCode::TokenInvalid.to_http_response("missing refresh cookie").into_response();
    };
    let claims = match s.tokens.verify(&token, TokenKind::Refresh) {
        Ok(claims) => claims,
        Err(TokenError::Expired) => {
            return AuthCode::TokenExpired.to_http_response("refresh token expired").into_response()
        }
        Err(_) => {
            return AuthCode::TokenInvalid.to_http_response("invalid refresh token").into_response()
        }
    };
    let Some(identity) = s.store.get(&claims.sub).await else {
        return AuthCode::TokenInvalid.to_http_response("invalid refresh token").into_response();
    };
    // Rotation check: only the most recently issued refresh token is
    // accepted. A superseded token (or one cleared by signout) fails.
    if identity.refresh_jti.as_deref() != Some(claims.jti.as_str()) {
        tracing::debug!(subject = %claims.sub, "superseded refresh token presented");
        return AuthCode::TokenInvalid.to_http_response("invalid refresh token").into_response();
    }

    match issue_session(&s, &identity).await {
        Ok(resp) => resp,
        Err(e) => internal(e),
    }
}

/// `POST /auth/me` — resolve the caller's identity from a bearer access
/// token or an API key header.
pub async fn me(State(s): State<Arc<GateState>>, headers: HeaderMap) -> Response {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());

    let credential = match (bearer, api_key) {
        (Some(token), _) => Credential::Bearer { token: token.to_owned() },
        (None, Some(key)) => Credential::ApiKey { key: key.to_owned() },
        (None, None) => {
            return AuthCode::TokenInvalid
                .to_http_response("missing credentials")
                .into_response()
        }
    };

    match s.verifier.verify(&credential).await {
        Ok(VerificationOutcome::Verified(identity)) => {
            Json(serde_json::json!({ "status": "ok", "user": identity.public() })).into_response()
        }
        Ok(VerificationOutcome::Rejected(reason)) => rejection(reason),
        Err(e) => internal(e),
    }
}

/// `POST /auth/signout` — clear the server-side refresh reference and
/// expire the cookie. Always succeeds from the caller's point of view.
pub async fn signout(State(s): State<Arc<GateState>>, headers: HeaderMap) -> Response {
    if let Some(token) = refresh_cookie_value(&headers) {
        if let Ok(claims) = s.tokens.verify(&token, TokenKind::Refresh) {
            if let Err(e) = s.store.set_refresh_jti(&claims.sub, None).await {
                tracing::debug!(err = %e, "signout for unknown subject");
            }
        }
    }
    (
        [(header::SET_COOKIE, clear_refresh_cookie())],
        Json(serde_json::json!({ "status": "ok" })),
    )
        .into_response()
}
