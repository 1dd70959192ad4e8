// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the auth endpoints.
//!
//! The refresh token rides the `/auth`-scoped cookie: responses are
//! parsed for `Set-Cookie` and the token is replayed via a `Cookie`
//! header, so the client works without a browser cookie jar.

use std::fmt;
use std::time::Duration;

use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::Client;

use crate::error::ErrorResponse;
use crate::identity::PublicIdentity;
use crate::transport::http::SessionResponse;

/// Failure classes for authenticated calls. `Network` is the
/// infra-unavailable class: it must never destroy cached refresh
/// material upstream.
#[derive(Debug)]
pub enum ApiError {
    /// 401/403-class rejection with the server's error code.
    Auth { code: String, message: String },
    RateLimited,
    Http { status: u16, message: String },
    Network(reqwest::Error),
}

impl ApiError {
    /// Authorization failures are the ones that trigger the refresh path.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth { code, message } => write!(f, "auth rejected ({code}): {message}"),
            Self::RateLimited => write!(f, "rate limited"),
            Self::Http { status, message } => write!(f, "http {status}: {message}"),
            Self::Network(e) => write!(f, "network failure: {e}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// A freshly-minted token pair plus the identity it belongs to.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub user: PublicIdentity,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

pub struct AuthApi {
    base_url: String,
    app_id: String,
    client: Client,
}

impl AuthApi {
    pub fn new(base_url: String, app_id: String) -> anyhow::Result<Self> {
        // reqwest is built with `rustls-no-provider`; make sure the ring
        // provider is installed before the first TLS handshake.
        let _ = rustls::crypto::ring::default_provider().install_default();
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { base_url, app_id, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).header("x-app-id", &self.app_id)
    }

    /// `POST /auth/signin`.
    pub async fn signin(&self, email: &str, password: &str) -> Result<SessionTokens, ApiError> {
        let resp = self
            .post("/auth/signin")
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(ApiError::Network)?;
        parse_session(resp).await
    }

    /// `POST /auth/refresh` — mint a new pair from the refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, ApiError> {
        let resp = self
            .post("/auth/refresh")
            .header(COOKIE, format!("refresh_token={refresh_token}"))
            .send()
            .await
            .map_err(ApiError::Network)?;
        parse_session(resp).await
    }

    /// `POST /auth/me` with a bearer access token.
    pub async fn me(&self, access_token: &str) -> Result<PublicIdentity, ApiError> {
        let resp = self
            .post("/auth/me")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(ApiError::Network)?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        #[derive(serde::Deserialize)]
        struct MeResponse {
            user: PublicIdentity,
        }
        let body: MeResponse = resp.json().await.map_err(ApiError::Network)?;
        Ok(body.user)
    }

    /// `POST /auth/signout` — best effort; clears the server-side
    /// refresh reference.
    pub async fn signout(&self, refresh_token: &str) -> Result<(), ApiError> {
        let resp = self
            .post("/auth/signout")
            .header(COOKIE, format!("refresh_token={refresh_token}"))
            .send()
            .await
            .map_err(ApiError::Network)?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        Ok(())
    }
}

/// Pull the rotated refresh token out of `Set-Cookie`.
fn extract_refresh_cookie(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers.get_all(SET_COOKIE).iter().find_map(|v| {
        let raw = v.to_str().ok()?;
        let rest = raw.strip_prefix("refresh_token=")?;
        let value = rest.split(';').next().unwrap_or("");
        if value.is_empty() {
            None
        } else {
            Some(value.to_owned())
        }
    })
}

async fn parse_session(resp: reqwest::Response) -> Result<SessionTokens, ApiError> {
    if !resp.status().is_success() {
        return Err(error_from(resp).await);
    }
    let refresh_token = extract_refresh_cookie(resp.headers())
        .ok_or_else(|| ApiError::Http { status: 200, message: "missing refresh cookie".into() })?;
    let body: SessionResponse = resp.json().await.map_err(ApiError::Network)?;
    Ok(SessionTokens {
        user: body.user,
        access_token: body.access_token,
        refresh_token,
        expires_in: body.expires_in,
    })
}

async fn error_from(resp: reqwest::Response) -> ApiError {
    let status = resp.status().as_u16();
    if status == 429 {
        return ApiError::RateLimited;
    }
    let (code, message) = match resp.json::<ErrorResponse>().await {
        Ok(body) => (body.error.code, body.error.message),
        Err(_) => ("UNKNOWN".to_owned(), "unrecognized error response".to_owned()),
    };
    if status == 401 || status == 403 {
        ApiError::Auth { code, message }
    } else {
        ApiError::Http { status, message }
    }
}
