// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signed, time-bounded token issue/verify.
//!
//! Tokens are `b64url(claims-json) + "." + b64url(hmac-sha256)`. The
//! service has no mutable state: output is a pure function of the
//! configured secret, the claims, and the caller-supplied clock.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::hmac;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;

/// Which token a claim set belongs to. Verification rejects a token
/// presented as the wrong kind even when the signature is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Signed token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (identity id).
    pub sub: String,
    pub kind: TokenKind,
    /// Issued at, epoch seconds.
    pub iat: u64,
    /// Expiry, epoch seconds.
    pub exp: u64,
    /// Random token id; also the rotation handle for refresh tokens.
    pub jti: String,
}

/// Why verification failed. All variants fail closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    BadSignature,
    Expired,
    WrongKind,
}

pub struct TokenService {
    key: hmac::Key,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(
        secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
            access_ttl,
            refresh_ttl,
            clock,
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// Mint a signed token for `subject_id`, expiring `configured TTL` from now.
    pub fn issue(&self, kind: TokenKind, subject_id: &str) -> anyhow::Result<(String, Claims)> {
        let now = self.clock.now_epoch_secs();
        let claims = Claims {
            sub: subject_id.to_owned(),
            kind,
            iat: now,
            exp: now + self.ttl(kind).as_secs(),
            jti: new_jti(),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let tag = hmac::sign(&self.key, payload.as_bytes());
        let sig = URL_SAFE_NO_PAD.encode(tag.as_ref());
        Ok((format!("{payload}.{sig}"), claims))
    }

    /// Verify signature, kind, and expiry. `exp <= now` is expired; no
    /// clock-skew leeway is applied.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let (payload, sig) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let sig_bytes = URL_SAFE_NO_PAD.decode(sig).map_err(|_| TokenError::Malformed)?;
        hmac::verify(&self.key, payload.as_bytes(), &sig_bytes)
            .map_err(|_| TokenError::BadSignature)?;

        let claims_bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|_| TokenError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&claims_bytes).map_err(|_| TokenError::Malformed)?;

        if claims.kind != kind {
            return Err(TokenError::WrongKind);
        }
        if claims.exp <= self.clock.now_epoch_secs() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

/// Random 128-bit token id, base64url. Two tokens minted in the same
/// second still differ, which is what makes rotation observable.
fn new_jti() -> String {
    let bytes: [u8; 16] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
