// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential verification strategies.
//!
//! One closed set of credential variants, one shared outcome type. The
//! dispatcher selects a strategy by variant tag and never falls back to
//! another strategy. Expected rejections are typed outcomes; only store
//! failures propagate as errors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AuthCode;
use crate::identity::{api_key_digest, verify_secret, Identity, IdentityStore, Provider};
use crate::token::{TokenError, TokenKind, TokenService};

/// A presented credential, tagged by strategy.
#[derive(Debug, Clone)]
pub enum Credential {
    Password { email: String, password: String },
    Bearer { token: String },
    ApiKey { key: String },
    External { profile: ExternalProfile },
}

/// Profile assertion from an upstream identity provider. Already
/// authenticated upstream; verification here only maps claims to a
/// local identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalProfile {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Closed set of expected rejection reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    UnknownIdentity,
    BadSecret,
    WrongProvider,
    Unverified,
    TokenInvalid,
    TokenExpired,
}

impl RejectReason {
    /// Wire-level code. Identity-shaped rejections coalesce into one
    /// generic code so callers cannot probe which emails exist.
    pub fn auth_code(&self) -> AuthCode {
        match self {
            Self::UnknownIdentity | Self::BadSecret | Self::WrongProvider => {
                AuthCode::InvalidCredentials
            }
            Self::Unverified => AuthCode::Unverified,
            Self::TokenInvalid => AuthCode::TokenInvalid,
            Self::TokenExpired => AuthCode::TokenExpired,
        }
    }
}

/// The single contract every strategy resolves to.
#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    Verified(Identity),
    Rejected(RejectReason),
}

pub struct Verifier {
    store: Arc<IdentityStore>,
    tokens: Arc<TokenService>,
}

impl Verifier {
    pub fn new(store: Arc<IdentityStore>, tokens: Arc<TokenService>) -> Self {
        Self { store, tokens }
    }

    /// Dispatch on the credential tag.
    pub async fn verify(&self, credential: &Credential) -> anyhow::Result<VerificationOutcome> {
        match credential {
            Credential::Password { email, password } => self.verify_password(email, password).await,
            Credential::Bearer { token } => self.verify_bearer(token).await,
            Credential::ApiKey { key } => self.verify_api_key(key).await,
            Credential::External { profile } => self.verify_external(profile).await,
        }
    }

    /// Password strategy: lookup, provider, verification flag, secret —
    /// in that order, each check rejecting independently.
    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> anyhow::Result<VerificationOutcome> {
        let Some(identity) = self.store.find_by_email(email).await else {
            return Ok(VerificationOutcome::Rejected(RejectReason::UnknownIdentity));
        };
        if identity.provider != Provider::Password {
            return Ok(VerificationOutcome::Rejected(RejectReason::WrongProvider));
        }
        if !identity.verified {
            return Ok(VerificationOutcome::Rejected(RejectReason::Unverified));
        }
        let matches =
            identity.secret_hash.as_deref().is_some_and(|stored| verify_secret(stored, password));
        if !matches {
            return Ok(VerificationOutcome::Rejected(RejectReason::BadSecret));
        }
        Ok(VerificationOutcome::Verified(identity))
    }

    /// Bearer strategy: token signature + expiry, then subject lookup.
    /// A vanished subject is a normal stale-token rejection, not an
    /// error; the caller's refresh path handles it.
    async fn verify_bearer(&self, token: &str) -> anyhow::Result<VerificationOutcome> {
        let claims = match self.tokens.verify(token, TokenKind::Access) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => {
                return Ok(VerificationOutcome::Rejected(RejectReason::TokenExpired))
            }
            Err(_) => return Ok(VerificationOutcome::Rejected(RejectReason::TokenInvalid)),
        };
        match self.store.get(&claims.sub).await {
            Some(identity) => Ok(VerificationOutcome::Verified(identity)),
            None => Ok(VerificationOutcome::Rejected(RejectReason::UnknownIdentity)),
        }
    }

    /// API-key strategy: hashed comparison, no expiry concept.
    async fn verify_api_key(&self, key: &str) -> anyhow::Result<VerificationOutcome> {
        let digest = api_key_digest(key);
        match self.store.find_by_api_key_hash(&digest).await {
            Some(identity) => Ok(VerificationOutcome::Verified(identity)),
            None => Ok(VerificationOutcome::Rejected(RejectReason::UnknownIdentity)),
        }
    }

    /// External-identity strategy: resolve idempotently by email. The
    /// only strategy permitted to create an identity. On an email
    /// collision the existing identity's provider wins; an account is
    /// never silently converted.
    async fn verify_external(
        &self,
        profile: &ExternalProfile,
    ) -> anyhow::Result<VerificationOutcome> {
        if let Some(existing) = self.store.find_by_email(&profile.email).await {
            if existing.provider != Provider::ExternalIdentity {
                return Ok(VerificationOutcome::Rejected(RejectReason::WrongProvider));
            }
            return Ok(VerificationOutcome::Verified(existing));
        }

        let identity = Identity {
            id: uuid::Uuid::new_v4().to_string(),
            email: profile.email.clone(),
            // The upstream provider already verified the email.
            verified: true,
            provider: Provider::ExternalIdentity,
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            secret_hash: None,
            api_key_hash: None,
            refresh_jti: None,
        };
        if let Err(e) = self.store.insert(identity.clone()).await {
            // Lost a creation race for this email: resolve against the
            // winner with the same tie-break as the lookup above.
            return match self.store.find_by_email(&profile.email).await {
                Some(existing) if existing.provider == Provider::ExternalIdentity => {
                    Ok(VerificationOutcome::Verified(existing))
                }
                Some(_) => Ok(VerificationOutcome::Rejected(RejectReason::WrongProvider)),
                None => Err(e),
            };
        }
        tracing::info!(email = %identity.email, "external identity created");
        Ok(VerificationOutcome::Verified(identity))
    }
}

#[cfg(test)]
#[path = "verifier_tests.rs"]
mod tests;
