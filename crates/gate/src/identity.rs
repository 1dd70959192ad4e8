// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity records and the identity store.
//!
//! The store is the only persistence the auth core touches: identities
//! plus the minimal session-tracking fields (last-issued refresh jti,
//! API key hash). Optionally persisted to a JSON file with atomic
//! writes; in-memory only when no path is configured.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::path::PathBuf;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::pbkdf2;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

/// Which credential mechanism owns an identity. An identity never
/// changes provider after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Password,
    ExternalIdentity,
    ApiKey,
}

/// Canonical authenticated subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub verified: bool,
    pub provider: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// PBKDF2 secret hash (`salt$hash`, base64url). Password provider only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_hash: Option<String>,
    /// SHA-256 digest of the API key, base64url. ApiKey provider only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_hash: Option<String>,
    /// jti of the last-issued refresh token. Rotation check: a refresh
    /// token whose jti no longer matches has been superseded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_jti: Option<String>,
}

/// Subset of an identity that is safe to return on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicIdentity {
    pub id: String,
    pub email: String,
    pub verified: bool,
    pub provider: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Identity {
    pub fn public(&self) -> PublicIdentity {
        PublicIdentity {
            id: self.id.clone(),
            email: self.email.clone(),
            verified: self.verified,
            provider: self.provider,
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

const PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;
const PBKDF2_OUT_LEN: usize = 32;
const PBKDF2_ITERS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(n) => n,
    None => NonZeroU32::MIN,
};

/// Derive a `salt$hash` string from a plaintext secret.
pub fn hash_secret(secret: &str) -> String {
    let salt: [u8; 16] = rand::random();
    let mut out = [0u8; PBKDF2_OUT_LEN];
    pbkdf2::derive(PBKDF2_ALG, PBKDF2_ITERS, &salt, secret.as_bytes(), &mut out);
    format!("{}${}", URL_SAFE_NO_PAD.encode(salt), URL_SAFE_NO_PAD.encode(out))
}

/// Constant-time verification of a plaintext secret against a stored
/// `salt$hash` string.
pub fn verify_secret(stored: &str, secret: &str) -> bool {
    let Some((salt_b64, hash_b64)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (URL_SAFE_NO_PAD.decode(salt_b64), URL_SAFE_NO_PAD.decode(hash_b64))
    else {
        return false;
    };
    pbkdf2::verify(PBKDF2_ALG, PBKDF2_ITERS, &salt, secret.as_bytes(), &hash).is_ok()
}

/// SHA-256 digest of an opaque API key, base64url.
pub fn api_key_digest(key: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(key.as_bytes()))
}

#[derive(Debug, Default)]
struct Inner {
    by_id: HashMap<String, Identity>,
    /// Lowercased email -> identity id.
    email_index: HashMap<String, String>,
}

/// Serializable snapshot for file persistence.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct PersistedIdentities {
    identities: Vec<Identity>,
}

pub struct IdentityStore {
    inner: RwLock<Inner>,
    persist_path: Option<PathBuf>,
}

impl IdentityStore {
    pub fn new(persist_path: Option<PathBuf>) -> Self {
        Self { inner: RwLock::new(Inner::default()), persist_path }
    }

    /// Load persisted identities from disk, if a path is configured and
    /// the file exists. A missing file is a fresh store, not an error.
    pub async fn load(&self) -> anyhow::Result<()> {
        let Some(ref path) = self.persist_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }
        let contents = std::fs::read_to_string(path)?;
        let persisted: PersistedIdentities = serde_json::from_str(&contents)?;
        let mut inner = self.inner.write().await;
        for identity in persisted.identities {
            inner.email_index.insert(identity.email.to_lowercase(), identity.id.clone());
            inner.by_id.insert(identity.id.clone(), identity);
        }
        tracing::info!(count = inner.by_id.len(), "identity store loaded");
        Ok(())
    }

    /// Insert a new identity. Fails if the email is already taken.
    pub async fn insert(&self, identity: Identity) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        let email_key = identity.email.to_lowercase();
        if inner.email_index.contains_key(&email_key) {
            anyhow::bail!("email already registered: {}", identity.email);
        }
        inner.email_index.insert(email_key, identity.id.clone());
        inner.by_id.insert(identity.id.clone(), identity);
        self.persist(&inner);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Option<Identity> {
        self.inner.read().await.by_id.get(id).cloned()
    }

    pub async fn find_by_email(&self, email: &str) -> Option<Identity> {
        let inner = self.inner.read().await;
        let id = inner.email_index.get(&email.to_lowercase())?;
        inner.by_id.get(id).cloned()
    }

    pub async fn find_by_api_key_hash(&self, digest: &str) -> Option<Identity> {
        let inner = self.inner.read().await;
        inner.by_id.values().find(|i| i.api_key_hash.as_deref() == Some(digest)).cloned()
    }

    /// Record the jti of the last-issued refresh token (None clears it,
    /// e.g. on signout).
    pub async fn set_refresh_jti(&self, id: &str, jti: Option<String>) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        let identity = inner
            .by_id
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("unknown identity: {id}"))?;
        identity.refresh_jti = jti;
        self.persist(&inner);
        Ok(())
    }

    /// Write the store to disk atomically (tmp + rename). Uses a unique
    /// temp filename (PID + counter) so concurrent saves cannot corrupt
    /// each other's partial writes.
    fn persist(&self, inner: &Inner) {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let Some(ref path) = self.persist_path else {
            return;
        };
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                if let Err(e) = std::fs::create_dir_all(dir) {
                    tracing::warn!(err = %e, "failed to create identity db dir");
                    return;
                }
            }
        }
        let persisted =
            PersistedIdentities { identities: inner.by_id.values().cloned().collect() };
        let json = match serde_json::to_string_pretty(&persisted) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(err = %e, "failed to serialize identity store");
                return;
            }
        };
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = path.with_file_name(tmp_name);
        if let Err(e) =
            std::fs::write(&tmp_path, &json).and_then(|()| std::fs::rename(&tmp_path, path))
        {
            tracing::warn!(err = %e, "failed to persist identity store");
        }
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
