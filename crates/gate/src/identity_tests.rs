// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn password_identity(id: &str, email: &str) -> Identity {
    Identity {
        id: id.to_owned(),
        email: email.to_owned(),
        verified: true,
        provider: Provider::Password,
        display_name: None,
        avatar_url: None,
        secret_hash: Some(hash_secret("secret1")),
        api_key_hash: None,
        refresh_jti: None,
    }
}

#[test]
fn secret_hash_verifies_and_rejects() {
    let stored = hash_secret("secret1");
    assert!(verify_secret(&stored, "secret1"));
    assert!(!verify_secret(&stored, "wrong"));
    assert!(!verify_secret("not-a-hash", "secret1"));
    assert!(!verify_secret("!!$!!", "secret1"));
}

#[test]
fn secret_hash_is_salted() {
    // Same input, different salt, different stored value.
    assert_ne!(hash_secret("secret1"), hash_secret("secret1"));
}

#[tokio::test]
async fn insert_rejects_duplicate_email() -> anyhow::Result<()> {
    let store = IdentityStore::new(None);
    store.insert(password_identity("u1", "a@b.com")).await?;
    // Case-insensitive collision.
    assert!(store.insert(password_identity("u2", "A@B.com")).await.is_err());
    Ok(())
}

#[tokio::test]
async fn find_by_email_is_case_insensitive() -> anyhow::Result<()> {
    let store = IdentityStore::new(None);
    store.insert(password_identity("u1", "a@b.com")).await?;
    let found = store.find_by_email("A@B.COM").await.ok_or_else(|| anyhow::anyhow!("missing"))?;
    assert_eq!(found.id, "u1");
    Ok(())
}

#[tokio::test]
async fn api_key_lookup_matches_digest() -> anyhow::Result<()> {
    let store = IdentityStore::new(None);
    let mut identity = password_identity("u1", "a@b.com");
    identity.provider = Provider::ApiKey;
    identity.api_key_hash = Some(api_key_digest("sk-live-123"));
    store.insert(identity).await?;

    assert!(store.find_by_api_key_hash(&api_key_digest("sk-live-123")).await.is_some());
    assert!(store.find_by_api_key_hash(&api_key_digest("sk-live-999")).await.is_none());
    Ok(())
}

#[tokio::test]
async fn refresh_jti_round_trips() -> anyhow::Result<()> {
    let store = IdentityStore::new(None);
    store.insert(password_identity("u1", "a@b.com")).await?;

    store.set_refresh_jti("u1", Some("jti-1".to_owned())).await?;
    let got = store.get("u1").await.ok_or_else(|| anyhow::anyhow!("missing"))?;
    assert_eq!(got.refresh_jti.as_deref(), Some("jti-1"));

    store.set_refresh_jti("u1", None).await?;
    let got = store.get("u1").await.ok_or_else(|| anyhow::anyhow!("missing"))?;
    assert_eq!(got.refresh_jti, None);

    assert!(store.set_refresh_jti("nope", None).await.is_err());
    Ok(())
}

#[tokio::test]
async fn persistence_survives_reload() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("identities.json");

    let store = IdentityStore::new(Some(path.clone()));
    store.insert(password_identity("u1", "a@b.com")).await?;
    store.set_refresh_jti("u1", Some("jti-1".to_owned())).await?;

    let reloaded = IdentityStore::new(Some(path));
    reloaded.load().await?;
    let got = reloaded.get("u1").await.ok_or_else(|| anyhow::anyhow!("missing"))?;
    assert_eq!(got.email, "a@b.com");
    assert_eq!(got.refresh_jti.as_deref(), Some("jti-1"));
    assert!(reloaded.find_by_email("a@b.com").await.is_some());
    Ok(())
}

#[tokio::test]
async fn load_without_file_is_fresh_store() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = IdentityStore::new(Some(dir.path().join("missing.json")));
    store.load().await?;
    assert!(store.get("u1").await.is_none());
    Ok(())
}
