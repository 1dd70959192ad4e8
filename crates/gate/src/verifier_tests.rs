// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::clock::ManualClock;
use crate::identity::hash_secret;

struct Fixture {
    store: Arc<IdentityStore>,
    tokens: Arc<TokenService>,
    clock: ManualClock,
    verifier: Verifier,
}

fn fixture() -> Fixture {
    let clock = ManualClock::new(1_000);
    let store = Arc::new(IdentityStore::new(None));
    let tokens = Arc::new(TokenService::new(
        "test-secret",
        Duration::from_secs(900),
        Duration::from_secs(86_400),
        Arc::new(clock.clone()),
    ));
    let verifier = Verifier::new(Arc::clone(&store), Arc::clone(&tokens));
    Fixture { store, tokens, clock, verifier }
}

fn identity(id: &str, email: &str, provider: Provider) -> Identity {
    Identity {
        id: id.to_owned(),
        email: email.to_owned(),
        verified: true,
        provider,
        display_name: None,
        avatar_url: None,
        secret_hash: Some(hash_secret("secret1")),
        api_key_hash: None,
        refresh_jti: None,
    }
}

fn assert_rejected(outcome: &VerificationOutcome, reason: RejectReason) {
    match outcome {
        VerificationOutcome::Rejected(r) if *r == reason => {}
        other => panic!("expected Rejected({reason:?}), got {other:?}"),
    }
}

#[tokio::test]
async fn password_matching_hash_verifies() -> anyhow::Result<()> {
    let f = fixture();
    f.store.insert(identity("u1", "a@b.com", Provider::Password)).await?;

    let cred = Credential::Password { email: "a@b.com".into(), password: "secret1".into() };
    match f.verifier.verify(&cred).await? {
        VerificationOutcome::Verified(i) => assert_eq!(i.id, "u1"),
        other => panic!("expected Verified, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn password_wrong_secret_rejects_bad_secret() -> anyhow::Result<()> {
    let f = fixture();
    f.store.insert(identity("u1", "a@b.com", Provider::Password)).await?;

    let cred = Credential::Password { email: "a@b.com".into(), password: "wrong".into() };
    assert_rejected(&f.verifier.verify(&cred).await?, RejectReason::BadSecret);
    Ok(())
}

#[tokio::test]
async fn password_unknown_email_rejects_unknown_identity() -> anyhow::Result<()> {
    let f = fixture();
    let cred = Credential::Password { email: "nobody@b.com".into(), password: "x".into() };
    assert_rejected(&f.verifier.verify(&cred).await?, RejectReason::UnknownIdentity);
    Ok(())
}

#[tokio::test]
async fn password_against_external_identity_rejects_wrong_provider() -> anyhow::Result<()> {
    let f = fixture();
    f.store.insert(identity("u1", "a@b.com", Provider::ExternalIdentity)).await?;

    let cred = Credential::Password { email: "a@b.com".into(), password: "secret1".into() };
    assert_rejected(&f.verifier.verify(&cred).await?, RejectReason::WrongProvider);
    Ok(())
}

#[tokio::test]
async fn password_unverified_email_rejects_before_secret_check() -> anyhow::Result<()> {
    let f = fixture();
    let mut unverified = identity("u1", "a@b.com", Provider::Password);
    unverified.verified = false;
    f.store.insert(unverified).await?;

    // Even with the correct secret, unverified wins: never conflated
    // with a wrong password.
    let cred = Credential::Password { email: "a@b.com".into(), password: "secret1".into() };
    assert_rejected(&f.verifier.verify(&cred).await?, RejectReason::Unverified);
    Ok(())
}

#[tokio::test]
async fn bearer_valid_token_resolves_subject() -> anyhow::Result<()> {
    let f = fixture();
    f.store.insert(identity("u1", "a@b.com", Provider::Password)).await?;
    let (token, _) = f.tokens.issue(TokenKind::Access, "u1")?;

    match f.verifier.verify(&Credential::Bearer { token }).await? {
        VerificationOutcome::Verified(i) => assert_eq!(i.id, "u1"),
        other => panic!("expected Verified, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn bearer_expired_token_rejects_token_expired() -> anyhow::Result<()> {
    let f = fixture();
    f.store.insert(identity("u1", "a@b.com", Provider::Password)).await?;
    let (token, _) = f.tokens.issue(TokenKind::Access, "u1")?;

    f.clock.advance(901);
    assert_rejected(
        &f.verifier.verify(&Credential::Bearer { token }).await?,
        RejectReason::TokenExpired,
    );
    Ok(())
}

#[tokio::test]
async fn bearer_garbage_token_rejects_token_invalid() -> anyhow::Result<()> {
    let f = fixture();
    assert_rejected(
        &f.verifier.verify(&Credential::Bearer { token: "garbage".into() }).await?,
        RejectReason::TokenInvalid,
    );
    Ok(())
}

#[tokio::test]
async fn bearer_vanished_subject_rejects_unknown_identity() -> anyhow::Result<()> {
    let f = fixture();
    // Valid signature and expiry, but the subject was never stored —
    // the stale-token case, handled as a rejection, never an error.
    let (token, _) = f.tokens.issue(TokenKind::Access, "gone")?;
    assert_rejected(
        &f.verifier.verify(&Credential::Bearer { token }).await?,
        RejectReason::UnknownIdentity,
    );
    Ok(())
}

#[tokio::test]
async fn api_key_lookup_by_digest() -> anyhow::Result<()> {
    let f = fixture();
    let mut keyed = identity("u1", "svc@b.com", Provider::ApiKey);
    keyed.api_key_hash = Some(crate::identity::api_key_digest("sk-live-123"));
    f.store.insert(keyed).await?;

    match f.verifier.verify(&Credential::ApiKey { key: "sk-live-123".into() }).await? {
        VerificationOutcome::Verified(i) => assert_eq!(i.id, "u1"),
        other => panic!("expected Verified, got {other:?}"),
    }
    assert_rejected(
        &f.verifier.verify(&Credential::ApiKey { key: "sk-live-999".into() }).await?,
        RejectReason::UnknownIdentity,
    );
    Ok(())
}

#[tokio::test]
async fn external_creates_identity_idempotently() -> anyhow::Result<()> {
    let f = fixture();
    let profile = ExternalProfile {
        email: "new@b.com".into(),
        display_name: Some("New User".into()),
        avatar_url: None,
    };

    let first = match f.verifier.verify(&Credential::External { profile: profile.clone() }).await? {
        VerificationOutcome::Verified(i) => i,
        other => panic!("expected Verified, got {other:?}"),
    };
    assert!(first.verified);
    assert_eq!(first.provider, Provider::ExternalIdentity);

    // Second resolution maps to the same identity, no duplicate.
    let second = match f.verifier.verify(&Credential::External { profile }).await? {
        VerificationOutcome::Verified(i) => i,
        other => panic!("expected Verified, got {other:?}"),
    };
    assert_eq!(first.id, second.id);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn external_concurrent_first_assertions_resolve_to_one_identity() -> anyhow::Result<()> {
    let f = Arc::new(fixture());
    let profile =
        ExternalProfile { email: "racer@b.com".into(), display_name: None, avatar_url: None };

    // Two first-time assertions for the same email; whichever insert
    // loses must still resolve to the winner's identity, never a 500.
    let a = {
        let f = Arc::clone(&f);
        let profile = profile.clone();
        tokio::spawn(async move { f.verifier.verify(&Credential::External { profile }).await })
    };
    let b = {
        let f = Arc::clone(&f);
        let profile = profile.clone();
        tokio::spawn(async move { f.verifier.verify(&Credential::External { profile }).await })
    };

    let mut ids = Vec::new();
    for outcome in [a.await??, b.await??] {
        match outcome {
            VerificationOutcome::Verified(i) => ids.push(i.id),
            other => panic!("expected Verified, got {other:?}"),
        }
    }
    assert_eq!(ids[0], ids[1]);
    Ok(())
}

#[tokio::test]
async fn external_never_converts_password_identity() -> anyhow::Result<()> {
    let f = fixture();
    f.store.insert(identity("u1", "a@b.com", Provider::Password)).await?;

    let profile =
        ExternalProfile { email: "a@b.com".into(), display_name: None, avatar_url: None };
    assert_rejected(
        &f.verifier.verify(&Credential::External { profile }).await?,
        RejectReason::WrongProvider,
    );

    // The stored identity is untouched.
    let stored = f.store.get("u1").await.ok_or_else(|| anyhow::anyhow!("missing"))?;
    assert_eq!(stored.provider, Provider::Password);
    Ok(())
}

#[test]
fn reject_reasons_coalesce_on_the_wire() {
    use crate::error::AuthCode;
    assert_eq!(RejectReason::UnknownIdentity.auth_code(), AuthCode::InvalidCredentials);
    assert_eq!(RejectReason::BadSecret.auth_code(), AuthCode::InvalidCredentials);
    assert_eq!(RejectReason::WrongProvider.auth_code(), AuthCode::InvalidCredentials);
    assert_eq!(RejectReason::Unverified.auth_code(), AuthCode::Unverified);
    assert_eq!(RejectReason::TokenExpired.auth_code(), AuthCode::TokenExpired);
    assert_eq!(RejectReason::TokenInvalid.auth_code(), AuthCode::TokenInvalid);
}
