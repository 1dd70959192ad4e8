// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-resident session lifecycle.
//!
//! Holds the session as one of four states and drives every transition
//! from verifier/token-service outcomes: observers watch the state, they
//! never set it. A single-flight gate guarantees at most one in-flight
//! refresh per session; an epoch counter fences refreshes that complete
//! after signout.

pub mod api;
pub mod retry;
pub mod scheduler;
pub mod storage;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{watch, Mutex, RwLock};

use crate::identity::PublicIdentity;
use api::{ApiError, AuthApi, SessionTokens};
use scheduler::RefreshScheduler;
use storage::{CachedTokens, TokenStorage};

/// Client-side session state.
///
/// `Unavailable` is distinct from `LoggedOut`: both stop automatic
/// retry, but only `LoggedOut` purges cached refresh material.
#[derive(Debug, Clone, PartialEq)]
pub enum Session {
    Loading,
    Authenticated { user: PublicIdentity, expires_at: u64 },
    LoggedOut,
    Unavailable,
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_url: String,
    pub app_id: String,
    /// How long before access-token expiry the proactive refresh fires.
    pub refresh_margin: Duration,
    /// Bound on refresh attempts per failed call.
    pub max_refresh_retries: u32,
}

impl SessionConfig {
    pub fn new(base_url: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            app_id: app_id.into(),
            refresh_margin: Duration::from_secs(60),
            max_refresh_retries: 3,
        }
    }
}

struct SessionInner {
    api: AuthApi,
    storage: Arc<dyn TokenStorage>,
    max_refresh_retries: u32,
    state_tx: watch::Sender<Session>,
    tokens: RwLock<Option<CachedTokens>>,
    scheduler: RefreshScheduler,
    /// Single-flight gate: at most one in-flight refresh per session.
    refresh_gate: Mutex<()>,
    /// Bumped on every applied token pair. A waiter that observes a
    /// bump while queued on the gate adopts the winner's result.
    generation: AtomicU64,
    /// Bumped on signout/forced logout. A refresh completing under a
    /// stale epoch is discarded.
    epoch: AtomicU64,
}

/// Handle to one session's lifecycle. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

impl SessionHandle {
    pub fn new(config: SessionConfig, storage: Arc<dyn TokenStorage>) -> anyhow::Result<Self> {
        let (state_tx, _) = watch::channel(Session::Loading);
        Ok(Self {
            inner: Arc::new(SessionInner {
                api: AuthApi::new(config.base_url, config.app_id)?,
                storage,
                max_refresh_retries: config.max_refresh_retries,
                state_tx,
                tokens: RwLock::new(None),
                scheduler: RefreshScheduler::new(config.refresh_margin),
                refresh_gate: Mutex::new(()),
                generation: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
            }),
        })
    }

    pub fn state(&self) -> Session {
        self.inner.state_tx.borrow().clone()
    }

    /// Watch session transitions.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state_tx.subscribe()
    }

    pub(crate) fn max_refresh_retries(&self) -> u32 {
        self.inner.max_refresh_retries
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner.tokens.read().await.as_ref().map(|t| t.access_token.clone())
    }

    fn set_state(&self, state: Session) {
        self.inner.state_tx.send_replace(state);
    }

    /// Resolve the initial session from cached refresh material.
    pub async fn bootstrap(&self) -> Session {
        let Some(cached) = self.inner.storage.load() else {
            self.set_state(Session::LoggedOut);
            return self.state();
        };
        *self.inner.tokens.write().await = Some(cached);

        match self.refresh_cycle().await {
            Ok(()) => {}
            // Infra failure: Unavailable was set, refresh material kept
            // for a later manual retry.
            Err(ApiError::Network(_)) => {}
            // Auth failure on cached material is terminal.
            Err(e) => {
                tracing::debug!(err = %e, "cached refresh material rejected");
                self.force_logout().await;
            }
        }
        self.state()
    }

    /// Sign in with a password credential.
    pub async fn signin(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        let tokens = self.inner.api.signin(email, password).await?;
        if !self.apply_tokens(tokens, epoch).await {
            return Err(ApiError::Auth {
                code: "LOGGED_OUT".to_owned(),
                message: "signed out during signin".to_owned(),
            });
        }
        Ok(())
    }

    /// Explicit signout. Atomic with respect to the refresh path: the
    /// epoch bump happens before the `tokens` write lock is taken, and
    /// the purge happens under it, so an in-flight refresh either
    /// commits fully before the purge or observes the stale epoch and
    /// discards its result.
    pub async fn signout(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        let cached = {
            let mut slot = self.inner.tokens.write().await;
            self.inner.storage.clear();
            self.inner.scheduler.cancel().await;
            self.set_state(Session::LoggedOut);
            slot.take()
        };

        if let Some(tokens) = cached {
            if let Err(e) = self.inner.api.signout(&tokens.refresh_token).await {
                tracing::debug!(err = %e, "server-side signout failed");
            }
        }
    }

    /// Manual recovery from `Unavailable`: one refresh cycle.
    pub async fn retry(&self) -> Result<(), ApiError> {
        self.refresh_cycle().await
    }

    /// One refresh cycle under the single-flight gate.
    ///
    /// Concurrent triggers queue on the gate; a trigger that observes
    /// the generation advance while it waited returns without issuing a
    /// second refresh.
    pub(crate) async fn refresh_cycle(&self) -> Result<(), ApiError> {
        let gen_before = self.inner.generation.load(Ordering::SeqCst);
        let _gate = self.inner.refresh_gate.lock().await;
        if self.inner.generation.load(Ordering::SeqCst) != gen_before {
            return Ok(());
        }

        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        let refresh_token =
            self.inner.tokens.read().await.as_ref().map(|t| t.refresh_token.clone());
        let Some(refresh_token) = refresh_token else {
            return Err(ApiError::Auth {
                code: "LOGGED_OUT".to_owned(),
                message: "no cached refresh material".to_owned(),
            });
        };

        match self.inner.api.refresh(&refresh_token).await {
            Ok(tokens) => {
                if !self.apply_tokens(tokens, epoch).await {
                    tracing::debug!("refresh result discarded: signed out while in flight");
                    return Err(ApiError::Auth {
                        code: "LOGGED_OUT".to_owned(),
                        message: "signed out during refresh".to_owned(),
                    });
                }
                Ok(())
            }
            Err(ApiError::Network(e)) => {
                // Infra failure, not an auth decision: keep the cached
                // refresh material and stop automatic retry.
                self.inner.scheduler.cancel().await;
                self.set_state(Session::Unavailable);
                Err(ApiError::Network(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Adopt a freshly minted pair: cache, persist, publish the state,
    /// and re-arm the proactive timer (exactly one). Returns false when
    /// `epoch` is stale, in which case nothing is committed.
    ///
    /// The epoch check and the whole commit happen under the `tokens`
    /// write lock; signout purges under the same lock after bumping the
    /// epoch, so a refresh result can never land after signout.
    async fn apply_tokens(&self, tokens: SessionTokens, epoch: u64) -> bool {
        let expires_at = now_epoch_secs() + tokens.expires_in;
        let cached = CachedTokens {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at,
        };

        let mut slot = self.inner.tokens.write().await;
        if self.inner.epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        *slot = Some(cached.clone());
        self.inner.storage.save(&cached);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.set_state(Session::Authenticated { user: tokens.user, expires_at });

        let handle = self.clone();
        self.inner
            .scheduler
            .arm(Duration::from_secs(tokens.expires_in), async move {
                handle.scheduled_refresh().await;
            })
            .await;
        true
    }

    /// Timer-driven refresh: same bounded budget as the reactive path.
    ///
    /// Boxed with an explicit `Send` bound to break the async recursion
    /// cycle through `apply_tokens`/`arm` for auto-trait inference.
    fn scheduled_refresh(
        self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'static>> {
        Box::pin(async move {
            for _ in 0..self.inner.max_refresh_retries {
                match self.refresh_cycle().await {
                    Ok(()) => return,
                    // Unavailable is terminal for auto-retry.
                    Err(ApiError::Network(_)) => return,
                    Err(e) => tracing::debug!(err = %e, "scheduled refresh attempt failed"),
                }
            }
            tracing::warn!("scheduled refresh exhausted retries, session terminated");
            self.force_logout().await;
        })
    }

    /// Terminal failure: purge cached material and transition to
    /// `LoggedOut`. Same epoch-then-lock ordering as `signout`.
    pub(crate) async fn force_logout(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        let mut slot = self.inner.tokens.write().await;
        slot.take();
        self.inner.storage.clear();
        self.inner.scheduler.cancel().await;
        self.set_state(Session::LoggedOut);
    }

    pub(crate) fn api(&self) -> &AuthApi {
        &self.inner.api
    }

    /// Seed token material directly (tests only).
    #[cfg(test)]
    pub(crate) async fn seed_tokens(&self, cached: CachedTokens, user: PublicIdentity) {
        let expires_at = cached.expires_at;
        *self.inner.tokens.write().await = Some(cached);
        self.set_state(Session::Authenticated { user, expires_at });
    }
}

fn now_epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
