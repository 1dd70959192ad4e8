// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::config::GateConfig;
use crate::identity::IdentityStore;
use crate::token::TokenService;
use crate::transport::ratelimit::RateLimiter;
use crate::verifier::Verifier;

/// Shared server state.
pub struct GateState {
    pub config: GateConfig,
    pub store: Arc<IdentityStore>,
    pub tokens: Arc<TokenService>,
    pub verifier: Verifier,
    pub limiter: RateLimiter,
    pub shutdown: CancellationToken,
}

impl GateState {
    pub fn new(config: GateConfig, shutdown: CancellationToken) -> Self {
        Self::with_clock(config, shutdown, Arc::new(SystemClock))
    }

    /// Construct with an explicit clock (tests drive expiry manually).
    pub fn with_clock(
        config: GateConfig,
        shutdown: CancellationToken,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(IdentityStore::new(config.identity_db.clone()));
        let tokens = Arc::new(TokenService::new(
            &config.token_secret,
            config.access_ttl(),
            config.refresh_ttl(),
            clock,
        ));
        let verifier = Verifier::new(Arc::clone(&store), Arc::clone(&tokens));
        let limiter = RateLimiter::new(config.signin_burst, config.signin_window());
        Self { config, store, tokens, verifier, limiter, shutdown }
    }
}
