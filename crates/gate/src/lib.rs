// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keygate: authentication and session-lifecycle service.
//!
//! Server side: credential verification strategies, signed time-bounded
//! tokens, and the `/auth` HTTP surface. Client side: the session state
//! machine with proactive refresh scheduling and bounded reactive retry.

pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod session;
pub mod state;
pub mod token;
pub mod transport;
pub mod verifier;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::GateConfig;
use crate::state::GateState;
use crate::transport::build_router;

/// Run the auth server until shutdown.
pub async fn run(config: GateConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let state = GateState::new(config, shutdown.clone());
    state.store.load().await?;
    let state = Arc::new(state);

    let router = build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("keygate listening on {addr}");
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
