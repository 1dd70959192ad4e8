// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the auth service.

pub mod guard;
pub mod http;
pub mod ratelimit;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::GateState;

/// Build the axum `Router` with all auth routes.
pub fn build_router(state: Arc<GateState>) -> Router {
    Router::new()
        // Liveness (no app id)
        .route("/healthz", get(http::health))
        // Identity lifecycle
        .route("/auth/signup", post(http::signup))
        .route("/auth/external", post(http::external))
        // Session lifecycle
        .route("/auth/signin", post(http::signin))
        .route("/auth/refresh", post(http::refresh))
        .route("/auth/me", post(http::me))
        .route("/auth/signout", post(http::signout))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), guard::app_id_layer))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
