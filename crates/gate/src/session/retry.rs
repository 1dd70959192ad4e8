// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reactive retry around authenticated calls.
//!
//! Wraps any call that takes the current access token. On an
//! authorization failure the session runs refresh cycles from a bounded
//! budget (an explicit loop, not recursion); each successful refresh
//! retries the original call exactly once. Exhausting the budget forces
//! logout and surfaces the original call's failure.

use std::future::Future;

use super::api::ApiError;
use super::SessionHandle;

impl SessionHandle {
    /// Run an authenticated call with transparent refresh-and-retry.
    ///
    /// The closure receives the current access token. Non-authorization
    /// failures of the retried call are surfaced as-is without another
    /// refresh attempt.
    pub async fn request<T, F, Fut>(&self, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let Some(token) = self.access_token().await else {
            return Err(ApiError::Auth {
                code: "LOGGED_OUT".to_owned(),
                message: "no active session".to_owned(),
            });
        };
        let mut original_err = match call(token).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_auth() => Some(e),
            Err(e) => return Err(e),
        };

        let mut remaining = self.max_refresh_retries();
        loop {
            if remaining == 0 {
                tracing::warn!("refresh retries exhausted, session terminated");
                self.force_logout().await;
                return Err(original_err.take().unwrap_or_else(|| ApiError::Auth {
                    code: "REFRESH_EXHAUSTED".to_owned(),
                    message: "session expired, please sign in again".to_owned(),
                }));
            }
            remaining -= 1;

            match self.refresh_cycle().await {
                Ok(()) => {
                    // Retry the original call exactly once per refresh.
                    let Some(token) = self.access_token().await else {
                        continue;
                    };
                    match call(token).await {
                        Ok(value) => return Ok(value),
                        // Still unauthorized: consumes another attempt.
                        Err(e) if e.is_auth() => continue,
                        Err(e) => return Err(e),
                    }
                }
                // Infra failure: the session is Unavailable and cached
                // refresh material is preserved; no further attempts.
                Err(e @ ApiError::Network(_)) => return Err(e),
                Err(e) => {
                    tracing::debug!(err = %e, "refresh attempt failed");
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
