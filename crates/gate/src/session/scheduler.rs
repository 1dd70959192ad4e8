// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proactive refresh timer.
//!
//! Owns at most one pending timer per session. Arming replaces (and
//! cancels) any previous timer; leaving the authenticated state cancels
//! it. The timer fires `margin` before access-token expiry.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub struct RefreshScheduler {
    margin: Duration,
    slot: Mutex<Option<CancellationToken>>,
}

impl RefreshScheduler {
    pub fn new(margin: Duration) -> Self {
        Self { margin, slot: Mutex::new(None) }
    }

    /// Arm the timer to fire `expires_in - margin` from now, replacing
    /// any previously armed timer. Never leaves two timers pending.
    pub async fn arm<F>(&self, expires_in: Duration, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = expires_in.saturating_sub(self.margin);
        let token = CancellationToken::new();
        let fire_guard = token.clone();

        let mut slot = self.slot.lock().await;
        if let Some(prev) = slot.take() {
            prev.cancel();
        }
        *slot = Some(token);
        drop(slot);

        tokio::spawn(async move {
            tokio::select! {
                _ = fire_guard.cancelled() => {}
                _ = tokio::time::sleep(delay) => on_fire.await,
            }
        });
    }

    /// Cancel the pending timer, if any.
    pub async fn cancel(&self) {
        if let Some(token) = self.slot.lock().await.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
