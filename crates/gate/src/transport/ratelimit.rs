// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-window rate limiter for signin attempts.
//!
//! Keyed by lowercased email. Deliberately independent of whether the
//! identity exists: the limiter runs before any credential check.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    burst: u32,
    window: Duration,
    windows: RwLock<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(burst: u32, window: Duration) -> Self {
        Self { burst, window, windows: RwLock::new(HashMap::new()) }
    }

    /// Record an attempt for `key`. Returns false when the window's
    /// budget is spent.
    pub async fn allow(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        let now = Instant::now();
        let mut windows = self.windows.write().await;

        // Opportunistic cleanup of stale windows to bound the map.
        if windows.len() > 1024 {
            windows.retain(|_, w| now.duration_since(w.started) < self.window);
        }

        let window = windows.entry(key).or_insert(Window { started: now, count: 0 });
        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }
        window.count += 1;
        window.count <= self.burst
    }
}

#[cfg(test)]
#[path = "ratelimit_tests.rs"]
mod tests;
