// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;

#[tokio::test]
async fn allows_up_to_burst_then_blocks() {
    let limiter = RateLimiter::new(3, Duration::from_secs(60));
    for _ in 0..3 {
        assert!(limiter.allow("a@b.com").await);
    }
    assert!(!limiter.allow("a@b.com").await);
    assert!(!limiter.allow("a@b.com").await);
}

#[tokio::test]
async fn keys_are_independent_and_case_insensitive() {
    let limiter = RateLimiter::new(1, Duration::from_secs(60));
    assert!(limiter.allow("a@b.com").await);
    assert!(!limiter.allow("A@B.COM").await);
    // A different email has its own window.
    assert!(limiter.allow("c@d.com").await);
}

#[tokio::test]
async fn window_resets_after_elapse() {
    let limiter = RateLimiter::new(1, Duration::from_millis(20));
    assert!(limiter.allow("a@b.com").await);
    assert!(!limiter.allow("a@b.com").await);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(limiter.allow("a@b.com").await);
}
