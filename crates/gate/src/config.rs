// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the keygate auth service.
#[derive(Debug, Clone, clap::Args)]
pub struct GateConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "KEYGATE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9700, env = "KEYGATE_PORT")]
    pub port: u16,

    /// Shared application identifier expected in the `x-app-id` header.
    #[arg(long, env = "KEYGATE_APP_ID")]
    pub app_id: String,

    /// HMAC signing secret for access and refresh tokens.
    #[arg(long, env = "KEYGATE_TOKEN_SECRET")]
    pub token_secret: String,

    /// Access token lifetime in seconds.
    #[arg(long, default_value_t = 900, env = "KEYGATE_ACCESS_TTL_SECS")]
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds (14 days).
    #[arg(long, default_value_t = 1_209_600, env = "KEYGATE_REFRESH_TTL_SECS")]
    pub refresh_ttl_secs: u64,

    /// Max signin attempts per email within the rate-limit window.
    #[arg(long, default_value_t = 10, env = "KEYGATE_SIGNIN_BURST")]
    pub signin_burst: u32,

    /// Rate-limit window in seconds.
    #[arg(long, default_value_t = 60, env = "KEYGATE_SIGNIN_WINDOW_SECS")]
    pub signin_window_secs: u64,

    /// Path to persist the identity store (JSON file). In-memory only when unset.
    #[arg(long, env = "KEYGATE_IDENTITY_DB")]
    pub identity_db: Option<std::path::PathBuf>,
}

impl GateConfig {
    pub fn access_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.refresh_ttl_secs)
    }

    pub fn signin_window(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.signin_window_secs)
    }
}
