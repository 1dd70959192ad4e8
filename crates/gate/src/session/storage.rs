// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Swappable client-side persistence for cached token material.
//!
//! The session core is storage-agnostic: anything with get/save/clear
//! works, so tests run without a real device store.

use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Token material cached between runs. `expires_at` is epoch seconds
/// for the access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: u64,
}

pub trait TokenStorage: Send + Sync {
    fn load(&self) -> Option<CachedTokens>;
    fn save(&self, tokens: &CachedTokens);
    fn clear(&self);
}

/// In-memory storage (tests, ephemeral sessions).
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<CachedTokens>>,
}

impl TokenStorage for MemoryStorage {
    fn load(&self) -> Option<CachedTokens> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn save(&self, tokens: &CachedTokens) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(tokens.clone());
        }
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

/// JSON file storage with atomic writes (tmp + rename).
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TokenStorage for FileStorage {
    fn load(&self) -> Option<CachedTokens> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    fn save(&self, tokens: &CachedTokens) {
        let json = match serde_json::to_string_pretty(tokens) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(err = %e, "failed to serialize cached tokens");
                return;
            }
        };
        let tmp_name = format!(
            "{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        if let Err(e) =
            std::fs::write(&tmp_path, &json).and_then(|()| std::fs::rename(&tmp_path, &self.path))
        {
            tracing::warn!(err = %e, "failed to persist cached tokens");
        }
    }

    fn clear(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(err = %e, "failed to clear cached tokens");
            }
        }
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
