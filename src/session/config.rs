// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session store configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session's state is dropped
    pub ttl_secs: u64,
    /// LRU bound per session shard
    pub max_sessions_per_shard: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_sessions_per_shard: 10_000,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ttl_secs: env::var("SESSION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ttl_secs),
            max_sessions_per_shard: env::var("MAX_SESSIONS_PER_SHARD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_sessions_per_shard),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.ttl_secs == 0 {
            return Err("Session TTL must be greater than 0".to_string());
        }
        if self.max_sessions_per_shard == 0 {
            return Err("max_sessions_per_shard must be greater than 0".to_string());
        }
        Ok(())
    }
}
