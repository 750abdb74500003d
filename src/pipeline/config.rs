// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pipeline wiring configuration

use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of session shard actors
    pub session_shards: usize,
    /// Lexicon scope for every session; each session id is its own scope when unset
    pub lexicon_scope: Option<String>,
    /// Capacity of the resolved word channel
    pub output_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            session_shards: 4,
            lexicon_scope: None,
            output_capacity: 256,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            session_shards: env::var("SESSION_SHARDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.session_shards),
            lexicon_scope: env::var("LEXICON_SCOPE").ok().filter(|v| !v.is_empty()),
            output_capacity: env::var("OUTPUT_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.output_capacity),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.session_shards == 0 {
            return Err("session_shards must be greater than 0".to_string());
        }
        if self.output_capacity == 0 {
            return Err("output_capacity must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Lexicon scope used for a session
    pub fn scope_for<'a>(&'a self, session_id: &'a str) -> &'a str {
        self.lexicon_scope.as_deref().unwrap_or(session_id)
    }
}
