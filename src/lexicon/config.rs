// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for lexicon resolution

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for the lexicon resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Remote lexicon search endpoint; the in-memory lexicon is used when unset
    pub endpoint: Option<String>,
    /// Candidates returned per word
    pub search_top_k: usize,
    /// Hits fetched from the backend before re-ranking
    pub search_candidate_limit: usize,
    pub relevance_weight: f64,
    pub alias_weight: f64,
    /// Backend call timeout in milliseconds
    pub timeout_ms: u64,
    /// Longest word (in characters) searched in prefix mode
    pub prefix_max_len: usize,
    /// Search edit budgets; the in-memory backend applies these
    pub prefix_max_edits: usize,
    pub fuzzy_max_edits: usize,
    /// Largest edit distance at which an alias still lends its confidence, in either mode
    pub alias_max_edits: usize,
}

impl ResolverConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: env::var("LEXICON_ENDPOINT").ok().filter(|v| !v.is_empty()),
            search_top_k: env::var("SEARCH_TOP_K")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.search_top_k),
            search_candidate_limit: env::var("SEARCH_CANDIDATE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.search_candidate_limit),
            relevance_weight: env::var("HYBRID_RELEVANCE_WEIGHT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.relevance_weight),
            alias_weight: env::var("HYBRID_ALIAS_WEIGHT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.alias_weight),
            timeout_ms: env::var("RESOLVER_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_ms),
            prefix_max_len: env::var("PREFIX_MAX_LEN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.prefix_max_len),
            prefix_max_edits: env::var("PREFIX_MAX_EDITS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.prefix_max_edits),
            fuzzy_max_edits: env::var("FUZZY_MAX_EDITS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.fuzzy_max_edits),
            alias_max_edits: env::var("ALIAS_MAX_EDITS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.alias_max_edits),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.search_top_k == 0 {
            return Err("search_top_k must be greater than 0".to_string());
        }
        if self.search_candidate_limit < self.search_top_k {
            return Err("search_candidate_limit must be at least search_top_k".to_string());
        }
        if self.relevance_weight < 0.0 || self.alias_weight < 0.0 {
            return Err("Hybrid weights must not be negative".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("Resolver timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            search_top_k: 5,
            search_candidate_limit: 20,
            relevance_weight: 0.7,
            alias_weight: 0.3,
            timeout_ms: 2_000,
            prefix_max_len: 3,
            prefix_max_edits: 1,
            fuzzy_max_edits: 2,
            alias_max_edits: 2,
        }
    }
}
