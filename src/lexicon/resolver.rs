// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Lexicon resolver
//!
//! Picks a search mode from the word length, queries the backend under a
//! timeout and re-ranks hits by hybrid score. Backend failures degrade to an
//! unresolved result carrying the raw word.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::backend::LexiconBackend;
use super::config::ResolverConfig;
use super::distance::normalize;
use super::scoring::{rank, HybridWeights};
use super::types::{Resolution, ResolverError, SearchHit, SearchMode};

pub struct LexiconResolver {
    backend: Arc<dyn LexiconBackend>,
    config: ResolverConfig,
}

impl LexiconResolver {
    pub fn new(backend: Arc<dyn LexiconBackend>, config: ResolverConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Search mode for a raw word; depends only on its normalised length
    pub fn select_mode(&self, raw_word: &str) -> SearchMode {
        if normalize(raw_word).chars().count() <= self.config.prefix_max_len {
            SearchMode::Prefix
        } else {
            SearchMode::Fuzzy
        }
    }

    fn weights(&self) -> HybridWeights {
        HybridWeights {
            relevance: self.config.relevance_weight,
            alias: self.config.alias_weight,
        }
    }

    /// Resolve a raw word against the lexicon of `scope_id`
    pub async fn resolve(&self, raw_word: &str, scope_id: &str) -> Resolution {
        let query = normalize(raw_word);
        if query.is_empty() {
            return Resolution::unresolved(raw_word, None);
        }

        let mode = self.select_mode(&query);
        let start = Instant::now();
        let hits = match self.search(&query, scope_id, mode).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(
                    raw_word = %raw_word,
                    backend = self.backend.name(),
                    error = %e,
                    "Lexicon search failed, returning raw word"
                );
                return Resolution::unresolved(raw_word, Some(mode));
            }
        };

        if hits.is_empty() {
            debug!(raw_word = %raw_word, mode = %mode, "No lexicon matches");
            return Resolution::unresolved(raw_word, Some(mode));
        }

        let candidates = rank(
            &query,
            hits,
            mode,
            self.config.alias_max_edits,
            self.weights(),
            self.config.search_top_k,
        );
        info!(
            raw_word = %raw_word,
            mode = %mode,
            top = candidates.first().map(|c| c.surface.as_str()).unwrap_or(""),
            candidates = candidates.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Resolved word"
        );

        Resolution {
            raw_word: raw_word.to_string(),
            search_mode: Some(mode),
            candidates,
            unresolved: false,
        }
    }

    async fn search(
        &self,
        query: &str,
        scope_id: &str,
        mode: SearchMode,
    ) -> Result<Vec<SearchHit>, ResolverError> {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let search = self
            .backend
            .search(query, scope_id, mode, self.config.search_candidate_limit);
        match tokio::time::timeout(timeout, search).await {
            Ok(result) => result,
            Err(_) => Err(ResolverError::Timeout {
                timeout_ms: self.config.timeout_ms,
            }),
        }
    }
}
