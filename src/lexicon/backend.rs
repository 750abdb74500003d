// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Lexicon backend trait definition

use async_trait::async_trait;

use super::types::{ResolverError, SearchHit, SearchMode};

/// Search index over lexicon entries
///
/// Implementations return hits ordered by their own relevance; the resolver
/// re-ranks them with alias confidence.
#[async_trait]
pub trait LexiconBackend: Send + Sync {
    /// Search surfaces and aliases visible to `scope_id`
    ///
    /// # Arguments
    /// * `query` - Normalised raw word
    /// * `scope_id` - User or tenant whose lexicon is searched
    /// * `mode` - Prefix or fuzzy matching
    /// * `limit` - Maximum number of hits
    async fn search(
        &self,
        query: &str,
        scope_id: &str,
        mode: SearchMode,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ResolverError>;

    /// Get the backend name for logging
    fn name(&self) -> &'static str;
}
