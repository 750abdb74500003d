// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Alias confidence lookup and hybrid ranking

use super::distance::{levenshtein, normalize};
use super::types::{Alias, ResolutionCandidate, SearchHit, SearchMode};

/// Weights of the hybrid score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridWeights {
    pub relevance: f64,
    pub alias: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            relevance: 0.7,
            alias: 0.3,
        }
    }
}

impl HybridWeights {
    pub fn score(&self, search_relevance: f64, alias_confidence: f64) -> f64 {
        self.relevance * search_relevance + self.alias * alias_confidence
    }
}

/// Confidence of the alias that best explains `query`, and that alias.
///
/// First match wins: exact alias, then (prefix mode only) an alias that
/// starts with the query, then an alias within `max_edits`. No match is 0.
/// The edit bound is independent of the search mode.
pub fn alias_confidence(
    query: &str,
    aliases: &[Alias],
    mode: SearchMode,
    max_edits: usize,
) -> (f64, Option<String>) {
    let query = normalize(query);
    let normalized: Vec<(String, &Alias)> =
        aliases.iter().map(|a| (normalize(&a.variant), a)).collect();

    if let Some((_, alias)) = normalized.iter().find(|(variant, _)| *variant == query) {
        return (alias.confidence, Some(alias.variant.clone()));
    }

    if mode == SearchMode::Prefix {
        let query_len = query.chars().count();
        if let Some((_, alias)) = normalized
            .iter()
            .filter(|(variant, _)| variant.starts_with(&query))
            .min_by_key(|(variant, _)| variant.chars().count() - query_len)
        {
            return (alias.confidence, Some(alias.variant.clone()));
        }
    }

    normalized
        .iter()
        .map(|(variant, alias)| (levenshtein(&query, variant), *alias))
        .filter(|(distance, _)| *distance <= max_edits)
        .min_by(|a, b| a.0.cmp(&b.0).then(b.1.confidence.total_cmp(&a.1.confidence)))
        .map(|(_, alias)| (alias.confidence, Some(alias.variant.clone())))
        .unwrap_or((0.0, None))
}

/// Score every hit and keep the best `top_k`.
///
/// Ordered by hybrid score, then search relevance, both descending.
pub fn rank(
    query: &str,
    hits: Vec<SearchHit>,
    mode: SearchMode,
    max_edits: usize,
    weights: HybridWeights,
    top_k: usize,
) -> Vec<ResolutionCandidate> {
    let mut candidates: Vec<ResolutionCandidate> = hits
        .into_iter()
        .map(|hit| {
            let (alias_confidence, matched_via) =
                alias_confidence(query, &hit.aliases, mode, max_edits);
            ResolutionCandidate {
                hybrid_score: weights.score(hit.relevance, alias_confidence),
                surface: hit.surface,
                search_relevance: hit.relevance,
                alias_confidence,
                matched_via,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.hybrid_score
            .total_cmp(&a.hybrid_score)
            .then(b.search_relevance.total_cmp(&a.search_relevance))
    });
    candidates.truncate(top_k);
    candidates
}
