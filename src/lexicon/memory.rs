// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-memory lexicon with BM25-style relevance
//!
//! Each entry is indexed as a small document whose fields are the normalised
//! surface form, its individual tokens and every alias variant. A query term
//! matches a field when it is within the mode's edit budget, and each match
//! contributes `1 / (1 + distance)` to the term frequency. Relevance is then
//! `idf * tf * (k1 + 1) / (tf + k1 * (1 - b + b * dl / avgdl))` with `dl`
//! the entry's field count and idf taken over the entries visible to the
//! requested scope.

use async_trait::async_trait;
use std::sync::RwLock;

use super::backend::LexiconBackend;
use super::distance::{levenshtein, normalize, prefix_distance};
use super::types::{LexiconEntry, ResolverError, SearchHit, SearchMode};

const K1: f64 = 1.2;
const B: f64 = 0.75;

struct IndexedEntry {
    entry: LexiconEntry,
    fields: Vec<String>,
}

impl IndexedEntry {
    fn new(entry: LexiconEntry) -> Self {
        let mut fields = vec![normalize(&entry.surface)];
        let tokens: Vec<String> = entry
            .surface
            .split(|c: char| c.is_whitespace() || c == '-')
            .filter(|t| !t.is_empty())
            .map(normalize)
            .collect();
        if tokens.len() > 1 {
            fields.extend(tokens);
        }
        fields.extend(entry.aliases.iter().map(|a| normalize(&a.variant)));

        let mut seen = std::collections::HashSet::new();
        fields.retain(|f| !f.is_empty() && seen.insert(f.clone()));
        Self { entry, fields }
    }
}

/// Lexicon held in process memory
pub struct InMemoryLexicon {
    entries: RwLock<Vec<IndexedEntry>>,
    prefix_max_edits: usize,
    fuzzy_max_edits: usize,
}

impl InMemoryLexicon {
    pub fn new(prefix_max_edits: usize, fuzzy_max_edits: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            prefix_max_edits,
            fuzzy_max_edits,
        }
    }

    pub fn with_entries(self, entries: Vec<LexiconEntry>) -> Self {
        self.extend(entries);
        self
    }

    /// Parse a JSON array of entries
    pub fn parse_entries(json: &str) -> Result<Vec<LexiconEntry>, ResolverError> {
        serde_json::from_str(json).map_err(|e| ResolverError::InvalidResponse {
            message: format!("Invalid lexicon JSON: {}", e),
        })
    }

    pub fn extend(&self, entries: Vec<LexiconEntry>) {
        if let Ok(mut indexed) = self.entries.write() {
            indexed.extend(entries.into_iter().map(IndexedEntry::new));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn field_distance(&self, query: &str, field: &str, mode: SearchMode) -> Option<usize> {
        let (distance, budget) = match mode {
            SearchMode::Prefix => (
                prefix_distance(query, field, self.prefix_max_edits),
                self.prefix_max_edits,
            ),
            SearchMode::Fuzzy => (levenshtein(query, field), self.fuzzy_max_edits),
        };
        (distance <= budget).then_some(distance)
    }
}

#[async_trait]
impl LexiconBackend for InMemoryLexicon {
    async fn search(
        &self,
        query: &str,
        scope_id: &str,
        mode: SearchMode,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ResolverError> {
        let query = normalize(query);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let entries = self
            .entries
            .read()
            .map_err(|_| ResolverError::Unavailable {
                message: "lexicon index poisoned".to_string(),
            })?;
        let visible: Vec<&IndexedEntry> = entries
            .iter()
            .filter(|e| e.entry.visible_to(scope_id))
            .collect();
        if visible.is_empty() {
            return Ok(Vec::new());
        }

        let doc_count = visible.len() as f64;
        let avg_len = visible.iter().map(|e| e.fields.len()).sum::<usize>() as f64 / doc_count;

        // (entry, term frequency)
        let matches: Vec<(&IndexedEntry, f64)> = visible
            .iter()
            .filter_map(|indexed| {
                let tf: f64 = indexed
                    .fields
                    .iter()
                    .filter_map(|field| self.field_distance(&query, field, mode))
                    .map(|distance| 1.0 / (1.0 + distance as f64))
                    .sum();
                (tf > 0.0).then_some((*indexed, tf))
            })
            .collect();

        let matched = matches.len() as f64;
        let idf = (1.0 + (doc_count - matched + 0.5) / (matched + 0.5)).ln();

        let mut hits: Vec<SearchHit> = matches
            .into_iter()
            .map(|(indexed, tf)| {
                let length_norm = 1.0 - B + B * indexed.fields.len() as f64 / avg_len;
                let relevance = idf * tf * (K1 + 1.0) / (tf + K1 * length_norm);
                SearchHit {
                    surface: indexed.entry.surface.clone(),
                    aliases: indexed.entry.aliases.clone(),
                    relevance,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.relevance
                .total_cmp(&a.relevance)
                .then_with(|| a.surface.cmp(&b.surface))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
