// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Core types for lexicon resolution

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A known confusable spelling of a surface form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub variant: String,
    /// How likely the letter model produces this variant for the surface form
    pub confidence: f64,
}

impl Alias {
    pub fn new(variant: impl Into<String>, confidence: f64) -> Self {
        Self {
            variant: variant.into(),
            confidence,
        }
    }
}

/// A word the resolver can produce, with its aliases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub surface: String,
    #[serde(default)]
    pub aliases: Vec<Alias>,
    /// Owning user or tenant; `None` makes the entry visible to every scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,
}

impl LexiconEntry {
    pub fn new(surface: impl Into<String>, aliases: Vec<Alias>) -> Self {
        Self {
            surface: surface.into(),
            aliases,
            scope_id: None,
        }
    }

    pub fn in_scope(mut self, scope_id: impl Into<String>) -> Self {
        self.scope_id = Some(scope_id.into());
        self
    }

    pub fn visible_to(&self, scope_id: &str) -> bool {
        self.scope_id.as_deref().map_or(true, |s| s == scope_id)
    }
}

/// Search strategy, picked from the length of the raw word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Left-anchored, for short words that may still be incomplete
    Prefix,
    /// Whole-term edit-distance match
    Fuzzy,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Prefix => write!(f, "prefix"),
            SearchMode::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

/// One backend match, before hybrid re-ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub surface: String,
    #[serde(default)]
    pub aliases: Vec<Alias>,
    /// Backend-native relevance; only comparable within one query
    pub relevance: f64,
}

/// A ranked resolution candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionCandidate {
    pub surface: String,
    pub search_relevance: f64,
    pub alias_confidence: f64,
    pub hybrid_score: f64,
    /// Alias that supplied `alias_confidence`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_via: Option<String>,
}

/// Result of resolving one raw word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub raw_word: String,
    pub search_mode: Option<SearchMode>,
    pub candidates: Vec<ResolutionCandidate>,
    /// No correction available; consumers should show `raw_word`
    pub unresolved: bool,
}

impl Resolution {
    pub fn unresolved(raw_word: impl Into<String>, search_mode: Option<SearchMode>) -> Self {
        Self {
            raw_word: raw_word.into(),
            search_mode,
            candidates: Vec::new(),
            unresolved: true,
        }
    }

    pub fn top(&self) -> Option<&ResolutionCandidate> {
        self.candidates.first()
    }
}

/// Errors from a lexicon backend
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolverError {
    #[error("Lexicon backend unavailable: {message}")]
    Unavailable { message: String },

    #[error("Lexicon search timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid lexicon response: {message}")]
    InvalidResponse { message: String },
}
