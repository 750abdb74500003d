// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Resolved word emitted for downstream delivery

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregator::{FinalizeTrigger, FinalizedWord};
use crate::lexicon::{Resolution, ResolutionCandidate, SearchMode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedWord {
    pub session_id: String,
    pub connection_id: String,
    pub raw_word: String,
    pub candidates: Vec<ResolutionCandidate>,
    /// When the word was finalized
    pub timestamp: DateTime<Utc>,
    pub unresolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_mode: Option<SearchMode>,
    pub trigger: FinalizeTrigger,
}

impl ResolvedWord {
    pub fn new(word: FinalizedWord, resolution: Resolution) -> Self {
        let timestamp = Utc
            .timestamp_millis_opt(word.finalized_at_ms)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            session_id: word.session_id,
            connection_id: word.connection_id,
            raw_word: word.raw_word,
            candidates: resolution.candidates,
            timestamp,
            unresolved: resolution.unresolved,
            search_mode: resolution.search_mode,
            trigger: word.trigger,
        }
    }

    /// Best surface form, or the raw word when unresolved
    pub fn best(&self) -> &str {
        self.candidates
            .first()
            .map(|c| c.surface.as_str())
            .unwrap_or(&self.raw_word)
    }
}
