// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Word finalizer: decides when a word buffer is complete

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use super::config::FinalizerConfig;
use crate::session::SessionState;

/// What completed the word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeTrigger {
    /// No commit for the configured pause duration
    Pause,
    /// Upstream could not see a single hand
    Skip,
    SessionEnd,
}

impl fmt::Display for FinalizeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalizeTrigger::Pause => write!(f, "pause"),
            FinalizeTrigger::Skip => write!(f, "skip"),
            FinalizeTrigger::SessionEnd => write!(f, "session_end"),
        }
    }
}

/// Snapshot of a completed word, ready for resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedWord {
    pub session_id: String,
    pub connection_id: String,
    pub raw_word: String,
    pub trigger: FinalizeTrigger,
    pub finalized_at_ms: i64,
}

#[derive(Debug, Clone)]
pub struct Finalizer {
    config: FinalizerConfig,
}

impl Finalizer {
    pub fn new(config: FinalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FinalizerConfig {
        &self.config
    }

    /// Time at which the session's buffer will count as paused
    pub fn pause_deadline(&self, state: &SessionState) -> Option<i64> {
        if state.buffer.is_empty() {
            return None;
        }
        state
            .buffer
            .last_activity_ms
            .map(|t| t + self.config.pause_duration_ms as i64)
    }

    /// Finalize if the buffer has been idle for the pause duration
    pub fn poll_pause(&self, state: &mut SessionState, now_ms: i64) -> Option<FinalizedWord> {
        match self.pause_deadline(state) {
            Some(deadline) if now_ms >= deadline => {
                self.finalize(state, FinalizeTrigger::Pause, now_ms)
            }
            _ => None,
        }
    }

    /// Finalize immediately; the streak is broken even when nothing was buffered
    pub fn on_skip(&self, state: &mut SessionState, now_ms: i64) -> Option<FinalizedWord> {
        let word = self.finalize(state, FinalizeTrigger::Skip, now_ms);
        if word.is_none() {
            state.commit.streak = None;
            state.window.clear();
        }
        word
    }

    /// Finalize whatever is buffered before the session goes away
    pub fn on_session_end(&self, state: &mut SessionState, now_ms: i64) -> Option<FinalizedWord> {
        self.finalize(state, FinalizeTrigger::SessionEnd, now_ms)
    }

    fn finalize(
        &self,
        state: &mut SessionState,
        trigger: FinalizeTrigger,
        now_ms: i64,
    ) -> Option<FinalizedWord> {
        if state.buffer.is_empty() {
            debug!(session_id = %state.session_id, trigger = %trigger, "Nothing to finalize");
            return None;
        }

        let raw_word = state.buffer.take();
        state.commit.streak = None;
        state.commit.last_committed_char = None;
        state.commit.consecutive_same = 0;
        state.window.clear();
        state.words_finalized += 1;

        info!(
            session_id = %state.session_id,
            raw_word = %raw_word,
            trigger = %trigger,
            "Word finalized"
        );
        Some(FinalizedWord {
            session_id: state.session_id.clone(),
            connection_id: state.connection_id.clone(),
            raw_word,
            trigger,
            finalized_at_ms: now_ms,
        })
    }
}
