// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Sliding-window commit engine
//!
//! Turns flickering per-frame letter guesses into committed letters:
//!
//! 1. frames under `min_confidence` are ignored without touching the streak
//! 2. accepted frames enter the session window; entries older than
//!    `newest - window_duration_ms` are evicted
//! 3. the window leader is the letter with the largest confidence sum
//! 4. a letter commits once it has led for `stability_duration_ms` of event
//!    time, its average confidence clears the floor, and the repeat policy
//!    allows it
//! 5. a commit resets the streak, so the next commit has to re-qualify

use tracing::{debug, info};

use super::config::{CommitConfig, RepeatPolicy};
use crate::session::{SessionState, Streak, WindowEntry};
use crate::stream::PredictionEvent;

/// Outcome of feeding one prediction to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum CommitDecision {
    /// Under the voting floor; nothing changed
    BelowConfidence,
    /// Older than the last commit; nothing changed
    Stale,
    /// Leader has not been stable long enough yet
    Accumulating { letter: char, held_ms: i64 },
    /// Stable, but the leader's average confidence is too low
    LowAverage { letter: char, average: f64 },
    /// Stable, but the repeat policy rejects another copy of the last letter
    Suppressed { letter: char },
    Committed { letter: char },
}

impl CommitDecision {
    pub fn committed(&self) -> Option<char> {
        match self {
            CommitDecision::Committed { letter } => Some(*letter),
            _ => None,
        }
    }
}

/// Coarse per-session phase, for logging and stats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Accumulating,
}

pub fn phase(state: &SessionState) -> SessionPhase {
    if state.commit.streak.is_some() || !state.window.is_empty() {
        SessionPhase::Accumulating
    } else {
        SessionPhase::Idle
    }
}

#[derive(Debug, Clone)]
pub struct CommitEngine {
    config: CommitConfig,
}

impl CommitEngine {
    pub fn new(config: CommitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CommitConfig {
        &self.config
    }

    /// Apply one prediction to a session.
    ///
    /// Streak timing uses the event's own timestamps; `now_ms` is only used to
    /// stamp word-buffer activity for pause detection.
    pub fn apply(
        &self,
        state: &mut SessionState,
        event: &PredictionEvent,
        now_ms: i64,
    ) -> CommitDecision {
        if event.confidence < self.config.min_confidence {
            debug!(
                session_id = %state.session_id,
                letter = %event.letter,
                confidence = event.confidence,
                "Below confidence floor"
            );
            return CommitDecision::BelowConfidence;
        }

        if let Some(last_commit) = state.commit.last_commit_timestamp_ms {
            if event.timestamp_ms < last_commit {
                debug!(
                    session_id = %state.session_id,
                    sequence = event.sequence_number,
                    "Ignoring prediction older than last commit"
                );
                return CommitDecision::Stale;
            }
        }

        state
            .window
            .push(WindowEntry::from(event), self.config.window_duration_ms as i64);

        let leader = match state.window.leader() {
            Some(leader) => leader,
            None => return CommitDecision::BelowConfidence,
        };

        let streak = match state.commit.streak {
            Some(mut streak) if streak.letter == leader.letter => {
                streak.last_seen_ms = streak.last_seen_ms.max(event.timestamp_ms);
                streak
            }
            _ => Streak {
                letter: leader.letter,
                first_seen_ms: event.timestamp_ms,
                last_seen_ms: event.timestamp_ms,
            },
        };
        state.commit.streak = Some(streak);

        let held_ms = streak.held_ms();
        if held_ms < self.config.stability_duration_ms as i64 {
            return CommitDecision::Accumulating {
                letter: leader.letter,
                held_ms,
            };
        }

        let average = leader.average_confidence();
        if average < self.config.commit_min_average_confidence {
            return CommitDecision::LowAverage {
                letter: leader.letter,
                average,
            };
        }

        if self.is_suppressed(state, leader.letter, event.timestamp_ms) {
            debug!(
                session_id = %state.session_id,
                letter = %leader.letter,
                "Repeat commit suppressed"
            );
            return CommitDecision::Suppressed {
                letter: leader.letter,
            };
        }

        let commit = &mut state.commit;
        commit.consecutive_same = if commit.last_committed_char == Some(leader.letter) {
            commit.consecutive_same + 1
        } else {
            1
        };
        commit.last_committed_char = Some(leader.letter);
        commit.last_commit_timestamp_ms = Some(event.timestamp_ms);
        commit.streak = None;
        state.buffer.push(leader.letter, now_ms);

        info!(
            session_id = %state.session_id,
            letter = %leader.letter,
            held_ms,
            average_confidence = average,
            buffer = %state.buffer.letters,
            "Committed letter"
        );
        CommitDecision::Committed {
            letter: leader.letter,
        }
    }

    fn is_suppressed(&self, state: &SessionState, letter: char, timestamp_ms: i64) -> bool {
        if state.commit.last_committed_char != Some(letter) {
            return false;
        }
        match self.config.repeat_policy {
            RepeatPolicy::MinInterval {
                dedupe_threshold_ms,
            } => match state.commit.last_commit_timestamp_ms {
                Some(last) => timestamp_ms - last < dedupe_threshold_ms as i64,
                None => false,
            },
            RepeatPolicy::MaxConsecutive {
                max_consecutive_same,
            } => state.commit.consecutive_same >= max_consecutive_same,
        }
    }
}
