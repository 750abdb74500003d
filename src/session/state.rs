// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-session aggregation state

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::stream::{PredictionEvent, SequenceNumber};

const TIE_EPSILON: f64 = 1e-9;

/// One accepted prediction inside a sliding window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowEntry {
    pub letter: char,
    pub confidence: f64,
    pub timestamp_ms: i64,
    pub sequence_number: SequenceNumber,
}

impl From<&PredictionEvent> for WindowEntry {
    fn from(event: &PredictionEvent) -> Self {
        Self {
            letter: event.letter,
            confidence: event.confidence,
            timestamp_ms: event.timestamp_ms,
            sequence_number: event.sequence_number,
        }
    }
}

/// Character currently dominating a window
#[derive(Debug, Clone, PartialEq)]
pub struct Leader {
    pub letter: char,
    /// Sum of confidences across the letter's entries
    pub total_confidence: f64,
    pub count: usize,
}

impl Leader {
    pub fn average_confidence(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_confidence / self.count as f64
        }
    }
}

/// Recent accepted predictions in insertion order.
///
/// Every retained entry satisfies `timestamp >= newest - duration`; older
/// entries are removed on insertion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlidingWindow {
    entries: VecDeque<WindowEntry>,
}

impl SlidingWindow {
    /// Append an entry and evict everything older than `duration_ms` before the newest
    pub fn push(&mut self, entry: WindowEntry, duration_ms: i64) -> usize {
        self.entries.push_back(entry);
        let newest = self.newest_timestamp().unwrap_or(i64::MIN);
        let floor = newest.saturating_sub(duration_ms);
        let before = self.entries.len();
        self.entries.retain(|e| e.timestamp_ms >= floor);
        before - self.entries.len()
    }

    /// Largest timestamp currently in the window
    pub fn newest_timestamp(&self) -> Option<i64> {
        self.entries.iter().map(|e| e.timestamp_ms).max()
    }

    /// Letter with the largest confidence sum; ties go to the letter seen most recently
    pub fn leader(&self) -> Option<Leader> {
        // (letter, total, count, last insertion index)
        let mut tallies: Vec<(char, f64, usize, usize)> = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            match tallies.iter_mut().find(|t| t.0 == entry.letter) {
                Some(tally) => {
                    tally.1 += entry.confidence;
                    tally.2 += 1;
                    tally.3 = index;
                }
                None => tallies.push((entry.letter, entry.confidence, 1, index)),
            }
        }

        tallies
            .into_iter()
            .max_by(|a, b| {
                if (a.1 - b.1).abs() <= TIE_EPSILON {
                    a.3.cmp(&b.3)
                } else {
                    a.1.total_cmp(&b.1)
                }
            })
            .map(|(letter, total_confidence, count, _)| Leader {
                letter,
                total_confidence,
                count,
            })
    }

    pub fn entries(&self) -> impl Iterator<Item = &WindowEntry> {
        self.entries.iter()
    }

    pub fn contains_sequence(&self, sequence_number: SequenceNumber) -> bool {
        self.entries.iter().any(|e| e.sequence_number == sequence_number)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Continuous leadership of one letter, in event time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Streak {
    pub letter: char,
    pub first_seen_ms: i64,
    pub last_seen_ms: i64,
}

impl Streak {
    pub fn held_ms(&self) -> i64 {
        self.last_seen_ms - self.first_seen_ms
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitState {
    pub last_committed_char: Option<char>,
    /// Event time of the last commit; events before it are never reprocessed
    pub last_commit_timestamp_ms: Option<i64>,
    /// Length of the current run of identical commits
    pub consecutive_same: u32,
    pub streak: Option<Streak>,
}

/// Letters committed since the last finalization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordBuffer {
    pub letters: String,
    /// Processing time of the last commit
    pub last_activity_ms: Option<i64>,
}

impl WordBuffer {
    pub fn push(&mut self, letter: char, now_ms: i64) {
        self.letters.push(letter);
        self.last_activity_ms = Some(now_ms);
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }

    /// Take the letters, leaving the buffer empty but alive
    pub fn take(&mut self) -> String {
        self.last_activity_ms = None;
        std::mem::take(&mut self.letters)
    }
}

/// Everything the aggregator and finalizer keep for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub connection_id: String,
    pub window: SlidingWindow,
    pub commit: CommitState,
    pub buffer: WordBuffer,
    /// Words finalized so far in this session
    pub words_finalized: u64,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, connection_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            connection_id: connection_id.into(),
            window: SlidingWindow::default(),
            commit: CommitState::default(),
            buffer: WordBuffer::default(),
            words_finalized: 0,
        }
    }
}
