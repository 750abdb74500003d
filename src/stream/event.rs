// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Letter events decoded from stream records
//!
//! The upstream letter model writes one JSON document per frame:
//!
//! ```json
//! {"session_id": "s-1", "connection_id": "c-1", "event_type": "prediction",
//!  "prediction": "A", "confidence": 0.91, "timestamp": 1730000000123}
//! ```
//!
//! `event_type` defaults to `prediction`. Skip events carry `skip_reason` and
//! `multi_hand`; `session_end` closes the session. `timestamp` may be epoch
//! milliseconds, epoch seconds as a float, or an ISO-8601 string (naive
//! strings are read as UTC). Anything else falls back to the arrival time.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::types::{SequenceNumber, StreamRecord};

/// One per-frame letter guess for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionEvent {
    pub session_id: String,
    pub connection_id: String,
    pub letter: char,
    pub confidence: f64,
    /// Epoch milliseconds
    pub timestamp_ms: i64,
    pub sequence_number: SequenceNumber,
}

/// Upstream could not produce a letter for the frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipEvent {
    pub session_id: String,
    pub connection_id: String,
    pub reason: SkipReason,
    pub timestamp_ms: i64,
    pub sequence_number: SequenceNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Two hands in frame, most likely a word-level sign
    MultiHand,
    /// Hand lost
    NoHands,
    Other(String),
}

impl SkipReason {
    fn parse(reason: Option<&str>, multi_hand: bool) -> Self {
        if multi_hand {
            return SkipReason::MultiHand;
        }
        match reason.map(|r| r.trim().to_ascii_lowercase()) {
            Some(r) if r == "multi_hand" => SkipReason::MultiHand,
            Some(r) if r == "no_hands" || r == "no_hand" || r.is_empty() => SkipReason::NoHands,
            Some(r) => SkipReason::Other(r),
            None => SkipReason::NoHands,
        }
    }
}

/// Explicit end of a fingerspelling session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEndEvent {
    pub session_id: String,
    pub connection_id: String,
    pub timestamp_ms: i64,
    pub sequence_number: SequenceNumber,
}

/// Anything the dispatcher routes to a session shard
#[derive(Debug, Clone, PartialEq)]
pub enum LetterEvent {
    Prediction(PredictionEvent),
    Skip(SkipEvent),
    SessionEnd(SessionEndEvent),
}

impl LetterEvent {
    pub fn session_id(&self) -> &str {
        match self {
            LetterEvent::Prediction(e) => &e.session_id,
            LetterEvent::Skip(e) => &e.session_id,
            LetterEvent::SessionEnd(e) => &e.session_id,
        }
    }

    pub fn connection_id(&self) -> &str {
        match self {
            LetterEvent::Prediction(e) => &e.connection_id,
            LetterEvent::Skip(e) => &e.connection_id,
            LetterEvent::SessionEnd(e) => &e.connection_id,
        }
    }

    pub fn sequence_number(&self) -> SequenceNumber {
        match self {
            LetterEvent::Prediction(e) => e.sequence_number,
            LetterEvent::Skip(e) => e.sequence_number,
            LetterEvent::SessionEnd(e) => e.sequence_number,
        }
    }

    pub fn timestamp_ms(&self) -> i64 {
        match self {
            LetterEvent::Prediction(e) => e.timestamp_ms,
            LetterEvent::Skip(e) => e.timestamp_ms,
            LetterEvent::SessionEnd(e) => e.timestamp_ms,
        }
    }
}

/// A record that cannot be turned into a [`LetterEvent`]; dropped by the worker
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MalformedEvent {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid letter {0:?}: expected exactly one character")]
    InvalidLetter(String),

    #[error("Confidence {0} outside [0, 1]")]
    InvalidConfidence(f64),

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
}

/// Event time as written by the producer
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EventTimestamp {
    /// Epoch milliseconds
    Millis(i64),
    /// Epoch seconds with a fractional part
    Seconds(f64),
    /// ISO-8601 / RFC 3339, or a number in a string
    Text(String),
}

impl EventTimestamp {
    /// Epoch milliseconds, if the value can be read as a point in time
    pub fn to_millis(&self) -> Option<i64> {
        match self {
            EventTimestamp::Millis(ms) => Some(*ms),
            EventTimestamp::Seconds(secs) if secs.is_finite() => {
                Some((secs * 1_000.0).round() as i64)
            }
            EventTimestamp::Seconds(_) => None,
            EventTimestamp::Text(text) => parse_text_timestamp(text.trim()),
        }
    }
}

fn parse_text_timestamp(text: &str) -> Option<i64> {
    if let Ok(ms) = text.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

#[derive(Debug, Deserialize)]
struct LetterRecord {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    connection_id: Option<String>,
    #[serde(default)]
    event_type: Option<String>,
    #[serde(default, alias = "prediction")]
    letter: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    timestamp: Option<EventTimestamp>,
    #[serde(default)]
    skip_reason: Option<String>,
    #[serde(default)]
    multi_hand: bool,
}

/// Decode one stream record into a letter event
pub fn decode_record(record: &StreamRecord) -> Result<LetterEvent, MalformedEvent> {
    let parsed: LetterRecord = serde_json::from_slice(&record.data)
        .map_err(|e| MalformedEvent::InvalidJson(e.to_string()))?;

    let session_id = parsed
        .session_id
        .filter(|s| !s.trim().is_empty())
        .ok_or(MalformedEvent::MissingField("session_id"))?;
    let connection_id = parsed.connection_id.unwrap_or_else(|| session_id.clone());
    let timestamp_ms = match parsed.timestamp.as_ref().map(EventTimestamp::to_millis) {
        Some(Some(ms)) => ms,
        Some(None) => {
            debug!(
                sequence = record.sequence_number,
                timestamp = ?parsed.timestamp,
                "Unreadable event timestamp, using arrival time"
            );
            record.arrival_timestamp_ms
        }
        None => record.arrival_timestamp_ms,
    };
    let sequence_number = record.sequence_number;

    let event_type = parsed
        .event_type
        .as_deref()
        .map(|t| t.trim().to_ascii_lowercase())
        .unwrap_or_else(|| "prediction".to_string());

    match event_type.as_str() {
        "prediction" => {
            let raw_letter = parsed.letter.ok_or(MalformedEvent::MissingField("letter"))?;
            let letter = single_letter(&raw_letter)?;
            let confidence = parsed
                .confidence
                .ok_or(MalformedEvent::MissingField("confidence"))?;
            if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
                return Err(MalformedEvent::InvalidConfidence(confidence));
            }
            Ok(LetterEvent::Prediction(PredictionEvent {
                session_id,
                connection_id,
                letter,
                confidence,
                timestamp_ms,
                sequence_number,
            }))
        }
        "skip" => Ok(LetterEvent::Skip(SkipEvent {
            session_id,
            connection_id,
            reason: SkipReason::parse(parsed.skip_reason.as_deref(), parsed.multi_hand),
            timestamp_ms,
            sequence_number,
        })),
        "session_end" | "end" => Ok(LetterEvent::SessionEnd(SessionEndEvent {
            session_id,
            connection_id,
            timestamp_ms,
            sequence_number,
        })),
        other => Err(MalformedEvent::UnknownEventType(other.to_string())),
    }
}

fn single_letter(raw: &str) -> Result<char, MalformedEvent> {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c.to_ascii_uppercase()),
        _ => Err(MalformedEvent::InvalidLetter(raw.to_string())),
    }
}
