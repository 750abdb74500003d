// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Core types for the letter stream

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider-assigned position of a record within its partition
pub type SequenceNumber = u64;

/// Identity of a registered push consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerHandle {
    /// Stream the consumer is registered against
    pub stream_id: String,
    /// Human-readable consumer name (unique per stream)
    pub consumer_name: String,
    /// Provider-assigned opaque identifier
    pub consumer_id: String,
}

/// Where a new subscription starts reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Only records published after the subscription opens
    Latest,
    /// Records strictly after the given sequence number; the record itself is never redelivered
    AfterSequence(SequenceNumber),
}

/// A single record as delivered by the provider
#[derive(Debug, Clone)]
pub struct StreamRecord {
    pub sequence_number: SequenceNumber,
    pub partition_key: String,
    pub data: Bytes,
    /// Time the provider accepted the record (epoch milliseconds)
    pub arrival_timestamp_ms: i64,
}

/// One push from a live subscription
#[derive(Debug, Clone)]
pub struct SubscriptionBatch {
    pub records: Vec<StreamRecord>,
    /// Resumption point; resubscribing `AfterSequence(token)` continues without loss
    pub continuation_token: Option<SequenceNumber>,
    /// How far behind the partition tip this batch is
    pub lag_millis: u64,
}

/// Per-partition read position owned by a partition worker.
///
/// Lives in memory only. A crash loses it and the next start reads from `Latest`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardCursor {
    pub partition_id: String,
    pub continuation_token: Option<SequenceNumber>,
}

impl ShardCursor {
    pub fn new(partition_id: impl Into<String>) -> Self {
        Self {
            partition_id: partition_id.into(),
            continuation_token: None,
        }
    }

    /// Position to use for the next subscription
    pub fn start_position(&self) -> StartPosition {
        match self.continuation_token {
            Some(sequence) => StartPosition::AfterSequence(sequence),
            None => StartPosition::Latest,
        }
    }

    /// Move the cursor forward; never moves backwards
    pub fn advance(&mut self, token: SequenceNumber) {
        match self.continuation_token {
            Some(current) if current >= token => {}
            _ => self.continuation_token = Some(token),
        }
    }
}

/// Errors surfaced by a stream provider or the consumer around it
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    /// Retryable provider failure (throttling, network, internal error)
    #[error("Transient provider error: {message}")]
    Transient { message: String },

    /// A consumer with this name is already registered
    #[error("Consumer {consumer_name} already registered on {stream_id}")]
    RegistrationConflict {
        stream_id: String,
        consumer_name: String,
    },

    /// The provider ended the subscription lease; resubscribe from the cursor
    #[error("Subscription to {partition_id} expired")]
    SubscriptionExpired { partition_id: String },

    #[error("Unknown stream: {0}")]
    UnknownStream(String),

    #[error("Unknown partition: {0}")]
    UnknownPartition(String),

    #[error("Unknown consumer: {0}")]
    UnknownConsumer(String),

    /// Shutdown was requested while the call was in flight
    #[error("Cancelled")]
    Cancelled,
}

impl StreamError {
    pub fn transient(message: impl Into<String>) -> Self {
        StreamError::Transient {
            message: message.into(),
        }
    }
}
