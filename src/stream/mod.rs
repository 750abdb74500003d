// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Letter stream consumer
//!
//! Push subscriptions per partition, resubscription on lease expiry,
//! exponential backoff on provider errors and a bounded hand-off queue to the
//! session shards.

pub mod backoff;
pub mod config;
pub mod consumer;
pub mod event;
pub mod memory;
pub mod provider;
pub mod queue;
pub mod types;
pub mod worker;

pub use backoff::Backoff;
pub use config::{BackoffConfig, StreamConfig};
pub use consumer::{RunningConsumer, StreamConsumer};
pub use event::{
    decode_record, EventTimestamp, LetterEvent, MalformedEvent, PredictionEvent, SessionEndEvent,
    SkipEvent, SkipReason,
};
pub use memory::MemoryStreamProvider;
pub use provider::{StreamProvider, SubscriptionStream};
pub use queue::{DispatchError, DispatchQueue, OverflowPolicy, PushOutcome};
pub use types::{
    ConsumerHandle, SequenceNumber, ShardCursor, StartPosition, StreamError, StreamRecord,
    SubscriptionBatch,
};
pub use worker::{EventSink, PartitionWorker, WorkerReport, WorkerState, WorkerStatsSnapshot};
