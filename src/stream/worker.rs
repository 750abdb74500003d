// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Partition worker
//!
//! One worker owns one partition's subscription for the lifetime of the
//! consumer. The retry loop is an explicit state machine:
//!
//! ```text
//! Subscribing -> Streaming -> Resubscribing -> Streaming ...
//!      |             |
//!      +--> Backoff <+          (any state) --cancel--> Stopped
//! ```
//!
//! Every blocking call (subscribe, read, backoff sleep, downstream push) is
//! raced against the worker's cancellation token.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backoff::Backoff;
use super::config::BackoffConfig;
use super::event::{decode_record, LetterEvent};
use super::provider::{StreamProvider, SubscriptionStream};
use super::queue::DispatchError;
use super::types::{ConsumerHandle, SequenceNumber, ShardCursor, StreamError, SubscriptionBatch};

/// Downstream receiver of decoded events
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Hand over one event; may wait for queue space until `cancel` fires
    async fn deliver(
        &self,
        event: LetterEvent,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError>;
}

/// Worker lifecycle states
pub enum WorkerState {
    Subscribing,
    Streaming(SubscriptionStream),
    /// Provider ended the lease; reopen from the cursor without delay
    Resubscribing,
    Backoff(StreamError),
    Stopped,
}

impl WorkerState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerState::Subscribing => "subscribing",
            WorkerState::Streaming(_) => "streaming",
            WorkerState::Resubscribing => "resubscribing",
            WorkerState::Backoff(_) => "backoff",
            WorkerState::Stopped => "stopped",
        }
    }
}

/// Live counters shared between a worker and its consumer
#[derive(Debug, Default)]
pub struct WorkerStats {
    subscriptions: AtomicU64,
    delivered: AtomicU64,
    duplicates_suppressed: AtomicU64,
    malformed: AtomicU64,
    resubscriptions: AtomicU64,
    retries: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatsSnapshot {
    pub partition_id: String,
    pub subscriptions: u64,
    pub delivered: u64,
    pub duplicates_suppressed: u64,
    pub malformed: u64,
    pub resubscriptions: u64,
    pub retries: u64,
}

impl WorkerStats {
    pub fn subscriptions(&self) -> u64 {
        self.subscriptions.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self, partition_id: &str) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            partition_id: partition_id.to_string(),
            subscriptions: self.subscriptions.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            resubscriptions: self.resubscriptions.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

/// Final state of a worker after it stopped
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub partition_id: String,
    pub cursor: ShardCursor,
    pub stats: WorkerStatsSnapshot,
}

pub struct PartitionWorker {
    partition_id: String,
    provider: Arc<dyn StreamProvider>,
    consumer: ConsumerHandle,
    sink: Arc<dyn EventSink>,
    cursor: ShardCursor,
    backoff: Backoff,
    last_delivered: Option<SequenceNumber>,
    stats: Arc<WorkerStats>,
    cancel: CancellationToken,
}

impl PartitionWorker {
    pub fn new(
        partition_id: impl Into<String>,
        provider: Arc<dyn StreamProvider>,
        consumer: ConsumerHandle,
        sink: Arc<dyn EventSink>,
        backoff: &BackoffConfig,
        cancel: CancellationToken,
    ) -> Self {
        let partition_id = partition_id.into();
        Self {
            cursor: ShardCursor::new(partition_id.clone()),
            partition_id,
            provider,
            consumer,
            sink,
            backoff: Backoff::new(backoff),
            last_delivered: None,
            stats: Arc::new(WorkerStats::default()),
            cancel,
        }
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Drive the state machine until cancelled
    pub async fn run(mut self) -> WorkerReport {
        let mut state = WorkerState::Subscribing;
        loop {
            debug!(partition = %self.partition_id, state = state.name(), "Worker transition");
            state = match state {
                WorkerState::Subscribing | WorkerState::Resubscribing => self.subscribe().await,
                WorkerState::Streaming(subscription) => self.stream(subscription).await,
                WorkerState::Backoff(error) => self.back_off(error).await,
                WorkerState::Stopped => break,
            };
        }

        info!(
            partition = %self.partition_id,
            cursor = ?self.cursor.continuation_token,
            "Partition worker stopped"
        );
        WorkerReport {
            stats: self.stats.snapshot(&self.partition_id),
            partition_id: self.partition_id,
            cursor: self.cursor,
        }
    }

    async fn subscribe(&mut self) -> WorkerState {
        let start = self.cursor.start_position();
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return WorkerState::Stopped,
            result = self.provider.subscribe(&self.consumer, &self.partition_id, start) => result,
        };

        match result {
            Ok(subscription) => {
                self.stats.subscriptions.fetch_add(1, Ordering::Relaxed);
                info!(partition = %self.partition_id, start = ?start, "Subscribed to partition");
                WorkerState::Streaming(subscription)
            }
            Err(StreamError::Cancelled) => WorkerState::Stopped,
            Err(error) => WorkerState::Backoff(error),
        }
    }

    async fn stream(&mut self, mut subscription: SubscriptionStream) -> WorkerState {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return WorkerState::Stopped,
                next = subscription.next() => next,
            };

            match next {
                None | Some(Err(StreamError::SubscriptionExpired { .. })) => {
                    self.stats.resubscriptions.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        partition = %self.partition_id,
                        cursor = ?self.cursor.continuation_token,
                        "Subscription lease ended, resubscribing"
                    );
                    return WorkerState::Resubscribing;
                }
                Some(Err(StreamError::Cancelled)) => return WorkerState::Stopped,
                Some(Err(error)) => return WorkerState::Backoff(error),
                Some(Ok(batch)) => {
                    if !batch.records.is_empty() {
                        self.backoff.reset();
                    }
                    if self.handle_batch(batch).await.is_err() {
                        return WorkerState::Stopped;
                    }
                }
            }
        }
    }

    async fn handle_batch(&mut self, batch: SubscriptionBatch) -> Result<(), DispatchError> {
        if batch.lag_millis > 0 {
            debug!(partition = %self.partition_id, lag_millis = batch.lag_millis, "Batch received");
        }

        for record in &batch.records {
            let sequence = record.sequence_number;
            if matches!(self.last_delivered, Some(last) if sequence <= last) {
                self.stats
                    .duplicates_suppressed
                    .fetch_add(1, Ordering::Relaxed);
                warn!(partition = %self.partition_id, sequence, "Suppressed redelivered record");
                continue;
            }

            match decode_record(record) {
                Ok(event) => {
                    self.sink.deliver(event, &self.cancel).await?;
                    self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(error) => {
                    self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        partition = %self.partition_id,
                        sequence,
                        error = %error,
                        "Dropping malformed record"
                    );
                }
            }
            self.last_delivered = Some(sequence);
            self.cursor.advance(sequence);
        }

        if let Some(token) = batch.continuation_token {
            self.cursor.advance(token);
        }
        Ok(())
    }

    async fn back_off(&mut self, error: StreamError) -> WorkerState {
        self.stats.retries.fetch_add(1, Ordering::Relaxed);
        let delay = self.backoff.next_delay();
        warn!(
            partition = %self.partition_id,
            error = %error,
            retry = self.backoff.retry_count(),
            delay_ms = delay.as_millis() as u64,
            "Partition read failed, backing off"
        );

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => WorkerState::Stopped,
            _ = tokio::time::sleep(delay) => WorkerState::Subscribing,
        }
    }
}
