// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-process partitioned stream
//!
//! Backs the replay binary and the integration tests. Semantics mirror a hosted
//! fan-out stream closely enough to exercise the consumer:
//! - sequence numbers are unique and increasing across the whole stream
//! - `Latest` skips everything published before the subscription opened
//! - `AfterSequence(n)` never redelivers `n`
//! - every subscription opens with an empty batch whose token is the resolved
//!   start position, so a reader that fails before its first record still
//!   resumes without a gap
//! - subscriptions can be given a lease (in batches) or expired on demand
//! - transient failures can be injected per partition

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use super::provider::{StreamProvider, SubscriptionStream};
use super::types::{
    ConsumerHandle, SequenceNumber, StartPosition, StreamError, StreamRecord, SubscriptionBatch,
};

const DEFAULT_MAX_BATCH: usize = 100;

struct PartitionLog {
    records: Vec<StreamRecord>,
    /// Bumped by `expire_subscriptions`; open subscriptions from an older epoch end
    lease_epoch: u64,
    failing_subscribes: u32,
    failing_reads: u32,
    tail: watch::Sender<u64>,
}

impl PartitionLog {
    fn new() -> Self {
        let (tail, _) = watch::channel(0);
        Self {
            records: Vec::new(),
            lease_epoch: 0,
            failing_subscribes: 0,
            failing_reads: 0,
            tail,
        }
    }

    fn wake(&self) {
        let next = *self.tail.borrow() + 1;
        self.tail.send_replace(next);
    }
}

struct StreamState {
    stream_id: String,
    partitions: BTreeMap<String, PartitionLog>,
    consumers: HashMap<String, ConsumerHandle>,
    last_sequence: SequenceNumber,
    lease_batches: Option<usize>,
    max_batch: usize,
    deregistrations: usize,
}

/// Partitioned, push-style stream held in memory
#[derive(Clone)]
pub struct MemoryStreamProvider {
    state: Arc<Mutex<StreamState>>,
}

impl MemoryStreamProvider {
    /// Create a stream with `partition_count` partitions named `shard-0..N`
    pub fn new(stream_id: impl Into<String>, partition_count: usize) -> Self {
        let partitions = (0..partition_count.max(1))
            .map(|i| (format!("shard-{}", i), PartitionLog::new()))
            .collect();

        Self {
            state: Arc::new(Mutex::new(StreamState {
                stream_id: stream_id.into(),
                partitions,
                consumers: HashMap::new(),
                last_sequence: 0,
                lease_batches: None,
                max_batch: DEFAULT_MAX_BATCH,
                deregistrations: 0,
            })),
        }
    }

    /// End every subscription after it has pushed `batches` batches
    pub fn with_lease_batches(self, batches: usize) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.lease_batches = Some(batches.max(1));
        }
        self
    }

    /// Cap the number of records per pushed batch
    pub fn with_max_batch(self, max_batch: usize) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.max_batch = max_batch.max(1);
        }
        self
    }

    /// Partition a key routes to
    pub fn partition_for(&self, partition_key: &str) -> Option<String> {
        let state = self.state.lock().ok()?;
        let count = state.partitions.len();
        let mut hasher = DefaultHasher::new();
        partition_key.hash(&mut hasher);
        let index = (hasher.finish() % count as u64) as usize;
        state.partitions.keys().nth(index).cloned()
    }

    /// Append a record, routing by partition key
    pub fn publish(
        &self,
        partition_key: &str,
        data: impl Into<Bytes>,
    ) -> Result<SequenceNumber, StreamError> {
        let partition_id = self
            .partition_for(partition_key)
            .ok_or_else(|| StreamError::transient("stream state poisoned"))?;
        self.publish_to(&partition_id, partition_key, data)
    }

    /// Append a record to an explicit partition
    pub fn publish_to(
        &self,
        partition_id: &str,
        partition_key: &str,
        data: impl Into<Bytes>,
    ) -> Result<SequenceNumber, StreamError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StreamError::transient("stream state poisoned"))?;
        state.last_sequence += 1;
        let sequence_number = state.last_sequence;
        let log = state
            .partitions
            .get_mut(partition_id)
            .ok_or_else(|| StreamError::UnknownPartition(partition_id.to_string()))?;
        log.records.push(StreamRecord {
            sequence_number,
            partition_key: partition_key.to_string(),
            data: data.into(),
            arrival_timestamp_ms: chrono::Utc::now().timestamp_millis(),
        });
        log.wake();
        Ok(sequence_number)
    }

    /// End all open subscriptions on a partition as if their lease ran out
    pub fn expire_subscriptions(&self, partition_id: &str) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(log) = state.partitions.get_mut(partition_id) {
                log.lease_epoch += 1;
                log.wake();
            }
        }
    }

    /// Make the next `count` subscribe calls on a partition fail transiently
    pub fn fail_next_subscribes(&self, partition_id: &str, count: u32) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(log) = state.partitions.get_mut(partition_id) {
                log.failing_subscribes += count;
            }
        }
    }

    /// Make open subscriptions on a partition yield `count` transient errors
    pub fn fail_next_reads(&self, partition_id: &str, count: u32) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(log) = state.partitions.get_mut(partition_id) {
                log.failing_reads += count;
                log.wake();
            }
        }
    }

    pub fn is_registered(&self, consumer_name: &str) -> bool {
        self.state
            .lock()
            .map(|s| s.consumers.contains_key(consumer_name))
            .unwrap_or(false)
    }

    pub fn deregistrations(&self) -> usize {
        self.state.lock().map(|s| s.deregistrations).unwrap_or(0)
    }

    pub fn last_sequence(&self) -> SequenceNumber {
        self.state.lock().map(|s| s.last_sequence).unwrap_or(0)
    }

    fn check_stream(state: &StreamState, stream_id: &str) -> Result<(), StreamError> {
        if state.stream_id == stream_id {
            Ok(())
        } else {
            Err(StreamError::UnknownStream(stream_id.to_string()))
        }
    }
}

/// Read position of one open subscription
struct SubscriptionCursor {
    state: Arc<Mutex<StreamState>>,
    partition_id: String,
    after: SequenceNumber,
    /// Start position not yet announced to the reader
    announce: bool,
    epoch: u64,
    delivered_batches: usize,
    lease_batches: Option<usize>,
    max_batch: usize,
    tail: watch::Receiver<u64>,
}

enum Poll {
    Batch(SubscriptionBatch),
    Fail(StreamError),
    Expired,
    Idle,
}

impl SubscriptionCursor {
    fn poll(&mut self) -> Poll {
        if self.announce {
            self.announce = false;
            return Poll::Batch(SubscriptionBatch {
                records: Vec::new(),
                continuation_token: Some(self.after),
                lag_millis: 0,
            });
        }
        if let Some(lease) = self.lease_batches {
            if self.delivered_batches >= lease {
                return Poll::Expired;
            }
        }

        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(_) => return Poll::Fail(StreamError::transient("stream state poisoned")),
        };
        let max_batch = self.max_batch;
        let log = match state.partitions.get_mut(&self.partition_id) {
            Some(log) => log,
            None => return Poll::Fail(StreamError::UnknownPartition(self.partition_id.clone())),
        };

        if log.lease_epoch != self.epoch {
            return Poll::Expired;
        }
        if log.failing_reads > 0 {
            log.failing_reads -= 1;
            return Poll::Fail(StreamError::transient("injected read failure"));
        }

        let records: Vec<StreamRecord> = log
            .records
            .iter()
            .filter(|r| r.sequence_number > self.after)
            .take(max_batch)
            .cloned()
            .collect();
        if records.is_empty() {
            return Poll::Idle;
        }

        let newest_arrival = log.records.last().map(|r| r.arrival_timestamp_ms).unwrap_or(0);
        let oldest_delivered = records[0].arrival_timestamp_ms;
        self.after = records[records.len() - 1].sequence_number;
        self.delivered_batches += 1;

        Poll::Batch(SubscriptionBatch {
            records,
            continuation_token: Some(self.after),
            lag_millis: (newest_arrival - oldest_delivered).max(0) as u64,
        })
    }

    async fn next_batch(mut self) -> Option<(Result<SubscriptionBatch, StreamError>, Self)> {
        loop {
            match self.poll() {
                Poll::Batch(batch) => return Some((Ok(batch), self)),
                Poll::Fail(error) => return Some((Err(error), self)),
                Poll::Expired => {
                    debug!(partition = %self.partition_id, "Subscription lease ended");
                    return None;
                }
                Poll::Idle => {
                    if self.tail.changed().await.is_err() {
                        return None;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl StreamProvider for MemoryStreamProvider {
    async fn register(
        &self,
        stream_id: &str,
        consumer_name: &str,
    ) -> Result<ConsumerHandle, StreamError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StreamError::transient("stream state poisoned"))?;
        Self::check_stream(&state, stream_id)?;

        if state.consumers.contains_key(consumer_name) {
            return Err(StreamError::RegistrationConflict {
                stream_id: stream_id.to_string(),
                consumer_name: consumer_name.to_string(),
            });
        }

        let handle = ConsumerHandle {
            stream_id: stream_id.to_string(),
            consumer_name: consumer_name.to_string(),
            consumer_id: Uuid::new_v4().to_string(),
        };
        state
            .consumers
            .insert(consumer_name.to_string(), handle.clone());
        Ok(handle)
    }

    async fn describe_consumer(
        &self,
        stream_id: &str,
        consumer_name: &str,
    ) -> Result<ConsumerHandle, StreamError> {
        let state = self
            .state
            .lock()
            .map_err(|_| StreamError::transient("stream state poisoned"))?;
        Self::check_stream(&state, stream_id)?;
        state
            .consumers
            .get(consumer_name)
            .cloned()
            .ok_or_else(|| StreamError::UnknownConsumer(consumer_name.to_string()))
    }

    async fn list_partitions(&self, stream_id: &str) -> Result<Vec<String>, StreamError> {
        let state = self
            .state
            .lock()
            .map_err(|_| StreamError::transient("stream state poisoned"))?;
        Self::check_stream(&state, stream_id)?;
        Ok(state.partitions.keys().cloned().collect())
    }

    async fn subscribe(
        &self,
        consumer: &ConsumerHandle,
        partition_id: &str,
        start: StartPosition,
    ) -> Result<SubscriptionStream, StreamError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StreamError::transient("stream state poisoned"))?;
        Self::check_stream(&state, &consumer.stream_id)?;

        match state.consumers.get(&consumer.consumer_name) {
            Some(known) if known.consumer_id == consumer.consumer_id => {}
            _ => return Err(StreamError::UnknownConsumer(consumer.consumer_name.clone())),
        }

        let last_sequence = state.last_sequence;
        let lease_batches = state.lease_batches;
        let max_batch = state.max_batch;
        let log = state
            .partitions
            .get_mut(partition_id)
            .ok_or_else(|| StreamError::UnknownPartition(partition_id.to_string()))?;

        if log.failing_subscribes > 0 {
            log.failing_subscribes -= 1;
            return Err(StreamError::transient("injected subscribe failure"));
        }

        let after = match start {
            StartPosition::Latest => last_sequence,
            StartPosition::AfterSequence(sequence) => sequence,
        };

        let cursor = SubscriptionCursor {
            state: Arc::clone(&self.state),
            partition_id: partition_id.to_string(),
            after,
            announce: true,
            epoch: log.lease_epoch,
            delivered_batches: 0,
            lease_batches,
            max_batch,
            tail: log.tail.subscribe(),
        };

        Ok(futures::stream::unfold(cursor, |cursor| cursor.next_batch()).boxed())
    }

    async fn deregister(&self, consumer: &ConsumerHandle) -> Result<(), StreamError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StreamError::transient("stream state poisoned"))?;
        match state.consumers.get(&consumer.consumer_name) {
            Some(known) if known.consumer_id == consumer.consumer_id => {
                state.consumers.remove(&consumer.consumer_name);
                state.deregistrations += 1;
                Ok(())
            }
            _ => Err(StreamError::UnknownConsumer(consumer.consumer_name.clone())),
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
