// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Shared helpers for stream consumer tests

#![allow(dead_code)]

use async_trait::async_trait;
use glossa_resolver::stream::{
    BackoffConfig, ConsumerHandle, DispatchError, EventSink, LetterEvent, MemoryStreamProvider,
    StartPosition, StreamConfig, StreamError, StreamProvider, SubscriptionStream,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const STREAM_ID: &str = "letters";

#[derive(Default)]
pub struct CollectingSink {
    pub events: Mutex<Vec<LetterEvent>>,
}

impl CollectingSink {
    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn sequences(&self) -> Vec<u64> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.sequence_number())
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn deliver(
        &self,
        event: LetterEvent,
        _cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

pub fn config() -> StreamConfig {
    StreamConfig {
        stream_id: STREAM_ID.to_string(),
        consumer_name: "resolver-it".to_string(),
        backoff: BackoffConfig {
            base_ms: 1,
            cap_ms: 10,
            jitter_ratio: 0.0,
        },
        ..Default::default()
    }
}

pub fn prediction(session_id: &str, letter: char, timestamp: i64) -> String {
    format!(
        r#"{{"session_id":"{}","connection_id":"conn-{}","prediction":"{}","confidence":0.9,"timestamp":{}}}"#,
        session_id, session_id, letter, timestamp
    )
}

pub async fn wait_for<F: Fn() -> bool>(check: F) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

/// Wraps the in-memory stream to misbehave like a real provider can
pub struct UnreliableProvider {
    pub inner: MemoryStreamProvider,
    /// Resume the next resubscription one record early, pushing the last record again
    pub replay_next: AtomicBool,
    pub fail_deregister: AtomicBool,
}

impl UnreliableProvider {
    pub fn new(inner: MemoryStreamProvider) -> Self {
        Self {
            inner,
            replay_next: AtomicBool::new(false),
            fail_deregister: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl StreamProvider for UnreliableProvider {
    async fn register(
        &self,
        stream_id: &str,
        consumer_name: &str,
    ) -> Result<ConsumerHandle, StreamError> {
        self.inner.register(stream_id, consumer_name).await
    }

    async fn describe_consumer(
        &self,
        stream_id: &str,
        consumer_name: &str,
    ) -> Result<ConsumerHandle, StreamError> {
        self.inner.describe_consumer(stream_id, consumer_name).await
    }

    async fn list_partitions(&self, stream_id: &str) -> Result<Vec<String>, StreamError> {
        self.inner.list_partitions(stream_id).await
    }

    async fn subscribe(
        &self,
        consumer: &ConsumerHandle,
        partition_id: &str,
        start: StartPosition,
    ) -> Result<SubscriptionStream, StreamError> {
        let start = match start {
            StartPosition::AfterSequence(seq) if self.replay_next.swap(false, Ordering::SeqCst) => {
                StartPosition::AfterSequence(seq.saturating_sub(1))
            }
            other => other,
        };
        self.inner.subscribe(consumer, partition_id, start).await
    }

    async fn deregister(&self, consumer: &ConsumerHandle) -> Result<(), StreamError> {
        if self.fail_deregister.load(Ordering::SeqCst) {
            return Err(StreamError::transient("deregister rejected"));
        }
        self.inner.deregister(consumer).await
    }

    fn name(&self) -> &'static str {
        "unreliable"
    }
}
