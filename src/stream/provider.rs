// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Stream provider trait definition

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::types::{ConsumerHandle, StartPosition, StreamError, SubscriptionBatch};

/// Live push subscription to one partition.
///
/// Yields batches until the provider ends the lease (the stream returns `None`)
/// or fails (an `Err` item). Either way the worker resubscribes from its cursor.
pub type SubscriptionStream = BoxStream<'static, Result<SubscriptionBatch, StreamError>>;

/// Trait for push-based stream transports
///
/// The consumer only relies on this contract, so any partitioned log with
/// enhanced fan-out style subscriptions can back it.
#[async_trait]
pub trait StreamProvider: Send + Sync {
    /// Register a named consumer against the stream
    ///
    /// Returns `StreamError::RegistrationConflict` when the name is taken.
    async fn register(
        &self,
        stream_id: &str,
        consumer_name: &str,
    ) -> Result<ConsumerHandle, StreamError>;

    /// Look up an already registered consumer
    async fn describe_consumer(
        &self,
        stream_id: &str,
        consumer_name: &str,
    ) -> Result<ConsumerHandle, StreamError>;

    /// Partition identifiers of the stream
    async fn list_partitions(&self, stream_id: &str) -> Result<Vec<String>, StreamError>;

    /// Open a push subscription on one partition
    ///
    /// The first batch may carry no records; its continuation token then marks
    /// the position the subscription resolved `start` to.
    async fn subscribe(
        &self,
        consumer: &ConsumerHandle,
        partition_id: &str,
        start: StartPosition,
    ) -> Result<SubscriptionStream, StreamError>;

    /// Release the consumer identity
    async fn deregister(&self, consumer: &ConsumerHandle) -> Result<(), StreamError>;

    /// Get the provider name for logging
    fn name(&self) -> &'static str;
}
