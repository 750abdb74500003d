// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Consumer identity: conflict reuse and single-attempt deregistration

use super::common::{config, wait_for, CollectingSink, UnreliableProvider, STREAM_ID};
use glossa_resolver::stream::{MemoryStreamProvider, StreamConsumer, StreamError, StreamProvider};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_conflicting_registration_reuses_identity() {
    let provider = MemoryStreamProvider::new(STREAM_ID, 2);
    let stale = provider
        .register(STREAM_ID, &config().consumer_name)
        .await
        .unwrap();

    let running = StreamConsumer::new(Arc::new(provider.clone()), config())
        .start(Arc::new(CollectingSink::default()), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(running.handle().consumer_id, stale.consumer_id);
    assert!(running.wait_until_subscribed(Duration::from_secs(2)).await);

    running.shutdown().await;
    assert!(!provider.is_registered(&config().consumer_name));
}

#[tokio::test]
async fn test_deregistration_failure_does_not_block_shutdown() {
    let provider = Arc::new(UnreliableProvider::new(MemoryStreamProvider::new(STREAM_ID, 1)));
    provider.fail_deregister.store(true, Ordering::SeqCst);

    let running = StreamConsumer::new(provider.clone(), config())
        .start(Arc::new(CollectingSink::default()), &CancellationToken::new())
        .await
        .unwrap();
    assert!(running.wait_until_subscribed(Duration::from_secs(2)).await);

    let reports = tokio::time::timeout(Duration::from_secs(2), running.shutdown())
        .await
        .unwrap();
    assert_eq!(reports.len(), 1);
    // Still registered; the next start goes through the conflict path.
    assert!(provider.inner.is_registered(&config().consumer_name));
    assert_eq!(provider.inner.deregistrations(), 0);
}

#[tokio::test]
async fn test_parent_cancellation_stops_workers() {
    let provider = MemoryStreamProvider::new(STREAM_ID, 2);
    let shutdown = CancellationToken::new();
    let sink = Arc::new(CollectingSink::default());
    let running = StreamConsumer::new(Arc::new(provider.clone()), config())
        .start(sink.clone(), &shutdown)
        .await
        .unwrap();
    assert!(running.wait_until_subscribed(Duration::from_secs(2)).await);

    shutdown.cancel();
    tokio::time::sleep(Duration::from_millis(20)).await;
    provider
        .publish("s-1", super::common::prediction("s-1", 'A', 0))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(sink.len(), 0);

    let reports = running.shutdown().await;
    assert!(reports.iter().all(|r| r.stats.delivered == 0));
}

#[tokio::test]
async fn test_unknown_consumer_on_subscribe_is_retried() {
    let provider = MemoryStreamProvider::new(STREAM_ID, 1);
    let running = StreamConsumer::new(Arc::new(provider.clone()), config())
        .start(Arc::new(CollectingSink::default()), &CancellationToken::new())
        .await
        .unwrap();
    assert!(running.wait_until_subscribed(Duration::from_secs(2)).await);

    let handle = running.handle().clone();
    provider.deregister(&handle).await.unwrap();
    provider.expire_subscriptions("shard-0");
    wait_for(|| running.stats()[0].retries >= 1).await;

    running.shutdown().await;
    let err = provider.deregister(&handle).await.unwrap_err();
    assert!(matches!(err, StreamError::UnknownConsumer(_)));
}
