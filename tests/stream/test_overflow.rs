// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Full dispatch queues: backpressure stalls the worker, drop_oldest evicts

use super::common::{config, prediction, wait_for, STREAM_ID};
use glossa_resolver::pipeline::Dispatcher;
use glossa_resolver::stream::{
    MemoryStreamProvider, OverflowPolicy, RunningConsumer, StreamConsumer,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn run_with(policy: OverflowPolicy) -> (MemoryStreamProvider, Dispatcher, RunningConsumer) {
    let provider = MemoryStreamProvider::new(STREAM_ID, 1);
    let dispatcher = Dispatcher::new(1, 2, policy);
    let running = StreamConsumer::new(Arc::new(provider.clone()), config())
        .start(Arc::new(dispatcher.clone()), &CancellationToken::new())
        .await
        .unwrap();
    assert!(running.wait_until_subscribed(Duration::from_secs(2)).await);
    (provider, dispatcher, running)
}

#[tokio::test]
async fn test_backpressure_loses_nothing() {
    let (provider, dispatcher, running) = run_with(OverflowPolicy::Backpressure).await;
    for i in 0..5 {
        provider.publish("s-1", prediction("s-1", 'A', i)).unwrap();
    }

    let queue = dispatcher.queue(0).unwrap();
    wait_for(|| queue.len() == 2).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(running.stats()[0].delivered, 2);

    let mut drained = Vec::new();
    while drained.len() < 5 {
        let event = tokio::time::timeout(Duration::from_secs(2), queue.pop())
            .await
            .unwrap()
            .unwrap();
        drained.push(event.sequence_number());
    }
    assert_eq!(drained, vec![1, 2, 3, 4, 5]);
    assert_eq!(dispatcher.dropped(), 0);

    running.shutdown().await;
}

#[tokio::test]
async fn test_drop_oldest_keeps_newest_events() {
    let (provider, dispatcher, running) = run_with(OverflowPolicy::DropOldest).await;
    for i in 0..5 {
        provider.publish("s-1", prediction("s-1", 'A', i)).unwrap();
    }
    wait_for(|| running.stats()[0].delivered == 5).await;

    let queue = dispatcher.queue(0).unwrap();
    let kept: Vec<u64> = std::iter::from_fn(|| queue.try_pop())
        .map(|e| e.sequence_number())
        .collect();
    assert_eq!(kept, vec![4, 5]);
    assert_eq!(dispatcher.dropped(), 3);

    running.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_unblocks_stalled_worker() {
    let (provider, _dispatcher, running) = run_with(OverflowPolicy::Backpressure).await;
    for i in 0..5 {
        provider.publish("s-1", prediction("s-1", 'A', i)).unwrap();
    }
    wait_for(|| running.stats()[0].delivered == 2).await;

    let reports = tokio::time::timeout(Duration::from_secs(2), running.shutdown())
        .await
        .unwrap();
    assert_eq!(reports[0].stats.delivered, 2);
}
