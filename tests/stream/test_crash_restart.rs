// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Cursors live in memory: a crashed consumer restarts at the stream tip

use super::common::{config, prediction, wait_for, CollectingSink, STREAM_ID};
use glossa_resolver::stream::{MemoryStreamProvider, StreamConsumer};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_records_published_while_down_are_lost() {
    let provider = MemoryStreamProvider::new(STREAM_ID, 2);

    let first_sink = Arc::new(CollectingSink::default());
    let first = StreamConsumer::new(Arc::new(provider.clone()), config())
        .start(first_sink.clone(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(first.wait_until_subscribed(Duration::from_secs(2)).await);
    let first_identity = first.handle().consumer_id.clone();

    for i in 0..4 {
        provider.publish("s-1", prediction("s-1", 'A', i)).unwrap();
    }
    wait_for(|| first_sink.len() == 4).await;

    first.abort();
    assert_eq!(provider.deregistrations(), 0);

    let mut missed = Vec::new();
    for i in 4..8 {
        missed.push(provider.publish("s-1", prediction("s-1", 'X', i)).unwrap());
    }

    let second_sink = Arc::new(CollectingSink::default());
    let second = StreamConsumer::new(Arc::new(provider.clone()), config())
        .start(second_sink.clone(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.handle().consumer_id, first_identity);
    assert!(second.wait_until_subscribed(Duration::from_secs(2)).await);

    let mut fresh = Vec::new();
    for i in 8..12 {
        fresh.push(provider.publish("s-1", prediction("s-1", 'B', i)).unwrap());
    }
    wait_for(|| second_sink.len() == 4).await;
    second.shutdown().await;

    let seen = second_sink.sequences();
    assert_eq!(seen, fresh);
    assert!(missed.iter().all(|seq| !seen.contains(seq)));
}
