// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Store outages, slow lexicons and graceful shutdown

use super::common::{hi_frames, lexicon, next_word, skip, Fixture, SlowLexicon};
use glossa_resolver::lexicon::SearchMode;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_lexicon_timeout_emits_raw_word() {
    let mut fixture = Fixture::new();
    fixture.config.resolver.timeout_ms = 50;
    let (running, mut words) = fixture
        .start_with(Arc::new(SlowLexicon {
            inner: lexicon(),
            delay: Duration::from_secs(1),
        }))
        .await;

    for frame in hi_frames("s-1", 0) {
        fixture.publish("s-1", frame);
    }
    fixture.publish("s-1", skip("s-1", 700));

    let word = next_word(&mut words).await;
    assert_eq!(word.raw_word, "HI");
    assert!(word.unresolved);
    assert!(word.candidates.is_empty());
    assert_eq!(word.best(), "HI");
    assert_eq!(word.search_mode, Some(SearchMode::Prefix));

    running.shutdown().await;
}

#[tokio::test]
async fn test_store_outage_drops_events_until_recovery() {
    let fixture = Fixture::new();
    let (running, mut words) = fixture.start().await;

    fixture.store.set_available(false);
    for frame in hi_frames("s-1", 0) {
        fixture.publish("s-1", frame);
    }
    fixture.publish("s-1", skip("s-1", 700));

    for _ in 0..400 {
        if running.stats().store_failures() >= 9 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(running.stats().store_failures(), 9);
    assert!(words.try_recv().is_err());

    fixture.store.set_available(true);
    assert!(fixture.session("s-1").await.is_none());

    for frame in hi_frames("s-1", 1_000) {
        fixture.publish("s-1", frame);
    }
    fixture.publish("s-1", skip("s-1", 1_700));

    let word = next_word(&mut words).await;
    assert_eq!(word.raw_word, "HI");
    assert!(!word.unresolved);

    running.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_waits_for_inflight_resolution() {
    let fixture = Fixture::new();
    let (running, mut words) = fixture
        .start_with(Arc::new(SlowLexicon {
            inner: lexicon(),
            delay: Duration::from_millis(200),
        }))
        .await;

    for frame in hi_frames("s-1", 0) {
        fixture.publish("s-1", frame);
    }
    fixture.publish("s-1", skip("s-1", 700));

    for _ in 0..400 {
        let finalized: u64 = running.stats().shards.iter().map(|s| s.finalizations).sum();
        if finalized == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(words.try_recv().is_err());

    running.shutdown().await;
    let word = words.try_recv().unwrap();
    assert_eq!(word.raw_word, "HI");
    assert!(!word.unresolved);
    // Every sender is gone once the shards have stopped.
    assert!(words.recv().await.is_none());
}
