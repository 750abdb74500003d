// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// A crashed service restarts at the stream tip; events published while down never reach a window

use super::common::{prediction, Fixture};
use std::time::Duration;

#[tokio::test]
async fn test_restart_skips_events_published_while_down() {
    let fixture = Fixture::new();
    let (first, _words) = fixture.start().await;

    let before = fixture.publish("s-1", prediction("s-1", 'B', 0.9, 0));
    for _ in 0..400 {
        if first.stats().delivered() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    for _ in 0..400 {
        if fixture.session("s-1").await.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    first.abort();

    let missed: Vec<u64> = (1..=3)
        .map(|i| fixture.publish("s-1", prediction("s-1", 'X', 0.9, i * 10)))
        .collect();

    let (second, _words) = fixture.start().await;
    let fresh: Vec<u64> = (4..=6)
        .map(|i| fixture.publish("s-1", prediction("s-1", 'C', 0.9, i * 10)))
        .collect();

    let mut window_seen = false;
    for _ in 0..400 {
        if let Some(state) = fixture.session("s-1").await {
            if fresh.iter().all(|seq| state.window.contains_sequence(*seq)) {
                window_seen = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(window_seen);

    let state = fixture.session("s-1").await.unwrap();
    assert!(state.window.contains_sequence(before));
    assert!(missed.iter().all(|seq| !state.window.contains_sequence(*seq)));
    assert!(state.window.entries().all(|e| e.letter != 'X'));

    let report = second.shutdown().await;
    assert_eq!(
        report.workers.iter().map(|w| w.stats.delivered).sum::<u64>(),
        3
    );
    assert!(!fixture.provider.is_registered("resolver-e2e"));
}
