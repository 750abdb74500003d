// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Letter events in, resolved words out

use super::common::{
    aws_frames, hi_frames, lexicon, next_word, session_end, skip, Fixture, RecordingLexicon,
};
use glossa_resolver::aggregator::FinalizeTrigger;
use glossa_resolver::lexicon::SearchMode;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_aws_resolves_after_pause() {
    let fixture = Fixture::new();
    let recording = Arc::new(RecordingLexicon::new(lexicon()));
    let (running, mut words) = fixture.start_with(recording.clone()).await;

    for frame in aws_frames("s-aws", 0) {
        fixture.publish("s-aws", frame);
    }
    fixture.wait_for_buffer("s-aws", "AWS").await;

    // No pause while the processing clock stands still.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(words.try_recv().is_err());

    fixture.clock.set(600);
    let word = next_word(&mut words).await;
    assert_eq!(word.raw_word, "AWS");
    assert_eq!(word.trigger, FinalizeTrigger::Pause);
    assert!(!word.unresolved);
    assert_eq!(word.best(), "AWS");
    assert_eq!(word.search_mode, Some(SearchMode::Prefix));
    assert_eq!(word.session_id, "s-aws");
    assert_eq!(word.connection_id, "conn-s-aws");
    assert_eq!(word.timestamp.timestamp_millis(), 600);
    assert!(word.candidates.len() <= 5);

    let top = &word.candidates[0];
    assert_eq!(top.surface, "AWS");
    assert_eq!(top.alias_confidence, 1.0);
    assert_eq!(top.matched_via.as_deref(), Some("AWS"));

    let report = running.shutdown().await;
    assert_eq!(
        recording.queries(),
        vec![("AWS".to_string(), SearchMode::Prefix)]
    );
    assert_eq!(report.shards.iter().map(|s| s.commits).sum::<u64>(), 3);
    assert_eq!(report.shards.iter().map(|s| s.finalizations).sum::<u64>(), 1);
    assert_eq!(
        report.workers.iter().map(|w| w.stats.delivered).sum::<u64>(),
        18
    );
    assert!(fixture.session("s-aws").await.unwrap().buffer.is_empty());
}

#[tokio::test]
async fn test_skip_separates_words() {
    let fixture = Fixture::new();
    let (running, mut words) = fixture.start().await;

    for frame in hi_frames("s-1", 0) {
        fixture.publish("s-1", frame);
    }
    fixture.publish("s-1", skip("s-1", 700));
    for frame in aws_frames("s-1", 1_000) {
        fixture.publish("s-1", frame);
    }
    fixture.publish("s-1", skip("s-1", 1_800));

    let mut raw: Vec<String> = vec![
        next_word(&mut words).await,
        next_word(&mut words).await,
    ]
    .into_iter()
    .inspect(|w| assert_eq!(w.trigger, FinalizeTrigger::Skip))
    .map(|w| w.raw_word)
    .collect();
    raw.sort();
    assert_eq!(raw, vec!["AWS".to_string(), "HI".to_string()]);

    let state = fixture.session("s-1").await.unwrap();
    assert_eq!(state.words_finalized, 2);
    running.shutdown().await;
}

#[tokio::test]
async fn test_session_end_flushes_and_forgets_session() {
    let fixture = Fixture::new();
    let (running, mut words) = fixture.start().await;

    for frame in hi_frames("s-end", 0) {
        fixture.publish("s-end", frame);
    }
    fixture.publish("s-end", session_end("s-end", 900));

    let word = next_word(&mut words).await;
    assert_eq!(word.raw_word, "HI");
    assert_eq!(word.trigger, FinalizeTrigger::SessionEnd);
    assert_eq!(word.best(), "HI");
    assert!(fixture.session("s-end").await.is_none());

    let report = running.shutdown().await;
    assert_eq!(report.shards.iter().map(|s| s.sessions_ended).sum::<u64>(), 1);
}

#[tokio::test]
async fn test_interleaved_sessions_stay_isolated() {
    let fixture = Fixture::new();
    let (running, mut words) = fixture.start().await;

    let hi = hi_frames("s-hi", 0);
    let aws = aws_frames("s-aws", 0);
    for i in 0..hi.len().max(aws.len()) {
        if let Some(frame) = hi.get(i) {
            fixture.publish("s-hi", frame.clone());
        }
        if let Some(frame) = aws.get(i) {
            fixture.publish("s-aws", frame.clone());
        }
    }
    fixture.wait_for_buffer("s-hi", "HI").await;
    fixture.wait_for_buffer("s-aws", "AWS").await;

    fixture.clock.set(1_000);
    let mut resolved: Vec<(String, String)> = Vec::new();
    for _ in 0..2 {
        let word = next_word(&mut words).await;
        resolved.push((word.session_id.clone(), word.raw_word.clone()));
    }
    resolved.sort();
    assert_eq!(
        resolved,
        vec![
            ("s-aws".to_string(), "AWS".to_string()),
            ("s-hi".to_string(), "HI".to_string()),
        ]
    );
    running.shutdown().await;
}
