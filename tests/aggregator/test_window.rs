// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Window retention and leader selection under long noisy streams

use glossa_resolver::aggregator::{CommitConfig, CommitEngine};
use glossa_resolver::session::{SessionState, SlidingWindow, WindowEntry};
use glossa_resolver::stream::PredictionEvent;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn entry(letter: char, confidence: f64, timestamp_ms: i64) -> WindowEntry {
    WindowEntry {
        letter,
        confidence,
        timestamp_ms,
        sequence_number: timestamp_ms as u64,
    }
}

#[test]
fn test_window_never_holds_entries_older_than_duration() {
    let engine = CommitEngine::new(CommitConfig::default());
    let window_ms = engine.config().window_duration_ms as i64;
    let mut state = SessionState::new("s-1", "c-1");
    let mut rng = StdRng::seed_from_u64(42);
    let letters = ['A', 'B', 'C', 'D', 'E'];

    let mut t = 0i64;
    for seq in 0..2_000u64 {
        t += rng.gen_range(0..60);
        let event = PredictionEvent {
            session_id: "s-1".to_string(),
            connection_id: "c-1".to_string(),
            letter: letters[rng.gen_range(0..letters.len())],
            confidence: rng.gen_range(0.0..1.0),
            timestamp_ms: t,
            sequence_number: seq,
        };
        engine.apply(&mut state, &event, t);

        if let Some(newest) = state.window.newest_timestamp() {
            assert!(state
                .window
                .entries()
                .all(|e| e.timestamp_ms >= newest - window_ms));
        }
    }
    assert!(state.buffer.letters.chars().all(|c| letters.contains(&c)));
}

#[test]
fn test_push_reports_evictions() {
    let mut window = SlidingWindow::default();
    assert_eq!(window.push(entry('A', 0.9, 0), 100), 0);
    assert_eq!(window.push(entry('A', 0.9, 50), 100), 0);
    assert_eq!(window.push(entry('B', 0.9, 100), 100), 0);
    // 0 falls out once the newest entry is 101
    assert_eq!(window.push(entry('B', 0.9, 101), 100), 1);
    assert_eq!(window.len(), 3);
}

#[test]
fn test_leader_is_highest_confidence_sum() {
    let mut window = SlidingWindow::default();
    window.push(entry('A', 0.9, 0), 300);
    window.push(entry('B', 0.5, 10), 300);
    window.push(entry('B', 0.5, 20), 300);

    let leader = window.leader().unwrap();
    assert_eq!(leader.letter, 'B');
    assert_eq!(leader.count, 2);
    assert!((leader.average_confidence() - 0.5).abs() < 1e-9);
}

#[test]
fn test_leader_tie_goes_to_most_recent_letter() {
    let mut window = SlidingWindow::default();
    window.push(entry('A', 0.6, 0), 300);
    window.push(entry('B', 0.6, 10), 300);
    assert_eq!(window.leader().unwrap().letter, 'B');

    window.push(entry('A', 0.0, 20), 300);
    assert_eq!(window.leader().unwrap().letter, 'A');
}

#[test]
fn test_empty_window_has_no_leader() {
    let window = SlidingWindow::default();
    assert!(window.leader().is_none());
    assert!(window.newest_timestamp().is_none());
}
