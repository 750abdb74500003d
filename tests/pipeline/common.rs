// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Service fixture: in-memory stream, store and lexicon on a manual clock

#![allow(dead_code)]

use async_trait::async_trait;
use glossa_resolver::aggregator::{CommitConfig, FinalizerConfig};
use glossa_resolver::clock::ManualClock;
use glossa_resolver::config::ServiceConfig;
use glossa_resolver::lexicon::{
    Alias, InMemoryLexicon, LexiconBackend, LexiconEntry, ResolverError, SearchHit, SearchMode,
};
use glossa_resolver::pipeline::{ResolvedWord, ResolverService, RunningService};
use glossa_resolver::session::{MemorySessionStore, SessionState, SessionStore};
use glossa_resolver::stream::{BackoffConfig, MemoryStreamProvider, SequenceNumber};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const STREAM_ID: &str = "letters";

pub struct Fixture {
    pub provider: MemoryStreamProvider,
    pub store: Arc<MemorySessionStore>,
    pub clock: Arc<ManualClock>,
    pub config: ServiceConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(0));
        Self {
            provider: MemoryStreamProvider::new(STREAM_ID, 2),
            store: Arc::new(MemorySessionStore::new(
                1_000,
                Duration::from_secs(300),
                clock.clone(),
            )),
            clock,
            config: config(),
        }
    }

    pub async fn start(&self) -> (RunningService, mpsc::Receiver<ResolvedWord>) {
        self.start_with(Arc::new(lexicon())).await
    }

    pub async fn start_with(
        &self,
        backend: Arc<dyn LexiconBackend>,
    ) -> (RunningService, mpsc::Receiver<ResolvedWord>) {
        let service = ResolverService::new(
            self.config.clone(),
            Arc::new(self.provider.clone()),
            self.store.clone(),
            backend,
            self.clock.clone(),
        );
        let (running, words) = service.start(&CancellationToken::new()).await.unwrap();
        assert!(running.wait_until_subscribed(Duration::from_secs(2)).await);
        (running, words)
    }

    pub fn publish(&self, session_id: &str, line: String) -> SequenceNumber {
        self.provider.publish(session_id, line).unwrap()
    }

    pub async fn session(&self, session_id: &str) -> Option<SessionState> {
        self.store.load(session_id).await.unwrap()
    }

    /// Wait until the stored buffer of a session reads `letters`
    pub async fn wait_for_buffer(&self, session_id: &str, letters: &str) {
        for _ in 0..400 {
            if let Some(state) = self.session(session_id).await {
                if state.buffer.letters == letters {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("buffer of {} never reached {:?}", session_id, letters);
    }
}

pub fn config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.stream.stream_id = STREAM_ID.to_string();
    config.stream.consumer_name = "resolver-e2e".to_string();
    config.stream.backoff = BackoffConfig {
        base_ms: 1,
        cap_ms: 10,
        jitter_ratio: 0.0,
    };
    config.commit = CommitConfig {
        stability_duration_ms: 135,
        ..Default::default()
    };
    config.finalizer = FinalizerConfig {
        pause_duration_ms: 500,
        pause_check_interval_ms: 5,
    };
    config.pipeline.session_shards = 2;
    config.pipeline.lexicon_scope = Some("tenant-1".to_string());
    config
}

pub fn lexicon() -> InMemoryLexicon {
    InMemoryLexicon::new(1, 2).with_entries(vec![
        LexiconEntry::new(
            "AWS",
            vec![
                Alias::new("AWS", 1.0),
                Alias::new("AWX", 0.9),
                Alias::new("A6S", 0.85),
            ],
        ),
        LexiconEntry::new("AWARDS", vec![Alias::new("AWARD", 0.7)]),
        LexiconEntry::new("HI", vec![Alias::new("HI", 1.0)]),
    ])
}

pub fn prediction(session_id: &str, letter: char, confidence: f64, timestamp: i64) -> String {
    format!(
        r#"{{"session_id":"{}","connection_id":"conn-{}","event_type":"prediction","prediction":"{}","confidence":{},"timestamp":{}}}"#,
        session_id, session_id, letter, confidence, timestamp
    )
}

pub fn skip(session_id: &str, timestamp: i64) -> String {
    format!(
        r#"{{"session_id":"{}","connection_id":"conn-{}","event_type":"skip","skip_reason":"no_hands","timestamp":{}}}"#,
        session_id, session_id, timestamp
    )
}

pub fn session_end(session_id: &str, timestamp: i64) -> String {
    format!(
        r#"{{"session_id":"{}","connection_id":"conn-{}","event_type":"session_end","timestamp":{}}}"#,
        session_id, session_id, timestamp
    )
}

/// A-W-S frames with a flickering "6", in timestamp order
pub fn aws_frames(session_id: &str, start_ms: i64) -> Vec<String> {
    let mut frames: Vec<(char, f64, i64)> = Vec::new();
    for t in [0, 50, 100, 150, 200] {
        frames.push(('A', 0.9, t));
    }
    for t in [250, 300, 350, 400, 450] {
        frames.push(('W', 0.85, t));
    }
    for t in [275, 325, 375] {
        frames.push(('6', 0.4, t));
    }
    for t in [500, 550, 600, 650, 700] {
        frames.push(('S', 0.95, t));
    }
    frames.sort_by_key(|(_, _, t)| *t);
    frames
        .into_iter()
        .map(|(letter, confidence, t)| prediction(session_id, letter, confidence, start_ms + t))
        .collect()
}

/// Frames committing "HI" with the fixture's window settings
pub fn hi_frames(session_id: &str, start_ms: i64) -> Vec<String> {
    let mut frames = Vec::new();
    for i in 0..4 {
        frames.push(prediction(session_id, 'H', 0.9, start_ms + i * 50));
    }
    for i in 0..4 {
        frames.push(prediction(session_id, 'I', 0.9, start_ms + 400 + i * 50));
    }
    frames
}

pub async fn next_word(words: &mut mpsc::Receiver<ResolvedWord>) -> ResolvedWord {
    tokio::time::timeout(Duration::from_secs(3), words.recv())
        .await
        .expect("no resolved word in time")
        .expect("output channel closed")
}

/// In-memory lexicon behind an artificial delay
pub struct SlowLexicon {
    pub inner: InMemoryLexicon,
    pub delay: Duration,
}

#[async_trait]
impl LexiconBackend for SlowLexicon {
    async fn search(
        &self,
        query: &str,
        scope_id: &str,
        mode: SearchMode,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ResolverError> {
        tokio::time::sleep(self.delay).await;
        self.inner.search(query, scope_id, mode, limit).await
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

/// In-memory lexicon that records every query it serves
pub struct RecordingLexicon {
    pub inner: InMemoryLexicon,
    pub queries: Mutex<Vec<(String, SearchMode)>>,
}

impl RecordingLexicon {
    pub fn new(inner: InMemoryLexicon) -> Self {
        Self {
            inner,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<(String, SearchMode)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl LexiconBackend for RecordingLexicon {
    async fn search(
        &self,
        query: &str,
        scope_id: &str,
        mode: SearchMode,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ResolverError> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), mode));
        self.inner.search(query, scope_id, mode, limit).await
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
