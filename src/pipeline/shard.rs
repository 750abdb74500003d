// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session shard actor
//!
//! Each shard is the only writer for the sessions hashed to it. It applies
//! events in queue order, sweeps for paused words on a fixed tick and runs
//! lexicon resolution off the event path.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::output::ResolvedWord;
use crate::aggregator::{CommitEngine, FinalizedWord, Finalizer};
use crate::clock::Clock;
use crate::lexicon::LexiconResolver;
use crate::session::{SessionState, SessionStore, SessionStoreError};
use crate::stream::{DispatchQueue, LetterEvent};

const TTL_SWEEP_INTERVAL_MS: i64 = 1_000;

/// Collaborators shared by every shard
#[derive(Clone)]
pub struct ShardContext {
    pub store: Arc<dyn SessionStore>,
    pub engine: CommitEngine,
    pub finalizer: Finalizer,
    pub resolver: Arc<LexiconResolver>,
    pub clock: Arc<dyn Clock>,
    pub output: mpsc::Sender<ResolvedWord>,
    pub lexicon_scope: Option<String>,
}

#[derive(Debug, Default)]
pub struct ShardStats {
    events: AtomicU64,
    commits: AtomicU64,
    finalizations: AtomicU64,
    sessions_ended: AtomicU64,
    sessions_expired: AtomicU64,
    store_failures: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStatsSnapshot {
    pub shard: usize,
    pub events: u64,
    pub commits: u64,
    pub finalizations: u64,
    pub sessions_ended: u64,
    pub sessions_expired: u64,
    pub store_failures: u64,
}

impl ShardStats {
    pub fn store_failures(&self) -> u64 {
        self.store_failures.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self, shard: usize) -> ShardStatsSnapshot {
        ShardStatsSnapshot {
            shard,
            events: self.events.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            finalizations: self.finalizations.load(Ordering::Relaxed),
            sessions_ended: self.sessions_ended.load(Ordering::Relaxed),
            sessions_expired: self.sessions_expired.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }
}

pub struct SessionShard {
    index: usize,
    queue: Arc<DispatchQueue<LetterEvent>>,
    ctx: ShardContext,
    /// Pause deadline of every session with a non-empty buffer
    pending: HashMap<String, i64>,
    resolutions: JoinSet<()>,
    last_ttl_sweep_ms: i64,
    stats: Arc<ShardStats>,
}

impl SessionShard {
    pub fn new(index: usize, queue: Arc<DispatchQueue<LetterEvent>>, ctx: ShardContext) -> Self {
        let last_ttl_sweep_ms = ctx.clock.now_ms();
        Self {
            index,
            queue,
            ctx,
            pending: HashMap::new(),
            resolutions: JoinSet::new(),
            last_ttl_sweep_ms,
            stats: Arc::new(ShardStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ShardStats> {
        Arc::clone(&self.stats)
    }

    /// Process events until the queue is closed and drained
    pub async fn run(mut self) -> ShardStatsSnapshot {
        let interval =
            Duration::from_millis(self.ctx.finalizer.config().pause_check_interval_ms.max(1));
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let queue = Arc::clone(&self.queue);
        loop {
            tokio::select! {
                event = queue.pop() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                _ = ticker.tick() => self.sweep().await,
                Some(joined) = self.resolutions.join_next(), if !self.resolutions.is_empty() => {
                    if let Err(e) = joined {
                        error!(shard = self.index, error = %e, "Resolution task failed");
                    }
                }
            }
        }

        // In-flight resolutions are bounded by the resolver timeout.
        while let Some(joined) = self.resolutions.join_next().await {
            if let Err(e) = joined {
                error!(shard = self.index, error = %e, "Resolution task failed");
            }
        }
        info!(shard = self.index, pending = self.pending.len(), "Session shard stopped");
        self.stats.snapshot(self.index)
    }

    async fn handle_event(&mut self, event: LetterEvent) {
        self.stats.events.fetch_add(1, Ordering::Relaxed);
        let now_ms = self.ctx.clock.now_ms();
        let session_id = event.session_id().to_string();

        let mut state = match self.ctx.store.load(&session_id).await {
            Ok(Some(state)) => state,
            Ok(None) => SessionState::new(session_id.clone(), event.connection_id()),
            Err(e) => return self.store_failure(&session_id, e),
        };
        if state.connection_id != event.connection_id() {
            state.connection_id = event.connection_id().to_string();
        }

        let word = match &event {
            LetterEvent::Prediction(prediction) => {
                let decision = self.ctx.engine.apply(&mut state, prediction, now_ms);
                if decision.committed().is_some() {
                    self.stats.commits.fetch_add(1, Ordering::Relaxed);
                }
                None
            }
            LetterEvent::Skip(skip) => {
                debug!(session_id = %session_id, reason = ?skip.reason, "Skip signal");
                self.ctx.finalizer.on_skip(&mut state, now_ms)
            }
            LetterEvent::SessionEnd(_) => {
                let word = self.ctx.finalizer.on_session_end(&mut state, now_ms);
                self.pending.remove(&session_id);
                if let Err(e) = self.ctx.store.remove(&session_id).await {
                    return self.store_failure(&session_id, e);
                }
                self.stats.sessions_ended.fetch_add(1, Ordering::Relaxed);
                info!(session_id = %session_id, words = state.words_finalized, "Session ended");
                if let Some(word) = word {
                    self.spawn_resolution(word);
                }
                return;
            }
        };

        match self.ctx.finalizer.pause_deadline(&state) {
            Some(deadline) => self.pending.insert(session_id.clone(), deadline),
            None => self.pending.remove(&session_id),
        };

        if let Err(e) = self.ctx.store.save(state).await {
            return self.store_failure(&session_id, e);
        }
        if let Some(word) = word {
            self.spawn_resolution(word);
        }
    }

    async fn sweep(&mut self) {
        let now_ms = self.ctx.clock.now_ms();
        let due: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now_ms)
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in due {
            self.pending.remove(&session_id);
            let mut state = match self.ctx.store.load(&session_id).await {
                Ok(Some(state)) => state,
                Ok(None) => {
                    warn!(session_id = %session_id, "Session gone before its pause elapsed, word lost");
                    continue;
                }
                Err(e) => {
                    // Keep the deadline so the pause is retried once the store is back.
                    self.pending.insert(session_id.clone(), now_ms);
                    self.store_failure(&session_id, e);
                    continue;
                }
            };

            let Some(word) = self.ctx.finalizer.poll_pause(&mut state, now_ms) else {
                if let Some(deadline) = self.ctx.finalizer.pause_deadline(&state) {
                    self.pending.insert(session_id, deadline);
                }
                continue;
            };
            match self.ctx.store.save(state).await {
                Ok(()) => self.spawn_resolution(word),
                Err(e) => {
                    self.pending.insert(session_id.clone(), now_ms);
                    self.store_failure(&session_id, e);
                }
            }
        }

        if now_ms - self.last_ttl_sweep_ms >= TTL_SWEEP_INTERVAL_MS {
            self.last_ttl_sweep_ms = now_ms;
            match self.ctx.store.evict_expired().await {
                Ok(expired) => {
                    for session_id in &expired {
                        if self.pending.remove(session_id).is_some() {
                            warn!(session_id = %session_id, "Session expired with unfinished word");
                        }
                    }
                    self.stats
                        .sessions_expired
                        .fetch_add(expired.len() as u64, Ordering::Relaxed);
                }
                Err(e) => self.store_failure("*", e),
            }
        }
    }

    fn spawn_resolution(&mut self, word: FinalizedWord) {
        self.stats.finalizations.fetch_add(1, Ordering::Relaxed);
        let resolver = Arc::clone(&self.ctx.resolver);
        let output = self.ctx.output.clone();
        let scope = self
            .ctx
            .lexicon_scope
            .clone()
            .unwrap_or_else(|| word.session_id.clone());

        self.resolutions.spawn(async move {
            let resolution = resolver.resolve(&word.raw_word, &scope).await;
            let resolved = ResolvedWord::new(word, resolution);
            if output.send(resolved).await.is_err() {
                warn!("Output channel closed, dropping resolved word");
            }
        });
    }

    fn store_failure(&self, session_id: &str, e: SessionStoreError) {
        let failures = self.stats.store_failures.fetch_add(1, Ordering::Relaxed) + 1;
        error!(
            shard = self.index,
            session_id = %session_id,
            store = self.ctx.store.name(),
            failures,
            error = %e,
            "Session store failure, event not applied"
        );
    }
}
