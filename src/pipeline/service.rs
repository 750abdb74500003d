// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Resolver service orchestration
//!
//! Wires the stream consumer, the session dispatcher, the shard actors and the
//! lexicon resolver together, and owns their shutdown order:
//! partition workers stop and deregister first, then the shard queues are
//! closed and drained, then in-flight resolutions complete.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::dispatcher::Dispatcher;
use super::output::ResolvedWord;
use super::shard::{SessionShard, ShardContext, ShardStats, ShardStatsSnapshot};
use crate::aggregator::{CommitEngine, Finalizer};
use crate::clock::Clock;
use crate::config::ServiceConfig;
use crate::lexicon::{LexiconBackend, LexiconResolver};
use crate::session::SessionStore;
use crate::stream::{
    RunningConsumer, StreamConsumer, StreamProvider, WorkerReport, WorkerStatsSnapshot,
};

/// Everything a service instance needs from the outside
pub struct ResolverService {
    config: ServiceConfig,
    provider: Arc<dyn StreamProvider>,
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn LexiconBackend>,
    clock: Arc<dyn Clock>,
}

impl ResolverService {
    pub fn new(
        config: ServiceConfig,
        provider: Arc<dyn StreamProvider>,
        store: Arc<dyn SessionStore>,
        backend: Arc<dyn LexiconBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            provider,
            store,
            backend,
            clock,
        }
    }

    /// Start shards and partition workers; resolved words arrive on the returned receiver
    pub async fn start(
        self,
        shutdown: &CancellationToken,
    ) -> Result<(RunningService, mpsc::Receiver<ResolvedWord>)> {
        self.config
            .validate()
            .context("Invalid service configuration")?;

        let (output_tx, output_rx) = mpsc::channel(self.config.pipeline.output_capacity);
        let dispatcher = Dispatcher::new(
            self.config.pipeline.session_shards,
            self.config.stream.queue_capacity,
            self.config.stream.overflow_policy,
        );

        let ctx = ShardContext {
            store: Arc::clone(&self.store),
            engine: CommitEngine::new(self.config.commit.clone()),
            finalizer: Finalizer::new(self.config.finalizer.clone()),
            resolver: Arc::new(LexiconResolver::new(
                Arc::clone(&self.backend),
                self.config.resolver.clone(),
            )),
            clock: Arc::clone(&self.clock),
            output: output_tx,
            lexicon_scope: self.config.pipeline.lexicon_scope.clone(),
        };

        let mut shards = Vec::with_capacity(dispatcher.shard_count());
        for index in 0..dispatcher.shard_count() {
            let queue = dispatcher
                .queue(index)
                .context("Dispatcher shard missing")?;
            let shard = SessionShard::new(index, queue, ctx.clone());
            let stats = shard.stats();
            shards.push((stats, tokio::spawn(shard.run())));
        }
        // Shards hold the only remaining senders, so the receiver ends when they stop.
        drop(ctx);

        let consumer = StreamConsumer::new(Arc::clone(&self.provider), self.config.stream.clone());
        let consumer = match consumer.start(Arc::new(dispatcher.clone()), shutdown).await {
            Ok(consumer) => consumer,
            Err(e) => {
                dispatcher.close();
                for (_, task) in shards {
                    let _ = task.await;
                }
                return Err(e).context("Failed to start stream consumer");
            }
        };

        info!(
            shards = dispatcher.shard_count(),
            partitions = consumer.partitions().len(),
            store = self.store.name(),
            lexicon = self.backend.name(),
            "Resolver service started"
        );

        Ok((
            RunningService {
                consumer,
                dispatcher,
                shards,
            },
            output_rx,
        ))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub workers: Vec<WorkerStatsSnapshot>,
    pub shards: Vec<ShardStatsSnapshot>,
    /// Events evicted from full dispatch queues
    pub dropped_events: u64,
}

impl ServiceStats {
    pub fn delivered(&self) -> u64 {
        self.workers.iter().map(|w| w.delivered).sum()
    }

    pub fn store_failures(&self) -> u64 {
        self.shards.iter().map(|s| s.store_failures).sum()
    }
}

#[derive(Debug, Clone)]
pub struct ServiceReport {
    pub workers: Vec<WorkerReport>,
    pub shards: Vec<ShardStatsSnapshot>,
    pub dropped_events: u64,
}

pub struct RunningService {
    consumer: RunningConsumer,
    dispatcher: Dispatcher,
    shards: Vec<(Arc<ShardStats>, JoinHandle<ShardStatsSnapshot>)>,
}

impl RunningService {
    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            workers: self.consumer.stats(),
            shards: self
                .shards
                .iter()
                .enumerate()
                .map(|(index, (stats, _))| stats.snapshot(index))
                .collect(),
            dropped_events: self.dispatcher.dropped(),
        }
    }

    pub async fn wait_until_subscribed(&self, timeout: Duration) -> bool {
        self.consumer.wait_until_subscribed(timeout).await
    }

    /// Graceful stop: workers, then shards, then pending resolutions
    pub async fn shutdown(self) -> ServiceReport {
        let workers = self.consumer.shutdown().await;
        self.dispatcher.close();

        let mut shards = Vec::with_capacity(self.shards.len());
        for (index, (stats, task)) in self.shards.into_iter().enumerate() {
            match task.await {
                Ok(snapshot) => shards.push(snapshot),
                Err(e) => {
                    error!(shard = index, error = %e, "Shard task failed");
                    shards.push(stats.snapshot(index));
                }
            }
        }

        let report = ServiceReport {
            workers,
            shards,
            dropped_events: self.dispatcher.dropped(),
        };
        info!(
            delivered = report.workers.iter().map(|w| w.stats.delivered).sum::<u64>(),
            dropped = report.dropped_events,
            "Resolver service stopped"
        );
        report
    }

    /// Stop everything abruptly, as a process crash would
    pub fn abort(self) {
        self.consumer.abort();
        self.dispatcher.close();
        for (_, task) in &self.shards {
            task.abort();
        }
    }
}
