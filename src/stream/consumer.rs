// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Stream consumer lifecycle: register, fan out partition workers, shut down

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::config::StreamConfig;
use super::provider::StreamProvider;
use super::types::{ConsumerHandle, StreamError};
use super::worker::{EventSink, PartitionWorker, WorkerReport, WorkerStats, WorkerStatsSnapshot};

pub struct StreamConsumer {
    provider: Arc<dyn StreamProvider>,
    config: StreamConfig,
}

impl StreamConsumer {
    pub fn new(provider: Arc<dyn StreamProvider>, config: StreamConfig) -> Self {
        Self { provider, config }
    }

    /// Register the consumer identity, reusing an existing registration
    pub async fn register(&self) -> Result<ConsumerHandle, StreamError> {
        let stream_id = &self.config.stream_id;
        let consumer_name = &self.config.consumer_name;

        match self.provider.register(stream_id, consumer_name).await {
            Ok(handle) => {
                info!(
                    stream = %stream_id,
                    consumer = %consumer_name,
                    provider = self.provider.name(),
                    "Registered stream consumer"
                );
                Ok(handle)
            }
            Err(StreamError::RegistrationConflict { .. }) => {
                let handle = self
                    .provider
                    .describe_consumer(stream_id, consumer_name)
                    .await?;
                info!(
                    stream = %stream_id,
                    consumer = %consumer_name,
                    consumer_id = %handle.consumer_id,
                    "Consumer already registered, reusing identity"
                );
                Ok(handle)
            }
            Err(e) => Err(e),
        }
    }

    /// Register and spawn one worker per partition
    pub async fn start(
        self,
        sink: Arc<dyn EventSink>,
        shutdown: &CancellationToken,
    ) -> Result<RunningConsumer, StreamError> {
        let handle = self.register().await?;
        let partitions = self.provider.list_partitions(&self.config.stream_id).await?;
        let cancel = shutdown.child_token();

        let mut workers = Vec::with_capacity(partitions.len());
        for partition_id in partitions {
            let worker = PartitionWorker::new(
                partition_id.clone(),
                Arc::clone(&self.provider),
                handle.clone(),
                Arc::clone(&sink),
                &self.config.backoff,
                cancel.clone(),
            );
            let stats = worker.stats();
            let task = tokio::spawn(worker.run());
            workers.push(WorkerHandle {
                partition_id,
                stats,
                task,
            });
        }

        info!(
            consumer = %handle.consumer_name,
            partitions = workers.len(),
            "Stream consumer started"
        );

        Ok(RunningConsumer {
            provider: self.provider,
            handle,
            workers,
            cancel,
        })
    }
}

struct WorkerHandle {
    partition_id: String,
    stats: Arc<WorkerStats>,
    task: JoinHandle<WorkerReport>,
}

/// A started consumer; owns its partition workers
pub struct RunningConsumer {
    provider: Arc<dyn StreamProvider>,
    handle: ConsumerHandle,
    workers: Vec<WorkerHandle>,
    cancel: CancellationToken,
}

impl RunningConsumer {
    pub fn handle(&self) -> &ConsumerHandle {
        &self.handle
    }

    pub fn partitions(&self) -> Vec<String> {
        self.workers.iter().map(|w| w.partition_id.clone()).collect()
    }

    pub fn stats(&self) -> Vec<WorkerStatsSnapshot> {
        self.workers
            .iter()
            .map(|w| w.stats.snapshot(&w.partition_id))
            .collect()
    }

    /// Wait until every partition has an open subscription.
    ///
    /// New subscriptions start at the partition tip, so anything published
    /// before this returns `true` may never be seen.
    pub async fn wait_until_subscribed(&self, timeout: Duration) -> bool {
        let all_subscribed = || self.workers.iter().all(|w| w.stats.subscriptions() > 0);
        let poll = async {
            while !all_subscribed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(timeout, poll).await.is_ok()
    }

    /// Stop every worker, then release the consumer identity
    pub async fn shutdown(self) -> Vec<WorkerReport> {
        self.cancel.cancel();

        let mut reports = Vec::with_capacity(self.workers.len());
        for worker in self.workers {
            match worker.task.await {
                Ok(report) => reports.push(report),
                Err(e) => error!(partition = %worker.partition_id, error = %e, "Worker task failed"),
            }
        }

        // One attempt only; a stale registration is reused on the next start.
        match self.provider.deregister(&self.handle).await {
            Ok(()) => info!(consumer = %self.handle.consumer_name, "Deregistered stream consumer"),
            Err(e) => warn!(
                consumer = %self.handle.consumer_name,
                error = %e,
                "Failed to deregister stream consumer"
            ),
        }
        reports
    }

    /// Kill the workers without deregistering, as a process crash would
    pub fn abort(self) {
        for worker in &self.workers {
            worker.task.abort();
        }
        warn!(consumer = %self.handle.consumer_name, "Stream consumer aborted");
    }
}
