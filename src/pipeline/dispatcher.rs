// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Routes letter events to the shard that owns their session

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::session::partition_for;
use crate::stream::{
    DispatchError, DispatchQueue, EventSink, LetterEvent, OverflowPolicy, PushOutcome,
};

/// Session-keyed fan-out over one queue per shard
#[derive(Clone)]
pub struct Dispatcher {
    queues: Vec<Arc<DispatchQueue<LetterEvent>>>,
}

impl Dispatcher {
    pub fn new(shards: usize, capacity: usize, policy: OverflowPolicy) -> Self {
        let queues = (0..shards.max(1))
            .map(|_| Arc::new(DispatchQueue::new(capacity, policy)))
            .collect();
        Self { queues }
    }

    pub fn shard_count(&self) -> usize {
        self.queues.len()
    }

    /// Shard index owning a session; stable for the process lifetime
    pub fn shard_for(&self, session_id: &str) -> usize {
        partition_for(session_id, self.queues.len())
    }

    pub fn queue(&self, shard: usize) -> Option<Arc<DispatchQueue<LetterEvent>>> {
        self.queues.get(shard).cloned()
    }

    /// Events evicted by `DropOldest` across all shards
    pub fn dropped(&self) -> u64 {
        self.queues.iter().map(|q| q.dropped()).sum()
    }

    /// Stop accepting events; shards drain what is queued and exit
    pub fn close(&self) {
        for queue in &self.queues {
            queue.close();
        }
    }

    pub async fn dispatch(
        &self,
        event: LetterEvent,
        cancel: &CancellationToken,
    ) -> Result<PushOutcome, DispatchError> {
        let shard = self.shard_for(event.session_id());
        self.queues[shard].push(event, cancel).await
    }
}

#[async_trait]
impl EventSink for Dispatcher {
    async fn deliver(
        &self,
        event: LetterEvent,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        self.dispatch(event, cancel).await.map(|_| ())
    }
}
