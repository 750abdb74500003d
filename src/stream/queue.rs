// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bounded hand-off queue between partition workers and session shards
//!
//! Two overflow policies:
//! - `Backpressure` (default): a full queue parks the producer until a slot
//!   frees up or the producer's cancellation token fires. Nothing is dropped,
//!   so per-partition ordering is preserved end to end.
//! - `DropOldest`: a full queue evicts its oldest item to admit the new one.
//!   Producers never wait; evictions are counted and logged.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    Backpressure,
    DropOldest,
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backpressure" => Ok(OverflowPolicy::Backpressure),
            "drop_oldest" | "drop-oldest" => Ok(OverflowPolicy::DropOldest),
            other => Err(format!("Unknown overflow policy: {}", other)),
        }
    }
}

/// How an item was admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// Admitted after evicting the oldest queued item
    DroppedOldest,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Producer gave up waiting for space because it is shutting down
    #[error("Dispatch cancelled")]
    Cancelled,

    #[error("Dispatch queue closed")]
    Closed,
}

/// Bounded multi-producer, single-consumer queue
pub struct DispatchQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    policy: OverflowPolicy,
    not_empty: Notify,
    not_full: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl<T> DispatchQueue<T> {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            policy,
            not_empty: Notify::new(),
            not_full: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items evicted under `DropOldest`
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting items and wake the consumer
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.not_empty.notify_one();
        self.not_full.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Admit an item according to the overflow policy
    pub async fn push(
        &self,
        item: T,
        cancel: &CancellationToken,
    ) -> Result<PushOutcome, DispatchError> {
        let mut pending = Some(item);
        loop {
            if self.is_closed() {
                return Err(DispatchError::Closed);
            }

            // Register interest before checking for space so a pop between the
            // check and the await still wakes us.
            let space = self.not_full.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            {
                let mut items = self.items.lock().map_err(|_| DispatchError::Closed)?;
                if items.len() < self.capacity {
                    if let Some(item) = pending.take() {
                        items.push_back(item);
                    }
                    drop(items);
                    self.not_empty.notify_one();
                    return Ok(PushOutcome::Enqueued);
                }

                if self.policy == OverflowPolicy::DropOldest {
                    items.pop_front();
                    if let Some(item) = pending.take() {
                        items.push_back(item);
                    }
                    drop(items);
                    let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(dropped_total = total, "Dispatch queue full, dropped oldest event");
                    self.not_empty.notify_one();
                    return Ok(PushOutcome::DroppedOldest);
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
                _ = &mut space => {}
            }
        }
    }

    /// Take the next item without waiting
    pub fn try_pop(&self) -> Option<T> {
        let item = self.items.lock().ok()?.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Wait for the next item; `None` once closed and drained
    pub async fn pop(&self) -> Option<T> {
        loop {
            let ready = self.not_empty.notified();
            tokio::pin!(ready);
            ready.as_mut().enable();

            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            if self.is_closed() {
                return None;
            }
            ready.await;
        }
    }
}
