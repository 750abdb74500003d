// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session store with idle TTL
//!
//! The in-process store is split into hash partitions so shards working on
//! different sessions do not share a lock.

use async_trait::async_trait;
use lru::LruCache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::state::SessionState;
use crate::clock::Clock;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionStoreError {
    /// Store cannot be read or written; aggregation must not proceed
    #[error("Session store unavailable: {message}")]
    Unavailable { message: String },
}

/// Keyed session state, expiring after a period without writes
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current state, or `None` if unknown or expired
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>, SessionStoreError>;

    /// Write state and refresh its TTL
    async fn save(&self, state: SessionState) -> Result<(), SessionStoreError>;

    async fn remove(&self, session_id: &str) -> Result<Option<SessionState>, SessionStoreError>;

    /// Drop every expired session and return their ids
    async fn evict_expired(&self) -> Result<Vec<String>, SessionStoreError>;

    async fn len(&self) -> Result<usize, SessionStoreError>;

    /// Get the store name for logging
    fn name(&self) -> &'static str;
}

struct StoredSession {
    state: SessionState,
    touched_at_ms: i64,
}

type Partition = Mutex<LruCache<String, StoredSession>>;

/// Partition owning a session; the dispatcher routes shards with the same hash
pub fn partition_for(session_id: &str, count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    session_id.hash(&mut hasher);
    (hasher.finish() % count.max(1) as u64) as usize
}

/// In-process store bounded by LRU capacity and idle TTL
///
/// Sessions are spread over independently locked partitions keyed by session
/// id. With one partition per shard, shards never contend for a lock.
pub struct MemorySessionStore {
    partitions: Vec<Partition>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
    evictions: AtomicU64,
}

impl MemorySessionStore {
    /// Single partition holding up to `capacity` sessions
    pub fn new(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self::partitioned(1, capacity, ttl, clock)
    }

    /// `partitions` partitions of `capacity_per_partition` sessions each
    pub fn partitioned(
        partitions: usize,
        capacity_per_partition: usize,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity_per_partition).unwrap_or(NonZeroUsize::MIN);
        Self {
            partitions: (0..partitions.max(1))
                .map(|_| Mutex::new(LruCache::new(capacity)))
                .collect(),
            ttl,
            clock,
            available: AtomicBool::new(true),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Unexpired sessions pushed out by capacity
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Simulate an outage of the backing store
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), SessionStoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SessionStoreError::Unavailable {
                message: "memory store marked unavailable".to_string(),
            })
        }
    }

    fn lock_partition(
        partition: &Partition,
    ) -> Result<MutexGuard<'_, LruCache<String, StoredSession>>, SessionStoreError> {
        partition.lock().map_err(|_| SessionStoreError::Unavailable {
            message: "session map poisoned".to_string(),
        })
    }

    fn lock(
        &self,
        session_id: &str,
    ) -> Result<MutexGuard<'_, LruCache<String, StoredSession>>, SessionStoreError> {
        let index = partition_for(session_id, self.partitions.len());
        Self::lock_partition(&self.partitions[index])
    }

    fn is_expired(&self, touched_at_ms: i64, now_ms: i64) -> bool {
        now_ms.saturating_sub(touched_at_ms) > self.ttl.as_millis() as i64
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>, SessionStoreError> {
        self.check_available()?;
        let now_ms = self.clock.now_ms();
        let mut sessions = self.lock(session_id)?;

        let expired = match sessions.get(session_id) {
            Some(stored) => self.is_expired(stored.touched_at_ms, now_ms),
            None => return Ok(None),
        };
        if expired {
            sessions.pop(session_id);
            debug!(session_id = %session_id, "Session expired on load");
            return Ok(None);
        }
        Ok(sessions.get(session_id).map(|s| s.state.clone()))
    }

    async fn save(&self, state: SessionState) -> Result<(), SessionStoreError> {
        self.check_available()?;
        let touched_at_ms = self.clock.now_ms();
        let session_id = state.session_id.clone();
        let evicted = self.lock(&session_id)?.push(
            session_id.clone(),
            StoredSession {
                state,
                touched_at_ms,
            },
        );

        if let Some((evicted_id, stored)) = evicted {
            if evicted_id == session_id {
                return Ok(());
            }
            if self.is_expired(stored.touched_at_ms, touched_at_ms) {
                debug!(session_id = %evicted_id, "Expired session displaced by capacity");
            } else {
                let total = self.evictions.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    session_id = %evicted_id,
                    unfinished_letters = stored.state.buffer.letters.len(),
                    evictions_total = total,
                    "Session store partition full, evicted live session"
                );
            }
        }
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<Option<SessionState>, SessionStoreError> {
        self.check_available()?;
        Ok(self.lock(session_id)?.pop(session_id).map(|s| s.state))
    }

    async fn evict_expired(&self) -> Result<Vec<String>, SessionStoreError> {
        self.check_available()?;
        let now_ms = self.clock.now_ms();

        let mut expired = Vec::new();
        for partition in &self.partitions {
            let mut sessions = Self::lock_partition(partition)?;
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, stored)| self.is_expired(stored.touched_at_ms, now_ms))
                .map(|(id, _)| id.clone())
                .collect();
            for id in &ids {
                sessions.pop(id);
            }
            expired.extend(ids);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "Evicted expired sessions");
        }
        Ok(expired)
    }

    async fn len(&self) -> Result<usize, SessionStoreError> {
        self.check_available()?;
        let mut total = 0;
        for partition in &self.partitions {
            total += Self::lock_partition(partition)?.len();
        }
        Ok(total)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
