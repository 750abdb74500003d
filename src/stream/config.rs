// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the letter stream consumer

use serde::{Deserialize, Serialize};
use std::env;

use super::queue::OverflowPolicy;

/// Configuration for the partition consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Stream carrying letter predictions
    pub stream_id: String,
    /// Consumer identity registered with the provider
    pub consumer_name: String,
    /// Retry policy for provider errors
    pub backoff: BackoffConfig,
    /// Capacity of each session shard's dispatch queue
    pub queue_capacity: usize,
    /// What to do when a dispatch queue is full
    pub overflow_policy: OverflowPolicy,
}

/// Exponential backoff settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub cap_ms: u64,
    /// Upper bound of the uniform jitter, as a fraction of the delay
    pub jitter_ratio: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 2_000,
            cap_ms: 60_000,
            jitter_ratio: 0.1,
        }
    }
}

impl StreamConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stream_id: env::var("LETTERS_STREAM_NAME").unwrap_or(defaults.stream_id),
            consumer_name: env::var("CONSUMER_NAME").unwrap_or(defaults.consumer_name),
            backoff: BackoffConfig {
                base_ms: env::var("BACKOFF_BASE_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.backoff.base_ms),
                cap_ms: env::var("BACKOFF_CAP_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.backoff.cap_ms),
                jitter_ratio: env::var("BACKOFF_JITTER_RATIO")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.backoff.jitter_ratio),
            },
            queue_capacity: env::var("DISPATCH_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.queue_capacity),
            overflow_policy: env::var("DISPATCH_OVERFLOW_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.overflow_policy),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.stream_id.trim().is_empty() {
            return Err("Stream id must not be empty".to_string());
        }
        if self.consumer_name.trim().is_empty() {
            return Err("Consumer name must not be empty".to_string());
        }
        if self.backoff.base_ms == 0 || self.backoff.cap_ms < self.backoff.base_ms {
            return Err("Backoff cap must be at least the (non-zero) base delay".to_string());
        }
        if !(0.0..=1.0).contains(&self.backoff.jitter_ratio) {
            return Err("Backoff jitter ratio must be within [0, 1]".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("Dispatch queue capacity must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        let host = env::var("HOSTNAME").unwrap_or_else(|_| "local".to_string());
        Self {
            stream_id: "asl-letters-stream".to_string(),
            consumer_name: format!("glossa-resolver-{}", host),
            backoff: BackoffConfig::default(),
            queue_capacity: 1024,
            overflow_policy: OverflowPolicy::Backpressure,
        }
    }
}
