// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Exponential backoff with jitter for partition workers

use rand::Rng;
use std::time::Duration;

use super::config::BackoffConfig;

/// Retry delay calculator
///
/// `delay = min(base * 2^retry_count, cap) + uniform(0, jitter * that)`.
/// The delay uses the count of failures before this one, so the first retry
/// waits `base`. The count is reset on the next successful delivery.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    jitter_ratio: f64,
    retry_count: u32,
}

impl Backoff {
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_ms),
            cap: Duration::from_millis(config.cap_ms),
            jitter_ratio: config.jitter_ratio.clamp(0.0, 1.0),
            retry_count: 0,
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Delay before jitter for a given retry count
    pub fn base_delay(&self, retry_count: u32) -> Duration {
        let factor = 1u64.checked_shl(retry_count).unwrap_or(u64::MAX);
        let base_ms = self.base.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms).min(self.cap)
    }

    /// Register a failure and return how long to wait before retrying
    pub fn next_delay(&mut self) -> Duration {
        self.next_delay_with(&mut rand::thread_rng())
    }

    pub fn next_delay_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Duration {
        let delay = self.base_delay(self.retry_count);
        self.retry_count = self.retry_count.saturating_add(1);
        let max_jitter = delay.as_secs_f64() * self.jitter_ratio;
        let jitter = if max_jitter > 0.0 {
            rng.gen_range(0.0..=max_jitter)
        } else {
            0.0
        };
        delay + Duration::from_secs_f64(jitter)
    }

    pub fn reset(&mut self) {
        self.retry_count = 0;
    }
}
