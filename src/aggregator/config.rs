// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Commit engine and finalizer configuration

use serde::{Deserialize, Serialize};
use std::env;

/// How repeated commits of the same letter are limited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepeatPolicy {
    /// Reject a repeat of the last committed letter until this much event time has passed
    MinInterval { dedupe_threshold_ms: u64 },
    /// Allow at most this many identical commits in a row
    MaxConsecutive { max_consecutive_same: u32 },
}

impl Default for RepeatPolicy {
    fn default() -> Self {
        RepeatPolicy::MaxConsecutive {
            max_consecutive_same: 1,
        }
    }
}

impl RepeatPolicy {
    pub const DEFAULT_DEDUPE_THRESHOLD_MS: u64 = 600;

    fn from_env(default: RepeatPolicy) -> RepeatPolicy {
        let kind = env::var("REPEAT_POLICY").ok();
        let threshold = env::var("DEDUPE_THRESHOLD_MS")
            .ok()
            .and_then(|v| v.parse().ok());
        let max_same = env::var("MAX_CONSECUTIVE_SAME")
            .ok()
            .and_then(|v| v.parse().ok());

        match kind.as_deref().map(str::trim) {
            Some("min_interval") => RepeatPolicy::MinInterval {
                dedupe_threshold_ms: threshold.unwrap_or(Self::DEFAULT_DEDUPE_THRESHOLD_MS),
            },
            Some("max_consecutive") => RepeatPolicy::MaxConsecutive {
                max_consecutive_same: max_same.unwrap_or(1),
            },
            _ => match default {
                RepeatPolicy::MinInterval { dedupe_threshold_ms } => RepeatPolicy::MinInterval {
                    dedupe_threshold_ms: threshold.unwrap_or(dedupe_threshold_ms),
                },
                RepeatPolicy::MaxConsecutive {
                    max_consecutive_same,
                } => RepeatPolicy::MaxConsecutive {
                    max_consecutive_same: max_same.unwrap_or(max_consecutive_same),
                },
            },
        }
    }
}

/// Sliding-window commit rule settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitConfig {
    /// Window retention, relative to the newest entry. Must stay short enough
    /// that a letter held for the stability time can outweigh its predecessor.
    pub window_duration_ms: u64,
    /// How long a letter must lead before it commits
    pub stability_duration_ms: u64,
    /// Per-frame voting floor
    pub min_confidence: f64,
    /// Average confidence the leader needs across the window to commit
    pub commit_min_average_confidence: f64,
    pub repeat_policy: RepeatPolicy,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            window_duration_ms: 150,
            stability_duration_ms: 135,
            min_confidence: 0.3,
            commit_min_average_confidence: 0.4,
            repeat_policy: RepeatPolicy::default(),
        }
    }
}

impl CommitConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            window_duration_ms: env::var("WINDOW_DURATION_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.window_duration_ms),
            stability_duration_ms: env::var("STABILITY_DURATION_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.stability_duration_ms),
            min_confidence: env::var("MIN_CONFIDENCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_confidence),
            commit_min_average_confidence: env::var("COMMIT_MIN_AVERAGE_CONFIDENCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.commit_min_average_confidence),
            repeat_policy: RepeatPolicy::from_env(defaults.repeat_policy),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.window_duration_ms == 0 {
            return Err("Window duration must be greater than 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err("Minimum confidence must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.commit_min_average_confidence) {
            return Err("Commit average confidence floor must be within [0, 1]".to_string());
        }
        if let RepeatPolicy::MaxConsecutive {
            max_consecutive_same: 0,
        } = self.repeat_policy
        {
            return Err("max_consecutive_same must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Word completion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizerConfig {
    /// Silence after the last commit that completes a word
    pub pause_duration_ms: u64,
    /// How often shards look for paused sessions
    pub pause_check_interval_ms: u64,
}

impl Default for FinalizerConfig {
    fn default() -> Self {
        Self {
            pause_duration_ms: 500,
            pause_check_interval_ms: 50,
        }
    }
}

impl FinalizerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            pause_duration_ms: env::var("PAUSE_DURATION_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.pause_duration_ms),
            pause_check_interval_ms: env::var("PAUSE_CHECK_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.pause_check_interval_ms),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.pause_duration_ms == 0 {
            return Err("Pause duration must be greater than 0".to_string());
        }
        if self.pause_check_interval_ms == 0 {
            return Err("Pause check interval must be greater than 0".to_string());
        }
        Ok(())
    }
}
