// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Letter aggregation: commit rule and word finalization

pub mod commit;
pub mod config;
pub mod finalizer;

pub use commit::{phase, CommitDecision, CommitEngine, SessionPhase};
pub use config::{CommitConfig, FinalizerConfig, RepeatPolicy};
pub use finalizer::{FinalizeTrigger, FinalizedWord, Finalizer};
