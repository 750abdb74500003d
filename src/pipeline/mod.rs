// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session routing, shard actors and service orchestration

pub mod config;
pub mod dispatcher;
pub mod output;
pub mod service;
pub mod shard;

pub use config::PipelineConfig;
pub use dispatcher::Dispatcher;
pub use output::ResolvedWord;
pub use service::{ResolverService, RunningService, ServiceReport, ServiceStats};
pub use shard::{SessionShard, ShardContext, ShardStatsSnapshot};
