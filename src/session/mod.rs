// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session state and its TTL-bounded store

pub mod config;
pub mod state;
pub mod store;

pub use config::SessionConfig;
pub use state::{CommitState, Leader, SessionState, SlidingWindow, Streak, WindowEntry, WordBuffer};
pub use store::{partition_for, MemorySessionStore, SessionStore, SessionStoreError};
